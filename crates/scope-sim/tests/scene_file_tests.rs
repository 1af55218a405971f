use scope_core::config::SamplerConfig;
use scope_core::controller::TaskSampler;
use scope_core::task::TaskDefinition;
use scope_sim::scene::{SceneDescription, SceneError};
use scope_sim::world::BoxWorld;
use scope_test_utils::{living_rooms, rng};
use std::io::Write;
use tempfile::NamedTempFile;

const TASK: &str = r#"{
    "activity": "putting_apple_on_table",
    "objects": {
        "table.n.02": ["table.n.02_1"],
        "apple.n.01": ["apple.n.01_1"]
    },
    "initial_conditions": [
        {"predicate": "inroom", "body": ["table.n.02_1", "living_room"]},
        {"predicate": "ontop", "body": ["apple.n.01_1", "table.n.02_1"]}
    ],
    "non_sampleable_categories": ["table.n.02"]
}"#;

fn write(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_sample_from_files() {
    let scene = write(&serde_json::to_string(&living_rooms()).unwrap());
    let task = write(TASK);
    let config = write("max_goal_condition_sets = 2\nseed = 4\n\n[placement]\nmax_trials = 50\n");

    let config = SamplerConfig::load(config.path()).unwrap();
    let task = TaskDefinition::load(task.path()).unwrap();
    let mut world = BoxWorld::load(scene.path()).unwrap();
    let report = TaskSampler::new(config.clone())
        .sample(&task, &mut world, &mut rng(config.seed.unwrap()))
        .unwrap();

    assert_eq!(config.placement.max_trials, 50);
    assert!(report.success, "{:?}", report.failure);
    assert!(report.placement.max_trial_steps <= 50);
}

#[test]
fn test_scene_round_trips_through_json() {
    let scene = living_rooms();
    let text = serde_json::to_string_pretty(&scene).unwrap();
    assert_eq!(SceneDescription::from_json_str(&text).unwrap(), scene);
}

#[test]
fn test_missing_scene_file() {
    let err = BoxWorld::load("/nonexistent/scene.json").unwrap_err();
    assert!(matches!(err, SceneError::Io { .. }));
}

#[test]
fn test_object_in_undeclared_room_is_rejected() {
    let text = r#"{
        "scene_id": "broken",
        "objects": [{"name": "t", "category": "table", "room": "attic_0",
                     "position": [0, 0, 0.4], "parts": [{"half_extents": [0.5, 0.5, 0.4]}]}]
    }"#;
    let err = BoxWorld::from_description(SceneDescription::from_json_str(text).unwrap()).unwrap_err();
    assert!(matches!(err, SceneError::UnknownRoom { .. }));
}

#[test]
fn test_duplicate_object_names_are_rejected() {
    let scene = living_rooms().with_object(scope_test_utils::table("table_0", "living_room_1", 14.5, 3.0));
    assert!(matches!(
        BoxWorld::from_description(scene),
        Err(SceneError::DuplicateName(name)) if name == "table_0"
    ));
}
