use nalgebra::Vector3;
use pretty_assertions::assert_eq;
use scope_core::condition::{Predicate, SupportPredicate};
use scope_core::config::{InstantiationPolicy, PlacementConfig};
use scope_core::instantiator::{Provenance, SampleableInstantiator};
use scope_core::journal::SamplingJournal;
use scope_core::physics::{in_contact, PhysicsWorld};
use scope_core::placement::{PlacementOutcome, PlacementSampler};
use scope_core::predicates;
use scope_core::scope::ObjectScope;
use scope_core::types::RoleId;
use scope_core::SceneCatalog;
use scope_test_utils::*;

fn room_with_table() -> scope_sim::scene::SceneDescription {
    base_scene("one_table")
        .with_room("living_room_0", "living_room", [0.0, 0.0], [6.0, 6.0])
        .with_object(table("table_0", "living_room_0", 3.0, 3.0))
        .with_object(apple("apple_0", "living_room_0", 0.5, 0.5))
}

#[test]
fn test_placement_leaves_object_collision_free_before_settling() {
    let config = PlacementConfig {
        settle_duration_secs: 0.0,
        ..PlacementConfig::default()
    };
    for seed in 0..5 {
        let mut world = world(room_with_table());
        let (apple, table) = (id(&world, "apple_0"), id(&world, "table_0"));
        let outcome = PlacementSampler::new(&config)
            .place(&mut world, apple, table, SupportPredicate::OnTop, &mut rng(seed))
            .unwrap();

        assert!(outcome.is_placed(), "{outcome:?}");
        assert!(world.contacts(apple).unwrap().is_empty());
        let aabb = world.aabb(apple).unwrap();
        assert!((aabb.min.z - (TABLE_HEIGHT + config.z_offset)).abs() < 1e-9);
        assert_eq!(world.saved_state_count(), 0);
    }
}

#[test]
fn test_settled_object_rests_on_support() {
    let config = PlacementConfig::default();
    let mut world = world(room_with_table());
    let (apple, table) = (id(&world, "apple_0"), id(&world, "table_0"));
    let outcome = PlacementSampler::new(&config)
        .place(&mut world, apple, table, SupportPredicate::OnTop, &mut rng(4))
        .unwrap();

    assert!(outcome.is_placed());
    assert!(in_contact(&world, apple, table).unwrap());
    assert!(predicates::evaluate(&world, Predicate::OnTop, apple, table).unwrap());
    assert!(!predicates::evaluate(&world, Predicate::Under, apple, table).unwrap());
}

#[test]
fn test_fully_blocked_surface_takes_exactly_max_trials_steps() {
    let config = PlacementConfig::default();
    let scene = room_with_table().with_object(lid("lid_0", "living_room_0", 3.0, 3.0));
    let mut world = world(scene);
    let (apple, table) = (id(&world, "apple_0"), id(&world, "table_0"));
    let before = world.step_count();
    let outcome = PlacementSampler::new(&config)
        .place(&mut world, apple, table, SupportPredicate::OnTop, &mut rng(8))
        .unwrap();

    assert_eq!(
        outcome,
        PlacementOutcome::Exhausted {
            trials: 100,
            trial_steps: 100
        }
    );
    assert_eq!(world.step_count() - before, 100);
    assert_eq!(world.saved_state_count(), 0);
}

#[test]
fn test_empty_eroded_grid_fails_without_stepping() {
    let config = PlacementConfig::default();
    let mut world = world(kitchen_with_bowl(0.01).with_object(apple("apple_0", "kitchen_0", 0.5, 0.5)));
    let (apple, bowl) = (id(&world, "apple_0"), id(&world, "bowl_0"));
    let before = world.step_count();
    let outcome = PlacementSampler::new(&config)
        .place(&mut world, apple, bowl, SupportPredicate::Inside, &mut rng(1))
        .unwrap();

    assert_eq!(
        outcome,
        PlacementOutcome::Exhausted {
            trials: 100,
            trial_steps: 0
        }
    );
    assert_eq!(world.step_count(), before);
}

#[test]
fn test_support_without_matching_surface() {
    let config = PlacementConfig::default();
    let mut world = world(room_with_table());
    let (apple, table) = (id(&world, "apple_0"), id(&world, "table_0"));
    let outcome = PlacementSampler::new(&config)
        .place(&mut world, apple, table, SupportPredicate::Inside, &mut rng(1))
        .unwrap();
    assert_eq!(outcome, PlacementOutcome::NoSupportSurface);
}

#[test]
fn test_existing_objects_are_reused_before_importing() {
    let mut world = world(room_with_table());
    let task = TaskBuilder::new("two_apples")
        .role(APPLE, "apple.n.01_1")
        .role(APPLE, "apple.n.01_2")
        .build();
    let roles: Vec<RoleId> = task.roles().map(|(r, _)| r.clone()).collect();
    let mut scope = ObjectScope::new(&roles);
    let mut journal = SamplingJournal::new();
    let policy = InstantiationPolicy::default();

    let bound = SampleableInstantiator::new(&policy)
        .instantiate(&task, &mut world, &mut scope, &mut rng(0), &mut journal)
        .unwrap();

    assert_eq!(bound.len(), 2);
    let reused: Vec<_> = bound.values().filter(|(_, p)| *p == Provenance::Reused).collect();
    let imported: Vec<_> = bound.values().filter(|(_, p)| *p == Provenance::Imported).collect();
    assert_eq!(reused.len(), 1);
    assert_eq!(imported.len(), 1);
    assert_eq!(reused[0].0, id(&world, "apple_0"));

    let new = imported[0].0;
    let record = world.object(new).unwrap();
    assert_eq!(record.name, "apple_1");
    assert_eq!(record.category.as_str(), "apple");
    assert_eq!(world.pose(new).unwrap().position, Vector3::new(100.0, 100.0, -100.0));
    assert!(scope.all_bound(&roles));
    assert_eq!(journal.len(), 2);
}

#[test]
fn test_pinned_model_is_used_for_imports() {
    let scene = room_with_table().with_model(
        "apple",
        scope_sim::scene::ModelSpec::cube("apple_big", Vector3::repeat(0.06)),
    );
    let mut world = world(scene);
    let task = TaskBuilder::new("big_apples")
        .role(APPLE, "apple.n.01_1")
        .role(APPLE, "apple.n.01_2")
        .build();
    let roles: Vec<RoleId> = task.roles().map(|(r, _)| r.clone()).collect();
    let mut scope = ObjectScope::new(&roles);
    let mut policy = InstantiationPolicy::default();
    policy
        .pinned_models
        .insert(scope_core::types::Category::new("apple"), "apple_big".to_string());

    let bound = SampleableInstantiator::new(&policy)
        .instantiate(&task, &mut world, &mut scope, &mut rng(2), &mut SamplingJournal::new())
        .unwrap();

    let (new, _) = bound
        .values()
        .find(|(_, p)| *p == Provenance::Imported)
        .copied()
        .unwrap();
    let size = world.object(new).unwrap().bounding_box;
    assert!((size.x - 0.12).abs() < 1e-12);
}
