use pretty_assertions::assert_eq;
use scope_core::config::{ConfigError, DebugMode, SamplerConfig};
use scope_core::types::Category;
use std::io::Write;

#[test]
fn test_loads_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
max_goal_condition_sets = 3
debug = "verbose"

[placement]
max_trials = 50
settle_duration_secs = 0.0

[instantiation]
preferred_categories = ["apple"]
spawn_origin = [0.0, 0.0, -50.0]

[instantiation.pinned_models]
apple = "apple_002"
"#
    )
    .unwrap();

    let config = SamplerConfig::load(file.path()).unwrap();
    let expected = SamplerConfig::new()
        .with_max_goal_condition_sets(3)
        .with_debug(DebugMode::Verbose)
        .with_placement_trials(50)
        .with_settle_duration(0.0);
    assert_eq!(config.max_goal_condition_sets, expected.max_goal_condition_sets);
    assert_eq!(config.placement, expected.placement);
    assert_eq!(config.debug, DebugMode::Verbose);
    assert_eq!(config.instantiation.preferred_categories, vec![Category::new("apple")]);
    assert_eq!(
        config.instantiation.pinned_models.get(&Category::new("apple")).map(String::as_str),
        Some("apple_002")
    );
    assert_eq!(config.instantiation.spawn_origin.z, -50.0);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SamplerConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let err = SamplerConfig::from_toml_str("max_goal_condition_sets = \"ten\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
