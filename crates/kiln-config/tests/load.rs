use kiln_config::{ConfigError, KilnConfig, CONFIG_FILE_NAME};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[test]
fn relative_paths_resolve_against_the_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[compiler]\nclasspath = [\"lib\", \"/opt/rt.jar\"]\noutput_dir = \"build\"\n",
    )
    .unwrap();

    let config = KilnConfig::discover(dir.path()).unwrap();
    assert_eq!(
        config.compiler.classpath,
        vec![dir.path().join("lib"), PathBuf::from("/opt/rt.jar")]
    );
    assert_eq!(config.compiler.output_dir, dir.path().join("build"));
}

#[test]
fn discover_without_a_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(KilnConfig::discover(dir.path()).unwrap(), KilnConfig::default());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = KilnConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().starts_with("failed to read config file"));
}

#[test]
fn malformed_toml_is_reported_without_a_snippet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[logging]\njson = \"sometimes\"\n").unwrap();
    let err = KilnConfig::load_from_path(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("failed to parse toml config"), "{message}");
    assert!(!message.contains("[logging]"), "{message}");
}
