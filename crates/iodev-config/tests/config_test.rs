#![allow(clippy::unwrap_used)]

use std::time::Duration;

use iodev_config::{Config, ConfigError, load_config_from, save_config_to};
use iodev_core::SmartNameMode;
use pretty_assertions::assert_eq;

fn write_file(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn file_values_reach_the_core_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        r#"
language = "de"
debounce_ms = 250
detect_foreign = false
trailing_ids = ["alias.0.common", "alias.0.global"]

[namespaces]
alias = "alias.1"

[smart_names]
mode = "custom"
integration_id = "iot.0"
"#,
    );

    let core = load_config_from(&path).unwrap().to_core_config().unwrap();
    assert_eq!(core.language, "de");
    assert_eq!(core.debounce, Duration::from_millis(250));
    assert!(!core.detect_foreign);
    assert_eq!(core.trailing_ids, ["alias.0.common", "alias.0.global"]);
    assert_eq!(core.alias_namespace, "alias.1");
    assert_eq!(core.linked_namespace, "linkeddevices.0");
    assert_eq!(
        core.smart_name_mode,
        SmartNameMode::Custom {
            integration_id: "iot.0".into()
        }
    );
}

#[test]
fn custom_smart_names_need_an_integration() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "[smart_names]\nmode = \"custom\"\n");
    let err = load_config_from(&path).unwrap_err();
    assert!(
        matches!(&err, ConfigError::Validation { field, .. } if field == "smart_names.integration_id"),
        "{err}"
    );
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("language = \" \"\n", "language"),
        ("debounce_ms = 120000\n", "debounce_ms"),
        ("[namespaces]\nalias = \"alias\"\n", "namespaces.alias"),
        ("[namespaces]\nlinked = \"alias.0\"\n", "namespaces.linked"),
        ("[smart_names]\nmode = \"cloud\"\n", "smart_names.mode"),
    ];
    for (contents, expected) in cases {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, contents);
        match load_config_from(&path) {
            Err(ConfigError::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("{contents:?} gave {other:?}"),
        }
    }
}

#[test]
fn malformed_toml_is_a_loading_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "debounce_ms = \"soon\"\n");
    assert!(matches!(load_config_from(&path), Err(ConfigError::Figment(_))));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = Config::default();
    config.language = "fr".into();
    config.trailing_ids = vec!["alias.0.global".into()];

    save_config_to(&config, &path).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), config);
}

#[test]
fn invalid_config_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = Config::default();
    config.namespaces.alias = String::new();

    assert!(save_config_to(&config, &path).is_err());
    assert!(!path.exists());
}
