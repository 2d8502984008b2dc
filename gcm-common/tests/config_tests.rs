//! Configuration loading and root folder resolution
//!
//! Tests touching GCM_ROOT_FOLDER run under #[serial] to avoid env races.

use gcm_common::config::{self, TomlConfig, CONFIG_FILE_NAME, ROOT_FOLDER_ENV};
use serial_test::serial;
use std::env;
use tempfile::TempDir;

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();

    let (root, config) = config::load(Some(dir.path()), None).unwrap();

    assert_eq!(root, dir.path());
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.database_path(&root), dir.path().join("gcm.db"));
}

#[test]
#[serial]
fn test_config_read_from_root_folder() {
    env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "database_file = \"workshops.db\"\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let (root, config) = config::load(Some(dir.path()), None).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.database_path(&root), dir.path().join("workshops.db"));
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    let dir = TempDir::new().unwrap();
    env::set_var(ROOT_FOLDER_ENV, dir.path());

    let (root, _) = config::load(None, None).unwrap();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, dir.path());
}

#[test]
#[serial]
fn test_explicit_config_supplies_root_folder() {
    env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("custom.toml");
    let data_root = dir.path().join("data");
    std::fs::write(
        &config_path,
        format!("root_folder = {:?}\n", data_root.to_string_lossy()),
    )
    .unwrap();

    let (root, _) = config::load(None, Some(&config_path)).unwrap();
    assert_eq!(root, data_root);
}

#[test]
#[serial]
fn test_missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(config::load(Some(dir.path()), Some(&dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "bind_addr = 42\n").unwrap();

    assert!(TomlConfig::load(&path).is_err());
}
