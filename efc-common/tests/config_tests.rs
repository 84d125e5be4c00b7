//! Configuration loading and root folder resolution
//!
//! Tests that manipulate EFC_ROOT_FOLDER are marked #[serial] so they do not
//! race each other.

use efc_common::config::{
    load_toml_config, read_toml_config, write_toml_config, BoardConfig, CompiledDefaults,
    Language, LoggingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("efc") || defaults.root_folder.ends_with("efc_data"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(resolver.resolve(), defaults.root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/efc-test-env-folder");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/efc-test-toml-folder")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new(None, &config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/efc-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/efc-test-env-folder");

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/tmp/efc-cli")), &TomlConfig::default());
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/efc-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/efc")),
        ..TomlConfig::default()
    };
    assert_eq!(RootFolderResolver::new(None, &config).resolve(), PathBuf::from("/srv/efc"));
}

#[test]
fn test_initializer_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("efc");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("efc.db"));
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&temp_dir.path().join("absent.toml")));

    assert!(config.root_folder.is_none());
    assert_eq!(config.board.most_used_limit, 12);
}

#[test]
fn test_invalid_config_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "this is [not valid toml").unwrap();

    assert!(read_toml_config(&path).is_err());
    let config = load_toml_config(Some(&path));
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_write_then_read_preserves_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("efc").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/data/efc")),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        board: BoardConfig {
            language: Language::En,
            speak_on_select: true,
            ..BoardConfig::default()
        },
        ..TomlConfig::default()
    };

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = read_toml_config(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(PathBuf::from("/data/efc")));
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(loaded.board.language, Language::En);
    assert!(loaded.board.speak_on_select);
    assert_eq!(loaded.pictograms.base_url, "https://api.arasaac.org/api");
}
