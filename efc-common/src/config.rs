//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file. A missing or unreadable file is
//! never fatal: a warning is logged and compiled defaults are used.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `EFC_ROOT_FOLDER` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EFC_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "efc.db";

/// Export folder name inside the root folder
pub const EXPORT_DIR: &str = "exports";

/// Speech language of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// BCP 47 tag handed to the speech synthesizer
    pub fn speech_tag(self) -> &'static str {
        match self {
            Language::Es => "es-ES",
            Language::En => "en-US",
        }
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the phrase database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub board: BoardConfig,

    #[serde(default)]
    pub pictograms: PictogramConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Phrase board behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Entries shown in the "most used" view
    pub most_used_limit: usize,
    /// Clear the built utterance after playback completes
    pub auto_clear: bool,
    /// Delay between playback completion and auto-clear
    pub auto_clear_delay_ms: u64,
    /// Speak the composed text on every selection
    pub speak_on_select: bool,
    /// Let complete phrases append to a non-empty utterance too
    pub chain_phrases: bool,
    pub language: Language,
    /// Maximum pictogram suggestions per search
    pub pictogram_search_limit: usize,
    /// Quiet period before a pictogram search is issued
    pub pictogram_debounce_ms: u64,
    /// How long initialization waits for the first remote snapshot
    pub remote_timeout_ms: u64,
    /// Default dataset file overriding the bundled one
    pub defaults_path: Option<PathBuf>,
    /// External text-to-speech program (e.g. `espeak-ng`)
    pub speech_command: Option<String>,
    /// Browser origins allowed to call the API; empty means the board's own
    /// localhost origins
    pub allowed_origins: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            most_used_limit: 12,
            auto_clear: true,
            auto_clear_delay_ms: 1000,
            speak_on_select: false,
            chain_phrases: false,
            language: Language::Es,
            pictogram_search_limit: 15,
            pictogram_debounce_ms: 500,
            remote_timeout_ms: 5000,
            defaults_path: None,
            speech_command: None,
            allowed_origins: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Configured origins, or the localhost origins for `port` when unset
    pub fn effective_origins(&self, port: u16) -> Vec<String> {
        if !self.allowed_origins.is_empty() {
            return self.allowed_origins.clone();
        }
        vec![
            format!("http://localhost:{}", port),
            format!("http://127.0.0.1:{}", port),
        ]
    }
}

/// Pictogram search service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PictogramConfig {
    pub base_url: String,
    /// Keyword language used in search requests
    pub locale: String,
}

impl Default for PictogramConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.arasaac.org/api".to_string(),
            locale: "es".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: get_default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Default configuration file path (`<config_dir>/efc/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("efc").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Load configuration, degrading to defaults
///
/// `explicit` is a `--config` path; otherwise the platform default path is
/// tried. Any failure logs a warning and yields `TomlConfig::default()`.
pub fn load_toml_config(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        }
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return TomlConfig::default();
    }

    match read_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} (using defaults)", e);
            TomlConfig::default()
        }
    }
}

/// Write configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Resolves the root folder from the configured sources
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_root: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        get_default_root_folder()
    }
}

/// Prepares the resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder {}", self.root_folder.display());
            std::fs::create_dir_all(&self.root_folder)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Folder receiving library exports
    pub fn export_dir(&self) -> PathBuf {
        self.root_folder.join(EXPORT_DIR)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("efc"))
        .unwrap_or_else(|| PathBuf::from("./efc_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origins_default_to_localhost() {
        let board = BoardConfig::default();
        assert_eq!(
            board.effective_origins(5750),
            vec!["http://localhost:5750", "http://127.0.0.1:5750"]
        );

        let board = BoardConfig {
            allowed_origins: vec!["https://board.example".to_string()],
            ..BoardConfig::default()
        };
        assert_eq!(board.effective_origins(5750), vec!["https://board.example"]);
    }

    #[test]
    fn test_export_dir_under_root() {
        let init = RootFolderInitializer::new(PathBuf::from("/data/efc"));
        assert_eq!(init.export_dir(), PathBuf::from("/data/efc/exports"));
    }

    #[test]
    fn test_language_speech_tags() {
        assert_eq!(Language::Es.speech_tag(), "es-ES");
        assert_eq!(Language::En.speech_tag(), "en-US");
    }

    #[test]
    fn test_board_defaults() {
        let board = BoardConfig::default();
        assert_eq!(board.most_used_limit, 12);
        assert!(board.auto_clear);
        assert!(!board.chain_phrases);
        assert_eq!(board.pictogram_debounce_ms, 500);
    }

    #[test]
    fn test_partial_board_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str("[board]\nmost_used_limit = 6\nlanguage = \"en\"\n").unwrap();
        assert_eq!(config.board.most_used_limit, 6);
        assert_eq!(config.board.language, Language::En);
        assert_eq!(config.board.auto_clear_delay_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }
}
