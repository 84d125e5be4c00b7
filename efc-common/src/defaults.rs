//! Bundled default phrase set
//!
//! Seeds an empty library. The JSON file ships inside the binary; a copy on
//! disk (the file the dev sync server rewrites) can override it.

use crate::model::Phrase;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default dataset compiled into the binary
pub const BUNDLED_DEFAULTS_JSON: &str = include_str!("../assets/default_phrases.json");

/// Parse the compiled-in default phrases
pub fn bundled() -> Result<Vec<Phrase>> {
    Ok(serde_json::from_str(BUNDLED_DEFAULTS_JSON)?)
}

/// Parse a default dataset file from disk
pub fn load_from_path(path: &Path) -> Result<Vec<Phrase>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Source of the seed dataset
#[derive(Debug, Clone, Default)]
pub enum DefaultPhrases {
    /// Compiled-in dataset
    #[default]
    Bundled,
    /// Dataset file on disk, falling back to the bundled set if unreadable
    File(PathBuf),
    /// Explicit list (tests, imports)
    Inline(Vec<Phrase>),
}

impl DefaultPhrases {
    pub fn from_optional_path(path: Option<PathBuf>) -> Self {
        path.map(DefaultPhrases::File).unwrap_or_default()
    }

    /// Load the seed dataset; never fails
    ///
    /// A broken bundled dataset is a build defect, but the board must still
    /// start, so that case degrades to an empty set.
    pub fn load(&self) -> Vec<Phrase> {
        let loaded = match self {
            DefaultPhrases::Bundled => bundled(),
            DefaultPhrases::File(path) => load_from_path(path).or_else(|e| {
                warn!(
                    "Could not read default phrases from {}: {} (using bundled set)",
                    path.display(),
                    e
                );
                bundled()
            }),
            DefaultPhrases::Inline(phrases) => Ok(phrases.clone()),
        };

        loaded.unwrap_or_else(|e| {
            warn!("Bundled default phrases are invalid: {}", e);
            Vec::new()
        })
    }
}
