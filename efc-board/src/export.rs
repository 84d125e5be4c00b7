//! Library export and import documents

use efc_common::{Error, Phrase, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name used when exporting into a directory
pub const EXPORT_FILE_NAME: &str = "phrases.json";

pub fn to_pretty_json(phrases: &[Phrase]) -> Result<String> {
    Ok(serde_json::to_string_pretty(phrases)?)
}

/// Write the export document as [`EXPORT_FILE_NAME`] inside `dir`
///
/// The folder is created when missing. Returns the written path.
pub async fn write_export(phrases: &[Phrase], dir: &Path) -> Result<PathBuf> {
    let document = to_pretty_json(phrases)?;
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(EXPORT_FILE_NAME);
    tokio::fs::write(&path, document).await?;
    info!(path = %path.display(), count = phrases.len(), "Exported phrase library");
    Ok(path)
}

/// Parse an import document (a JSON array of phrases)
pub fn parse_import(document: &str) -> Result<Vec<Phrase>> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    if !value.is_array() {
        return Err(Error::InvalidInput(
            "import document must be a JSON array of phrases".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use efc_common::PhraseKind;

    #[test]
    fn test_export_is_pretty_printed() {
        let phrases = vec![Phrase::new("1", "Hola", vec![], PhraseKind::Word)];
        let json = to_pretty_json(&phrases).unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"type\": \"word\""));
    }

    #[tokio::test]
    async fn test_write_export_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("exports");
        let phrases = vec![Phrase::new("1", "Hola", vec![], PhraseKind::Phrase)];

        let path = write_export(&phrases, &exports).await.unwrap();
        assert_eq!(path, exports.join(EXPORT_FILE_NAME));
        let parsed = parse_import(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, phrases);
    }

    #[test]
    fn test_import_rejects_non_array() {
        assert!(matches!(
            parse_import(r#"{"id":"1"}"#),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(parse_import("nope"), Err(Error::Json(_))));
    }

    #[test]
    fn test_import_defaults_missing_fields() {
        let parsed = parse_import(r#"[{"id":"1","text":"Hola"}]"#).unwrap();
        assert_eq!(parsed[0].usage_count, 0);
        assert_eq!(parsed[0].kind, PhraseKind::Phrase);
    }
}
