//! Phrase editor draft
//!
//! Holds the fields of a phrase while it is being created or edited and
//! validates them before they reach the library.

use efc_common::{Phrase, PhraseKind, Pictogram};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhraseDraft {
    /// Id of the phrase being edited, `None` for a new phrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pictograms: Vec<Pictogram>,
    #[serde(default, rename = "type")]
    pub kind: PhraseKind,
}

impl PhraseDraft {
    pub fn new(kind: PhraseKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn from_phrase(phrase: &Phrase) -> Self {
        Self {
            id: Some(phrase.id.clone()),
            text: phrase.text.clone(),
            pictograms: phrase.pictograms.clone(),
            kind: phrase.kind,
        }
    }

    /// Add a pictogram unless one with the same URL is already present
    ///
    /// The pictogram's word is appended to the text when the text does not
    /// contain it yet. Returns false for a duplicate.
    pub fn add_pictogram(&mut self, pictogram: Pictogram) -> bool {
        if self.pictograms.iter().any(|p| p.url == pictogram.url) {
            return false;
        }

        let word = pictogram.word.trim();
        if !word.is_empty() && !self.text.to_lowercase().contains(&word.to_lowercase()) {
            if self.text.trim().is_empty() {
                self.text = word.to_string();
            } else {
                self.text = format!("{} {}", self.text.trim_end(), word);
            }
        }

        self.pictograms.push(pictogram);
        true
    }

    /// Remove the pictogram at `index`; the text is left untouched
    pub fn remove_pictogram(&mut self, index: usize) -> Option<Pictogram> {
        if index < self.pictograms.len() {
            Some(self.pictograms.remove(index))
        } else {
            None
        }
    }

    /// Drop pictograms whose URL already appeared earlier in the list
    pub fn dedup_pictograms(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.pictograms.retain(|p| seen.insert(p.url.clone()));
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.text.trim().is_empty() {
            return Err(LibraryError::Validation(
                "phrase text must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picto(word: &str, id: u32) -> Pictogram {
        Pictogram::new(
            word,
            format!("https://api.arasaac.org/api/pictograms/{}?download=false", id),
        )
    }

    #[test]
    fn test_adding_pictograms_builds_text() {
        let mut draft = PhraseDraft::new(PhraseKind::Phrase);
        assert!(draft.add_pictogram(picto("quiero", 1)));
        assert!(draft.add_pictogram(picto("agua", 2)));

        assert_eq!(draft.text, "quiero agua");
        assert_eq!(draft.pictograms.len(), 2);
    }

    #[test]
    fn test_duplicate_url_skipped() {
        let mut draft = PhraseDraft::new(PhraseKind::Word);
        draft.add_pictogram(picto("agua", 2));
        assert!(!draft.add_pictogram(picto("agua", 2)));
        assert_eq!(draft.pictograms.len(), 1);
    }

    #[test]
    fn test_word_already_in_text_not_repeated() {
        let mut draft = PhraseDraft::new(PhraseKind::Phrase);
        draft.text = "Quiero Agua fría".to_string();
        draft.add_pictogram(picto("agua", 2));
        assert_eq!(draft.text, "Quiero Agua fría");
    }

    #[test]
    fn test_remove_pictogram_keeps_text() {
        let mut draft = PhraseDraft::new(PhraseKind::Phrase);
        draft.add_pictogram(picto("quiero", 1));
        draft.add_pictogram(picto("agua", 2));

        let removed = draft.remove_pictogram(0).unwrap();
        assert_eq!(removed.word, "quiero");
        assert_eq!(draft.text, "quiero agua");
        assert!(draft.remove_pictogram(5).is_none());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut draft = PhraseDraft::new(PhraseKind::Phrase);
        draft.pictograms = vec![picto("agua", 2), picto("quiero", 1), picto("agua", 2)];
        draft.dedup_pictograms();
        assert_eq!(draft.pictograms, vec![picto("agua", 2), picto("quiero", 1)]);
    }

    #[test]
    fn test_validate_rejects_blank_text() {
        let draft = PhraseDraft::new(PhraseKind::Phrase);
        assert!(matches!(draft.validate(), Err(LibraryError::Validation(_))));
    }

    #[test]
    fn test_from_phrase_copies_fields() {
        let phrase = Phrase::new("7", "Hola", vec![picto("hola", 3)], PhraseKind::Word);
        let draft = PhraseDraft::from_phrase(&phrase);
        assert!(draft.is_editing());
        assert_eq!(draft.kind, PhraseKind::Word);
        assert!(draft.validate().is_ok());
    }
}
