//! Phrase library data model
//!
//! Field names match the persisted JSON records: a phrase is
//! `{id, text, usage_count, pictograms, type?}` and a pictogram is
//! `{word, url, base64?}`. Records written before `type` existed load as
//! [`PhraseKind::Phrase`].

use serde::{Deserialize, Serialize};

/// Classification of a library entry
///
/// Words chain onto the utterance being built; phrases are complete
/// utterances on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhraseKind {
    Word,
    #[default]
    Phrase,
}

impl PhraseKind {
    pub fn is_word(self) -> bool {
        matches!(self, PhraseKind::Word)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhraseKind::Word => "word",
            PhraseKind::Phrase => "phrase",
        }
    }
}

/// Where a pictogram's image currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRef<'a> {
    /// Inline `data:` URI, renderable offline
    Inline(&'a str),
    /// Remote URL, needs network access
    Remote(&'a str),
}

/// A labeled image attached to a phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pictogram {
    /// Display label
    pub word: String,
    /// Remote image URL (kept even after materialization as a fallback)
    pub url: String,
    /// Inline encoding of the image, authoritative when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl Pictogram {
    pub fn new(word: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            url: url.into(),
            base64: None,
        }
    }

    /// The authoritative image reference (inline wins over the URL)
    pub fn image_ref(&self) -> ImageRef<'_> {
        match self.base64.as_deref() {
            Some(inline) if !inline.is_empty() => ImageRef::Inline(inline),
            _ => ImageRef::Remote(&self.url),
        }
    }

    /// Source string a renderer should load
    pub fn image_source(&self) -> &str {
        match self.image_ref() {
            ImageRef::Inline(s) | ImageRef::Remote(s) => s,
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.image_ref(), ImageRef::Inline(_))
    }

    /// Replace wholesale with the inline form
    pub fn with_inline(&self, data_uri: String) -> Self {
        Self {
            word: self.word.clone(),
            url: self.url.clone(),
            base64: Some(data_uri),
        }
    }
}

/// A saved utterance in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    /// Unique, stable identifier
    pub id: String,
    /// The utterance text
    pub text: String,
    /// Number of times the phrase was selected for composition
    #[serde(default)]
    pub usage_count: u64,
    /// Pictograms in presentation/speech order
    #[serde(default)]
    pub pictograms: Vec<Pictogram>,
    /// Word or phrase (absent in legacy records)
    #[serde(rename = "type", default)]
    pub kind: PhraseKind,
}

impl Phrase {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        pictograms: Vec<Pictogram>,
        kind: PhraseKind,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            usage_count: 0,
            pictograms,
            kind,
        }
    }

    /// True when every pictogram already carries an inline image
    pub fn is_materialized(&self) -> bool {
        self.pictograms.iter().all(Pictogram::is_materialized)
    }
}
