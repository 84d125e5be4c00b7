//! Built utterance composition
//!
//! Words chain onto a non-empty utterance; phrases replace it. Every
//! accepted selection increments the phrase's usage exactly once. The
//! utterance holds copies of pictograms, so later library edits or deletes
//! do not affect it.

use chrono::Utc;
use efc_common::config::BoardConfig;
use efc_common::events::{EventBus, LibraryEvent};
use efc_common::time::millis_to_duration;
use efc_common::{Phrase, PhraseKind, Pictogram};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::LibraryError;
use crate::library::PhraseLibrary;
use crate::search;
use crate::speech::{SpeechError, SpeechSynthesizer};

/// The in-progress message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuiltUtterance {
    pub text: String,
    pub pictograms: Vec<Pictogram>,
}

impl BuiltUtterance {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pictograms.is_empty()
    }

    /// Apply a selected phrase
    ///
    /// Appends when `phrase` is a word (or `chain_phrases` is set) and the
    /// utterance is non-empty; replaces otherwise.
    pub fn accept(&mut self, phrase: &Phrase, chain_phrases: bool) {
        let appends = !self.is_empty() && (phrase.kind.is_word() || chain_phrases);
        if appends {
            if self.text.is_empty() {
                self.text = phrase.text.clone();
            } else {
                self.text = format!("{} {}", self.text, phrase.text);
            }
            self.pictograms.extend(phrase.pictograms.iter().cloned());
        } else {
            self.text = phrase.text.clone();
            self.pictograms = phrase.pictograms.clone();
        }
    }

    /// Remove one pictogram; the text stays as it is
    pub fn remove_pictogram(&mut self, index: usize) -> Option<Pictogram> {
        if index < self.pictograms.len() {
            Some(self.pictograms.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.pictograms.clear();
    }
}

/// Composition behaviour, taken from `[board]`
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub auto_clear: bool,
    pub auto_clear_delay: Duration,
    pub speak_on_select: bool,
    pub chain_phrases: bool,
    /// BCP-47 tag passed to the synthesizer
    pub language: String,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self::from_config(&BoardConfig::default())
    }
}

impl ComposerSettings {
    pub fn from_config(config: &BoardConfig) -> Self {
        Self {
            auto_clear: config.auto_clear,
            auto_clear_delay: millis_to_duration(config.auto_clear_delay_ms),
            speak_on_select: config.speak_on_select,
            chain_phrases: config.chain_phrases,
            language: config.language.speech_tag().to_string(),
        }
    }
}

#[derive(Default)]
struct Session {
    utterance: BuiltUtterance,
    /// Bumped on every change; auto-clear only fires if unchanged since playback
    revision: u64,
}

struct ComposerInner {
    library: PhraseLibrary,
    speech: Arc<dyn SpeechSynthesizer>,
    settings: ComposerSettings,
    events: EventBus,
    session: Mutex<Session>,
}

/// Composition session over a phrase library
#[derive(Clone)]
pub struct Composer {
    inner: Arc<ComposerInner>,
}

impl Composer {
    pub fn new(
        library: PhraseLibrary,
        speech: Arc<dyn SpeechSynthesizer>,
        settings: ComposerSettings,
    ) -> Self {
        let events = library.events().clone();
        Self {
            inner: Arc::new(ComposerInner {
                library,
                speech,
                settings,
                events,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.inner.settings
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // Session holds plain data; recover it if a holder panicked
        self.inner
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to the utterance and announce the result
    fn modify<R>(&self, change: impl FnOnce(&mut BuiltUtterance) -> R) -> (R, BuiltUtterance) {
        let mut session = self.session();
        let result = change(&mut session.utterance);
        session.revision += 1;
        let snapshot = session.utterance.clone();
        drop(session);

        self.inner.events.emit_lossy(LibraryEvent::UtteranceChanged {
            text: snapshot.text.clone(),
            pictogram_count: snapshot.pictograms.len(),
            timestamp: Utc::now(),
        });
        (result, snapshot)
    }

    pub fn current(&self) -> BuiltUtterance {
        self.session().utterance.clone()
    }

    /// Accept a phrase into the utterance
    pub async fn accept(&self, phrase: &Phrase) -> Result<BuiltUtterance, LibraryError> {
        self.inner.library.increment_usage(&phrase.id).await?;

        let chain = self.inner.settings.chain_phrases;
        let ((), utterance) = self.modify(|u| u.accept(phrase, chain));
        debug!(phrase_id = %phrase.id, text = %utterance.text, "Phrase accepted");

        if self.inner.settings.speak_on_select {
            if let Err(e) = self.speak_text(&utterance.text).await {
                warn!("Speak on select failed: {}", e);
            }
        }
        Ok(utterance)
    }

    /// Accept the library phrase with `id`; `Ok(None)` if unknown
    pub async fn select(&self, id: &str) -> Result<Option<BuiltUtterance>, LibraryError> {
        match self.inner.library.get(id).await {
            Some(phrase) => self.accept(&phrase).await.map(Some),
            None => {
                debug!(phrase_id = %id, "Selection of unknown phrase ignored");
                Ok(None)
            }
        }
    }

    /// Compose the exact match of `query`, creating a phrase if none exists
    ///
    /// Blank input is ignored (`Ok(None)`).
    pub async fn submit(&self, query: &str) -> Result<Option<BuiltUtterance>, LibraryError> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let phrases = self.inner.library.snapshot().await;
        match search::find_exact(&phrases, query) {
            Some(existing) => self.accept(existing).await.map(Some),
            None => self.quick_add(query, PhraseKind::Phrase).await.map(Some),
        }
    }

    /// Add `text` as a new phrase of `kind` and compose it immediately
    pub async fn quick_add(
        &self,
        text: &str,
        kind: PhraseKind,
    ) -> Result<BuiltUtterance, LibraryError> {
        let phrase = self.inner.library.add(text, Vec::new(), kind).await?;
        info!(phrase_id = %phrase.id, kind = kind.as_str(), "Quick-added phrase");
        self.accept(&phrase).await
    }

    /// Remove the pictogram at `index`; `None` if out of range
    pub fn remove_pictogram(&self, index: usize) -> Option<BuiltUtterance> {
        if index >= self.session().utterance.pictograms.len() {
            return None;
        }

        let (_, utterance) = self.modify(|u| u.remove_pictogram(index));
        Some(utterance)
    }

    pub fn clear(&self) -> BuiltUtterance {
        self.modify(BuiltUtterance::clear).1
    }

    /// Speak the utterance; schedules auto-clear once playback completes
    ///
    /// Returns false when there was nothing to speak.
    pub async fn play(&self) -> Result<bool, SpeechError> {
        let (text, revision) = {
            let session = self.session();
            (session.utterance.text.clone(), session.revision)
        };
        if text.trim().is_empty() {
            return Ok(false);
        }

        self.speak_text(&text).await?;

        if self.inner.settings.auto_clear {
            let composer = self.clone();
            let delay = self.inner.settings.auto_clear_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                composer.clear_if_unchanged(revision);
            });
        }
        Ok(true)
    }

    fn clear_if_unchanged(&self, revision: u64) {
        if self.session().revision != revision {
            debug!("Utterance changed since playback, skipping auto-clear");
            return;
        }
        self.clear();
        debug!("Utterance auto-cleared after playback");
    }

    async fn speak_text(&self, text: &str) -> Result<(), SpeechError> {
        self.inner
            .speech
            .speak(text, &self.inner.settings.language)
            .await
    }
}
