//! Text-to-speech collaborator
//!
//! Playback completes when `speak` returns; the composer uses that as the
//! trigger for auto-clearing the built utterance.

use async_trait::async_trait;
use efc_common::config::BoardConfig;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder in `speech_command` replaced with the language tag
pub const LANG_PLACEHOLDER: &str = "{lang}";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech command is empty")]
    EmptyCommand,

    #[error("Failed to start speech program {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Speech program exited with {0}")]
    Failed(String),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` in `language` (BCP-47 tag, e.g. `es-ES`)
    async fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError>;
}

/// Records utterances in the log instead of producing audio
#[derive(Default)]
pub struct LogSpeech {
    spoken: Mutex<Vec<(String, String)>>,
}

impl LogSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(text, language)` spoken so far
    pub fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SpeechSynthesizer for LogSpeech {
    async fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        info!(language, "Speaking: {}", text);
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push((text.to_string(), language.to_string()));
        }
        Ok(())
    }
}

/// Runs an external TTS program with the text as its last argument
///
/// The text follows a `--` separator, so an utterance starting with `-`
/// is never read as an option.
///
/// `{lang}` inside the configured arguments is replaced with the language
/// tag, e.g. `espeak-ng -v {lang}`.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn parse(command: &str) -> Result<Self, SpeechError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(SpeechError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn build_args(&self, text: &str, language: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(LANG_PLACEHOLDER, language))
            .collect();
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSpeech {
    async fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        let args = self.build_args(text, language);
        debug!(program = %self.program, ?args, "Running speech program");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| SpeechError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SpeechError::Failed(output.status.to_string()));
        }
        Ok(())
    }
}

/// Synthesizer selected by `[board].speech_command`
pub fn from_config(config: &BoardConfig) -> Result<Arc<dyn SpeechSynthesizer>, SpeechError> {
    match config.speech_command.as_deref() {
        Some(command) => Ok(Arc::new(CommandSpeech::parse(command)?)),
        None => Ok(Arc::new(LogSpeech::new())),
    }
}
