//! Event types for the EFC event system
//!
//! Provides shared event definitions and the EventBus used by the phrase
//! library and the composition session. Events are broadcast to every
//! subscriber and can be serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Where the canonical phrase set came from on initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Locally persisted records only
    Local,
    /// Remote snapshot merged with local-only records
    Remote,
    /// Library was empty and got seeded with the bundled defaults
    Defaults,
}

/// Library and composition events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LibraryEvent {
    /// Initialization finished; the library accepts mutations
    LibraryLoaded {
        source: LoadSource,
        phrase_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A phrase was created
    PhraseAdded {
        phrase_id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A phrase's text, pictograms or kind changed
    PhraseUpdated {
        phrase_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A phrase was removed
    PhraseDeleted {
        phrase_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A phrase was selected for composition
    UsageIncremented {
        phrase_id: String,
        usage_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Library discarded and re-seeded from defaults
    LibraryReset {
        phrase_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Phrases imported from an external document
    LibraryImported {
        imported: usize,
        phrase_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A pushed remote snapshot was merged into the library
    RemoteSnapshotMerged {
        phrase_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Remote sync failed; operating on local persistence only
    SyncDegraded {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The built utterance changed
    UtteranceChanged {
        text: String,
        pictogram_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl LibraryEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LibraryEvent::LibraryLoaded { .. } => "LibraryLoaded",
            LibraryEvent::PhraseAdded { .. } => "PhraseAdded",
            LibraryEvent::PhraseUpdated { .. } => "PhraseUpdated",
            LibraryEvent::PhraseDeleted { .. } => "PhraseDeleted",
            LibraryEvent::UsageIncremented { .. } => "UsageIncremented",
            LibraryEvent::LibraryReset { .. } => "LibraryReset",
            LibraryEvent::LibraryImported { .. } => "LibraryImported",
            LibraryEvent::RemoteSnapshotMerged { .. } => "RemoteSnapshotMerged",
            LibraryEvent::SyncDegraded { .. } => "SyncDegraded",
            LibraryEvent::UtteranceChanged { .. } => "UtteranceChanged",
        }
    }
}

/// Broadcast bus for [`LibraryEvent`]s
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LibraryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use efc_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: LibraryEvent,
    ) -> Result<usize, broadcast::error::SendError<LibraryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LibraryEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
