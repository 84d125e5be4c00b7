//! # EFC Common Library
//!
//! Shared code for the EFC phrase board services including:
//! - Phrase and pictogram data model
//! - Bundled default phrase set
//! - Library event types (LibraryEvent enum) and EventBus
//! - Configuration loading
//! - Utility functions

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod model;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use model::{Phrase, PhraseKind, Pictogram};
