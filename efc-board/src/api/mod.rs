//! HTTP API for efc-board
//!
//! Thin presentation layer over the phrase library and the composer.

pub mod health;
pub mod phrases;
pub mod pictograms;
pub mod session;
pub mod sse;
pub mod utterance;

pub use health::health_routes;
pub use sse::event_stream;
