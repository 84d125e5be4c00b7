//! Phrase identifiers

use uuid::Uuid;

/// Generate a fresh phrase id
///
/// Random v4 UUIDs rather than creation timestamps, so that phrases created
/// within the same millisecond (or on two devices) never collide.
pub fn new_phrase_id() -> String {
    Uuid::new_v4().to_string()
}
