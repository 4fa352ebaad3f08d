//! Identifier generation.

use uuid::Uuid;

/// Returns a fresh, globally unique identifier for a new entity.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
