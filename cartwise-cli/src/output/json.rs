//! JSON output formatting.

use anyhow::Result;
use cartwise_core::{Item, ListSummary, OfflineOperation, ShoppingList};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for `list show`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetailOutput {
    pub list: ShoppingList,
    pub items: Vec<Item>,
    pub summary: ListSummary,
}

/// JSON output for `queue`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOutput {
    pub pending: Vec<OfflineOperation>,
    pub dead_letters: Vec<OfflineOperation>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_queue_output_keys() {
        let formatter = JsonFormatter::new(false);
        let output = QueueOutput {
            pending: Vec::new(),
            dead_letters: Vec::new(),
        };
        let json = formatter.format(&output).unwrap();
        assert_eq!(json, r#"{"pending":[],"deadLetters":[]}"#);
    }
}
