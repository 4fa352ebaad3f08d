//! Output formatting for CLI.

mod json;
mod text;

pub use json::{JsonFormatter, ListDetailOutput, QueueOutput};
pub use text::TextFormatter;
