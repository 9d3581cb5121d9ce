//! JSON Lines formatter - one serialized step per output line.

use crate::Step;
use crate::format::Formatter;

/// Machine-readable alternative to the HTML formatter.
///
/// Each record carries its own depth, so level transitions and document
/// begin/end emit nothing.
#[derive(Debug, Default)]
pub struct JsonLines;

impl JsonLines {
    pub fn new() -> Self {
        JsonLines
    }
}

impl Formatter for JsonLines {
    fn begin_document(&mut self) -> String {
        String::new()
    }

    fn enter_level(&mut self) -> String {
        String::new()
    }

    fn leave_level(&mut self) -> String {
        String::new()
    }

    fn render_step(&mut self, step: &Step) -> String {
        let mut line = serde_json::to_string(step).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }

    fn end_document(&mut self) -> String {
        String::new()
    }
}
