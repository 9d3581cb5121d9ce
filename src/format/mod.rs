//! Output formatters driven by the converter.

pub mod html;
pub mod jsonl;

pub use html::SingleHtmlFile;
pub use jsonl::JsonLines;

use crate::Step;

/// Capability set the converter drives, in document order:
/// begin, then any interleaving of level changes and steps, then end.
///
/// Fragments are only meaningful as part of the full emitted sequence;
/// the converter writes them out verbatim, in order.
pub trait Formatter {
    /// Document preamble, emitted before any step.
    fn begin_document(&mut self) -> String;

    /// One unit of nesting opened. Never called for more than one level
    /// at a time.
    fn enter_level(&mut self) -> String;

    /// One unit of nesting closed.
    fn leave_level(&mut self) -> String;

    /// Render a single classified step at the current level.
    fn render_step(&mut self, step: &Step) -> String;

    /// Document close. Closes at most one still-open item; a trace that
    /// ends above depth 1 leaves its outer lists unterminated, mirroring
    /// the original emitter.
    fn end_document(&mut self) -> String;
}
