//! Streaming conversion of line-oriented execution traces into a single
//! browsable HTML document.
//!
//! The pipeline: classify each input line into a [`Step`] ([`parse`]),
//! track nesting depth and drive a [`format::Formatter`] one level at a
//! time ([`convert`]), and render nested list markup ([`format`]). No
//! tree is ever materialized; memory use is independent of trace depth
//! and length.

pub mod convert;
pub mod format;
pub mod parse;
pub mod step;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use convert::Converter;
pub use step::{CallOutcome, INDENT_WIDTH, Step, StepKind};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("unable to open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to open output file {path}: {source}")]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line_no}: indent of {indent} is not a multiple of 4")]
    Indentation { line_no: usize, indent: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;
