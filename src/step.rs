//! Trace step schema - one classified record per input line.

use serde::Serialize;

/// Indentation characters per nesting level in the trace format.
pub const INDENT_WIDTH: usize = 4;

/// A single classified trace line.
///
/// Created fresh for each input line, handed to the formatter, and dropped;
/// nothing outlives one pipeline iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// Nesting level derived from leading indentation.
    pub depth: usize,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// How a traced call ended. A call records at most one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Returned(String),
    Threw(String),
}

/// The event carried by one trace line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Top-level request banner: `REQUEST <final> via <original> from <ip>`.
    Request {
        final_url: String,
        original_url: String,
        remote_ip: String,
        mem_delta_kb: i64,
        runtime_ms: f64,
    },

    /// `HEADER ["]text["]`, optionally prefixed with `REPLACE `.
    Header { text: String, replace: bool },

    /// `INCLUDE <path>` - a file pulled into the traced script.
    Include {
        path: String,
        mem_delta_kb: i64,
        runtime_ms: f64,
    },

    /// Any line not starting with a known type token: call syntax.
    Call {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
        /// Receiver representation from `this=<recv>|`. Present iff the
        /// call was made on an instance rather than statically.
        #[serde(skip_serializing_if = "Option::is_none")]
        receiver: Option<String>,
        /// Raw argument list text, deliberately left unsplit.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<CallOutcome>,
        mem_delta_kb: i64,
        runtime_ms: f64,
    },

    /// `WRITE(<n>): "<text>"` - bytes written to the script's output.
    Write {
        #[serde(skip_serializing_if = "Option::is_none")]
        byte_count: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        truncated: bool,
        runtime_ms: f64,
    },

    /// `SEND_HEADERS` - no payload.
    SendHeaders,

    /// `EXIT` - no payload.
    ScriptExit,

    /// `ERROR` - reserved in the trace format; no extraction is defined.
    Error,
}

impl StepKind {
    /// Fully qualified display name for a call, joining class and function
    /// with `->` for instance calls and `::` for static ones.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            StepKind::Call {
                name,
                class_name,
                receiver,
                ..
            } => Some(match class_name {
                Some(class) if receiver.is_some() => format!("{class}->{name}"),
                Some(class) => format!("{class}::{name}"),
                None => name.clone(),
            }),
            _ => None,
        }
    }
}
