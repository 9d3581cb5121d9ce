//! Line classifier and field extractor for the trace format.
//!
//! One call to [`classify`] turns one raw input line into a [`Step`].
//! Indentation that is not a multiple of [`INDENT_WIDTH`] is the only
//! fatal grammar violation; everything else degrades to a partially
//! populated step plus a `tracing` warning.

use tracing::warn;

use crate::step::{CallOutcome, INDENT_WIDTH, Step, StepKind};
use crate::{TraceError, TraceResult};

/// Classify one raw trace line into a [`Step`].
///
/// `line_no` is carried only for diagnostics.
pub fn classify(raw: &str, line_no: usize) -> TraceResult<Step> {
    let (depth, line) = measure_depth(raw, line_no)?;

    let token = line.split(' ').next().unwrap_or(line);
    let kind = match token {
        "REQUEST" => parse_request(rest_after(line, token), line_no),
        "HEADER" => parse_header(rest_after(line, token)),
        "INCLUDE" => parse_include(rest_after(line, token), line_no),
        "SEND_HEADERS" => StepKind::SendHeaders,
        "EXIT" => StepKind::ScriptExit,
        "ERROR" => {
            // Reserved kind: the trace format defines no field layout.
            warn!(line_no, "no field extraction defined for ERROR lines");
            StepKind::Error
        }
        _ if token.starts_with("WRITE(") => {
            // Keep the parenthesis: the byte count lives inside it.
            parse_write(&line["WRITE".len()..], line_no)
        }
        _ => parse_call(line, line_no),
    };

    Ok(Step { depth, kind })
}

/// Measure leading indentation and strip surrounding whitespace.
fn measure_depth(raw: &str, line_no: usize) -> Result<(usize, &str), TraceError> {
    let line = raw.trim_end();
    let stripped = line.trim_start();
    let indent = line.chars().count() - stripped.chars().count();
    if indent % INDENT_WIDTH != 0 {
        return Err(TraceError::Indentation { line_no, indent });
    }
    Ok((indent / INDENT_WIDTH, stripped))
}

fn rest_after<'a>(line: &'a str, token: &str) -> &'a str {
    line[token.len()..].trim_start()
}

/// Remove a trailing `mem:<start>-><end>` marker (plus the space before it)
/// and return `start - end` in Kb. Absent or malformed markers yield 0.
fn take_mem_delta(line: &mut String, line_no: usize) -> i64 {
    let Some(pos) = line.rfind("mem:") else {
        return 0;
    };
    let marker_end = line[pos..].find(' ').map(|o| pos + o).unwrap_or(line.len());
    let body = &line[pos + "mem:".len()..marker_end];

    let delta = match body
        .split_once("->")
        .and_then(|(start, end)| Some((start.parse::<i64>().ok()?, end.parse::<i64>().ok()?)))
    {
        Some((start, end)) => start - end,
        None => {
            warn!(line_no, marker = body, "malformed memory usage marker");
            0
        }
    };

    let cut_from = if pos > 0 && line.as_bytes()[pos - 1] == b' ' {
        pos - 1
    } else {
        pos
    };
    line.replace_range(cut_from..marker_end, "");
    delta
}

/// Remove a trailing `[<n> us]` marker and return the runtime in
/// milliseconds. Absent marker yields 0.0.
fn take_runtime(line: &mut String) -> f64 {
    if !line.ends_with(" us]") {
        return 0.0;
    }
    let Some(open) = line.rfind('[') else {
        return 0.0;
    };
    let Ok(us) = line[open + 1..line.len() - " us]".len()].parse::<i64>() else {
        return 0.0;
    };
    line.truncate(open);
    let kept = line.trim_end().len();
    line.truncate(kept);
    us as f64 / 1000.0
}

/// Read one token: quoted (quotes stripped) or up to the next space.
fn read_token(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix('"') {
        match rest.find('"') {
            Some(quote) => &rest[..quote],
            None => rest,
        }
    } else {
        line.split(' ').next().unwrap_or(line)
    }
}

fn parse_request(rest: &str, line_no: usize) -> StepKind {
    let mut line = rest.to_string();
    let mem_delta_kb = take_mem_delta(&mut line, line_no);
    let runtime_ms = take_runtime(&mut line);

    // Positional "<final> via <original> from <ip>" phrase. Field values
    // containing spaces shift everything; known limitation of the format.
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() < 5 {
        warn!(line_no, "request line is missing fields");
    }
    StepKind::Request {
        final_url: parts.first().copied().unwrap_or("").to_string(),
        original_url: parts.get(2).copied().unwrap_or("").to_string(),
        remote_ip: parts.get(4).copied().unwrap_or("").to_string(),
        mem_delta_kb,
        runtime_ms,
    }
}

fn parse_header(rest: &str) -> StepKind {
    let (replace, rest) = match rest.strip_prefix("REPLACE ") {
        Some(stripped) => (true, stripped),
        None => (false, rest),
    };
    StepKind::Header {
        text: rest.trim_matches('"').to_string(),
        replace,
    }
}

fn parse_include(rest: &str, line_no: usize) -> StepKind {
    let mut line = rest.to_string();
    let mem_delta_kb = take_mem_delta(&mut line, line_no);
    let runtime_ms = take_runtime(&mut line);
    StepKind::Include {
        path: read_token(&line).to_string(),
        mem_delta_kb,
        runtime_ms,
    }
}

fn parse_write(rest: &str, line_no: usize) -> StepKind {
    let mut line = rest.to_string();
    let runtime_ms = take_runtime(&mut line);

    let Some((byte_count, content)) = write_payload(&line) else {
        warn!(line_no, "write line does not match the (<n>): \"<text>\" shape");
        return StepKind::Write {
            byte_count: None,
            output: None,
            truncated: false,
            runtime_ms,
        };
    };

    let (output, truncated) = match content.strip_suffix("**CUT**") {
        Some(kept) => (kept, true),
        None => (content, false),
    };
    StepKind::Write {
        byte_count: Some(byte_count),
        output: Some(output.to_string()),
        truncated,
        runtime_ms,
    }
}

/// Match `(<digits>): "<content>"` and return the pieces.
fn write_payload(line: &str) -> Option<(u64, &str)> {
    let rest = line.strip_prefix('(')?;
    let close = rest.find(')')?;
    let byte_count = rest[..close].parse::<u64>().ok()?;
    let content = rest[close + 1..].strip_prefix(": \"")?;
    let content = content.strip_suffix('"')?;
    Some((byte_count, content))
}

fn parse_call(full: &str, line_no: usize) -> StepKind {
    let mut line = full.to_string();
    let mem_delta_kb = take_mem_delta(&mut line, line_no);
    let runtime_ms = take_runtime(&mut line);

    let Some(paren) = line.find('(') else {
        warn!(line_no, "call line has no argument list");
        return StepKind::Call {
            name: line,
            class_name: None,
            receiver: None,
            arguments: None,
            outcome: None,
            mem_delta_kb,
            runtime_ms,
        };
    };

    let full_name = &line[..paren];
    let (class_name, name) = match full_name.split_once("::") {
        Some((class, func)) => (Some(class.to_string()), func.to_string()),
        None => (None, full_name.to_string()),
    };

    // `) -> value` and `) THROWS value` run to end of line; whatever sits
    // between the outer parens is the receiver plus raw argument text.
    let rest = &line[paren..];
    let (inner, outcome) = if let Some(p) = rest.find(") -> ") {
        (
            &rest[1..p],
            Some(CallOutcome::Returned(rest[p + ") -> ".len()..].to_string())),
        )
    } else if let Some(p) = rest.find(") THROWS ") {
        (
            &rest[1..p],
            Some(CallOutcome::Threw(rest[p + ") THROWS ".len()..].to_string())),
        )
    } else if rest.ends_with(')') {
        (&rest[1..rest.len() - 1], None)
    } else {
        warn!(line_no, "ambiguous parenthesization in call line");
        (&rest[1..], None)
    };

    let (receiver, args_text) = match inner.strip_prefix("this=") {
        Some(after) => match after.find('|') {
            Some(bar) if bar > 0 => (Some(after[..bar].to_string()), &after[bar + 1..]),
            _ => (None, inner),
        },
        None => (None, inner),
    };
    let arguments = (!args_text.is_empty()).then(|| args_text.to_string());

    StepKind::Call {
        name,
        class_name,
        receiver,
        arguments,
        outcome,
        mem_delta_kb,
        runtime_ms,
    }
}
