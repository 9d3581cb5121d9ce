//! Depth-tracked streaming conversion loop.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::format::Formatter;
use crate::parse;
use crate::{Step, TraceResult};

/// Drives a [`Formatter`] over a line-oriented trace stream.
///
/// Depth transitions are issued one level at a time, so the formatter can
/// get by with a single open-item flag instead of a stack; the nesting
/// structure lives in the emitted markup's own bracketing.
pub struct Converter<R, W, F> {
    input: R,
    output: W,
    formatter: F,
    depth: usize,
}

impl<R: BufRead, W: Write, F: Formatter> Converter<R, W, F> {
    pub fn new(input: R, output: W, formatter: F) -> Self {
        Converter {
            input,
            output,
            formatter,
            depth: 0,
        }
    }

    /// Run the conversion to stream exhaustion.
    ///
    /// Fragments are written as each stage produces them; if an error cuts
    /// the run short, no partial-document guarantee is made.
    pub fn convert(mut self) -> TraceResult<()> {
        let fragment = self.formatter.begin_document();
        self.output.write_all(fragment.as_bytes())?;

        let mut line = String::new();
        let mut line_no = 0usize;
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let step = parse::classify(&line, line_no)?;
            self.emit(&step)?;
        }

        let fragment = self.formatter.end_document();
        self.output.write_all(fragment.as_bytes())?;
        self.output.flush()?;
        debug!(lines = line_no, "conversion finished");
        Ok(())
    }

    fn emit(&mut self, step: &Step) -> TraceResult<()> {
        while step.depth > self.depth {
            let fragment = self.formatter.enter_level();
            self.output.write_all(fragment.as_bytes())?;
            self.depth += 1;
        }
        while step.depth < self.depth {
            let fragment = self.formatter.leave_level();
            self.output.write_all(fragment.as_bytes())?;
            self.depth -= 1;
        }
        let fragment = self.formatter.render_step(step);
        self.output.write_all(fragment.as_bytes())?;
        Ok(())
    }
}
