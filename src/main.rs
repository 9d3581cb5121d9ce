#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use trace_html::format::{JsonLines, SingleHtmlFile};
use trace_html::{Converter, TraceError};

#[derive(Parser, Debug)]
#[command(name = "trace-to-html")]
#[command(about = "Convert an execution trace log into a browsable HTML call tree", long_about = None)]
struct Cli {
    /// Title for the generated document
    #[arg(short, long, default_value = "Execution Trace")]
    title: String,

    /// Input trace file (standard input is the default)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (standard output is the default)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "html")]
    format: Format,

    /// Enable verbose logging (or set TRACE_HTML_LOG)
    #[arg(long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Html,
    Jsonl,
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("TRACE_HTML_LOG").unwrap_or_else(|_| {
        if verbose {
            "trace_html=debug".to_string()
        } else {
            "trace_html=warn".to_string()
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead>, TraceError> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|e| TraceError::OpenInput {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>, TraceError> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|e| TraceError::OpenOutput {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let input = open_input(cli.input.as_ref())?;
    let output = open_output(cli.output.as_ref())?;

    match cli.format {
        Format::Html => Converter::new(input, output, SingleHtmlFile::new(cli.title)).convert()?,
        Format::Jsonl => Converter::new(input, output, JsonLines::new()).convert()?,
    }
    Ok(())
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
