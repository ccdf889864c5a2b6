//! Purpose: `mapqueue` CLI entry point for inspecting and driving a file queue.
//! Role: Binary crate root; parses args, runs one queue command, emits JSON on stdout.
//! Invariants: Queue items are JSON values (one per line on output).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{error::ErrorKind as ClapErrorKind, Parser, Subcommand, ValueHint};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use mapqueue::{
    to_exit_code, Durability, Error, ErrorKind, FileQueue, JsonCodec, QueueOptions,
    DEFAULT_PAGE_SIZE, DEFAULT_QUEUE_NAME,
};

#[derive(Parser)]
#[command(
    name = "mapqueue",
    version,
    about = "Persistent FIFO queue backed by memory-mapped files",
    after_help = r#"EXAMPLES
  $ mapqueue push '"hello"' '{"job":1}'
  $ mapqueue pull --all
  $ mapqueue --dir /var/spool/q --name jobs info"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "./",
        help = "Directory holding the queue files",
        value_hint = ValueHint::DirPath
    )]
    dir: PathBuf,
    #[arg(long, default_value = DEFAULT_QUEUE_NAME, help = "Queue name (files are <name>.index and <name>.data)")]
    name: String,
    #[arg(long, help = "Growth page size in bytes or K/M/G (default: 64M)")]
    page_size: Option<String>,
    #[arg(long, help = "Flush both files to disk after every operation")]
    flush: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Append JSON values to the queue")]
    Push {
        #[arg(required = true, help = "JSON values, one per argument")]
        values: Vec<String>,
    },
    #[command(about = "Remove values from the head of the queue")]
    Pull {
        #[arg(long, default_value_t = 1, conflicts_with = "all", help = "Number of values to pull")]
        count: usize,
        #[arg(long, help = "Pull until the queue is empty")]
        all: bool,
    },
    #[command(about = "Drop all queued values and shrink the data file")]
    Clear,
    #[command(about = "Show cursors and capacity")]
    Info,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(());
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `mapqueue --help` for usage."));
            }
        },
    };

    let page_size = match cli.page_size.as_deref() {
        Some(input) => parse_size(input)?,
        None => DEFAULT_PAGE_SIZE,
    };
    let durability = if cli.flush {
        Durability::Flush
    } else {
        Durability::Fast
    };
    let options = QueueOptions::new(cli.dir, cli.name)
        .with_page_size(page_size)
        .with_durability(durability);
    let queue = FileQueue::open(options, JsonCodec::<Value>::new())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Push { values } => {
            let parsed = values
                .iter()
                .map(String::as_str)
                .map(parse_value)
                .collect::<Result<Vec<_>, _>>()?;
            for value in &parsed {
                queue.push(value)?;
            }
            emit_json(&mut out, &json!({ "pushed": parsed.len() }))?;
        }
        Command::Pull { count, all } => {
            let limit = if all { usize::MAX } else { count };
            let mut pulled = 0usize;
            while pulled < limit {
                let Some(value) = queue.pull()? else {
                    break;
                };
                emit_json(&mut out, &value)?;
                pulled += 1;
            }
        }
        Command::Clear => {
            queue.clear()?;
            emit_json(&mut out, &json!({ "cleared": true }))?;
        }
        Command::Info => {
            let stats = queue.stats()?;
            let paths = queue.paths();
            let info = json!({
                "index": paths.index.display().to_string(),
                "data": paths.data.display().to_string(),
                "read_cursor": stats.read_cursor,
                "write_cursor": stats.write_cursor,
                "capacity": stats.capacity,
                "page_size": stats.page_size,
                "pending_bytes": stats.pending_bytes,
                "empty": stats.is_empty(),
            });
            emit_json(&mut out, &info)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn parse_value(raw: &str) -> Result<Value, Error> {
    serde_json::from_str(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid JSON value: {raw}"))
            .with_hint("Quote strings as JSON, e.g. '\"hello\"'.")
            .with_source(err)
    })
}

// Plain bytes or a single K/M/G binary suffix; IEC spellings like "MiB" are rejected.
fn parse_size(input: &str) -> Result<u64, Error> {
    let input = input.trim();
    let (digits, shift) = match input.char_indices().last() {
        Some((idx, 'K' | 'k')) => (&input[..idx], 10),
        Some((idx, 'M' | 'm')) => (&input[..idx], 20),
        Some((idx, 'G' | 'g')) => (&input[..idx], 30),
        _ => (input, 0),
    };
    let bytes: u64 = digits.trim().parse().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid size `{input}`"))
            .with_hint("Use bytes or K/M/G (e.g. 64M).")
            .with_source(err)
    })?;
    bytes
        .checked_mul(1u64 << shift)
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message(format!("size `{input}` is too large")))
}

fn emit_json(out: &mut impl Write, value: &Value) -> Result<(), Error> {
    let line = serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    writeln!(out, "{line}").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })
}

fn clap_error_summary(err: &clap::Error) -> String {
    let text = err.to_string();
    text.lines()
        .next()
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", err.to_text());
    } else {
        eprintln!("{}", err.to_json());
    }
}
