//! foundry-persist: Store JSON records in a SQLite database
//!
//! Tables and columns are created or widened as records arrive; list fields
//! become child tables linked back by `{parent}_id` columns.
//!
//! Usage:
//!   # Persist a JSON array (or single object) from a file
//!   foundry-persist users.json --db app.db --table users
//!
//!   # Persist NDJSON from stdin
//!   cat events.jsonl | foundry-persist --ndjson --db app.db --table events
//!
//!   # Keep some lists inline as JSON text, with debug logging
//!   foundry-persist orders.json --db app.db --table orders --inline-fields tags,notes -v

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use foundry::cli::ConfigArgs;
use foundry::{Foundry, Record, SqliteStore, WriteReport};
use serde_json::Value;
use std::fs::File;
use std::io::{stdin, BufRead, BufReader, Read};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "foundry-persist")]
#[command(about = "Persist JSON records into SQLite with inferred schemas", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// SQLite database file (created if missing)
    #[arg(long)]
    db: String,

    /// Root table name
    #[arg(long, short = 't')]
    table: String,

    /// Process newline-delimited JSON (one JSON object per line)
    #[arg(long)]
    ndjson: bool,

    #[command(flatten)]
    engine: ConfigArgs,

    /// Compact report output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Log schema changes and writes to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.engine.build().context("Failed to load engine configuration")?;
    let foundry = Foundry::open(&args.db, config)
        .with_context(|| format!("Failed to open database {}", args.db))?;

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        let file = File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?;
        Box::new(BufReader::new(file))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let report = if args.ndjson {
        foundry
            .persist_json(&args.table, reader)
            .context("Failed to persist NDJSON input")?
    } else {
        persist_document(&foundry, &args.table, reader)?
    };

    if report.records == 0 {
        warn!("no JSON objects found in input");
    }
    info!(records = report.records, rows = report.rows_written, "done");

    let output = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", output);

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Persist a JSON document: an array of objects or a single object.
///
/// Falls back to line-by-line parsing when the input is not one document.
fn persist_document(
    foundry: &Foundry<SqliteStore>,
    table: &str,
    mut reader: Box<dyn BufRead>,
) -> Result<WriteReport> {
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;

    // simd-json parses in place, so keep a copy for the fallback path
    let mut scratch = content.clone();
    let document: Value = match simd_json::serde::from_slice(&mut scratch) {
        Ok(value) => value,
        Err(_) => {
            return foundry
                .persist_json(table, content.as_slice())
                .context("Failed to persist input as NDJSON");
        }
    };

    let mut report = WriteReport::default();
    match document {
        Value::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                let record = Record::from_json(item)
                    .with_context(|| format!("Element {} is not a valid record", index))?;
                report.merge(
                    foundry
                        .persist(table, &record)
                        .with_context(|| format!("Failed to persist element {}", index))?,
                );
            }
        }
        Value::Object(_) => {
            let record = Record::from_json(document)?;
            report.merge(foundry.persist(table, &record)?);
        }
        other => bail!("Expected a JSON object or array of objects, found {}", other),
    }

    Ok(report)
}
