//! foundry-plan: Show how JSON records would be decomposed, without a database
//!
//! Records are persisted into a throwaway in-memory store, then the
//! resulting table layout and per-record write plans are printed as JSON.
//! Identities are assigned exactly as foundry-persist assigns them against
//! an empty database.
//!
//! Usage:
//!   # Plan a single document
//!   foundry-plan order.json --table orders
//!
//!   # Plan NDJSON from stdin with compact output
//!   cat events.jsonl | foundry-plan --ndjson --table events --compact

use anyhow::{Context, Result};
use clap::Parser;
use foundry::cli::ConfigArgs;
use foundry::{ColumnSet, Foundry, Record, TableStore, WritePlan};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{stdin, BufRead, BufReader};

#[derive(Parser, Debug)]
#[command(name = "foundry-plan")]
#[command(about = "Dry-run decomposition of JSON records into tables", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Root table name
    #[arg(long, short = 't')]
    table: String,

    /// Process newline-delimited JSON (one JSON object per line)
    #[arg(long)]
    ndjson: bool,

    #[command(flatten)]
    engine: ConfigArgs,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

#[derive(Serialize)]
struct PlanOutput {
    tables: BTreeMap<String, ColumnSet>,
    plans: Vec<WritePlan>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = args.engine.build().context("Failed to load engine configuration")?;
    let foundry = Foundry::open_in_memory(config)?;

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(File::open(file_path)?))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let mut plans = Vec::new();

    if args.ndjson {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = Record::from_json_str(line)
                .with_context(|| format!("Invalid record on line {}", index + 1))?;
            plans.push(foundry.persist_with_plan(&args.table, &record)?.0);
        }
    } else {
        let value: Value = serde_json::from_reader(reader)?;
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            let record = Record::from_json(item)?;
            plans.push(foundry.persist_with_plan(&args.table, &record)?.0);
        }
    }

    if plans.is_empty() {
        eprintln!("Warning: No JSON objects found in input");
    }

    let store = foundry.store();
    let mut tables = BTreeMap::new();
    for table in store.tables()? {
        let columns = store.columns(&table)?;
        tables.insert(table, columns);
    }

    let output = PlanOutput { tables, plans };
    let output = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", output);

    Ok(())
}
