//! mmdb-infer: Print the table schemas inferred from a MaxMind DB file
//!
//! Usage:
//!   mmdb-infer --mmdb GeoLite2-City.mmdb
//!   mmdb-infer --mmdb GeoLite2-ASN.mmdb --layout inline --compact

use anyhow::{Context, Result};
use clap::Parser;
use mmdb_ingest::config::parse_columns;
use mmdb_ingest::{infer_schemas, Layout, Reader};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mmdb-infer")]
#[command(about = "Infer ClickHouse table schemas from a MaxMind DB file", long_about = None)]
struct Args {
    /// MMDB file to inspect
    #[arg(long, default_value = "example.mmdb")]
    mmdb: PathBuf,

    /// Comma-separated flattened columns to keep (default: all)
    #[arg(long)]
    columns: Option<String>,

    /// Table layout: deduplicated or inline
    #[arg(long, default_value = "deduplicated")]
    layout: Layout,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let reader = Reader::open(&args.mmdb)
        .with_context(|| format!("Failed to open {}", args.mmdb.display()))?;
    let columns = args.columns.as_deref().map(parse_columns).unwrap_or_default();
    let allow_list = Some(&columns).filter(|c| !c.is_empty());

    let schemas = infer_schemas(&reader, args.layout, allow_list)?;

    let output = if args.compact {
        serde_json::to_string(&schemas)?
    } else {
        serde_json::to_string_pretty(&schemas)?
    };
    println!("{}", output);

    Ok(())
}
