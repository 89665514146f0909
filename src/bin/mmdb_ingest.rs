//! mmdb-ingest: Load a MaxMind DB file into ClickHouse
//!
//! Usage:
//!   # Load into the default database of a local server
//!   mmdb-ingest --mmdb GeoLite2-City.mmdb --name geolite2_city
//!
//!   # Recreate every object, keep two columns, check the result
//!   mmdb-ingest --mmdb GeoLite2-City.mmdb --name geolite2_city \
//!       --drop --columns country_iso_code,city_names_en --reload --test
//!
//! The connection string can also be given as CLICKHOUSE_DSN. Log output is
//! controlled with RUST_LOG.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use mmdb_ingest::config::parse_columns;
use mmdb_ingest::{run, IngestConfig, Layout};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mmdb-ingest")]
#[command(about = "Load a MaxMind DB file into ClickHouse tables and dictionaries", long_about = None)]
struct Args {
    /// ClickHouse connection string (clickhouse://, tcp:// or http(s)://)
    #[arg(long, env = "CLICKHOUSE_DSN", default_value = "clickhouse://localhost:9000")]
    dsn: String,

    /// MMDB file to load
    #[arg(long, default_value = "example.mmdb")]
    mmdb: PathBuf,

    /// Prefix of every table, dictionary and function name
    #[arg(long, default_value = "example_mmdb")]
    name: String,

    /// Partition to write, YYYY-MM-DD (default: today)
    #[arg(long)]
    partition: Option<NaiveDate>,

    /// Networks per insert
    #[arg(long, default_value_t = 1_000_000)]
    batch: usize,

    /// Comma-separated flattened columns to keep (default: all)
    #[arg(long)]
    columns: Option<String>,

    /// Drop the function, dictionaries and tables before creating them
    #[arg(long)]
    drop: bool,

    /// Reload the dictionaries after the insert
    #[arg(long)]
    reload: bool,

    /// Look up 1.1.1.1 after the insert
    #[arg(long)]
    test: bool,

    /// Days a partition is kept
    #[arg(long, default_value_t = 30)]
    ttl: u32,

    /// Table layout: deduplicated or inline
    #[arg(long, default_value = "deduplicated")]
    layout: Layout,
}

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mmdb_ingest=info"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact());

    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    // Build config
    let mut config = IngestConfig {
        dsn: args.dsn,
        mmdb: args.mmdb,
        name: args.name,
        batch_size: args.batch,
        drop: args.drop,
        reload: args.reload,
        test: args.test,
        ttl: args.ttl,
        layout: args.layout,
        ..IngestConfig::default()
    };
    if let Some(partition) = args.partition {
        config.partition = partition;
    }
    if let Some(columns) = args.columns {
        config.columns = parse_columns(&columns);
    }

    let summary = run(&config)
        .with_context(|| format!("Failed to ingest {}", config.mmdb.display()))?;

    tracing::info!(
        "Loaded {} networks ({} distinct payloads) into partition {} in {} flushes",
        summary.stats.networks,
        summary.stats.values,
        config.partition,
        summary.stats.flushes
    );
    Ok(())
}
