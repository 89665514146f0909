//! # mmdb-ingest - IP attribute databases into ClickHouse
//!
//! Loads a MaxMind DB (MMDB) file into ClickHouse tables backed by
//! dictionaries, so that attributes of an IP address can be looked up with
//! a single function call.
//!
//! ## Modules
//!
//! - **mmdb**: Search tree enumeration and data section decoding
//! - **flatten** / **schema**: Nested records to flat, typed columns
//! - **dedupe**: Dense pointers for distinct payloads
//! - **pipeline**: Batched inserts of network and value rows
//! - **store** / **ddl**: ClickHouse access and object definitions
//! - **run**: One complete ingestion
//!
//! ## Layouts
//!
//! Many networks share one payload. The deduplicated layout stores each
//! payload once in `{name}_values_history` and points at it from
//! `{name}_networks_history`; `{name}(ip, attr)` joins the two dictionaries.
//! The inline layout writes every attribute on every network row of
//! `{name}_history`.
//!
//! ## Quick Start
//!
//! ```rust
//! use mmdb_ingest::flatten::flatten;
//! use mmdb_ingest::types::{AttributeRecord, Value};
//!
//! let mut names = AttributeRecord::new();
//! names.insert("en".to_string(), Value::Text("Sydney".to_string()));
//! let mut city = AttributeRecord::new();
//! city.insert("names".to_string(), Value::Map(names));
//! let mut record = AttributeRecord::new();
//! record.insert("city".to_string(), Value::Map(city));
//!
//! let flat = flatten(&record);
//! assert_eq!(flat[0].0, "city_names_en");
//! ```
//!
//! ```rust,no_run
//! use mmdb_ingest::{run, IngestConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = IngestConfig {
//!     mmdb: "GeoLite2-City.mmdb".into(),
//!     name: "geolite2_city".to_string(),
//!     ..IngestConfig::default()
//! };
//! let summary = run(&config)?;
//! println!("{} networks", summary.stats.networks);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ddl;
pub mod dedupe;
pub mod error;
pub mod flatten;
pub mod mmdb;
pub mod pipeline;
pub mod run;
pub mod schema;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use config::IngestConfig;
pub use dedupe::PointerIndex;
pub use error::{IngestError, Result};
pub use mmdb::{Reader, Source};
pub use pipeline::{BatchPipeline, IngestStats};
pub use run::{infer_schemas, ingest, run, RunSummary};
pub use schema::{infer_schema, Schema};
pub use store::{ClickHouse, Store};
pub use types::{Layout, Value};
