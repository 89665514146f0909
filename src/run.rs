//! One complete ingestion: infer, create, load, reload, check

use crate::config::IngestConfig;
use crate::ddl::{self, DictCredentials, ObjectNames};
use crate::error::{IngestError, Result};
use crate::mmdb::{Reader, Source};
use crate::pipeline::{BatchPipeline, IngestStats};
use crate::schema::{infer_schema, network_schema, Schema};
use crate::store::{ClickHouse, Store};
use crate::types::{AttributeRecord, Column, Layout};
use serde::Serialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{info, warn};

/// Address queried by the post-load check
pub const TEST_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

/// Table schemas for one layout
#[derive(Debug, Clone, Serialize)]
pub struct InferredSchemas {
    /// Network table; carries the attributes in the inline layout
    pub networks: Schema,
    /// Value table of the deduplicated layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Schema>,
}

impl InferredSchemas {
    /// Schema holding the attribute columns
    pub fn attributes(&self) -> &Schema {
        self.values.as_ref().unwrap_or(&self.networks)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub names: ObjectNames,
    pub stats: IngestStats,
    /// Answer of the store to the post-load check
    pub test_result: Option<String>,
    /// Pointer this run gave the payload covering [`TEST_IP`]
    pub local_pointer: Option<u64>,
}

/// Record of the first enumerated network, used as the inference sample
pub fn sample_record(source: &dyn Source) -> Result<AttributeRecord> {
    let mut cursor = source.networks(true)?;
    if cursor.next().is_some() {
        return cursor.record();
    }
    cursor.finish()?;
    Err(IngestError::Enumeration(
        "database has no networks".to_string(),
    ))
}

pub fn infer_schemas(
    source: &dyn Source,
    layout: Layout,
    allow_list: Option<&HashSet<String>>,
) -> Result<InferredSchemas> {
    let sample = sample_record(source)?;
    Ok(match layout {
        Layout::Deduplicated => InferredSchemas {
            networks: network_schema(),
            values: Some(infer_schema(&sample, Column::pointer(), allow_list)?),
        },
        Layout::Inline => InferredSchemas {
            networks: infer_schema(&sample, Column::network(), allow_list)?,
            values: None,
        },
    })
}

/// Connect, open the database and ingest it
pub fn run(config: &IngestConfig) -> Result<RunSummary> {
    config.validate()?;

    let store = ClickHouse::connect(&config.dsn)?;
    let reader = Reader::open(&config.mmdb)?;
    let metadata = reader.metadata();
    info!(
        "Opened {} ({}, IPv{}, built {})",
        config.mmdb.display(),
        metadata.database_type,
        metadata.ip_version,
        metadata.build_epoch
    );

    let credentials = DictCredentials {
        user: store.endpoint().user.clone(),
        password: store.endpoint().password.clone(),
    };
    ingest(&reader, &store, config, &credentials)
}

/// Ingest `source` into `store` under the configured names and partition
pub fn ingest(
    source: &dyn Source,
    store: &dyn Store,
    config: &IngestConfig,
    credentials: &DictCredentials,
) -> Result<RunSummary> {
    config.validate()?;

    let schemas = infer_schemas(source, config.layout, config.allow_list())?;
    info!("Inferred schema: {}", schemas.attributes().to_sql());

    let names = ObjectNames::new(&config.name, config.layout);
    ddl::prepare_objects(
        store,
        &names,
        &schemas.networks,
        schemas.values.as_ref(),
        config.ttl,
        config.drop,
        credentials,
    )?;

    ddl::drop_partition(store, &names.network_table, config.partition)?;
    if let Some(value_table) = &names.value_table {
        ddl::drop_partition(store, value_table, config.partition)?;
    }

    let pipeline = BatchPipeline::new(source, store, config.partition, config.batch_size)?;
    let (stats, index) = match (&names.value_table, &schemas.values) {
        (Some(value_table), Some(value_schema)) => {
            let (stats, index) =
                pipeline.run_deduplicated(&names.network_table, value_table, value_schema)?;
            (stats, Some(index))
        }
        _ => (pipeline.run_inline(&names.network_table, &schemas.networks)?, None),
    };

    if config.reload {
        ddl::reload_dictionary(store, &names.network_dict)?;
        if let Some(value_dict) = &names.value_dict {
            ddl::reload_dictionary(store, value_dict)?;
        }
    }

    let mut summary = RunSummary {
        names,
        stats,
        test_result: None,
        local_pointer: None,
    };

    if config.test {
        match schemas.attributes().value_columns().first() {
            Some(column) => {
                let result = store.query_scalar(&test_query(&summary.names, &column.name))?;
                info!("{}({}, {}) = {}", config.name, TEST_IP, column.name, result);
                summary.test_result = Some(result);
            }
            None => warn!("No attribute columns, skipping lookup test"),
        }

        if let Some(index) = &index {
            summary.local_pointer = source
                .lookup_offset(TEST_IP)?
                .and_then(|offset| index.get(offset));
            info!("Local pointer for {}: {:?}", TEST_IP, summary.local_pointer);
        }
    }

    Ok(summary)
}

fn test_query(names: &ObjectNames, attr: &str) -> String {
    match &names.function {
        Some(function) => format!("SELECT {}('{}', '{}')", function, TEST_IP, attr),
        None => format!(
            "SELECT dictGet('{}', '{}', IPv6StringToNum('{}'))",
            names.network_dict, attr, TEST_IP
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmdb::fixture;
    use crate::store::memory::MemoryStore;
    use crate::store::Cell;
    use crate::types::{ColumnKind, Value};
    use chrono::NaiveDate;

    /// 0.0.0.0/2 -> Paris, 64.0.0.0/3 -> Paris, 96.0.0.0/3 -> nothing, 128.0.0.0/1 -> Sydney
    fn reader() -> Reader {
        fixture("city.mmdb")
    }

    fn config(layout: Layout) -> IngestConfig {
        IngestConfig {
            name: "geo".to_string(),
            partition: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            batch_size: 2,
            layout,
            ..IngestConfig::default()
        }
    }

    fn answering(pattern: &str, answer: &str) -> MemoryStore {
        MemoryStore {
            answers: [(pattern.to_string(), answer.to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_infer_deduplicated_schemas() {
        let schemas = infer_schemas(&reader(), Layout::Deduplicated, None).unwrap();
        assert_eq!(schemas.networks.len(), 3);

        let values = schemas.values.unwrap();
        assert_eq!(values.key(), &Column::pointer());
        assert_eq!(
            values.value_columns(),
            &[
                Column::new("city", ColumnKind::String),
                Column::new("location_accuracy", ColumnKind::UInt16),
            ]
        );
    }

    #[test]
    fn test_infer_inline_schema_with_allow_list() {
        let allow: HashSet<String> = ["city".to_string()].into_iter().collect();
        let schemas = infer_schemas(&reader(), Layout::Inline, Some(&allow)).unwrap();
        assert!(schemas.values.is_none());
        assert_eq!(
            schemas.networks.to_sql(),
            "`network` String, `city` String, `partition` Date"
        );
    }

    #[test]
    fn test_empty_database_has_no_sample() {
        let reader = fixture("empty.mmdb");
        assert!(matches!(
            sample_record(&reader),
            Err(IngestError::Enumeration(_))
        ));
    }

    #[test]
    fn test_deduplicated_ingest() {
        let store = answering("geo('1.1.1.1', 'city')", "Paris");
        let config = IngestConfig {
            reload: true,
            test: true,
            ..config(Layout::Deduplicated)
        };
        let summary = ingest(&reader(), &store, &config, &DictCredentials::default()).unwrap();

        assert_eq!(summary.stats.networks, 3);
        assert_eq!(summary.stats.values, 2);
        assert_eq!(summary.test_result.as_deref(), Some("Paris"));
        assert_eq!(summary.local_pointer, Some(1));

        let networks = store.stored("geo_networks_history");
        assert_eq!(networks[0][0], Cell::Network("0.0.0.0/2".to_string()));
        assert_eq!(networks[1][0], Cell::Network("64.0.0.0/3".to_string()));
        assert_eq!(networks[0][1], networks[1][1]);
        assert_eq!(networks[2][1], Cell::Pointer(2));

        let values = store.stored("geo_values_history");
        assert_eq!(
            values[1],
            vec![
                Cell::Pointer(2),
                Cell::Value(Value::Text("Sydney".to_string())),
                Cell::Value(Value::U16(50)),
                Cell::Partition(config.partition),
            ]
        );

        let reloads = store
            .statements()
            .iter()
            .filter(|s| s.starts_with("SYSTEM RELOAD DICTIONARY"))
            .count();
        assert_eq!(reloads, 2);
    }

    #[test]
    fn test_rerun_replaces_partition() {
        let store = MemoryStore::default();
        let source = reader();
        let config = config(Layout::Deduplicated);

        ingest(&source, &store, &config, &DictCredentials::default()).unwrap();
        ingest(&source, &store, &config, &DictCredentials::default()).unwrap();
        assert_eq!(store.stored("geo_networks_history").len(), 3);
        assert_eq!(store.stored("geo_values_history").len(), 2);

        let next_day = IngestConfig {
            partition: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            ..config
        };
        ingest(&source, &store, &next_day, &DictCredentials::default()).unwrap();
        assert_eq!(store.stored("geo_networks_history").len(), 6);
    }

    #[test]
    fn test_inline_ingest() {
        let store = answering("dictGet('geo', 'city'", "Paris");
        let config = IngestConfig {
            test: true,
            ..config(Layout::Inline)
        };
        let summary = ingest(&reader(), &store, &config, &DictCredentials::default()).unwrap();

        assert_eq!(summary.stats.networks, 3);
        assert_eq!(summary.test_result.as_deref(), Some("Paris"));
        assert_eq!(summary.local_pointer, None);

        let rows = store.stored("geo_history");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][1], Cell::Value(Value::Text("Sydney".to_string())));
        assert!(store.statements().iter().all(|s| !s.contains("FUNCTION")));
    }

    #[test]
    fn test_invalid_name_fails_before_any_statement() {
        let store = MemoryStore::default();
        let config = IngestConfig {
            name: "geo-city".to_string(),
            ..config(Layout::Deduplicated)
        };
        let err = ingest(&reader(), &store, &config, &DictCredentials::default()).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_unsupported_kind_stops_before_any_statement() {
        let store = MemoryStore::default();
        let err = ingest(
            &fixture("array.mmdb"),
            &store,
            &config(Layout::Deduplicated),
            &DictCredentials::default(),
        )
        .unwrap_err();

        match err {
            IngestError::Schema { path, kind } => {
                assert_eq!(path, "tags");
                assert_eq!(kind, "array");
            }
            other => panic!("Expected schema error, got: {:?}", other),
        }
        assert!(store.sent.borrow().is_empty());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_unsupported_kind_outside_allow_list_loads() {
        let store = MemoryStore::default();
        let config = IngestConfig {
            columns: ["city".to_string()].into_iter().collect(),
            ..config(Layout::Inline)
        };
        let summary = ingest(&fixture("array.mmdb"), &store, &config, &DictCredentials::default())
            .unwrap();

        assert_eq!(summary.stats.networks, 1);
        assert_eq!(
            store.stored("geo_history"),
            vec![vec![
                Cell::Network("0.0.0.0/1".to_string()),
                Cell::Value(Value::Text("Paris".to_string())),
                Cell::Partition(config.partition),
            ]]
        );
    }
}
