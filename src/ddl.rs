//! Table, dictionary and function statements
//!
//! Every create is guarded by `IF NOT EXISTS` and every drop by `IF EXISTS`,
//! so the whole sequence can be replayed after a failed run. Names come from
//! a validated identifier prefix; where the store accepts bound identifiers
//! they are passed as parameters anyway.

use crate::error::Result;
use crate::schema::Schema;
use crate::store::{Param, Store};
use crate::types::{Layout, NETWORK_COLUMN, POINTER_COLUMN};
use chrono::NaiveDate;
use tracing::info;

/// Names of every object created for one naming prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNames {
    pub network_table: String,
    pub network_dict: String,
    /// Only in the deduplicated layout
    pub value_table: Option<String>,
    pub value_dict: Option<String>,
    pub function: Option<String>,
}

impl ObjectNames {
    pub fn new(prefix: &str, layout: Layout) -> Self {
        match layout {
            Layout::Deduplicated => ObjectNames {
                network_table: format!("{}_networks_history", prefix),
                network_dict: format!("{}_networks", prefix),
                value_table: Some(format!("{}_values_history", prefix)),
                value_dict: Some(format!("{}_values", prefix)),
                function: Some(prefix.to_string()),
            },
            Layout::Inline => ObjectNames {
                network_table: format!("{}_history", prefix),
                network_dict: prefix.to_string(),
                value_table: None,
                value_dict: None,
                function: None,
            },
        }
    }
}

/// Dictionary layout: trie for network prefixes, flat array for pointers
pub const IP_TRIE_LAYOUT: &str = "IP_TRIE";
pub const FLAT_LAYOUT: &str = "FLAT(INITIAL_ARRAY_SIZE 50000 MAX_ARRAY_SIZE 50000000)";

pub fn create_partitioned_table(
    store: &dyn Store,
    name: &str,
    schema: &Schema,
    order_by: &str,
    ttl: u32,
) -> Result<()> {
    info!("Creating table {}", name);
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {{name:Identifier}} ({})
        ENGINE MergeTree
        ORDER BY {{orderBy:Identifier}}
        PARTITION BY partition
        TTL partition + INTERVAL {{ttl:Int64}} DAY",
        schema.to_sql()
    );
    store.execute(
        &sql,
        &[
            Param::named("name", name),
            Param::named("orderBy", order_by),
            Param::named("ttl", ttl),
        ],
    )
}

/// Source credentials a dictionary uses to query its own table
#[derive(Debug, Clone, Default)]
pub struct DictCredentials {
    pub user: String,
    pub password: String,
}

#[allow(clippy::too_many_arguments)]
pub fn create_dictionary(
    store: &dyn Store,
    name: &str,
    schema: &Schema,
    source_table: &str,
    primary_key: &str,
    layout: &str,
    credentials: &DictCredentials,
) -> Result<()> {
    info!("Creating dictionary {}", name);
    let user = if credentials.user.is_empty() {
        "default"
    } else {
        credentials.user.as_str()
    };
    // The dictionary source is a string literal; bound parameters do not reach it
    let sql = format!(
        "CREATE DICTIONARY IF NOT EXISTS {name} ({columns})
        PRIMARY KEY {primary_key}
        SOURCE(CLICKHOUSE(
            QUERY 'SELECT * FROM {table} WHERE partition = (SELECT MAX(partition) FROM {table})'
            USER '{user}'
            PASSWORD '{password}'
        ))
        LIFETIME(MIN 0 MAX 3600)
        LAYOUT({layout})",
        name = name,
        columns = schema.to_sql(),
        primary_key = primary_key,
        table = source_table,
        user = quote(user),
        password = quote(&credentials.password),
        layout = layout,
    );
    store.execute(&sql, &[])
}

pub fn create_function(store: &dyn Store, name: &str, args: &str, expr: &str) -> Result<()> {
    info!("Creating function {}", name);
    let sql = format!("CREATE FUNCTION IF NOT EXISTS {} AS ({}) -> {}", name, args, expr);
    store.execute(&sql, &[])
}

/// `name(ip, attr)`: attribute `attr` of the payload covering `ip`
pub fn lookup_function_expr(network_dict: &str, value_dict: &str) -> String {
    format!(
        "dictGet('{}', attr, dictGet('{}', '{}', IPv6StringToNum(ip)))",
        value_dict, network_dict, POINTER_COLUMN
    )
}

pub fn drop_table(store: &dyn Store, name: &str) -> Result<()> {
    info!("Dropping table {}", name);
    store.execute("DROP TABLE IF EXISTS {name:Identifier}", &[Param::named("name", name)])
}

pub fn drop_dictionary(store: &dyn Store, name: &str) -> Result<()> {
    info!("Dropping dictionary {}", name);
    store.execute(
        "DROP DICTIONARY IF EXISTS {name:Identifier}",
        &[Param::named("name", name)],
    )
}

pub fn drop_function(store: &dyn Store, name: &str) -> Result<()> {
    info!("Dropping function {}", name);
    // DROP FUNCTION does not take query parameters
    store.execute(&format!("DROP FUNCTION IF EXISTS {}", name), &[])
}

pub fn drop_partition(store: &dyn Store, table: &str, partition: NaiveDate) -> Result<()> {
    info!("Dropping partition {} of {}", partition, table);
    store.execute(
        "ALTER TABLE {name:Identifier} DROP PARTITION {partition:String}",
        &[
            Param::named("name", table),
            Param::named("partition", partition.format("%Y-%m-%d")),
        ],
    )
}

pub fn reload_dictionary(store: &dyn Store, name: &str) -> Result<()> {
    info!("Reloading dictionary {}", name);
    store.execute(
        "SYSTEM RELOAD DICTIONARY {name:Identifier}",
        &[Param::named("name", name)],
    )
}

/// Create every object of the layout, dropping them first if asked
pub fn prepare_objects(
    store: &dyn Store,
    names: &ObjectNames,
    network_schema: &Schema,
    value_schema: Option<&Schema>,
    ttl: u32,
    drop_existing: bool,
    credentials: &DictCredentials,
) -> Result<()> {
    if drop_existing {
        if let Some(function) = &names.function {
            drop_function(store, function)?;
        }
        if let Some(value_dict) = &names.value_dict {
            drop_dictionary(store, value_dict)?;
        }
        drop_dictionary(store, &names.network_dict)?;
        if let Some(value_table) = &names.value_table {
            drop_table(store, value_table)?;
        }
        drop_table(store, &names.network_table)?;
    }

    create_partitioned_table(store, &names.network_table, network_schema, NETWORK_COLUMN, ttl)?;
    create_dictionary(
        store,
        &names.network_dict,
        network_schema,
        &names.network_table,
        NETWORK_COLUMN,
        IP_TRIE_LAYOUT,
        credentials,
    )?;

    if let (Some(value_table), Some(value_dict), Some(schema)) =
        (&names.value_table, &names.value_dict, value_schema)
    {
        create_partitioned_table(store, value_table, schema, POINTER_COLUMN, ttl)?;
        create_dictionary(
            store,
            value_dict,
            schema,
            value_table,
            POINTER_COLUMN,
            FLAT_LAYOUT,
            credentials,
        )?;
    }

    if let (Some(function), Some(value_dict)) = (&names.function, &names.value_dict) {
        create_function(
            store,
            function,
            "ip, attr",
            &lookup_function_expr(&names.network_dict, value_dict),
        )?;
    }
    Ok(())
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::network_schema;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_object_names() {
        let dedup = ObjectNames::new("geo", Layout::Deduplicated);
        assert_eq!(dedup.network_table, "geo_networks_history");
        assert_eq!(dedup.value_table.as_deref(), Some("geo_values_history"));
        assert_eq!(dedup.network_dict, "geo_networks");
        assert_eq!(dedup.value_dict.as_deref(), Some("geo_values"));
        assert_eq!(dedup.function.as_deref(), Some("geo"));

        let inline = ObjectNames::new("geo", Layout::Inline);
        assert_eq!(inline.network_table, "geo_history");
        assert_eq!(inline.network_dict, "geo");
        assert!(inline.value_table.is_none());
        assert!(inline.function.is_none());
    }

    #[test]
    fn test_create_table_binds_parameters() {
        let store = MemoryStore::default();
        create_partitioned_table(&store, "geo_networks_history", &network_schema(), "network", 7)
            .unwrap();

        let executed = store.executed.borrow();
        let (sql, params) = &executed[0];
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS {name:Identifier}"));
        assert!(sql.contains("`network` String, `pointer` UInt64, `partition` Date"));
        assert!(sql.contains("TTL partition + INTERVAL {ttl:Int64} DAY"));
        assert_eq!(
            params,
            &vec![
                Param::named("name", "geo_networks_history"),
                Param::named("orderBy", "network"),
                Param::named("ttl", 7),
            ]
        );
    }

    #[test]
    fn test_dictionary_quotes_credentials() {
        let store = MemoryStore::default();
        let credentials = DictCredentials {
            user: String::new(),
            password: "it's".to_string(),
        };
        create_dictionary(
            &store,
            "geo_networks",
            &network_schema(),
            "geo_networks_history",
            "network",
            IP_TRIE_LAYOUT,
            &credentials,
        )
        .unwrap();

        let sql = &store.statements()[0];
        assert!(sql.contains("USER 'default'"));
        assert!(sql.contains(r"PASSWORD 'it\'s'"));
        assert!(sql.contains("LAYOUT(IP_TRIE)"));
        assert!(sql.contains("FROM geo_networks_history WHERE partition = (SELECT MAX(partition) FROM geo_networks_history)"));
    }

    #[test]
    fn test_lookup_function_expr() {
        assert_eq!(
            lookup_function_expr("geo_networks", "geo_values"),
            "dictGet('geo_values', attr, dictGet('geo_networks', 'pointer', IPv6StringToNum(ip)))"
        );
    }

    #[test]
    fn test_drop_order() {
        let store = MemoryStore::default();
        let names = ObjectNames::new("geo", Layout::Deduplicated);
        let schema = network_schema();
        prepare_objects(&store, &names, &schema, Some(&schema), 30, true, &DictCredentials::default())
            .unwrap();

        let statements = store.statements();
        assert_eq!(statements[0], "DROP FUNCTION IF EXISTS geo");
        assert!(statements[1].starts_with("DROP DICTIONARY"));
        assert!(statements[2].starts_with("DROP DICTIONARY"));
        assert!(statements[3].starts_with("DROP TABLE"));
        assert!(statements[4].starts_with("DROP TABLE"));
        assert!(statements.last().unwrap().starts_with("CREATE FUNCTION IF NOT EXISTS geo AS (ip, attr)"));
        assert_eq!(statements.len(), 10);
    }

    #[test]
    fn test_inline_layout_has_no_function() {
        let store = MemoryStore::default();
        let names = ObjectNames::new("geo", Layout::Inline);
        prepare_objects(&store, &names, &network_schema(), None, 30, false, &DictCredentials::default())
            .unwrap();

        let statements = store.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().all(|s| !s.contains("FUNCTION")));
    }
}
