use crate::error::{IngestError, Result};
use crate::types::Layout;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

/// Configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Store connection string
    pub dsn: String,

    /// Path of the source database
    pub mmdb: PathBuf,

    /// Prefix for every table, dictionary and function name
    pub name: String,

    /// Partition the rows are written to; replaced if it already exists
    pub partition: NaiveDate,

    /// Networks per insert
    pub batch_size: usize,

    /// Flattened column names to keep (empty keeps all)
    pub columns: HashSet<String>,

    /// Drop existing objects before creating them
    pub drop: bool,

    /// Reload the dictionaries after the insert
    pub reload: bool,

    /// Query the dictionaries after the insert
    pub test: bool,

    /// Partitions (days) to keep; only applied when the tables are created
    pub ttl: u32,

    pub layout: Layout,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            dsn: String::from("clickhouse://localhost:9000"),
            mmdb: PathBuf::from("example.mmdb"),
            name: String::from("example_mmdb"),
            partition: chrono::Local::now().date_naive(),
            batch_size: 1_000_000,
            columns: HashSet::new(),
            drop: false,
            reload: false,
            test: false,
            ttl: 30,
            layout: Layout::default(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(IngestError::Config(format!(
                "name {} is not a valid identifier",
                self.name
            )));
        }
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch size must be positive".to_string()));
        }
        Ok(())
    }

    /// Allow-list for schema inference, `None` when every column is kept
    pub fn allow_list(&self) -> Option<&HashSet<String>> {
        Some(&self.columns).filter(|c| !c.is_empty())
    }
}

/// Split a comma-separated column list, ignoring blanks
pub fn parse_columns(list: &str) -> HashSet<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_REGEX.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns() {
        let columns = parse_columns(" country_iso_code, city_names_en,,");
        assert_eq!(columns.len(), 2);
        assert!(columns.contains("country_iso_code"));
        assert!(columns.contains("city_names_en"));
        assert!(parse_columns("").is_empty());
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("geolite2_city"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("geo; DROP TABLE users"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_validate() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.allow_list().is_none());

        let bad_name = IngestConfig {
            name: "bad-name".to_string(),
            ..IngestConfig::default()
        };
        assert!(matches!(bad_name.validate(), Err(IngestError::Config(_))));

        let bad_batch = IngestConfig {
            batch_size: 0,
            ..IngestConfig::default()
        };
        assert!(matches!(bad_batch.validate(), Err(IngestError::Config(_))));
    }
}
