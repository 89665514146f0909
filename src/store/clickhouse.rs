//! ClickHouse over HTTP
//!
//! Statements are POSTed as the request body. Named parameters travel as
//! `param_<name>` URL parameters, and inserts are streamed as
//! `JSONCompactEachRow`, one JSON array per row.

use super::{BatchHandle, Param, Row, Store};
use crate::error::{IngestError, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use tracing::debug;

const HTTP_PORT: u16 = 8123;
const NATIVE_PORT: u16 = 9000;

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl Endpoint {
    /// Parse a connection string.
    ///
    /// `http://` and `https://` are used as given. `clickhouse://` and
    /// `tcp://` name the native protocol and are mapped to HTTP, switching
    /// the default native port to the default HTTP port.
    pub fn parse(dsn: &str) -> Result<Self> {
        let parsed = Url::parse(dsn)
            .map_err(|e| IngestError::Connection(format!("invalid DSN {}: {}", dsn, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| IngestError::Connection(format!("DSN {} has no host", dsn)))?;

        let base = match parsed.scheme() {
            "http" | "https" => match parsed.port() {
                Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
                None => format!("{}://{}/", parsed.scheme(), host),
            },
            "clickhouse" | "tcp" => {
                let port = match parsed.port() {
                    None | Some(NATIVE_PORT) => HTTP_PORT,
                    Some(port) => port,
                };
                format!("http://{}:{}/", host, port)
            }
            other => {
                return Err(IngestError::Connection(format!(
                    "unsupported DSN scheme {}",
                    other
                )))
            }
        };
        let url = Url::parse(&base)
            .map_err(|e| IngestError::Connection(format!("invalid DSN {}: {}", dsn, e)))?;

        let user = match parsed.username() {
            "" => "default".to_string(),
            user => user.to_string(),
        };
        let database = Some(parsed.path().trim_matches('/'))
            .filter(|db| !db.is_empty())
            .map(str::to_string);

        Ok(Endpoint {
            url,
            user,
            password: parsed.password().unwrap_or_default().to_string(),
            database,
        })
    }
}

pub struct ClickHouse {
    client: Client,
    endpoint: Endpoint,
}

impl ClickHouse {
    /// Parse `dsn` and check that the server answers
    pub fn connect(dsn: &str) -> Result<Self> {
        let endpoint = Endpoint::parse(dsn)?;
        let client = Client::builder()
            .build()
            .map_err(|e| IngestError::Connection(e.to_string()))?;
        let store = ClickHouse { client, endpoint };

        store
            .query_scalar("SELECT 1")
            .map_err(|e| IngestError::Connection(format!("{}: {}", store.endpoint.url, e)))?;
        debug!("Connected to {}", store.endpoint.url);
        Ok(store)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn post(&self, query: &[(String, String)], body: Vec<u8>) -> Result<String> {
        let mut request = self
            .client
            .post(self.endpoint.url.clone())
            .header("X-ClickHouse-User", &self.endpoint.user)
            .header("X-ClickHouse-Key", &self.endpoint.password)
            .query(query)
            .body(body);
        if let Some(database) = &self.endpoint.database {
            request = request.query(&[("database", database)]);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(IngestError::Storage(format!("{}: {}", status, text.trim())));
        }
        Ok(text)
    }
}

impl Store for ClickHouse {
    fn execute(&self, sql: &str, params: &[Param]) -> Result<()> {
        let query: Vec<(String, String)> = params
            .iter()
            .map(|p| (format!("param_{}", p.name), p.value.clone()))
            .collect();
        self.post(&query, sql.as_bytes().to_vec())?;
        Ok(())
    }

    fn prepare_batch(&self, table: &str) -> Result<Box<dyn BatchHandle + '_>> {
        Ok(Box::new(ClickHouseBatch {
            store: self,
            insert: format!("INSERT INTO {} FORMAT JSONCompactEachRow", table),
            body: Vec::new(),
            rows: 0,
        }))
    }

    fn query_scalar(&self, sql: &str) -> Result<String> {
        let text = self.post(&[], sql.as_bytes().to_vec())?;
        Ok(text.trim_end_matches('\n').to_string())
    }
}

struct ClickHouseBatch<'a> {
    store: &'a ClickHouse,
    insert: String,
    body: Vec<u8>,
    rows: usize,
}

impl BatchHandle for ClickHouseBatch<'_> {
    fn append(&mut self, row: Row) -> Result<()> {
        serde_json::to_writer(&mut self.body, &row)?;
        self.body.push(b'\n');
        self.rows += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn send(self: Box<Self>) -> Result<()> {
        let ClickHouseBatch {
            store,
            insert,
            body,
            rows,
        } = *self;
        if rows == 0 {
            return Ok(());
        }
        store.post(&[("query".to_string(), insert)], body)?;
        Ok(())
    }
}
