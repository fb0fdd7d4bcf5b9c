//! Pluggable analytical query backends.
//!
//! Everything outside this module talks to a backend through [`QueryEngine`]
//! and [`RowIterator`] only. New backends add an [`EngineConfig`] variant and
//! a branch in [`make`].

pub mod bigquery;
#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::table::FieldMode;

use self::bigquery::{BigQueryEngine, BigQueryEngineConfig};

pub const BIGQUERY_NAME: &str = "bigquery";

pub static SUPPORTED_ENGINES: [&str; 1] = [BIGQUERY_NAME];

/// A result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Engines available to the process, keyed by engine name.
pub type QueryEngines = HashMap<String, Arc<dyn QueryEngine>>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported {0} data engine")]
    Unsupported(String),

    #[error("{config} config cannot build the {engine} engine")]
    ConfigMismatch {
        engine: String,
        config: &'static str,
    },

    #[error("engine client error: {0}")]
    Client(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("query did not complete within {0:?}")]
    Timeout(Duration),

    #[error("malformed result: {0}")]
    Decode(String),
}

/// Describes a single result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub description: String,
    /// Whether the field may contain multiple values.
    pub repeated: bool,
    /// Whether the field is required. Ignored if `repeated` is set.
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl FieldSchema {
    pub fn mode(&self) -> FieldMode {
        FieldMode::from_flags(self.repeated, self.required)
    }
}

/// Lazy, forward-only sequence of result rows.
#[async_trait]
pub trait RowIterator: Send {
    /// Schema of the rows. Available before, during and after iteration.
    fn schema(&self) -> &[FieldSchema];

    /// Total rows of the result when the backend reports it.
    fn total_rows(&self) -> Option<u64>;

    /// Next row, or `None` once the result is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>, EngineError>;
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Executes `query` and waits for it to complete.
    async fn run(&self, query: &str) -> Result<Box<dyn RowIterator>, EngineError>;
}

/// Engine construction parameters, one variant per backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineConfig {
    BigQuery(BigQueryEngineConfig),
}

impl EngineConfig {
    pub fn engine_name(&self) -> &'static str {
        match self {
            EngineConfig::BigQuery(_) => BIGQUERY_NAME,
        }
    }
}

/// Builds the engine registered under `engine` from its own config variant.
pub async fn make(engine: &str, config: &EngineConfig) -> Result<Arc<dyn QueryEngine>, EngineError> {
    match (engine, config) {
        (BIGQUERY_NAME, EngineConfig::BigQuery(config)) => {
            info!("Initializing {} query engine", engine);

            Ok(Arc::new(BigQueryEngine::new(config).await?))
        }
        // Reachable once a second backend adds its config variant.
        (name, config) if SUPPORTED_ENGINES.contains(&name) => Err(EngineError::ConfigMismatch {
            engine: name.to_string(),
            config: config.engine_name(),
        }),
        (name, _) => Err(EngineError::Unsupported(name.to_string())),
    }
}

/// A fully drained query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub schemas: Vec<FieldSchema>,
}

pub async fn collect_rows(iter: &mut dyn RowIterator) -> Result<QueryResult, EngineError> {
    let mut rows = Vec::new();

    while let Some(row) = iter.next_row().await? {
        rows.push(row);
    }

    Ok(QueryResult {
        rows,
        schemas: iter.schema().to_vec(),
    })
}

/// Runs an ad-hoc query on the named engine and collects every row.
pub async fn run_query(
    engines: &QueryEngines,
    engine: &str,
    query: &str,
) -> Result<QueryResult, EngineError> {
    let selected = engines
        .get(engine)
        .ok_or_else(|| EngineError::Unsupported(engine.to_string()))?;

    debug!("Running query on {}: {}", engine, query);

    let mut iter = selected.run(query).await?;

    if let Some(total) = iter.total_rows() {
        info!("Query on {} returned {} rows", engine, total);
    }

    collect_rows(iter.as_mut()).await
}

#[cfg(test)]
mod tests {
    use super::mock::MockEngine;
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(row) => row,
            _ => panic!("row must be an object"),
        }
    }

    #[tokio::test]
    async fn test_make_rejects_unknown_engine() {
        let config = EngineConfig::BigQuery(BigQueryEngineConfig::default());

        let result = make("clickhouse", &config).await;

        assert!(matches!(result, Err(EngineError::Unsupported(name)) if name == "clickhouse"));
    }

    #[tokio::test]
    async fn test_make_matches_engine_names_exactly() {
        let config = EngineConfig::BigQuery(BigQueryEngineConfig::default());

        let result = make("BigQuery", &config).await;

        assert!(matches!(result, Err(EngineError::Unsupported(name)) if name == "BigQuery"));
    }

    #[tokio::test]
    async fn test_make_bigquery_without_credentials_fails() {
        let config = EngineConfig::BigQuery(BigQueryEngineConfig {
            project_id: "substrate-etl".to_string(),
            credentials_path: "/nonexistent/credentials.json".to_string(),
            ..BigQueryEngineConfig::default()
        });

        assert!(make(BIGQUERY_NAME, &config).await.is_err());
    }

    #[test]
    fn test_engine_config_is_tagged() {
        let config: EngineConfig = serde_json::from_value(json!({
            "type": "bigquery",
            "projectId": "substrate-etl",
            "credentialsPath": "/etc/hyperdot/sa.json"
        }))
        .unwrap();

        assert_eq!(config.engine_name(), BIGQUERY_NAME);
        let EngineConfig::BigQuery(bigquery) = config;
        assert_eq!(bigquery.project_id, "substrate-etl");
    }

    #[test]
    fn test_field_schema_mode() {
        let field = FieldSchema {
            name: "table_cols".to_string(),
            description: String::new(),
            repeated: true,
            required: true,
            field_type: "STRING".to_string(),
        };

        assert_eq!(field.mode(), FieldMode::Repeated);
    }

    #[tokio::test]
    async fn test_run_query_collects_rows_and_schema() {
        let engine = MockEngine::new().with_rows(
            "select 1",
            vec![row(json!({"n": 1})), row(json!({"n": 2}))],
        );
        let mut engines: QueryEngines = HashMap::new();
        engines.insert("mock".to_string(), Arc::new(engine));

        let result = run_query(&engines, "mock", "select 1").await.unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1]["n"], 2);
        assert_eq!(result.schemas.len(), 1);
        assert_eq!(result.schemas[0].name, "n");
    }

    #[tokio::test]
    async fn test_run_query_on_missing_engine() {
        let engines: QueryEngines = HashMap::new();

        let result = run_query(&engines, "bigquery", "select 1").await;

        assert!(matches!(result, Err(EngineError::Unsupported(_))));
    }
}
