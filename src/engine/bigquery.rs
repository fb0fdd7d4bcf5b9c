//! Google BigQuery backend.
//!
//! A query goes through three steps: submit with `jobs.query`, poll
//! `getQueryResults` until the job reports completion, then read result
//! pages on demand as the iterator is consumed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gcp_bigquery_client::{
    error::BQError,
    model::{
        get_query_results_parameters::GetQueryResultsParameters, query_request::QueryRequest,
        query_response::QueryResponse, table_field_schema::TableFieldSchema, table_row::TableRow,
    },
    Client,
};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EngineError, FieldSchema, QueryEngine, Row, RowIterator, BIGQUERY_NAME};

/// Server side wait per poll and per page request.
const POLL_TIMEOUT_MS: i32 = 10_000;
const PAGE_SIZE: i32 = 10_000;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryEngineConfig {
    /// Project the query jobs are billed to.
    pub project_id: String,
    /// Service account key file.
    #[serde(default)]
    pub credentials_path: String,
    /// Upper bound on waiting for a query job to complete.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for BigQueryEngineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            credentials_path: String::new(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl From<BQError> for EngineError {
    fn from(err: BQError) -> Self {
        EngineError::Query(err.to_string())
    }
}

pub struct BigQueryEngine {
    client: Client,
    project_id: String,
    query_timeout: Duration,
}

impl BigQueryEngine {
    pub async fn new(config: &BigQueryEngineConfig) -> Result<Self, EngineError> {
        let client = Client::from_service_account_key_file(&config.credentials_path)
            .await
            .map_err(|err| EngineError::Client(err.to_string()))?;

        Ok(Self {
            client,
            project_id: config.project_id.clone(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }
}

#[async_trait]
impl QueryEngine for BigQueryEngine {
    fn name(&self) -> &str {
        BIGQUERY_NAME
    }

    async fn run(&self, query: &str) -> Result<Box<dyn RowIterator>, EngineError> {
        let mut request = QueryRequest::new(query);
        request.timeout_ms = Some(POLL_TIMEOUT_MS);
        request.max_results = Some(PAGE_SIZE);

        let result_set = self.client.job().query(&self.project_id, request).await?;
        let response = result_set.query_response();

        let reference = response
            .job_reference
            .as_ref()
            .ok_or_else(|| EngineError::Decode(String::from("query response has no job reference")))?;

        let job = Job {
            client: self.client.clone(),
            project_id: self.project_id.clone(),
            job_id: reference
                .job_id
                .clone()
                .ok_or_else(|| EngineError::Decode(String::from("query response has no job id")))?,
            location: reference.location.clone(),
        };

        let page = wait(&job, Page::from_query_response(response), self.query_timeout).await?;

        Ok(Box::new(BigQueryRowIterator::new(Box::new(job), page)))
    }
}

/// Polls the job until it reports completion.
async fn wait(source: &dyn PageSource, first: Page, timeout: Duration) -> Result<Page, EngineError> {
    let started = Instant::now();
    let mut page = first;

    while !page.complete {
        if started.elapsed() >= timeout {
            return Err(EngineError::Timeout(timeout));
        }

        debug!("Waiting for BigQuery job {}", source.job_id());

        page = source.fetch_page(None).await?;
    }

    Ok(page)
}

/// Where result pages of a query job come from.
#[async_trait]
trait PageSource: Send + Sync {
    fn job_id(&self) -> &str;

    async fn fetch_page(&self, page_token: Option<String>) -> Result<Page, EngineError>;
}

/// A submitted query job.
struct Job {
    client: Client,
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[async_trait]
impl PageSource for Job {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn fetch_page(&self, page_token: Option<String>) -> Result<Page, EngineError> {
        let parameters = GetQueryResultsParameters {
            location: self.location.clone(),
            max_results: Some(PAGE_SIZE),
            page_token,
            timeout_ms: Some(POLL_TIMEOUT_MS),
            ..Default::default()
        };

        let response = self
            .client
            .job()
            .get_query_results(&self.project_id, &self.job_id, parameters)
            .await?;

        Ok(Page {
            complete: response.job_complete.unwrap_or(false),
            page_token: response.page_token,
            rows: response
                .rows
                .unwrap_or_default()
                .into_iter()
                .map(row_cells)
                .collect(),
            fields: response.schema.and_then(|schema| schema.fields).unwrap_or_default(),
            total_rows: response.total_rows.and_then(|total| total.parse().ok()),
        })
    }
}

#[derive(Default)]
struct Page {
    complete: bool,
    page_token: Option<String>,
    rows: Vec<Vec<Value>>,
    fields: Vec<TableFieldSchema>,
    total_rows: Option<u64>,
}

impl Page {
    fn from_query_response(response: &QueryResponse) -> Self {
        Self {
            complete: response.job_complete.unwrap_or(false),
            page_token: response.page_token.clone(),
            rows: response
                .rows
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(row_cells)
                .collect(),
            fields: response
                .schema
                .as_ref()
                .and_then(|schema| schema.fields.clone())
                .unwrap_or_default(),
            total_rows: response
                .total_rows
                .as_ref()
                .and_then(|total| total.parse().ok()),
        }
    }
}

fn row_cells(row: TableRow) -> Vec<Value> {
    row.columns
        .unwrap_or_default()
        .into_iter()
        .map(|cell| cell.value.unwrap_or(Value::Null))
        .collect()
}

pub struct BigQueryRowIterator {
    source: Box<dyn PageSource>,
    columns: Vec<Column>,
    schema: Vec<FieldSchema>,
    buffer: VecDeque<Vec<Value>>,
    page_token: Option<String>,
    total_rows: Option<u64>,
}

impl BigQueryRowIterator {
    fn new(source: Box<dyn PageSource>, page: Page) -> Self {
        let columns = page.fields.iter().map(Column::from).collect();
        let schema = page.fields.iter().map(field_schema).collect();

        Self::from_parts(source, columns, schema, page)
    }

    fn from_parts(
        source: Box<dyn PageSource>,
        columns: Vec<Column>,
        schema: Vec<FieldSchema>,
        page: Page,
    ) -> Self {
        Self {
            source,
            columns,
            schema,
            buffer: page.rows.into(),
            page_token: page.page_token,
            total_rows: page.total_rows,
        }
    }
}

#[async_trait]
impl RowIterator for BigQueryRowIterator {
    fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    async fn next_row(&mut self) -> Result<Option<Row>, EngineError> {
        loop {
            if let Some(cells) = self.buffer.pop_front() {
                return Ok(Some(decode_row(&self.columns, cells)));
            }

            // The token is kept until its page arrives so a failed read can
            // be retried instead of ending the result early.
            let Some(token) = self.page_token.clone() else {
                return Ok(None);
            };

            let page = self.source.fetch_page(Some(token)).await?;
            self.page_token = page.page_token;
            self.buffer.extend(page.rows);
        }
    }
}

fn field_schema(field: &TableFieldSchema) -> FieldSchema {
    let mode = field.mode.as_deref().unwrap_or("NULLABLE");

    let field_type = match serde_json::to_value(&field.r#type) {
        Ok(Value::String(name)) => name,
        _ => format!("{:?}", field.r#type).to_uppercase(),
    };

    FieldSchema {
        name: field.name.clone(),
        description: field.description.clone().unwrap_or_default(),
        repeated: mode.eq_ignore_ascii_case("REPEATED"),
        required: mode.eq_ignore_ascii_case("REQUIRED"),
        field_type,
    }
}

/// The parts of a result column needed to decode its cells.
#[derive(Debug, Clone)]
struct Column {
    name: String,
    repeated: bool,
    children: Option<Vec<Column>>,
}

impl From<&TableFieldSchema> for Column {
    fn from(field: &TableFieldSchema) -> Self {
        Self {
            name: field.name.clone(),
            repeated: matches!(field.mode.as_deref(), Some(mode) if mode.eq_ignore_ascii_case("REPEATED")),
            children: field
                .fields
                .as_ref()
                .map(|fields| fields.iter().map(Column::from).collect()),
        }
    }
}

impl Column {
    fn decode(&self, value: Value) -> Value {
        if !self.repeated {
            return self.decode_single(value);
        }

        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.decode_single(unwrap_cell(item)))
                    .collect(),
            ),
            other => other,
        }
    }

    fn decode_single(&self, value: Value) -> Value {
        match (&self.children, value) {
            (Some(children), Value::Object(mut record)) => match record.remove("f") {
                Some(Value::Array(cells)) => Value::Object(decode_row(
                    children,
                    cells.into_iter().map(unwrap_cell).collect(),
                )),
                _ => Value::Object(record),
            },
            (_, value) => value,
        }
    }
}

/// Nested cells arrive wrapped as `{"v": value}`.
fn unwrap_cell(value: Value) -> Value {
    match value {
        Value::Object(mut cell) if cell.len() == 1 && cell.contains_key("v") => {
            cell.remove("v").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_row(columns: &[Column], cells: Vec<Value>) -> Row {
    columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| (column.name.clone(), column.decode(cell)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    /// Serves a fixed sequence of page reads and records the tokens asked for.
    struct ScriptedPages {
        pages: Mutex<VecDeque<Result<Page, EngineError>>>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Result<Page, EngineError>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<Option<String>> {
            self.requested.lock().clone()
        }
    }

    #[async_trait]
    impl PageSource for Arc<ScriptedPages> {
        fn job_id(&self) -> &str {
            "job_1"
        }

        async fn fetch_page(&self, page_token: Option<String>) -> Result<Page, EngineError> {
            self.requested.lock().push(page_token);
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::Query("no more pages".to_string())))
        }
    }

    fn page(ids: &[&str], token: Option<&str>) -> Page {
        Page {
            complete: true,
            page_token: token.map(String::from),
            rows: ids.iter().map(|id| vec![json!(id)]).collect(),
            ..Default::default()
        }
    }

    fn iterator(source: &Arc<ScriptedPages>, first: Page) -> BigQueryRowIterator {
        BigQueryRowIterator::from_parts(
            Box::new(Arc::clone(source)),
            vec![column("table_id")],
            vec![],
            first,
        )
    }

    async fn drain(iter: &mut BigQueryRowIterator) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(row) = iter.next_row().await.unwrap() {
            ids.push(row["table_id"].as_str().unwrap().to_string());
        }
        ids
    }

    #[tokio::test]
    async fn test_reads_following_pages() {
        let source = ScriptedPages::new(vec![
            Ok(page(&[], Some("p3"))),
            Ok(page(&["blocks2004"], None)),
        ]);
        let mut iter = iterator(&source, page(&["blocks0", "blocks2000"], Some("p2")));

        let ids = drain(&mut iter).await;

        assert_eq!(ids, vec!["blocks0", "blocks2000", "blocks2004"]);
        assert_eq!(
            source.requested(),
            vec![Some("p2".to_string()), Some("p3".to_string())]
        );
        assert!(iter.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_page_read_is_not_end_of_rows() {
        let source = ScriptedPages::new(vec![
            Err(EngineError::Query("backend unavailable".to_string())),
            Ok(page(&["blocks2004"], None)),
        ]);
        let mut iter = iterator(&source, page(&["blocks0"], Some("p2")));

        assert!(iter.next_row().await.unwrap().is_some());
        assert!(iter.next_row().await.is_err());

        let rest = drain(&mut iter).await;

        assert_eq!(rest, vec!["blocks2004"]);
        assert_eq!(
            source.requested(),
            vec![Some("p2".to_string()), Some("p2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_wait_polls_until_complete() {
        let source = ScriptedPages::new(vec![
            Ok(Page::default()),
            Ok(page(&["blocks0"], None)),
        ]);

        let done = wait(&source, Page::default(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(done.complete);
        assert_eq!(done.rows.len(), 1);
        assert_eq!(source.requested(), vec![None, None]);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let source = ScriptedPages::new(vec![]);

        let result = wait(&source, Page::default(), Duration::ZERO).await;

        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_complete_first_page_skips_polling() {
        let source = ScriptedPages::new(vec![]);

        let done = wait(&source, page(&["blocks0"], None), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(done.rows.len(), 1);
        assert!(source.requested().is_empty());
    }

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            repeated: false,
            children: None,
        }
    }

    #[test]
    fn test_decode_schema_table_row() {
        let columns = vec![
            column("table_id"),
            Column {
                repeated: true,
                ..column("table_cols")
            },
            column("table_schema"),
        ];
        let cells = vec![
            json!("transfers2000"),
            json!([{"v": "ts"}, {"v": "amount"}]),
            json!("[{\"name\":\"ts\",\"type\":\"TIMESTAMP\"}]"),
        ];

        let row = decode_row(&columns, cells);

        assert_eq!(row["table_id"], "transfers2000");
        assert_eq!(row["table_cols"], json!(["ts", "amount"]));
        assert_eq!(row["table_schema"], "[{\"name\":\"ts\",\"type\":\"TIMESTAMP\"}]");
    }

    #[test]
    fn test_decode_nested_records() {
        let columns = vec![Column {
            name: "events".to_string(),
            repeated: true,
            children: Some(vec![column("section"), column("method")]),
        }];
        let cells = vec![json!([
            {"v": {"f": [{"v": "balances"}, {"v": "Transfer"}]}},
            {"v": {"f": [{"v": "system"}, {"v": null}]}}
        ])];

        let row = decode_row(&columns, cells);

        assert_eq!(
            row["events"],
            json!([
                {"section": "balances", "method": "Transfer"},
                {"section": "system", "method": null}
            ])
        );
    }

    #[test]
    fn test_decode_null_repeated_stays_null() {
        let columns = vec![Column {
            repeated: true,
            ..column("table_cols")
        }];

        let row = decode_row(&columns, vec![Value::Null]);

        assert_eq!(row["table_cols"], Value::Null);
    }
}
