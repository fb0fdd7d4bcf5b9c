use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;

use super::{EngineError, FieldSchema, QueryEngine, Row, RowIterator};

/// Serves canned rows per query string.
#[derive(Default)]
pub(crate) struct MockEngine {
    results: HashMap<String, Vec<Row>>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_rows(mut self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.results.insert(query.into(), rows);
        self
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, query: &str) -> Result<Box<dyn RowIterator>, EngineError> {
        let rows = self
            .results
            .get(query)
            .cloned()
            .ok_or_else(|| EngineError::Query(format!("unexpected query: {}", query)))?;

        let schema = rows
            .first()
            .map(|row| {
                row.keys()
                    .map(|name| FieldSchema {
                        name: name.clone(),
                        description: String::new(),
                        repeated: false,
                        required: false,
                        field_type: String::from("STRING"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::new(MockRowIterator {
            schema,
            rows: rows.into(),
        }))
    }
}

struct MockRowIterator {
    schema: Vec<FieldSchema>,
    rows: VecDeque<Row>,
}

#[async_trait]
impl RowIterator for MockRowIterator {
    fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    fn total_rows(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    async fn next_row(&mut self) -> Result<Option<Row>, EngineError> {
        Ok(self.rows.pop_front())
    }
}
