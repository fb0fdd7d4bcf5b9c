use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::chain::{Chain, ChainId, RelayChainMetadata};
use super::table::Table;

/// Tag of the raw blockchain dataset, currently the only one published.
pub const RAW_TAG: &str = "raw";

/// One published snapshot of an engine's dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEngineDatasetInfo {
    pub id: String,
    pub chains: BTreeMap<ChainId, Chain>,
    pub relay_chains: BTreeMap<String, RelayChainMetadata>,
    pub chain_tables: BTreeMap<ChainId, Vec<Table>>,
}

impl QueryEngineDatasetInfo {
    pub fn table_count(&self) -> usize {
        self.chain_tables.values().map(Vec::len).sum()
    }
}

/// The snapshots produced by one sync cycle, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct QueryEngineDatasets {
    pub raw: Option<Arc<QueryEngineDatasetInfo>>,
}

impl QueryEngineDatasets {
    pub fn with_raw(raw: QueryEngineDatasetInfo) -> Self {
        Self {
            raw: Some(Arc::new(raw)),
        }
    }

    /// Present snapshots as `(tag, snapshot)` pairs.
    pub fn tagged(&self) -> Vec<(&'static str, &Arc<QueryEngineDatasetInfo>)> {
        self.raw.iter().map(|raw| (RAW_TAG, raw)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEngineDatasetMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Describes an engine and the datasets it exposes, without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEngineDescriptor {
    pub name: String,
    pub datasets: HashMap<String, QueryEngineDatasetMetadata>,
}

pub fn default_query_engines() -> Vec<QueryEngineDescriptor> {
    let raw = QueryEngineDatasetMetadata {
        id: RAW_TAG.to_string(),
        title: String::from("Raw"),
        description: String::from("Raw blockchain crypto data"),
    };

    vec![QueryEngineDescriptor {
        name: String::from("Bigquery"),
        datasets: HashMap::from([(String::from("Bigquery"), raw)]),
    }]
}
