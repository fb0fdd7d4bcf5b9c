//! In-memory copy of the latest published datasets.

use std::collections::HashMap;
use std::sync::Arc;

use log::*;
use parking_lot::RwLock;

use crate::{
    errors::{MetadataError, MetadataResult},
    models::dataset::{QueryEngineDatasetInfo, QueryEngineDatasets},
};

type TaggedDatasets = HashMap<String, Arc<QueryEngineDatasetInfo>>;

/// Datasets keyed by engine name, then by tag.
///
/// Readers get a shared handle to an immutable snapshot, so a concurrent
/// publish never exposes a half written dataset.
#[derive(Default)]
pub struct EngineCache {
    engines: RwLock<HashMap<String, TaggedDatasets>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the engine known without any dataset.
    pub fn register_engine(&self, engine: &str) {
        self.engines.write().entry(engine.to_string()).or_default();
    }

    /// Replaces every tag present in `datasets`. Tags that are absent keep
    /// their previous snapshot.
    pub fn set_datasets(&self, engine: &str, datasets: &QueryEngineDatasets) {
        let mut engines = self.engines.write();
        let tagged = engines.entry(engine.to_string()).or_default();

        for (tag, info) in datasets.tagged() {
            tagged.insert(tag.to_string(), Arc::clone(info));
            debug!("Cached {} dataset of {}", tag, engine);
        }
    }

    pub fn get_datasets(
        &self,
        engine: &str,
        tag: &str,
    ) -> MetadataResult<Arc<QueryEngineDatasetInfo>> {
        let engines = self.engines.read();

        let tagged = engines
            .get(engine)
            .ok_or_else(|| MetadataError::EngineNotFound(engine.to_string()))?;

        tagged
            .get(tag)
            .cloned()
            .ok_or_else(|| MetadataError::TagNotFound(tag.to_string()))
    }
}
