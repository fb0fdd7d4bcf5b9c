use std::sync::Arc;

use log::*;

use crate::{
    cache::EngineCache,
    db::db::MetadataStore,
    errors::MetadataResult,
    models::dataset::{QueryEngineDatasetInfo, QueryEngineDatasets, QueryEngineDescriptor, RAW_TAG},
};

/// Read side of the dataset tiers: the cache first, the store when the
/// cache has nothing yet.
#[derive(Clone)]
pub struct DatasetReader {
    cache: Arc<EngineCache>,
    store: MetadataStore,
}

impl DatasetReader {
    pub fn new(cache: Arc<EngineCache>, store: MetadataStore) -> Self {
        Self { cache, store }
    }

    pub fn get_dataset(&self, engine: &str, tag: &str) -> MetadataResult<Arc<QueryEngineDatasetInfo>> {
        match self.cache.get_datasets(engine, tag) {
            Ok(info) => Ok(info),
            Err(err) if err.is_not_found() => {
                debug!("{}, reading {} {} from the store", err, engine, tag);

                Ok(Arc::new(self.store.get_dataset(engine, tag)?))
            }
            Err(err) => Err(err),
        }
    }

    pub fn query_engines(&self) -> MetadataResult<Vec<QueryEngineDescriptor>> {
        self.store.get_query_engines()
    }

    /// Loads the stored raw dataset of `engine` into the cache. Returns
    /// whether there was one.
    pub fn warm_cache(&self, engine: &str) -> MetadataResult<bool> {
        match self.store.get_dataset(engine, RAW_TAG) {
            Ok(info) => {
                info!(
                    "Loaded stored {} dataset of {} with {} chains",
                    RAW_TAG,
                    engine,
                    info.chains.len()
                );

                self.cache
                    .set_datasets(engine, &QueryEngineDatasets::with_raw(info));

                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                info!("No stored {} dataset of {}", RAW_TAG, engine);

                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
