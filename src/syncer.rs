use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::*;
use tokio::time::timeout;

use crate::{
    builder::DatasetBuilder,
    cache::EngineCache,
    db::db::MetadataStore,
    models::dataset::{QueryEngineDatasetInfo, QueryEngineDatasets},
    scheduler::Job,
};

/// One sync cycle: build the raw dataset of an engine, then publish it to
/// the cache and the store.
pub struct MetadataSyncer {
    job_name: String,
    builder: DatasetBuilder,
    cache: Arc<EngineCache>,
    store: MetadataStore,
    timeout: Duration,
}

impl MetadataSyncer {
    pub fn new(
        builder: DatasetBuilder,
        cache: Arc<EngineCache>,
        store: MetadataStore,
        timeout: Duration,
    ) -> Self {
        Self {
            job_name: format!("sync-{}-metadata", builder.engine_name()),
            builder,
            cache,
            store,
            timeout,
        }
    }

    pub async fn sync(&self) -> Result<Arc<QueryEngineDatasetInfo>> {
        let engine = self.builder.engine_name();

        let info = timeout(self.timeout, self.builder.build())
            .await
            .map_err(|_| anyhow!("Building the {} dataset took longer than {:?}", engine, self.timeout))??;

        let datasets = QueryEngineDatasets::with_raw(info);

        self.publish(engine, &datasets)?;

        datasets
            .raw
            .ok_or_else(|| anyhow!("No raw dataset was built for {}", engine))
    }

    /// Nothing is published unless the whole cycle succeeded, so readers
    /// keep the previous snapshot on failure.
    pub fn publish(&self, engine: &str, datasets: &QueryEngineDatasets) -> Result<()> {
        self.cache.set_datasets(engine, datasets);

        self.store.set_datasets(engine, datasets)?;

        for (tag, info) in datasets.tagged() {
            info!(
                "Published {} dataset of {}: chains ({}) relay chains ({}) tables ({})",
                tag,
                engine,
                info.chains.len(),
                info.relay_chains.len(),
                info.table_count()
            );
        }

        Ok(())
    }
}

#[async_trait]
impl Job for MetadataSyncer {
    fn name(&self) -> &str {
        &self.job_name
    }

    async fn run(&self) -> Result<()> {
        self.sync().await.map(|_| ())
    }
}
