use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use hyperdot_node::{
    builder::DatasetBuilder,
    cache::EngineCache,
    configs::node_config::{NodeArgs, NodeConfig},
    db::db::MetadataStore,
    engine::{self, EngineConfig, QueryEngine, BIGQUERY_NAME},
    fetcher::ChainRegistry,
    reader::DatasetReader,
    scheduler::{Every, JobManager},
    syncer::MetadataSyncer,
};
use log::*;
use simple_logger::SimpleLogger;

#[tokio::main()]
async fn main() {
    dotenv().ok();

    let args = NodeArgs::parse();

    let log = SimpleLogger::new().with_level(LevelFilter::Info);

    if args.debug {
        log.with_level(LevelFilter::Debug).init().unwrap();
    } else {
        log.init().unwrap();
    }

    info!("Starting Hyperdot Node.");

    let config = NodeConfig::new(&args.config).expect("Unable to load config.");

    let store = MetadataStore::open(&config.store.path).expect("Unable to open metadata store.");

    let cache = Arc::new(EngineCache::new());

    let reader = DatasetReader::new(cache.clone(), store.clone());

    let engine = engine::make(
        BIGQUERY_NAME,
        &EngineConfig::BigQuery(config.bigquery.clone()),
    )
    .await
    .expect("Unable to start query engine.");

    cache.register_engine(engine.name());

    if let Err(err) = reader.warm_cache(engine.name()) {
        warn!("Unable to load stored datasets: {}", err);
    }

    let registry = ChainRegistry::new(&config.polkaholic, config.http.timeout())
        .expect("Unable to start registry client.");

    let syncer = MetadataSyncer::new(
        DatasetBuilder::new(registry, engine),
        cache,
        store,
        config.scheduler.sync_timeout(),
    );

    let mut jobs = JobManager::new(config.scheduler.run_on_start);

    jobs.add_job(
        Every::Seconds(config.scheduler.sync_interval_secs),
        Arc::new(syncer),
    )
    .expect("Unable to schedule metadata sync.");

    let handle = jobs.start();

    tokio::signal::ctrl_c()
        .await
        .expect("Unable to listen for shutdown signal.");

    info!("Shutting down Hyperdot Node.");

    jobs.stop();

    if let Err(err) = handle.await {
        error!("Job scheduler exited abnormally: {}", err);
    }
}
