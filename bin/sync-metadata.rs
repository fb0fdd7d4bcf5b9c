use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use hyperdot_node::{
    builder::DatasetBuilder,
    cache::EngineCache,
    configs::node_config::{NodeArgs, NodeConfig},
    db::db::MetadataStore,
    engine::{self, EngineConfig, BIGQUERY_NAME},
    fetcher::ChainRegistry,
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

    info!("Starting metadata sync.");

    let config = NodeConfig::new(&args.config).expect("Unable to load config.");

    let store = MetadataStore::open(&config.store.path).expect("Unable to open metadata store.");

    let engine = engine::make(
        BIGQUERY_NAME,
        &EngineConfig::BigQuery(config.bigquery.clone()),
    )
    .await
    .expect("Unable to start query engine.");

    let registry = ChainRegistry::new(&config.polkaholic, config.http.timeout())
        .expect("Unable to start registry client.");

    let syncer = MetadataSyncer::new(
        DatasetBuilder::new(registry, engine),
        Arc::new(EngineCache::new()),
        store,
        config.scheduler.sync_timeout(),
    );

    match syncer.sync().await {
        Ok(info) => info!(
            "Metadata sync finished: chains ({}) tables ({})",
            info.chains.len(),
            info.table_count()
        ),
        Err(err) => {
            error!("Metadata sync failed: {:#}", err);
            std::process::exit(1);
        }
    }
}
