use std::collections::HashMap;

use clap::Parser;
use dotenv::dotenv;
use hyperdot_node::{
    chains::chains::get_namespace,
    configs::{node_config::NodeConfig, query_config::QueryArgs},
    engine::{self, run_query, EngineConfig, QueryEngines},
};
use log::*;
use simple_logger::SimpleLogger;

#[tokio::main()]
async fn main() {
    dotenv().ok();

    let args = QueryArgs::parse();

    let log = SimpleLogger::new().with_level(LevelFilter::Info);

    if args.debug {
        log.with_level(LevelFilter::Debug).init().unwrap();
    } else {
        log.init().unwrap();
    }

    let config = NodeConfig::new(&args.config).expect("Unable to load config.");

    let query = match (&args.query, &args.schema) {
        (Some(query), _) => query.clone(),
        (None, Some(name)) => match get_namespace(name) {
            Some(namespace) => namespace.schema_query(),
            None => {
                error!("Unknown namespace {}", name);
                std::process::exit(2);
            }
        },
        (None, None) => unreachable!("clap requires --query or --schema"),
    };

    let engine = engine::make(&args.engine, &EngineConfig::BigQuery(config.bigquery.clone()))
        .await
        .expect("Unable to start query engine.");

    let mut engines: QueryEngines = HashMap::new();
    engines.insert(args.engine.clone(), engine);

    match run_query(&engines, &args.engine, &query).await {
        Ok(result) => {
            info!("Fetched {} rows", result.rows.len());

            match serde_json::to_string_pretty(&result) {
                Ok(output) => println!("{}", output),
                Err(err) => {
                    error!("Unable to encode result: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Err(err) => {
            error!("Query failed: {}", err);
            std::process::exit(1);
        }
    }
}
