use clap::Parser;

use crate::engine::BIGQUERY_NAME;

use super::node_config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "Hyperdot Query",
    about = "Runs an ad-hoc query through a configured query engine."
)]
pub struct QueryArgs {
    #[arg(short, long, help = "Start log with debug.", default_value_t = false)]
    pub debug: bool,

    #[arg(short, long, help = "Path to the JSON config file.", default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    pub config: String,

    #[arg(short, long, help = "Query engine to run on.", default_value_t = String::from(BIGQUERY_NAME))]
    pub engine: String,

    #[arg(
        short,
        long,
        help = "SQL to run.",
        required_unless_present = "schema",
        conflicts_with = "schema"
    )]
    pub query: Option<String>,

    #[arg(short, long, help = "Namespace whose table schemas to list (polkadot, kusama).")]
    pub schema: Option<String>,
}
