use std::collections::HashMap;

use crate::models::chain::ChainId;

/// A public BigQuery dataset that holds the tables of one relay chain
/// ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub name: &'static str,
    pub dataset: &'static str,
    /// Added to chain ids found in table names, so that ids of both
    /// ecosystems share one key space.
    pub chain_id_offset: ChainId,
}

impl Namespace {
    pub fn schema_query(&self) -> String {
        format!("select * from `{}.{}`", self.dataset, TABLE_SCHEMA_TABLE)
    }

    /// Table id as exposed outside of the namespace.
    pub fn qualify(&self, table_id: &str) -> String {
        format!("{}_{}", self.name, table_id)
    }
}

pub const TABLE_SCHEMA_TABLE: &str = "AAA_tableschema";

pub const POLKADOT: Namespace = Namespace {
    name: "polkadot",
    dataset: "bigquery-public-data.crypto_polkadot",
    chain_id_offset: 0,
};

// See https://github.com/colorfulnotion/substrate-etl/tree/main/kusama
pub const KUSAMA: Namespace = Namespace {
    name: "kusama",
    dataset: "bigquery-public-data.crypto_kusama",
    chain_id_offset: 20000,
};

pub static NAMESPACES: [Namespace; 2] = [POLKADOT, KUSAMA];

pub static SYSTEM_TABLES: [&str; 2] = [TABLE_SCHEMA_TABLE, "chains"];

pub const DEFAULT_RELAY_COLOR: &str = "#00C67D";

pub static RELAY_COLORS: [(&str, &str); 2] = [("Polkadot", "#E0016A"), ("Kusama", "#000000")];

pub fn get_namespaces() -> HashMap<String, Namespace> {
    let mut namespaces: HashMap<String, Namespace> = HashMap::new();

    for namespace in NAMESPACES.into_iter() {
        namespaces.insert(String::from(namespace.name), namespace);
    }

    namespaces
}

pub fn get_namespace(name: &str) -> Option<Namespace> {
    get_namespaces().remove(name)
}

pub fn is_system_table(table_id: &str) -> bool {
    SYSTEM_TABLES.contains(&table_id)
}

pub fn relay_color(chain_name: &str) -> &'static str {
    RELAY_COLORS
        .iter()
        .find(|(name, _)| *name == chain_name)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_RELAY_COLOR)
}
