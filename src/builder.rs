use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::*;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    chains::chains::{is_system_table, relay_color, Namespace, NAMESPACES},
    engine::QueryEngine,
    fetcher::ChainRegistry,
    models::{
        chain::{Chain, ChainId, RelayChainMetadata},
        dataset::{QueryEngineDatasetInfo, RAW_TAG},
        table::{Table, TableRaw},
    },
};

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits regex"));

/// Where a table of a namespace ends up in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Chain(ChainId),
    CrossChain,
    System,
    Dropped,
}

/// First run of digits in a table id, if any.
pub fn first_digit_run(table_id: &str) -> Option<&str> {
    DIGITS.find(table_id).map(|m| m.as_str())
}

pub fn classify(namespace: &Namespace, table_id: &str) -> Result<TableClass> {
    if let Some(digits) = first_digit_run(table_id) {
        let chain_id = digits
            .parse::<ChainId>()
            .ok()
            .and_then(|id| id.checked_add(namespace.chain_id_offset))
            .ok_or_else(|| anyhow!("Table {} has an out of range chain id {}", table_id, digits))?;

        return Ok(TableClass::Chain(chain_id));
    }

    if table_id.contains("xcm") {
        return Ok(TableClass::CrossChain);
    }

    if is_system_table(table_id) {
        return Ok(TableClass::System);
    }

    Ok(TableClass::Dropped)
}

/// Tables of all namespaces sorted into their buckets.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedTables {
    pub chain_tables: BTreeMap<ChainId, Vec<Table>>,
    pub cross_chain_tables: Vec<Table>,
    pub system_tables: Vec<Table>,
    pub dropped: usize,
}

impl ClassifiedTables {
    pub fn push(&mut self, namespace: &Namespace, mut table: Table) -> Result<()> {
        match classify(namespace, &table.table_id)? {
            TableClass::Chain(chain_id) => {
                self.chain_tables.entry(chain_id).or_default().push(table);
            }
            TableClass::CrossChain => {
                table.table_id = namespace.qualify(&table.table_id);
                self.cross_chain_tables.push(table);
            }
            TableClass::System => {
                table.table_id = namespace.qualify(&table.table_id);
                self.system_tables.push(table);
            }
            TableClass::Dropped => {
                debug!("Skipping table {} of {}", table.table_id, namespace.name);
                self.dropped += 1;
            }
        }

        Ok(())
    }

    pub fn extend(&mut self, namespace: &Namespace, tables: Vec<Table>) -> Result<()> {
        for table in tables {
            self.push(namespace, table)?;
        }

        Ok(())
    }

    /// Tables kept in any bucket.
    pub fn total(&self) -> usize {
        self.chain_tables.values().map(Vec::len).sum::<usize>()
            + self.cross_chain_tables.len()
            + self.system_tables.len()
    }
}

/// Groups chains under their relay chain. Relay chains come first in their
/// own member list, followed by their parachains in registry order.
pub fn build_relay_chains(chains: &[Chain]) -> BTreeMap<String, RelayChainMetadata> {
    let mut relay_chains: BTreeMap<String, RelayChainMetadata> = BTreeMap::new();

    for chain in chains.iter().filter(|chain| chain.is_relay()) {
        relay_chains.insert(
            chain.relay_chain.clone(),
            RelayChainMetadata {
                chain_id: chain.chain_id,
                name: chain.chain_name.clone(),
                show_color: relay_color(&chain.chain_name).to_string(),
                para_chain_ids: vec![chain.chain_id],
            },
        );
    }

    for chain in chains.iter().filter(|chain| !chain.is_relay()) {
        match relay_chains.get_mut(&chain.relay_chain) {
            Some(relay) => relay.para_chain_ids.push(chain.chain_id),
            None => debug!(
                "Chain {} has unknown relay chain {:?}",
                chain.id, chain.relay_chain
            ),
        }
    }

    relay_chains
}

/// Builds the raw dataset of a query engine from the chain registry and the
/// engine's table schemas.
pub struct DatasetBuilder {
    registry: ChainRegistry,
    engine: Arc<dyn QueryEngine>,
}

impl DatasetBuilder {
    pub fn new(registry: ChainRegistry, engine: Arc<dyn QueryEngine>) -> Self {
        Self { registry, engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub async fn build(&self) -> Result<QueryEngineDatasetInfo> {
        info!("Start building {} raw dataset", self.engine.name());

        let chains = self.registry.fetch_chains().await?;

        self.build_from_chains(chains).await
    }

    pub async fn build_from_chains(&self, chains: Vec<Chain>) -> Result<QueryEngineDatasetInfo> {
        let relay_chains = build_relay_chains(&chains);

        let chains: BTreeMap<ChainId, Chain> = chains
            .into_iter()
            .map(|chain| (chain.chain_id, chain))
            .collect();

        let mut classified = ClassifiedTables::default();

        for namespace in NAMESPACES.iter() {
            let tables = self.introspect(namespace).await?;

            info!("Fetched {} table schemas of {}", tables.len(), namespace.name);

            classified.extend(namespace, tables)?;
        }

        info!(
            "Built {} raw dataset: chains ({}) relay chains ({}) chain tables ({}) cross chain tables ({}) system tables ({}) skipped ({})",
            self.engine.name(),
            chains.len(),
            relay_chains.len(),
            classified.chain_tables.len(),
            classified.cross_chain_tables.len(),
            classified.system_tables.len(),
            classified.dropped
        );

        Ok(QueryEngineDatasetInfo {
            id: RAW_TAG.to_string(),
            chains,
            relay_chains,
            chain_tables: classified.chain_tables,
        })
    }

    async fn introspect(&self, namespace: &Namespace) -> Result<Vec<Table>> {
        let mut rows = self.engine.run(&namespace.schema_query()).await?;

        if let Some(total) = rows.total_rows() {
            debug!("Schema table of {} has {} rows", namespace.name, total);
        }

        let mut tables = Vec::new();

        while let Some(row) = rows.next_row().await? {
            tables.push(Table::from_raw(TableRaw::from_row(row)?)?);
        }

        Ok(tables)
    }
}
