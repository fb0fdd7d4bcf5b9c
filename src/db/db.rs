use std::path::Path;
use std::sync::Arc;

use log::*;
use redb::{Database, ReadableTable, TableDefinition, TableError};

use crate::{
    errors::{MetadataError, MetadataResult},
    models::dataset::{
        default_query_engines, QueryEngineDatasetInfo, QueryEngineDatasets, QueryEngineDescriptor,
    },
};

pub const METADATA_BUCKET: &str = "hyperdot_chain_metadata";

pub const QUERY_ENGINES_KEY: &str = "query_engines";

const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new(METADATA_BUCKET);

pub fn dataset_key(engine: &str, tag: &str) -> String {
    format!("{}_{}", engine, tag)
}

/// Durable copy of the published datasets, stored as JSON documents.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<Database>,
}

impl MetadataStore {
    /// Opens or creates the database file and records the supported query
    /// engines.
    pub fn open(path: impl AsRef<Path>) -> MetadataResult<Self> {
        info!("Opening metadata store at {}", path.as_ref().display());

        let store = Self::from_database(Database::create(path)?);

        store.put(QUERY_ENGINES_KEY, &serde_json::to_vec(&default_query_engines())?)?;

        Ok(store)
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    fn put(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(METADATA_TABLE)?;
            table.insert(key, value)?;
        }
        write_tx.commit()?;

        Ok(())
    }

    fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        let read_tx = self.db.begin_read()?;

        let table = match read_tx.open_table(METADATA_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(MetadataError::BucketNotFound(METADATA_BUCKET.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let value = table.get(key)?.map(|value| value.value().to_vec());

        Ok(value)
    }

    /// Replaces the stored datasets of `engine` for every tag present in
    /// `datasets`, in a single transaction.
    pub fn set_datasets(&self, engine: &str, datasets: &QueryEngineDatasets) -> MetadataResult<()> {
        let mut values = Vec::new();

        for (tag, info) in datasets.tagged() {
            values.push((dataset_key(engine, tag), serde_json::to_vec(info.as_ref())?));
        }

        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(METADATA_TABLE)?;
            for (key, value) in values.iter() {
                table.insert(key.as_str(), value.as_slice())?;
            }
        }
        write_tx.commit()?;

        for (key, value) in values.iter() {
            debug!("Stored {} ({} bytes)", key, value.len());
        }

        Ok(())
    }

    pub fn get_dataset(&self, engine: &str, tag: &str) -> MetadataResult<QueryEngineDatasetInfo> {
        let value = self
            .get(&dataset_key(engine, tag))?
            .ok_or_else(|| MetadataError::DatasetNotFound {
                engine: engine.to_string(),
                tag: tag.to_string(),
            })?;

        Ok(serde_json::from_slice(&value)?)
    }

    pub fn get_query_engines(&self) -> MetadataResult<Vec<QueryEngineDescriptor>> {
        match self.get(QUERY_ENGINES_KEY) {
            Ok(Some(value)) => Ok(serde_json::from_slice(&value)?),
            Ok(None) | Err(MetadataError::BucketNotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        chain::{Chain, RelayChainMetadata},
        table::{FieldMode, Table, TableSchema},
    };
    use serde_json::{json, Map};
    use std::collections::BTreeMap;

    fn dataset() -> QueryEngineDatasetInfo {
        let mut stats = Map::new();
        stats.insert("numHolders".to_string(), json!(42));

        let chain = Chain {
            id: "polkadot".to_string(),
            prefix: 0,
            chain_id: 0,
            chain_name: "Polkadot".to_string(),
            symbol: "DOT".to_string(),
            relay_chain: "polkadot".to_string(),
            icon_url: String::new(),
            stats,
        };

        QueryEngineDatasetInfo {
            id: "raw".to_string(),
            chains: BTreeMap::from([(0, chain)]),
            relay_chains: BTreeMap::from([(
                "polkadot".to_string(),
                RelayChainMetadata {
                    chain_id: 0,
                    name: "Polkadot".to_string(),
                    show_color: "#E0016A".to_string(),
                    para_chain_ids: vec![0],
                },
            )]),
            chain_tables: BTreeMap::from([(
                0,
                vec![Table {
                    table_id: "blocks0".to_string(),
                    cols: vec!["number".to_string()],
                    schemas: vec![TableSchema {
                        mode: FieldMode::Required,
                        name: "number".to_string(),
                        field_type: "INTEGER".to_string(),
                    }],
                }],
            )]),
        }
    }

    #[test]
    fn test_dataset_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.redb");

        {
            let store = MetadataStore::open(&path).unwrap();
            store
                .set_datasets("bigquery", &QueryEngineDatasets::with_raw(dataset()))
                .unwrap();
        }

        let store = MetadataStore::open(&path).unwrap();
        assert_eq!(store.get_dataset("bigquery", "raw").unwrap(), dataset());
    }

    #[test]
    fn test_set_replaces_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.redb")).unwrap();

        store
            .set_datasets("bigquery", &QueryEngineDatasets::with_raw(dataset()))
            .unwrap();
        store
            .set_datasets(
                "bigquery",
                &QueryEngineDatasets::with_raw(QueryEngineDatasetInfo::default()),
            )
            .unwrap();

        assert_eq!(
            store.get_dataset("bigquery", "raw").unwrap(),
            QueryEngineDatasetInfo::default()
        );
    }

    #[test]
    fn test_empty_datasets_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.redb")).unwrap();

        store
            .set_datasets("bigquery", &QueryEngineDatasets::default())
            .unwrap();

        assert!(store.get_dataset("bigquery", "raw").is_err());
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.redb")).unwrap();

        let err = store.get_dataset("bigquery", "raw").unwrap_err();

        assert!(matches!(err, MetadataError::DatasetNotFound { .. }));
        assert_eq!(err.to_string(), "bigquery of raw not found");
    }

    #[test]
    fn test_missing_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("empty.redb")).unwrap();
        let store = MetadataStore::from_database(db);

        let err = store.get_dataset("bigquery", "raw").unwrap_err();

        assert!(matches!(err, MetadataError::BucketNotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_engines_without_bucket_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("empty.redb")).unwrap();
        let store = MetadataStore::from_database(db);

        assert!(store.get_query_engines().unwrap().is_empty());
    }

    #[test]
    fn test_query_engines_are_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.redb")).unwrap();

        let engines = store.get_query_engines().unwrap();

        assert_eq!(engines, default_query_engines());
        assert_eq!(engines[0].name, "Bigquery");
        assert_eq!(engines[0].datasets["Bigquery"].id, "raw");
    }
}
