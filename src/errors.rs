//! Error types for the dataset cache and the metadata store.

use thiserror::Error;

/// Errors returned by the two dataset tiers.
///
/// The not-found variants are expected outcomes: callers use them to fall
/// back from the in-memory cache to the durable store.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No datasets were ever published for this query engine.
    #[error("query engine {0} not found")]
    EngineNotFound(String),

    /// The query engine is known but has no dataset under this tag.
    #[error("dataset tag {0} not found")]
    TagNotFound(String),

    /// The metadata table has not been created yet.
    #[error("bucket {0} not found")]
    BucketNotFound(String),

    /// The metadata table exists but holds no dataset for this key.
    #[error("{engine} of {tag} not found")]
    DatasetNotFound { engine: String, tag: String },

    /// Embedded database failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetadataError::EngineNotFound(_)
                | MetadataError::TagNotFound(_)
                | MetadataError::BucketNotFound(_)
                | MetadataError::DatasetNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Serialization(err.to_string())
    }
}

macro_rules! storage_error_from {
    ($($err:ty),+ $(,)?) => {
        $(
            impl From<$err> for MetadataError {
                fn from(err: $err) -> Self {
                    MetadataError::Storage(err.to_string())
                }
            }
        )+
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type MetadataResult<T> = Result<T, MetadataError>;
