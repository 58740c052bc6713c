use thiserror::Error;

/// Failures surfaced by the pipeline. None of them are retried; the run stops
/// at the first one that reaches the process boundary.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to read {collection}: {reason}")]
    DataRead { collection: String, reason: String },

    #[error("relation {0:?} has not been materialized")]
    MissingRelation(String),

    #[error("failed to write table {table}: {reason}")]
    Write { table: String, reason: String },
}

impl EtlError {
    pub fn data_read(collection: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::DataRead {
            collection: collection.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(table: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::Write {
            table: table.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
