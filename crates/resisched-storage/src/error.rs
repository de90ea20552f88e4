use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("run already in progress for an overlapping date range")]
    RunConflict,

    #[error("approval chain {chain_id} has no record at sequence {sequence_num}")]
    ChainGap { chain_id: String, sequence_num: u64 },
}

pub type Result<T> = std::result::Result<T, StorageError>;
