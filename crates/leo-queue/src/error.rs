use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("queue is closed: {0}")]
    Closed(String),

    #[error("failed to open job store: {0}")]
    Database(#[from] ::redb::DatabaseError),

    #[error("job store transaction failed: {0}")]
    Transaction(#[from] ::redb::TransactionError),

    #[error("job store table error: {0}")]
    Table(#[from] ::redb::TableError),

    #[error("job store storage error: {0}")]
    Storage(#[from] ::redb::StorageError),

    #[error("job store commit failed: {0}")]
    Commit(#[from] ::redb::CommitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
