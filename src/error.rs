use thiserror::Error;

/// Failures writing to (or opening) a persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history log error: {0}")]
    Csv(#[from] csv::Error),
}

/// Requests the session controller refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a level is already in progress")]
    LevelActive,
    #[error("no level is in progress")]
    NoActiveLevel,
    #[error("the session has already finished")]
    Finished,
}
