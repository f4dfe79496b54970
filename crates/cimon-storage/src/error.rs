//! Errors that can occur within the storage layer.

/// Storage-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored record carried a value kind the reader does not know.
    #[error("storage: unexpected value kind {kind} in record row {row_id}")]
    UnexpectedValueKind { row_id: i64, kind: i64 },

    /// A column contained an unexpected SQLite value type.
    #[error("storage: unexpected value type in column '{column}'")]
    UnexpectedColumnType { column: &'static str },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
