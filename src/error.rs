use thiserror::Error;

/// Errors surfaced by the address index core.
///
/// `Corruption` means the on-disk data failed to decode and the index
/// should be considered inconsistent (the usual remedy is dropping and
/// rebuilding it).  `Assert` indicates a violated internal invariant and
/// always points at a coding error rather than bad input.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("address type is not supported by the address index")]
    UnsupportedAddress,

    #[error("corrupt index data: {0}")]
    Corruption(String),

    #[error("assertion violated: {0}")]
    Assert(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("interrupt requested")]
    InterruptRequested,
}

impl From<rocksdb::Error> for IndexError {
    fn from(e: rocksdb::Error) -> Self {
        IndexError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
