use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;
pub type LockResult<T> = Result<T, LockError>;

/// Failures raised by an [`OrderedStore`](crate::infrastructure::OrderedStore) backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend could not complete the call.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A caller panicked while holding the store's internal lock.
    #[error("store state poisoned by a panicked caller")]
    Poisoned,

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors surfaced by [`LockRegistry`](crate::registry::LockRegistry) operations.
///
/// Absence is never an error: queries for unlocked resources return an empty
/// list or `None`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LockError {
    /// A store call failed. Earlier calls of the same operation may have
    /// been applied; the indexes heal on the next sweep.
    #[error("lock store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Rejected before any store call was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl LockError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, LockError::InvalidArgument(_))
    }
}
