//! Store-level failures.
//!
//! Not-found and already-visited are not errors: the resolver handles both
//! internally. Everything here escapes to the caller.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Connectivity or query failure. Fatal to the whole operation.
    #[error("lineage store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A lineage fact that the store refused (unknown reference, constraint violation).
    #[error("invalid lineage fact: {0}")]
    InvalidFact(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}
