use std::time::Duration;

use shared::error::MappingError;
use thiserror::Error;

/// Failure reported by a [`crate::ProductStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid pagination cursor: {0}")]
    InvalidCursor(String),
    #[error("unsupported query field: {0}")]
    UnsupportedField(String),
    #[error("store backend failure: {source:#}")]
    Backend { source: anyhow::Error },
}

impl StoreError {
    /// Whether re-issuing the same command may succeed without any change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Backend { .. }
        )
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(source: anyhow::Error) -> Self {
        Self::Backend { source }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl FetchError {
    /// Mapping failures repeat until the stored record changes.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::Mapping(_) => false,
        }
    }
}
