use async_trait::async_trait;
use shared::{domain::Cursor, protocol::RawRecord};
use storage::{QueryError, Storage};

use crate::error::StoreError;

/// Highest code point; appended to a prefix it bounds every string that
/// starts with that prefix.
pub const PREFIX_SENTINEL: char = char::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub order_by: String,
    pub descending: bool,
    pub limit: u32,
    pub after: Option<Cursor>,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Position of the last record in `records`; `None` for an empty page.
    pub next_cursor: Option<Cursor>,
}

/// Half-open lexicographic range `[lower, upper)` over one indexed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRange {
    pub field: String,
    pub lower: String,
    pub upper: String,
}

impl PrefixRange {
    pub fn starts_with(field: impl Into<String>, prefix: &str) -> Self {
        Self {
            field: field.into(),
            lower: prefix.to_string(),
            upper: format!("{prefix}{PREFIX_SENTINEL}"),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        value >= self.lower.as_str() && value < self.upper.as_str()
    }
}

/// Read-only view of the remote product collection.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn query_page(&self, query: &PageQuery) -> Result<Page, StoreError>;
    async fn query_prefix(&self, range: &PrefixRange) -> Result<Vec<RawRecord>, StoreError>;
}

pub struct MissingProductStore;

#[async_trait]
impl ProductStore for MissingProductStore {
    async fn query_page(&self, _query: &PageQuery) -> Result<Page, StoreError> {
        Err(StoreError::Unavailable(
            "product store is not configured".to_string(),
        ))
    }

    async fn query_prefix(&self, range: &PrefixRange) -> Result<Vec<RawRecord>, StoreError> {
        Err(StoreError::Unavailable(format!(
            "product store is not configured (prefix query on '{}')",
            range.field
        )))
    }
}

#[async_trait]
impl ProductStore for Storage {
    async fn query_page(&self, query: &PageQuery) -> Result<Page, StoreError> {
        let page = self
            .list_products_page(
                &query.order_by,
                query.descending,
                query.limit,
                query.after.as_ref(),
            )
            .await
            .map_err(classify_storage_error)?;
        Ok(Page {
            records: page.records,
            next_cursor: page.next_cursor,
        })
    }

    async fn query_prefix(&self, range: &PrefixRange) -> Result<Vec<RawRecord>, StoreError> {
        self.list_products_in_range(&range.field, &range.lower, &range.upper)
            .await
            .map_err(classify_storage_error)
    }
}

fn classify_storage_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<QueryError>() {
        Some(QueryError::CursorNotFound(_)) => StoreError::InvalidCursor(err.to_string()),
        Some(QueryError::UnindexedField(field)) => StoreError::UnsupportedField(field.clone()),
        None => StoreError::from(err),
    }
}
