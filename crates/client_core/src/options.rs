use std::{fmt, str::FromStr, time::Duration};

use shared::{
    domain::Product,
    error::MappingError,
    protocol::{RawRecord, FIELD_CREATED_AT, FIELD_NAME},
};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to fetch products";
pub const DEFAULT_STATE_CAPACITY: usize = 64;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// What to do with a batch that contains malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// One malformed record fails the whole page or search.
    #[default]
    FailBatch,
    /// Malformed records are logged and dropped.
    SkipInvalid,
}

/// Which completions are allowed to replace the displayed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Only the most recently issued command (search or page) may commit.
    #[default]
    LatestRequest,
    /// Every completion commits; the last one to finish wins.
    LastCompletion,
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParsePolicyError {
    kind: &'static str,
    value: String,
}

impl FromStr for BatchPolicy {
    type Err = ParsePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail_batch" | "fail-batch" => Ok(Self::FailBatch),
            "skip_invalid" | "skip-invalid" => Ok(Self::SkipInvalid),
            _ => Err(ParsePolicyError {
                kind: "batch policy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for BatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FailBatch => "fail_batch",
            Self::SkipInvalid => "skip_invalid",
        })
    }
}

impl FromStr for CommitPolicy {
    type Err = ParsePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest_request" | "latest-request" => Ok(Self::LatestRequest),
            "last_completion" | "last-completion" => Ok(Self::LastCompletion),
            _ => Err(ParsePolicyError {
                kind: "commit policy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LatestRequest => "latest_request",
            Self::LastCompletion => "last_completion",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub page_size: u32,
    pub order_field: String,
    pub search_field: String,
    pub error_message: String,
    pub batch_policy: BatchPolicy,
    pub commit_policy: CommitPolicy,
    pub state_capacity: usize,
    pub query_timeout: Option<Duration>,
    /// Issue a `load_more` as soon as the controller is created.
    pub initial_load: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            order_field: FIELD_CREATED_AT.to_string(),
            search_field: FIELD_NAME.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            batch_policy: BatchPolicy::default(),
            commit_policy: CommitPolicy::default(),
            state_capacity: DEFAULT_STATE_CAPACITY,
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
            initial_load: true,
        }
    }
}

pub(crate) fn map_records(
    records: &[RawRecord],
    policy: BatchPolicy,
) -> Result<Vec<Product>, MappingError> {
    match policy {
        BatchPolicy::FailBatch => records.iter().map(Product::try_from).collect(),
        BatchPolicy::SkipInvalid => Ok(records
            .iter()
            .filter_map(|record| match Product::try_from(record) {
                Ok(product) => Some(product),
                Err(err) => {
                    warn!(record_id = %err.record_id(), error = %err, "skipping malformed record");
                    None
                }
            })
            .collect()),
    }
}
