use thiserror::Error;

use crate::domain::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedKind {
    String,
    Number,
    Timestamp,
}

impl std::fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Timestamp => "timestamp",
        };
        f.write_str(label)
    }
}

/// A raw record could not be turned into a typed entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("record {id}: missing required field '{field}'")]
    MissingField { id: ProductId, field: &'static str },
    #[error("record {id}: field '{field}' is not a {expected}")]
    InvalidType {
        id: ProductId,
        field: &'static str,
        expected: ExpectedKind,
    },
    #[error("record {id}: field '{field}' has an invalid value: {reason}")]
    InvalidValue {
        id: ProductId,
        field: &'static str,
        reason: String,
    },
}

impl MappingError {
    pub fn record_id(&self) -> &ProductId {
        match self {
            Self::MissingField { id, .. }
            | Self::InvalidType { id, .. }
            | Self::InvalidValue { id, .. } => id,
        }
    }
}
