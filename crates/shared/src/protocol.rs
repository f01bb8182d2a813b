use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::{
    domain::{Product, ProductId},
    error::{ExpectedKind, MappingError},
};

pub const FIELD_NAME: &str = "name";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_IMAGE_URL: &str = "imageUrl";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Untyped document as delivered by a store: its id plus a field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: ProductId,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(id),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    fn required(&self, field: &'static str) -> Result<&Value, MappingError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(MappingError::MissingField {
                id: self.id.clone(),
                field,
            }),
            Some(value) => Ok(value),
        }
    }

    fn string(&self, field: &'static str) -> Result<String, MappingError> {
        match self.required(field)? {
            Value::String(value) => Ok(value.clone()),
            _ => Err(self.invalid_type(field, ExpectedKind::String)),
        }
    }

    fn price(&self, field: &'static str) -> Result<Decimal, MappingError> {
        let Value::Number(number) = self.required(field)? else {
            return Err(self.invalid_type(field, ExpectedKind::Number));
        };
        let price = decimal_from_number(number).ok_or_else(|| MappingError::InvalidValue {
            id: self.id.clone(),
            field,
            reason: format!("{number} is not representable as a decimal"),
        })?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(MappingError::InvalidValue {
                id: self.id.clone(),
                field,
                reason: format!("price must not be negative, got {price}"),
            });
        }
        Ok(price)
    }

    /// Accepts epoch milliseconds, an RFC 3339 string, or a
    /// `{"seconds", "nanos"}` object.
    fn timestamp(&self, field: &'static str) -> Result<DateTime<Utc>, MappingError> {
        let parsed = match self.required(field)? {
            Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
            Value::String(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|value| value.with_timezone(&Utc)),
            Value::Object(parts) => {
                let seconds = parts.get("seconds").and_then(Value::as_i64);
                let nanos = parts.get("nanos").and_then(Value::as_u64).unwrap_or(0);
                seconds.and_then(|seconds| {
                    DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
                })
            }
            _ => return Err(self.invalid_type(field, ExpectedKind::Timestamp)),
        };
        parsed.ok_or_else(|| self.invalid_type(field, ExpectedKind::Timestamp))
    }

    fn invalid_type(&self, field: &'static str, expected: ExpectedKind) -> MappingError {
        MappingError::InvalidType {
            id: self.id.clone(),
            field,
            expected,
        }
    }
}

fn decimal_from_number(number: &Number) -> Option<Decimal> {
    if let Some(value) = number.as_i64() {
        return Some(Decimal::from(value));
    }
    if let Some(value) = number.as_u64() {
        return Some(Decimal::from(value));
    }
    let text = number.to_string();
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
        .map(|value| value.normalize())
}

impl TryFrom<&RawRecord> for Product {
    type Error = MappingError;

    fn try_from(record: &RawRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.clone(),
            name: record.string(FIELD_NAME)?,
            price: record.price(FIELD_PRICE)?,
            image_url: record.string(FIELD_IMAGE_URL)?,
            description: record.string(FIELD_DESCRIPTION)?,
            created_at: record.timestamp(FIELD_CREATED_AT)?,
        })
    }
}

impl TryFrom<RawRecord> for Product {
    type Error = MappingError;

    fn try_from(record: RawRecord) -> Result<Self, Self::Error> {
        Self::try_from(&record)
    }
}
