use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use super::FieldValue;
use crate::errors::ServiceError;

/// Identifier of a row in the `Model` table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ModelId {
    Integer(i64),
    Text(String),
}

impl TryFrom<FieldValue> for ModelId {
    type Error = ServiceError;

    fn try_from(value: FieldValue) -> Result<Self, Self::Error> {
        match value {
            FieldValue::Integer(id) => Ok(Self::Integer(id)),
            FieldValue::Text(id) if !id.trim().is_empty() => Ok(Self::Text(id)),
            FieldValue::Decimal(d) if d.fract().is_zero() => d
                .to_i64()
                .map(Self::Integer)
                .ok_or_else(|| ServiceError::QueryError(format!("Model ID {} out of range", d))),
            other => Err(ServiceError::QueryError(format!(
                "Unusable model ID value: {:?}",
                other
            ))),
        }
    }
}

impl From<i64> for ModelId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<&ModelId> for sea_orm::Value {
    fn from(id: &ModelId) -> Self {
        match id {
            ModelId::Integer(id) => (*id).into(),
            ModelId::Text(id) => id.clone().into(),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{}", id),
            Self::Text(id) => f.write_str(id),
        }
    }
}
