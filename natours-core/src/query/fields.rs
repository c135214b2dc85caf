use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;

/// Storage type of a queryable field, used to parse raw parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Timestamp,
    Uuid,
    /// Array or JSON column: selectable, never filterable
    Document,
}

impl FieldKind {
    /// Whether range operators (`gt`, `gte`, `lt`, `lte`) apply.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            FieldKind::Integer | FieldKind::Float | FieldKind::Decimal | FieldKind::Timestamp
        )
    }
}

/// Allow-list entry describing one column a client may touch through the
/// query string.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub filterable: bool,
    pub sortable: bool,
    /// Bookkeeping column left out of the default projection
    pub internal: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            filterable: false,
            sortable: false,
            internal: false,
        }
    }

    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub const fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

pub fn lookup(fields: &'static [FieldSpec], name: &str) -> Option<&'static FieldSpec> {
    fields.iter().find(|spec| spec.name == name)
}

/// A typed value parsed from the query string.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn parse(spec: &FieldSpec, raw: &str) -> Result<Self, AppError> {
        let cast_error = || AppError::Cast(format!("Invalid {}: {}", spec.name, raw));
        let value = match spec.kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Integer => FieldValue::Integer(raw.parse().map_err(|_| cast_error())?),
            FieldKind::Float => FieldValue::Float(raw.parse().map_err(|_| cast_error())?),
            FieldKind::Decimal => {
                FieldValue::Decimal(Decimal::from_str(raw).map_err(|_| cast_error())?)
            }
            FieldKind::Boolean => FieldValue::Boolean(raw.parse().map_err(|_| cast_error())?),
            FieldKind::Timestamp => FieldValue::Timestamp(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| cast_error())?
                    .with_timezone(&Utc),
            ),
            FieldKind::Uuid => FieldValue::Uuid(Uuid::parse_str(raw).map_err(|_| cast_error())?),
            FieldKind::Document => return Err(cast_error()),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE: FieldSpec = FieldSpec::new("price", FieldKind::Decimal).filterable();

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(
            FieldValue::parse(&PRICE, "497.50").unwrap(),
            FieldValue::Decimal(Decimal::new(49750, 2))
        );

        let flag = FieldSpec::new("secret_tour", FieldKind::Boolean);
        assert_eq!(FieldValue::parse(&flag, "true").unwrap(), FieldValue::Boolean(true));
    }

    #[test]
    fn test_parse_rejects_malformed_values() {
        assert!(matches!(FieldValue::parse(&PRICE, "cheap"), Err(AppError::Cast(_))));

        let id = FieldSpec::new("tour_id", FieldKind::Uuid);
        assert!(matches!(FieldValue::parse(&id, "12345"), Err(AppError::Cast(_))));
    }

    #[test]
    fn test_builder_flags() {
        let spec = FieldSpec::new("created_at", FieldKind::Timestamp).sortable().internal();
        assert!(spec.sortable);
        assert!(spec.internal);
        assert!(!spec.filterable);
        assert!(spec.kind.is_ordered());
        assert!(!FieldKind::Text.is_ordered());
    }
}
