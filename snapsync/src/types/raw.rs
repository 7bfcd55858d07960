use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::conversions::numeric::decimal_to_text;

/// Untyped value as returned by the source table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawValue {
    Null,
    Bool(bool),
    /// Numbers keep the full precision of the source.
    Number(BigDecimal),
    String(String),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Converts the value to JSON for backups.
    ///
    /// Numbers are rendered as strings so that no precision is lost.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawValue::Null => serde_json::Value::Null,
            RawValue::Bool(value) => serde_json::Value::Bool(*value),
            RawValue::Number(value) => serde_json::Value::String(decimal_to_text(value)),
            RawValue::String(value) => serde_json::Value::String(value.clone()),
            RawValue::List(values) => {
                serde_json::Value::Array(values.iter().map(RawValue::to_json).collect())
            }
            RawValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(value) => RawValue::Bool(value),
            serde_json::Value::Number(number) => match BigDecimal::from_str(&number.to_string()) {
                Ok(decimal) => RawValue::Number(decimal),
                Err(_) => RawValue::String(number.to_string()),
            },
            serde_json::Value::String(value) => RawValue::String(value),
            serde_json::Value::Array(values) => {
                RawValue::List(values.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(entries) => RawValue::Map(
                entries
                    .into_iter()
                    .map(|(name, value)| (name, RawValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(BigDecimal::from(value))
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Bool(value) => write!(f, "{value}"),
            RawValue::Number(value) => f.write_str(&decimal_to_text(value)),
            RawValue::String(value) => write!(f, "{value:?}"),
            RawValue::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            RawValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (name, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A record as read from the source table, before normalization.
pub type RawRecord = BTreeMap<String, RawValue>;

/// Converts a record to a JSON object for backups.
pub fn raw_record_to_json(record: &RawRecord) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

/// Primary key of an item, mapping each key attribute to its value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PrimaryKey(BTreeMap<String, RawValue>);

impl PrimaryKey {
    pub fn new(attributes: BTreeMap<String, RawValue>) -> Self {
        Self(attributes)
    }

    /// Builds a key with a single attribute.
    pub fn single(name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self(BTreeMap::from([(name.into(), value.into())]))
    }

    /// Extracts the key attributes from `record`.
    ///
    /// Returns [`None`] when any key attribute is missing or null.
    pub fn from_record(record: &RawRecord, key_attributes: &[String]) -> Option<Self> {
        let mut attributes = BTreeMap::new();
        for name in key_attributes {
            let value = record.get(name).filter(|value| !value.is_null())?;
            attributes.insert(name.clone(), value.clone());
        }

        Some(Self(attributes))
    }

    pub fn attributes(&self) -> &BTreeMap<String, RawValue> {
        &self.0
    }

    pub fn into_attributes(self) -> BTreeMap<String, RawValue> {
        self.0
    }

    /// Returns whether `record` holds exactly this key.
    pub fn matches(&self, record: &RawRecord) -> bool {
        self.0
            .iter()
            .all(|(name, value)| record.get(name) == Some(value))
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Opaque cursor returned by the source table to continue a scan.
///
/// Wraps the key of the last item the source evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(PrimaryKey);

impl ContinuationToken {
    pub fn new(last_evaluated_key: PrimaryKey) -> Self {
        Self(last_evaluated_key)
    }

    pub fn last_evaluated_key(&self) -> &PrimaryKey {
        &self.0
    }

    pub fn into_last_evaluated_key(self) -> PrimaryKey {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_keep_precision() {
        let value = RawValue::from(serde_json::json!(45000.10));

        assert_eq!(
            value,
            RawValue::Number(BigDecimal::from_str("45000.1").unwrap())
        );
        assert_eq!(value.to_json(), serde_json::json!("45000.1"));
    }

    #[test]
    fn key_requires_every_attribute() {
        let record = RawRecord::from([
            ("ID_Oferta".to_string(), RawValue::from("a-1")),
            ("Ciudad".to_string(), RawValue::Null),
        ]);

        let key = PrimaryKey::from_record(&record, &["ID_Oferta".to_string()]).unwrap();
        assert!(key.matches(&record));
        assert_eq!(key.to_string(), "ID_Oferta=\"a-1\"");

        assert!(PrimaryKey::from_record(&record, &["Ciudad".to_string()]).is_none());
    }
}
