use std::sync::Arc;

use tracing::trace;

use crate::conversions::numeric::{
    decimal_to_float, decimal_to_integer, decimal_to_text, parse_float_text, parse_integer_text,
};
use crate::conversions::tags::{parse_tag_text, parse_tag_values, title_case};
use crate::schema::{FieldKind, FieldSpec, TableSchema};
use crate::types::{CanonicalRecord, FieldValue, RawRecord, RawValue, TagList};

/// Converts raw records into canonical records of a fixed schema.
///
/// Normalization is total: missing or unusable values resolve to the default of the field
/// kind (empty string, `0`, `0.0`, empty tag list) and never fail the record.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    schema: Arc<TableSchema>,
}

impl FieldNormalizer {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Normalizes every schema field of `record`. Attributes outside the schema are ignored.
    pub fn normalize(&self, record: &RawRecord) -> CanonicalRecord {
        let values = self
            .schema
            .fields()
            .iter()
            .map(|field| normalize_field(field, record.get(&field.name)))
            .collect();

        CanonicalRecord::new(values)
    }
}

/// Normalizes one value according to the kind of `field`.
pub fn normalize_field(field: &FieldSpec, value: Option<&RawValue>) -> FieldValue {
    let normalized = match field.kind {
        FieldKind::Text => to_text(value).map(FieldValue::Text),
        FieldKind::TitleText => to_text(value)
            .map(|text| FieldValue::Text(title_case(text.trim()))),
        FieldKind::Integer => to_integer(value).map(FieldValue::Integer),
        FieldKind::Money | FieldKind::Float => to_float(value).map(FieldValue::Float),
        FieldKind::TagList => to_tags(value).map(FieldValue::Tags),
    };

    normalized.unwrap_or_else(|| {
        trace!(field = %field.name, kind = %field.kind, value = ?value, "value defaulted");
        default_value(field.kind)
    })
}

/// Default value of a field kind.
pub fn default_value(kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Text | FieldKind::TitleText => FieldValue::Text(String::new()),
        FieldKind::Integer => FieldValue::Integer(0),
        FieldKind::Money | FieldKind::Float => FieldValue::Float(0.0),
        FieldKind::TagList => FieldValue::Tags(TagList::empty()),
    }
}

fn to_text(value: Option<&RawValue>) -> Option<String> {
    match value? {
        RawValue::String(value) => Some(value.clone()),
        RawValue::Number(value) => Some(decimal_to_text(value)),
        RawValue::Bool(value) => Some(value.to_string()),
        RawValue::Null | RawValue::List(_) | RawValue::Map(_) => None,
    }
}

fn to_integer(value: Option<&RawValue>) -> Option<i64> {
    match value? {
        RawValue::String(value) => parse_integer_text(value),
        RawValue::Number(value) => decimal_to_integer(value),
        RawValue::Null | RawValue::Bool(_) | RawValue::List(_) | RawValue::Map(_) => None,
    }
}

fn to_float(value: Option<&RawValue>) -> Option<f64> {
    match value? {
        RawValue::String(value) => parse_float_text(value),
        RawValue::Number(value) => decimal_to_float(value),
        RawValue::Null | RawValue::Bool(_) | RawValue::List(_) | RawValue::Map(_) => None,
    }
}

fn to_tags(value: Option<&RawValue>) -> Option<TagList> {
    match value? {
        RawValue::String(value) => Some(parse_tag_text(value)),
        RawValue::List(values) => Some(parse_tag_values(values)),
        RawValue::Null | RawValue::Bool(_) | RawValue::Number(_) | RawValue::Map(_) => None,
    }
}
