use std::fmt;

/// Ordered, duplicate-free list of title-cased labels.
///
/// Only built by [`crate::conversions::tags`], which enforces the invariants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagList(Vec<String>);

impl TagList {
    pub(crate) fn from_normalized(tags: Vec<String>) -> Self {
        Self(tags)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns whether a tag equals `label`, ignoring case.
    pub fn contains_ignore_case(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.0.iter().any(|tag| tag.to_lowercase() == label)
    }

    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

/// Normalized value of one schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Always finite.
    Float(f64),
    Tags(TagList),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&TagList> {
        match self {
            FieldValue::Tags(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(value) => write!(f, "{value:?}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Tags(tags) => write!(f, "{:?}", tags.as_slice()),
        }
    }
}

/// A record conforming to a [`crate::schema::TableSchema`].
///
/// Values are aligned with the schema fields by position.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    values: Vec<FieldValue>,
}

impl CanonicalRecord {
    pub(crate) fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
