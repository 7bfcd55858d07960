use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Canonical type of a snapshot column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, coerced from any scalar.
    Text,
    /// Text that is trimmed and title-cased, for categorical values.
    TitleText,
    /// 64-bit signed integer, `0` when absent or unparseable.
    Integer,
    /// Monetary amount; currency symbols and thousands separators are stripped.
    Money,
    /// 64-bit float, `0.0` when absent or unparseable.
    Float,
    /// Ordered, deduplicated list of title-cased labels.
    TagList,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::Text => "text",
            FieldKind::TitleText => "title_text",
            FieldKind::Integer => "integer",
            FieldKind::Money => "money",
            FieldKind::Float => "float",
            FieldKind::TagList => "tag_list",
        };
        f.write_str(s)
    }
}

/// One column of the snapshot schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub kind: FieldKind,
}

/// Explicit schema of the source table, overriding the built-in job offer schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Attributes forming the primary key of the source table.
    pub key: Vec<String>,
    /// Columns in export order.
    pub fields: Vec<FieldConfig>,
}

impl SchemaConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "schema.fields".to_string(),
                constraint: "must declare at least one field".to_string(),
            });
        }

        if self.key.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "schema.key".to_string(),
                constraint: "must name at least one key attribute".to_string(),
            });
        }

        let mut names = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: "schema.fields.name".to_string(),
                    constraint: "must not be empty".to_string(),
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(ValidationError::DuplicateSchemaField(field.name.clone()));
            }
        }

        if let Some(unknown) = self.key.iter().find(|key| !names.contains(key.as_str())) {
            return Err(ValidationError::UnknownKeyField(unknown.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, kind: FieldKind) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn rejects_duplicate_fields() {
        let schema = SchemaConfig {
            key: vec!["id".to_string()],
            fields: vec![field("id", FieldKind::Text), field("id", FieldKind::Integer)],
        };

        assert_eq!(
            schema.validate(),
            Err(ValidationError::DuplicateSchemaField("id".to_string()))
        );
    }

    #[test]
    fn rejects_key_outside_fields() {
        let schema = SchemaConfig {
            key: vec!["pk".to_string()],
            fields: vec![field("id", FieldKind::Text)],
        };

        assert_eq!(
            schema.validate(),
            Err(ValidationError::UnknownKeyField("pk".to_string()))
        );
    }

    #[test]
    fn deserializes_kinds_in_snake_case() {
        let schema: SchemaConfig = serde_json::from_str(
            r#"{"key":["id"],"fields":[{"name":"id","kind":"text"},{"name":"tags","kind":"tag_list"}]}"#,
        )
        .unwrap();

        assert_eq!(schema.fields[1].kind, FieldKind::TagList);
        assert!(schema.validate().is_ok());
    }
}
