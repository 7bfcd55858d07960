use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The same column name appears twice in the table schema.
    #[error("schema field `{0}` is declared more than once")]
    DuplicateSchemaField(String),
    /// A key attribute is not declared as a schema field.
    #[error("key attribute `{0}` is not declared in the schema fields")]
    UnknownKeyField(String),
}
