//! Derived analysis columns appended to exported snapshots.
//!
//! Every derived value is a pure function of one canonical record, so enrichment never
//! changes the outcome of a comparison and derived columns are dropped on reload.

use snapsync_config::shared::EnrichmentConfig;

use crate::schema::TableSchema;
use crate::types::{CanonicalRecord, FieldValue};

pub const LANGUAGES_FIELD: &str = "Lenguajes_Lista";
pub const FRAMEWORKS_FIELD: &str = "Frameworks_Lista";
pub const DATABASES_FIELD: &str = "Bases_Datos_Lista";
pub const SALARY_FIELD: &str = "Salario_Monto";

pub const TOTAL_LANGUAGES_COLUMN: &str = "Total_Lenguajes";
pub const TOTAL_FRAMEWORKS_COLUMN: &str = "Total_Frameworks";
pub const TOTAL_DATABASES_COLUMN: &str = "Total_BD";
pub const SALARY_RANGE_COLUMN: &str = "Rango_Salario";

/// Prefix of the per-language flag columns.
pub const USES_LANGUAGE_PREFIX: &str = "Usa_";

const YES: &str = "Sí";
const NO: &str = "No";

/// Returns the salary bucket of `amount`.
pub fn salary_range(amount: f64) -> &'static str {
    match amount {
        // Zero means the salary was not published.
        a if a == 0.0 => "No especificado",
        a if a < 30_000.0 => "Hasta $30K",
        a if a < 50_000.0 => "$30K - $50K",
        a if a < 80_000.0 => "$50K - $80K",
        a if a < 120_000.0 => "$80K - $120K",
        _ => "Más de $120K",
    }
}

/// Computes derived columns for records of one schema.
#[derive(Debug, Clone)]
pub struct Enricher {
    popular_languages: Vec<String>,
    languages: Option<usize>,
    frameworks: Option<usize>,
    databases: Option<usize>,
    salary: Option<usize>,
}

impl Enricher {
    pub fn new(schema: &TableSchema, config: &EnrichmentConfig) -> Self {
        Self {
            popular_languages: config.popular_languages.clone(),
            languages: schema.index_of(LANGUAGES_FIELD),
            frameworks: schema.index_of(FRAMEWORKS_FIELD),
            databases: schema.index_of(DATABASES_FIELD),
            salary: schema.index_of(SALARY_FIELD),
        }
    }

    /// Names of the derived columns, in output order.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec![TOTAL_LANGUAGES_COLUMN.to_string()];
        headers.extend(
            self.popular_languages
                .iter()
                .map(|language| format!("{USES_LANGUAGE_PREFIX}{language}")),
        );
        headers.push(TOTAL_FRAMEWORKS_COLUMN.to_string());
        headers.push(TOTAL_DATABASES_COLUMN.to_string());
        headers.push(SALARY_RANGE_COLUMN.to_string());
        headers
    }

    /// Derived values of `record`, aligned with [`Enricher::headers`].
    pub fn values(&self, record: &CanonicalRecord) -> Vec<String> {
        let tag_count = |index: Option<usize>| {
            index
                .and_then(|index| record.get(index))
                .and_then(FieldValue::as_tags)
                .map(|tags| tags.len())
                .unwrap_or(0)
        };

        let languages = self
            .languages
            .and_then(|index| record.get(index))
            .and_then(FieldValue::as_tags);

        let mut values = vec![tag_count(self.languages).to_string()];
        values.extend(self.popular_languages.iter().map(|language| {
            let uses = languages.is_some_and(|tags| tags.contains_ignore_case(language));
            if uses { YES } else { NO }.to_string()
        }));
        values.push(tag_count(self.frameworks).to_string());
        values.push(tag_count(self.databases).to_string());

        let salary = self
            .salary
            .and_then(|index| record.get(index))
            .and_then(FieldValue::as_float)
            .unwrap_or(0.0);
        values.push(salary_range(salary).to_string());

        values
    }
}
