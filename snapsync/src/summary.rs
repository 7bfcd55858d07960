//! Descriptive statistics of a snapshot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::enrich::{LANGUAGES_FIELD, SALARY_FIELD};
use crate::types::{FieldValue, Snapshot};

pub const COMPANY_FIELD: &str = "Nombre_Empresa";
pub const CITY_FIELD: &str = "Ciudad";
pub const CATEGORY_FIELD: &str = "Categoria_Puesto";

/// Number of languages listed in a summary.
pub const TOP_LANGUAGES: usize = 5;

/// How often a language is requested across offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub offers: usize,
    /// Share of all records mentioning the language, in percent.
    pub percentage: f64,
}

/// Statistics logged after a snapshot is published and printed by `snapsync stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub unique_companies: usize,
    pub unique_cities: usize,
    pub unique_categories: usize,
    /// Mean of the published (non-zero) salaries.
    pub salary_mean: Option<f64>,
    /// Median of the published (non-zero) salaries.
    pub salary_median: Option<f64>,
    pub top_languages: Vec<LanguageCount>,
}

impl DatasetSummary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let schema = snapshot.schema();
        let records = snapshot.records();

        let unique_texts = |name: &str| -> usize {
            let Some(index) = schema.index_of(name) else {
                return 0;
            };
            records
                .iter()
                .filter_map(|record| record.get(index).and_then(FieldValue::as_text))
                .filter(|value| !value.trim().is_empty())
                .collect::<HashSet<_>>()
                .len()
        };

        let mut salaries: Vec<f64> = schema
            .index_of(SALARY_FIELD)
            .map(|index| {
                records
                    .iter()
                    .filter_map(|record| record.get(index).and_then(FieldValue::as_float))
                    .filter(|salary| *salary != 0.0)
                    .collect()
            })
            .unwrap_or_default();
        salaries.sort_by(f64::total_cmp);

        let salary_mean =
            (!salaries.is_empty()).then(|| salaries.iter().sum::<f64>() / salaries.len() as f64);
        let salary_median = median(&salaries);

        let mut mentions: HashMap<&str, usize> = HashMap::new();
        if let Some(index) = schema.index_of(LANGUAGES_FIELD) {
            for tags in records
                .iter()
                .filter_map(|record| record.get(index).and_then(FieldValue::as_tags))
            {
                for language in tags.iter() {
                    *mentions.entry(language).or_default() += 1;
                }
            }
        }

        let mut top_languages: Vec<LanguageCount> = mentions
            .into_iter()
            .map(|(language, offers)| LanguageCount {
                language: language.to_string(),
                offers,
                percentage: offers as f64 * 100.0 / records.len() as f64,
            })
            .collect();
        top_languages.sort_by(|a, b| {
            b.offers
                .cmp(&a.offers)
                .then_with(|| a.language.cmp(&b.language))
        });
        top_languages.truncate(TOP_LANGUAGES);

        Self {
            records: records.len(),
            unique_companies: unique_texts(COMPANY_FIELD),
            unique_cities: unique_texts(CITY_FIELD),
            unique_categories: unique_texts(CATEGORY_FIELD),
            salary_mean,
            salary_median,
            top_languages,
        }
    }

    /// Emits the summary as structured log events.
    pub fn log(&self) {
        info!(
            records = self.records,
            unique_companies = self.unique_companies,
            unique_cities = self.unique_cities,
            unique_categories = self.unique_categories,
            salary_mean = ?self.salary_mean.map(f64::round),
            salary_median = ?self.salary_median.map(f64::round),
            "dataset summary"
        );

        for (rank, language) in self.top_languages.iter().enumerate() {
            info!(
                rank = rank + 1,
                language = %language.language,
                offers = language.offers,
                percentage = format!("{:.1}", language.percentage),
                "top language"
            );
        }
    }
}

/// Median of sorted values.
fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[middle - 1] + sorted[middle]) / 2.0)
    } else {
        Some(sorted[middle])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::conversions::normalize::FieldNormalizer;
    use crate::schema::TableSchema;
    use crate::types::{RawRecord, RawValue};

    fn offer(company: &str, salary: &str, languages: &str) -> RawRecord {
        RawRecord::from([
            (COMPANY_FIELD.to_string(), RawValue::from(company)),
            (SALARY_FIELD.to_string(), RawValue::from(salary)),
            (LANGUAGES_FIELD.to_string(), RawValue::from(languages)),
        ])
    }

    #[test]
    fn summarizes_offers() {
        let schema = Arc::new(TableSchema::job_offers());
        let normalizer = FieldNormalizer::new(schema.clone());
        let records = [
            offer("Acme", "30000", "Python, Java"),
            offer("Acme", "0", "python"),
            offer("Globex", "$50,000", "Go"),
            offer("", "70000", ""),
        ]
        .iter()
        .map(|record| normalizer.normalize(record))
        .collect();
        let snapshot = Snapshot::new(schema, records, NaiveDateTime::default());

        let summary = DatasetSummary::from_snapshot(&snapshot);

        assert_eq!(summary.records, 4);
        assert_eq!(summary.unique_companies, 2);
        assert_eq!(summary.salary_mean, Some(50_000.0));
        assert_eq!(summary.salary_median, Some(50_000.0));
        assert_eq!(
            summary.top_languages[0],
            LanguageCount {
                language: "Python".to_string(),
                offers: 2,
                percentage: 50.0,
            }
        );
        assert_eq!(summary.top_languages.len(), 3);
    }

    #[test]
    fn empty_snapshot_has_no_salary_statistics() {
        let schema = Arc::new(TableSchema::job_offers());
        let snapshot = Snapshot::new(schema, Vec::new(), NaiveDateTime::default());

        let summary = DatasetSummary::from_snapshot(&snapshot);

        assert_eq!(summary.salary_mean, None);
        assert!(summary.top_languages.is_empty());
    }
}
