//! Content comparison of snapshots.
//!
//! Only canonical records take part in the comparison. The sync timestamp and the version
//! tag are not part of a record, so two snapshots that differ only in those are equal.

use std::fmt;

use crate::types::Snapshot;

/// First reason found for two snapshots to differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotDifference {
    /// The snapshots hold a different number of records.
    RecordCount { old: usize, new: usize },
    /// The record at `index` differs, starting at `field`.
    Record { index: usize, field: String },
}

impl fmt::Display for SnapshotDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotDifference::RecordCount { old, new } => {
                write!(f, "record count changed from {old} to {new}")
            }
            SnapshotDifference::Record { index, field } => {
                write!(f, "record {index} differs in field `{field}`")
            }
        }
    }
}

/// Returns whether `new` differs in content from `old`.
pub fn differs(old: &Snapshot, new: &Snapshot) -> bool {
    first_difference(old, new).is_some()
}

/// Returns the first difference between `old` and `new`, or [`None`] if their contents
/// are equal.
///
/// Records are compared positionally and field by field.
pub fn first_difference(old: &Snapshot, new: &Snapshot) -> Option<SnapshotDifference> {
    if old.record_count() != new.record_count() {
        return Some(SnapshotDifference::RecordCount {
            old: old.record_count(),
            new: new.record_count(),
        });
    }

    let schema = new.schema();
    for (index, (old_record, new_record)) in old.records().iter().zip(new.records()).enumerate() {
        if old_record == new_record {
            continue;
        }

        let position = old_record
            .values()
            .iter()
            .zip(new_record.values())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| old_record.len().min(new_record.len()));

        let field = schema
            .fields()
            .get(position)
            .map(|field| field.name.clone())
            .unwrap_or_else(|| format!("#{position}"));

        return Some(SnapshotDifference::Record { index, field });
    }

    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::conversions::normalize::FieldNormalizer;
    use crate::schema::TableSchema;
    use crate::types::{RawRecord, RawValue};

    fn snapshot(ids: &[&str], salary: &str, minute: u32) -> Snapshot {
        let schema = Arc::new(TableSchema::job_offers());
        let normalizer = FieldNormalizer::new(schema.clone());
        let records = ids
            .iter()
            .map(|id| {
                normalizer.normalize(&RawRecord::from([
                    ("ID_Oferta".to_string(), RawValue::from(*id)),
                    ("Salario_Monto".to_string(), RawValue::from(salary)),
                ]))
            })
            .collect();
        let synced_at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();

        Snapshot::new(schema, records, synced_at)
    }

    #[test]
    fn volatile_fields_are_ignored() {
        let old = snapshot(&["a", "b"], "1000", 0);
        let new = snapshot(&["a", "b"], "$1,000", 30);

        assert_ne!(old.version(), new.version());
        assert!(!differs(&old, &new));
    }

    #[test]
    fn added_record_is_a_change() {
        let old = snapshot(&["a"], "1000", 0);
        let new = snapshot(&["a", "b"], "1000", 0);

        assert!(differs(&old, &new));
        assert_eq!(
            first_difference(&old, &new),
            Some(SnapshotDifference::RecordCount { old: 1, new: 2 })
        );
    }

    #[test]
    fn changed_field_is_reported() {
        let old = snapshot(&["a", "b"], "1000", 0);
        let new = snapshot(&["a", "b"], "2000", 0);

        assert_eq!(
            first_difference(&old, &new),
            Some(SnapshotDifference::Record {
                index: 0,
                field: "Salario_Monto".to_string()
            })
        );
    }

    #[test]
    fn reordered_records_differ() {
        let old = snapshot(&["a", "b"], "1000", 0);
        let new = snapshot(&["b", "a"], "1000", 0);

        assert!(differs(&old, &new));
    }
}
