//! CSV encoding of a snapshot body.
//!
//! The header lists the schema fields in order, then the derived columns when enrichment
//! is enabled, then [`UPDATED_AT_COLUMN`] and [`VERSION_COLUMN`]. Reading a body back goes
//! through the normalizer again, so columns outside the schema are ignored.

use chrono::NaiveDateTime;

use crate::bail;
use crate::conversions::normalize::FieldNormalizer;
use crate::enrich::Enricher;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::schema::{FieldKind, TableSchema};
use crate::types::{
    CanonicalRecord, FieldValue, RawRecord, RawValue, Snapshot, TIMESTAMP_FORMAT, VersionTag,
};

pub const UPDATED_AT_COLUMN: &str = "ultima_actualizacion";
pub const VERSION_COLUMN: &str = "version_datos";

/// Separator of tags inside one cell.
///
/// A `|` or `\` inside a tag is written escaped with a backslash.
pub const TAG_CELL_SEPARATOR: &str = " | ";

const TAG_ESCAPE: char = '\\';

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Records and version information read from a body.
#[derive(Debug)]
pub(crate) struct DecodedBody {
    pub records: Vec<CanonicalRecord>,
    /// Version stamped on the rows, absent when the body has no rows.
    pub version: Option<VersionTag>,
    pub synced_at: Option<NaiveDateTime>,
}

/// Column names of a body.
pub(crate) fn headers(schema: &TableSchema, enricher: Option<&Enricher>) -> Vec<String> {
    let mut headers: Vec<String> = schema.field_names().map(str::to_string).collect();
    if let Some(enricher) = enricher {
        headers.extend(enricher.headers());
    }
    headers.push(UPDATED_AT_COLUMN.to_string());
    headers.push(VERSION_COLUMN.to_string());
    headers
}

pub(crate) fn encode(
    snapshot: &Snapshot,
    enricher: Option<&Enricher>,
    write_bom: bool,
) -> SyncResult<Vec<u8>> {
    let mut buffer = Vec::new();
    if write_bom {
        buffer.extend_from_slice(BOM);
    }

    let mut writer = csv::Writer::from_writer(buffer);
    writer.write_record(headers(snapshot.schema(), enricher))?;

    let updated_at = snapshot.synced_at().format(TIMESTAMP_FORMAT).to_string();
    let version = snapshot.version().as_str();

    for record in snapshot.records() {
        let mut row: Vec<String> = record.values().iter().map(render_cell).collect();
        if let Some(enricher) = enricher {
            row.extend(enricher.values(record));
        }
        row.push(updated_at.clone());
        row.push(version.to_string());

        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|err| SyncError::from(err.into_error()))
}

pub(crate) fn decode(bytes: &[u8], normalizer: &FieldNormalizer) -> SyncResult<DecodedBody> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);

    let header = reader.headers()?.clone();
    let position = |name: &str| header.iter().position(|column| column == name);

    let schema = normalizer.schema();
    for key in schema.key() {
        if position(key).is_none() {
            bail!(
                ErrorKind::SnapshotCorrupted,
                "Stored snapshot misses a key column",
                format!("column `{key}` not found in header")
            );
        }
    }

    let columns: Vec<Option<usize>> = schema
        .fields()
        .iter()
        .map(|field| position(&field.name))
        .collect();
    let version_column = position(VERSION_COLUMN);
    let updated_at_column = position(UPDATED_AT_COLUMN);

    let mut decoded = DecodedBody {
        records: Vec::new(),
        version: None,
        synced_at: None,
    };

    for row in reader.records() {
        let row = row?;

        if decoded.records.is_empty() {
            decoded.version = version_column
                .and_then(|index| row.get(index))
                .filter(|cell| !cell.is_empty())
                .map(str::parse::<VersionTag>)
                .transpose()?;
            decoded.synced_at = updated_at_column
                .and_then(|index| row.get(index))
                .filter(|cell| !cell.is_empty())
                .map(|cell| NaiveDateTime::parse_from_str(cell, TIMESTAMP_FORMAT))
                .transpose()?;
        }

        let raw: RawRecord = schema
            .fields()
            .iter()
            .zip(&columns)
            .filter_map(|(field, column)| {
                let cell = row.get((*column)?)?;
                Some((field.name.clone(), parse_cell(field.kind, cell)))
            })
            .collect();

        decoded.records.push(normalizer.normalize(&raw));
    }

    Ok(decoded)
}

fn render_cell(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(value) => value.clone(),
        FieldValue::Integer(value) => value.to_string(),
        FieldValue::Float(value) => value.to_string(),
        FieldValue::Tags(tags) => tags
            .iter()
            .map(|tag| escape_tag(tag))
            .collect::<Vec<_>>()
            .join(TAG_CELL_SEPARATOR),
    }
}

fn escape_tag(tag: &str) -> String {
    let mut escaped = String::with_capacity(tag.len());
    for c in tag.chars() {
        if c == TAG_ESCAPE || c == '|' {
            escaped.push(TAG_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Splits a tag cell on unescaped `|`. Surrounding spaces are trimmed by the normalizer.
fn split_tags(cell: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = String::new();
    let mut chars = cell.chars();

    while let Some(c) = chars.next() {
        match c {
            TAG_ESCAPE => current.extend(chars.next()),
            '|' => tags.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    tags.push(current);

    tags.retain(|tag| !tag.trim().is_empty());
    tags
}

fn parse_cell(kind: FieldKind, cell: &str) -> RawValue {
    match kind {
        FieldKind::TagList => {
            RawValue::List(split_tags(cell).into_iter().map(RawValue::from).collect())
        }
        _ => RawValue::from(cell),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use snapsync_config::shared::EnrichmentConfig;

    use super::*;
    use crate::schema::FieldSpec;

    fn schema() -> Arc<TableSchema> {
        Arc::new(TableSchema::new(
            vec!["id".to_string()],
            vec![
                FieldSpec::new("id", FieldKind::Text),
                FieldSpec::new("city", FieldKind::TitleText),
                FieldSpec::new("years", FieldKind::Integer),
                FieldSpec::new("salary", FieldKind::Money),
                FieldSpec::new("languages", FieldKind::TagList),
            ],
        ))
    }

    fn snapshot(records: &[RawRecord]) -> Snapshot {
        let schema = schema();
        let normalizer = FieldNormalizer::new(schema.clone());
        let synced_at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 59)
            .unwrap();

        Snapshot::new(
            schema,
            records.iter().map(|r| normalizer.normalize(r)).collect(),
            synced_at,
        )
    }

    fn record(id: &str, languages: &str) -> RawRecord {
        RawRecord::from([
            ("id".to_string(), RawValue::from(id)),
            ("city".to_string(), RawValue::from(" san josé ")),
            ("years".to_string(), RawValue::from("No disponible")),
            ("salary".to_string(), RawValue::from("$45,000.50")),
            ("languages".to_string(), RawValue::from(languages)),
        ])
    }

    #[test]
    fn encodes_with_bom_and_version_columns() {
        let bytes = encode(&snapshot(&[record("a", "python, Go")]), None, true).unwrap();

        assert!(bytes.starts_with(BOM));
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        insta::assert_snapshot!(text, @r"
        id,city,years,salary,languages,ultima_actualizacion,version_datos
        a,San José,0,45000.5,Python | Go,2024-03-07 09:05:59,20240307_0905
        ");
    }

    #[test]
    fn decoding_restores_canonical_records() {
        let original = snapshot(&[
            record("a", "python, Go"),
            record("b", ""),
            record("c", r"ci | cd, c\d, go"),
        ]);
        let normalizer = FieldNormalizer::new(original.schema().clone());
        let enricher = Enricher::new(
            original.schema(),
            &EnrichmentConfig {
                enabled: true,
                ..EnrichmentConfig::default()
            },
        );

        let bytes = encode(&original, Some(&enricher), true).unwrap();
        let decoded = decode(&bytes, &normalizer).unwrap();

        assert_eq!(decoded.records, original.records());
        assert_eq!(decoded.version.as_ref(), Some(original.version()));
        assert_eq!(decoded.synced_at, Some(original.synced_at()));
    }

    #[test]
    fn separator_inside_a_tag_is_escaped() {
        let original = snapshot(&[record("a", r"ci | cd, c\d")]);
        let normalizer = FieldNormalizer::new(original.schema().clone());

        let bytes = encode(&original, None, false).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r"Ci \| Cd | C\\D"));

        let decoded = decode(&bytes, &normalizer).unwrap();
        let tags = decoded.records[0].values()[4].as_tags().unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Ci | Cd", r"C\D"]);
    }

    #[test]
    fn empty_body_has_no_version() {
        let original = snapshot(&[]);
        let normalizer = FieldNormalizer::new(original.schema().clone());

        let decoded = decode(&encode(&original, None, false).unwrap(), &normalizer).unwrap();

        assert!(decoded.records.is_empty());
        assert!(decoded.version.is_none());
    }

    #[test]
    fn missing_key_column_is_rejected() {
        let normalizer = FieldNormalizer::new(schema());

        let err = decode(b"city,years\nX,1\n", &normalizer).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SnapshotCorrupted);
    }
}
