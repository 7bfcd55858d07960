use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::conversions::normalize::FieldNormalizer;
use crate::schema::{JOB_OFFER_KEY, TableSchema};
use crate::types::{PrimaryKey, RawRecord, RawValue, Snapshot};

/// A job offer item the way the ingestion pipeline stores it, loosely typed.
pub fn offer(id: &str) -> RawRecord {
    let fields: [(&str, RawValue); 12] = [
        (JOB_OFFER_KEY, RawValue::from(id)),
        ("Titulo_Oferta", RawValue::from(format!("Desarrollador {id}"))),
        ("Ciudad", RawValue::from("San José")),
        ("Modalidad_Trabajo", RawValue::from("remoto")),
        ("Salario_Monto", RawValue::from("$45,000.00")),
        ("Salario_Moneda", RawValue::from("USD")),
        ("Lenguajes_Lista", RawValue::from("Python, python , JAVA,Python")),
        ("Frameworks_Lista", RawValue::from("django")),
        ("Bases_Datos_Lista", RawValue::List(Vec::new())),
        ("Anos_Experiencia", RawValue::from("No disponible")),
        ("Nombre_Empresa", RawValue::from("Acme")),
        ("Categoria_Puesto", RawValue::from("Backend")),
    ];

    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// `count` offers with ids `of-000`, `of-001`, ...
pub fn offers(count: usize) -> Vec<RawRecord> {
    (0..count).map(|i| offer(&offer_id(i))).collect()
}

/// Keys of [`offers`].
pub fn offer_keys(count: usize) -> Vec<PrimaryKey> {
    (0..count)
        .map(|i| PrimaryKey::single(JOB_OFFER_KEY, offer_id(i)))
        .collect()
}

pub fn offer_id(index: usize) -> String {
    format!("of-{index:03}")
}

/// Timestamp used by snapshots built in tests.
pub fn test_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 7)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .unwrap()
}

/// Snapshot of `count` normalized [`offers`] taken at [`test_timestamp`].
pub fn offer_snapshot(count: usize) -> Snapshot {
    let schema = Arc::new(TableSchema::job_offers());
    let normalizer = FieldNormalizer::new(schema.clone());
    let records = offers(count)
        .iter()
        .map(|record| normalizer.normalize(record))
        .collect();

    Snapshot::new(schema, records, test_timestamp())
}
