//! Fixed schema of the snapshot.

use snapsync_config::shared::SchemaConfig;
pub use snapsync_config::shared::FieldKind;

/// Name of the key attribute of the job offers table.
pub const JOB_OFFER_KEY: &str = "ID_Oferta";

/// One column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered columns of a snapshot plus the key attributes of the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    key: Vec<String>,
    fields: Vec<FieldSpec>,
}

impl TableSchema {
    pub fn new(key: Vec<String>, fields: Vec<FieldSpec>) -> Self {
        Self { key, fields }
    }

    /// Schema of the job offers table populated by the ingestion pipeline.
    pub fn job_offers() -> Self {
        use FieldKind::*;

        let fields = [
            (JOB_OFFER_KEY, Text),
            ("Titulo_Oferta", Text),
            ("Ciudad", Text),
            ("Region_Departamento", Text),
            ("Fecha_Publicacion", Text),
            ("Tipo_Contrato", Text),
            ("Tipo_Jornada", Text),
            ("Modalidad_Trabajo", TitleText),
            ("Salario_Monto", Money),
            ("Salario_Moneda", Text),
            ("Salario_Tipo_Pago", Text),
            ("Lenguajes_Lista", TagList),
            ("Frameworks_Lista", TagList),
            ("Bases_Datos_Lista", TagList),
            ("Herramientas_Lista", TagList),
            ("Nivel_Ingles", Text),
            ("Nivel_Educacion", Text),
            ("Anos_Experiencia", Integer),
            ("Conocimientos_Adicionales_Lista", TagList),
            ("Edad_Minima", Integer),
            ("Edad_Maxima", Integer),
            ("Categoria_Puesto", Text),
            ("Nombre_Empresa", Text),
            ("Contenido_Descripcion_Empresa", Text),
            ("Enlace_Oferta", Text),
            ("Contenido_Descripcion_Oferta", Text),
            ("fecha_procesamiento", Text),
        ]
        .into_iter()
        .map(|(name, kind)| FieldSpec::new(name, kind))
        .collect();

        Self::new(vec![JOB_OFFER_KEY.to_string()], fields)
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the position of the field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::job_offers()
    }
}

impl From<&SchemaConfig> for TableSchema {
    fn from(config: &SchemaConfig) -> Self {
        Self::new(
            config.key.clone(),
            config
                .fields
                .iter()
                .map(|field| FieldSpec::new(field.name.clone(), field.kind))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_offer_schema_is_keyed_by_offer_id() {
        let schema = TableSchema::job_offers();

        assert_eq!(schema.key(), [JOB_OFFER_KEY.to_string()]);
        assert_eq!(schema.index_of(JOB_OFFER_KEY), Some(0));
        assert_eq!(schema.len(), 27);
        assert_eq!(
            schema.fields()[schema.index_of("Salario_Monto").unwrap()].kind,
            FieldKind::Money
        );
    }
}
