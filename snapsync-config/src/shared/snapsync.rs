use serde::Deserialize;

use crate::Config;
use crate::shared::{
    DeleteConfig, LogConfig, MetricsConfig, SchemaConfig, SentryConfig, SourceConfig, StoreConfig,
    SyncConfig, ValidationError,
};

/// Top-level configuration of the snapshot sync service.
///
/// This intentionally does not implement [`serde::Serialize`] since the source and Sentry
/// sections may carry secrets.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SnapsyncConfig {
    /// Table snapshots are taken from.
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub delete: DeleteConfig,
    /// Explicit table schema. The built-in job offer schema is used when absent.
    #[serde(default)]
    pub schema: Option<SchemaConfig>,
    #[serde(default)]
    pub log: LogConfig,
    /// Prometheus exporter, started only when the service runs on an interval.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
}

impl SnapsyncConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.store.validate()?;
        self.sync.validate()?;

        if let Some(schema) = &self.schema {
            schema.validate()?;
        }

        Ok(())
    }
}

impl Config for SnapsyncConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["store.enrichment.popular_languages"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_interval() {
        let config: SnapsyncConfig = serde_json::from_str(
            r#"{"source":{"json_file":{"path":"a.json","table_name":"t"}},"sync":{"interval_mins":0}}"#,
        )
        .unwrap();

        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "sync.interval_mins".to_string(),
                constraint: "must be greater than 0".to_string(),
            })
        );
    }

    #[test]
    fn rejects_access_key_without_secret() {
        let config: SnapsyncConfig = serde_json::from_str(
            r#"{"source":{"dynamodb":{"table_name":"ofertas_trabajo","access_key_id":"AKIA"}}}"#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn dynamodb_region_defaults() {
        let config: SnapsyncConfig =
            serde_json::from_str(r#"{"source":{"dynamodb":{"table_name":"ofertas_trabajo"}}}"#)
                .unwrap();

        let SourceConfig::DynamoDb { region, .. } = &config.source else {
            panic!("expected a dynamodb source");
        };
        assert_eq!(region, SourceConfig::DEFAULT_REGION);
        assert!(config.validate().is_ok());
    }
}
