use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, WriteRequest};
use bigdecimal::BigDecimal;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::conversions::numeric::decimal_to_text;
use crate::error::SyncResult;
use crate::source::{BatchDeleteOutcome, ScanPage, ScanRequest, SourceTable};
use crate::types::{ContinuationToken, PrimaryKey, RawRecord, RawValue};

/// Connection settings of a DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoDbSettings {
    pub table_name: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub page_size: Option<u32>,
    pub consistent_read: bool,
}

/// DynamoDB table read with `Scan` and deleted from with `BatchWriteItem`.
#[derive(Debug, Clone)]
pub struct DynamoDbSourceTable {
    client: Client,
    table_name: String,
    page_size: Option<u32>,
    consistent_read: bool,
}

impl DynamoDbSourceTable {
    /// Builds a client from the default AWS configuration chain, overridden by `settings`.
    pub async fn connect(settings: DynamoDbSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));

        if let Some(endpoint_url) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key.expose_secret(),
                None,
                None,
                "snapsync-explicit",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        info!(
            table = %settings.table_name,
            region = %settings.region,
            endpoint = ?settings.endpoint_url,
            explicit_credentials = settings.access_key_id.is_some(),
            "dynamodb source table initialized"
        );

        Self::new(
            Client::new(&sdk_config),
            settings.table_name,
            settings.page_size,
            settings.consistent_read,
        )
    }

    pub fn new(
        client: Client,
        table_name: String,
        page_size: Option<u32>,
        consistent_read: bool,
    ) -> Self {
        Self {
            client,
            table_name,
            page_size,
            consistent_read,
        }
    }
}

impl SourceTable for DynamoDbSourceTable {
    fn name(&self) -> &str {
        &self.table_name
    }

    async fn scan_page(&self, request: ScanRequest) -> SyncResult<ScanPage> {
        let (projection_expression, attribute_names) = match &request.projection {
            Some(names) => {
                let placeholders: Vec<String> =
                    (0..names.len()).map(|i| format!("#p{i}")).collect();
                let attribute_names = placeholders
                    .iter()
                    .cloned()
                    .zip(names.iter().cloned())
                    .collect::<HashMap<_, _>>();
                (Some(placeholders.join(", ")), Some(attribute_names))
            }
            None => (None, None),
        };

        let limit = request
            .limit
            .or(self.page_size)
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));

        let output = self
            .client
            .scan()
            .table_name(&self.table_name)
            .consistent_read(self.consistent_read)
            .set_limit(limit)
            .set_projection_expression(projection_expression)
            .set_expression_attribute_names(attribute_names)
            .set_exclusive_start_key(
                request
                    .start
                    .map(|token| key_to_item(token.into_last_evaluated_key())),
            )
            .send()
            .await?;

        let records: Vec<RawRecord> = output.items().iter().map(item_to_record).collect();
        let next = output
            .last_evaluated_key()
            .filter(|key| !key.is_empty())
            .map(|key| ContinuationToken::new(PrimaryKey::new(item_to_record(key))));

        debug!(
            table = %self.table_name,
            items = records.len(),
            scanned = output.scanned_count(),
            has_next = next.is_some(),
            "scanned dynamodb page"
        );

        Ok(ScanPage { records, next })
    }

    async fn delete_batch(&self, keys: Vec<PrimaryKey>) -> SyncResult<BatchDeleteOutcome> {
        let mut requests = Vec::with_capacity(keys.len());
        for key in keys {
            let delete = DeleteRequest::builder()
                .set_key(Some(key_to_item(key)))
                .build()?;
            requests.push(WriteRequest::builder().delete_request(delete).build());
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items()
            .and_then(|items| items.get(&self.table_name))
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|request| request.delete_request())
                    .map(|delete| PrimaryKey::new(item_to_record(delete.key())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(BatchDeleteOutcome { unprocessed })
    }
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> RawRecord {
    item.iter()
        .map(|(name, value)| (name.clone(), attribute_to_raw(value)))
        .collect()
}

fn key_to_item(key: PrimaryKey) -> HashMap<String, AttributeValue> {
    key.into_attributes()
        .into_iter()
        .map(|(name, value)| (name, raw_to_attribute(value)))
        .collect()
}

fn parse_number(value: &str) -> RawValue {
    match BigDecimal::from_str(value) {
        Ok(decimal) => RawValue::Number(decimal),
        Err(_) => RawValue::String(value.to_string()),
    }
}

/// Converts a DynamoDB attribute. Binary attributes have no raw counterpart and become null.
fn attribute_to_raw(value: &AttributeValue) -> RawValue {
    match value {
        AttributeValue::S(value) => RawValue::String(value.clone()),
        AttributeValue::N(value) => parse_number(value),
        AttributeValue::Bool(value) => RawValue::Bool(*value),
        AttributeValue::Null(_) => RawValue::Null,
        AttributeValue::L(values) => RawValue::List(values.iter().map(attribute_to_raw).collect()),
        AttributeValue::M(entries) => RawValue::Map(
            entries
                .iter()
                .map(|(name, value)| (name.clone(), attribute_to_raw(value)))
                .collect(),
        ),
        AttributeValue::Ss(values) => {
            RawValue::List(values.iter().cloned().map(RawValue::String).collect())
        }
        AttributeValue::Ns(values) => {
            RawValue::List(values.iter().map(|value| parse_number(value)).collect())
        }
        _ => RawValue::Null,
    }
}

fn raw_to_attribute(value: RawValue) -> AttributeValue {
    match value {
        RawValue::Null => AttributeValue::Null(true),
        RawValue::Bool(value) => AttributeValue::Bool(value),
        RawValue::Number(value) => AttributeValue::N(decimal_to_text(&value)),
        RawValue::String(value) => AttributeValue::S(value),
        RawValue::List(values) => {
            AttributeValue::L(values.into_iter().map(raw_to_attribute).collect())
        }
        RawValue::Map(entries) => AttributeValue::M(
            entries
                .into_iter()
                .map(|(name, value)| (name, raw_to_attribute(value)))
                .collect(),
        ),
    }
}
