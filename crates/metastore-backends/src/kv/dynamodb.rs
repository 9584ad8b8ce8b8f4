//! DynamoDB over its JSON 1.0 HTTP protocol

use async_trait::async_trait;
use metastore_core::access::{self, Capability};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::store::{Item, KeyValueStore, KvStoreError};
use crate::aws::{
    Credentials, ProvideCredentials, RequestSigner, SigV4Signer, StaticProvider, LOCAL_REGION,
};

const TARGET_PREFIX: &str = "DynamoDB_20120810";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const LOCAL_ENDPOINT: &str = "http://localhost:8000";
const SIGNING_SERVICE: &str = "dynamodb";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutItemInput<'a> {
    table_name: &'a str,
    item: &'a Item,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyInput<'a> {
    table_name: &'a str,
    key: &'a Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistent_read: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetItemOutput {
    #[serde(default)]
    item: Option<Item>,
}

/// DynamoDB client for single-item operations
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    http: reqwest::Client,
    endpoint: Url,
    signer: RequestSigner,
}

impl DynamoDbStore {
    pub fn new(http: reqwest::Client, endpoint: Url, signer: RequestSigner) -> Self {
        Self {
            http,
            endpoint,
            signer,
        }
    }

    /// Regional endpoint, or the local emulator with placeholder credentials for region `local`
    pub fn for_region(
        http: reqwest::Client,
        region: &str,
        credentials: Arc<dyn ProvideCredentials>,
    ) -> Result<Self, KvStoreError> {
        let (endpoint, credentials) = if region == LOCAL_REGION {
            let placeholder: Arc<dyn ProvideCredentials> = Arc::new(StaticProvider::new(
                Credentials::new("dummykey", "dummysecret"),
            ));
            (LOCAL_ENDPOINT.to_string(), placeholder)
        } else {
            (format!("https://dynamodb.{}.amazonaws.com", region), credentials)
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| KvStoreError::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let signer = RequestSigner::new(SigV4Signer::new(region, SIGNING_SERVICE), credentials);
        Ok(Self::new(http, endpoint, signer))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: Serialize>(&self, operation: &str, input: &T) -> Result<Value, KvStoreError> {
        access::check(Capability::Network).map_err(|e| KvStoreError::Denied(e.to_string()))?;

        let body = serde_json::to_vec(input).map_err(|e| KvStoreError::Decode(e.to_string()))?;
        let headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            (
                "x-amz-target".to_string(),
                format!("{}.{}", TARGET_PREFIX, operation),
            ),
        ];

        let mut builder = self.http.post(self.endpoint.clone());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = self
            .signer
            .sign(builder, "POST", &self.endpoint, &headers, &body)
            .await?;

        debug!(operation, endpoint = %self.endpoint, "Calling DynamoDB");
        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| KvStoreError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| KvStoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|e| KvStoreError::Decode(e.to_string()))
    }
}

fn service_error(status: u16, body: &[u8]) -> KvStoreError {
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let code = parsed
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    if code == "ResourceNotFoundException" {
        KvStoreError::ResourceNotFound(message)
    } else {
        KvStoreError::Service { code, message }
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    fn name(&self) -> &str {
        "dynamodb"
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), KvStoreError> {
        self.call(
            "PutItem",
            &PutItemInput {
                table_name: table,
                item: &item,
            },
        )
        .await?;
        Ok(())
    }

    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, KvStoreError> {
        let output = self
            .call(
                "GetItem",
                &KeyInput {
                    table_name: table,
                    key: &key,
                    consistent_read: Some(true),
                },
            )
            .await?;
        let output: GetItemOutput =
            serde_json::from_value(output).map_err(|e| KvStoreError::Decode(e.to_string()))?;
        Ok(output.item)
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), KvStoreError> {
        self.call(
            "DeleteItem",
            &KeyInput {
                table_name: table,
                key: &key,
                consistent_read: None,
            },
        )
        .await?;
        Ok(())
    }
}
