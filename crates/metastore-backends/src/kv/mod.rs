//! Backend over a distributed key-value store
//!
//! Items are keyed by `(tenant_id, id)` and hold the whole serialized document as a JSON string
//! under `_source`. The table name is the index name without `.` characters. The store has no
//! query capability, so search is delegated to a paired remote document store when one is
//! configured.
//!
//! Two behaviors differ from the document stores: put always reports `created`, and delete
//! always reports `deleted`, whether or not an item existed.

mod dynamodb;
mod store;

pub use dynamodb::DynamoDbStore;
pub use store::{
    item_key, AttributeValue, Item, KeyValueStore, KvStoreError, MemoryKeyValueStore, HASH_KEY,
    RANGE_KEY, SOURCE_ATTRIBUTE,
};

use async_trait::async_trait;
use metastore_core::access;
use metastore_core::request::serialize_document;
use metastore_core::tenant::tenant_or_default;
use metastore_core::{
    DataObjectBackend, DataObjectError, DeleteDataObjectRequest, DeleteDataObjectResponse,
    GetDataObjectRequest, GetDataObjectResponse, GetResult, PutDataObjectRequest,
    PutDataObjectResponse, ResponseParser, Result, SearchDataObjectRequest,
    SearchDataObjectResponse, ShardInfo, UpdateDataObjectRequest, UpdateDataObjectResponse,
    WriteResult,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::remote::RemoteStoreBackend;

/// Table backing an index
pub fn table_name(index: &str) -> String {
    index.replace('.', "")
}

fn map_store_error(err: KvStoreError, table: &str) -> DataObjectError {
    match err {
        KvStoreError::InvalidKey(msg) => DataObjectError::Validation(msg),
        KvStoreError::Denied(msg) => DataObjectError::PermissionDenied(msg),
        KvStoreError::Service { ref code, ref message } if code == "ValidationException" => {
            DataObjectError::Validation(format!("{} ({})", message, table))
        }
        other => DataObjectError::BackendUnavailable(format!("table {}: {}", table, other)),
    }
}

/// [`DataObjectBackend`] over a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct KeyValueBackend {
    store: Arc<dyn KeyValueStore>,
    search: Option<RemoteStoreBackend>,
}

impl KeyValueBackend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            search: None,
        }
    }

    /// Route searches to `search`
    pub fn with_search_backend(mut self, search: RemoteStoreBackend) -> Self {
        self.search = Some(search);
        self
    }

    pub fn has_search_backend(&self) -> bool {
        self.search.is_some()
    }
}

#[async_trait]
impl DataObjectBackend for KeyValueBackend {
    fn name(&self) -> &str {
        "key-value"
    }

    async fn put(&self, request: PutDataObjectRequest) -> Result<PutDataObjectResponse> {
        let document = serialize_document(request.index(), request.data_object())?;
        let source = Value::Object(document).to_string();
        let tenant_id = tenant_or_default(request.tenant_id());
        let id = request
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let table = table_name(request.index());

        let mut item = item_key(tenant_id, &id);
        item.insert(SOURCE_ATTRIBUTE.to_string(), AttributeValue::S(source));
        access::elevated(self.store.put_item(&table, item))
            .await
            .map_err(|e| map_store_error(e, &table))?;
        info!(backend = self.name(), index = request.index(), id = %id, "Stored data object");

        let parser = ResponseParser::from_serializable(&WriteResult {
            index: request.index().to_string(),
            id: id.clone(),
            version: None,
            result: "created".to_string(),
            seq_no: None,
            primary_term: None,
            shards: Some(ShardInfo::single()),
        })?;
        Ok(PutDataObjectResponse::new(id, true, Some(parser)))
    }

    async fn get(&self, request: GetDataObjectRequest) -> Result<GetDataObjectResponse> {
        let tenant_id = tenant_or_default(request.tenant_id());
        let table = table_name(request.index());
        let item = access::elevated(
            self.store
                .get_item(&table, item_key(tenant_id, request.id())),
        )
        .await
        .map_err(|e| map_store_error(e, &table))?;

        let source = item
            .as_ref()
            .and_then(|item| item.get(SOURCE_ATTRIBUTE))
            .and_then(AttributeValue::as_s)
            .map(|raw| match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) | Err(_) => Err(DataObjectError::BackendUnavailable(format!(
                    "Stored source of {} in table {} is not a JSON object",
                    request.id(),
                    table
                ))),
            })
            .transpose()?;
        debug!(
            backend = self.name(),
            index = request.index(),
            id = request.id(),
            found = source.is_some(),
            "Fetched data object"
        );

        let source: Option<Map<String, Value>> =
            source.map(|s| request.fetch_source().apply(s));
        let found = source.is_some();
        let parser = ResponseParser::from_serializable(&GetResult {
            index: request.index().to_string(),
            id: request.id().to_string(),
            found,
            version: None,
            seq_no: None,
            primary_term: None,
            source: source.clone().filter(|_| request.fetch_source().fetch_source),
        })?;

        match source {
            Some(source) => Ok(GetDataObjectResponse::new(
                request.id(),
                true,
                Some(parser),
                source,
            )),
            None => Ok(GetDataObjectResponse::not_found(request.id(), Some(parser))),
        }
    }

    async fn update(&self, request: UpdateDataObjectRequest) -> Result<UpdateDataObjectResponse> {
        Err(DataObjectError::Unsupported(format!(
            "update of {} in index {} is not supported by the key-value backend",
            request.id(),
            request.index()
        )))
    }

    async fn delete(&self, request: DeleteDataObjectRequest) -> Result<DeleteDataObjectResponse> {
        let tenant_id = tenant_or_default(request.tenant_id());
        let table = table_name(request.index());
        access::elevated(
            self.store
                .delete_item(&table, item_key(tenant_id, request.id())),
        )
        .await
        .map_err(|e| map_store_error(e, &table))?;
        info!(backend = self.name(), index = request.index(), id = request.id(), "Deleted data object");

        let parser = ResponseParser::from_serializable(&WriteResult {
            index: request.index().to_string(),
            id: request.id().to_string(),
            version: None,
            result: "deleted".to_string(),
            seq_no: None,
            primary_term: None,
            shards: Some(ShardInfo::single()),
        })?;
        Ok(DeleteDataObjectResponse::new(request.id(), true, Some(parser)))
    }

    async fn search(&self, request: SearchDataObjectRequest) -> Result<SearchDataObjectResponse> {
        match &self.search {
            Some(search) => {
                debug!(
                    backend = self.name(),
                    delegate = search.name(),
                    "Delegating search"
                );
                search.search(request).await
            }
            None => Err(DataObjectError::Unsupported(format!(
                "search over {} requires a search backend paired with the key-value store",
                request.indices().join(",")
            ))),
        }
    }
}
