//! Backend over the in-process document engine
//!
//! The engine is synchronous, so each call runs on the blocking pool of the runtime driving the
//! request, inside an elevated scope. Engine responses are rendered with their own serializer and
//! re-parsed into the uniform handle.

use async_trait::async_trait;
use metastore_core::access::{self, Capability};
use metastore_core::request::serialize_document;
use metastore_core::tenant::{
    scope_search_source, stamp_tenant, strip_tenant, tenant_or_default, Ownership,
};
use metastore_core::{
    DataObjectBackend, DataObjectError, DeleteDataObjectRequest, DeleteDataObjectResponse,
    GetDataObjectRequest, GetDataObjectResponse, PutDataObjectRequest, PutDataObjectResponse,
    ResponseParser, Result, SearchDataObjectRequest, SearchDataObjectResponse,
    UpdateDataObjectRequest, UpdateDataObjectResponse,
};
use metastore_engine::{
    DeleteRequest, DocWriteResult, DocumentEngine, EngineError, GetRequest, GetResponse,
    IndexRequest, OpType, SearchRequest, SourceFilter, UpdateRequest,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

fn map_engine_error(err: EngineError) -> DataObjectError {
    match err {
        EngineError::VersionConflict { index, id, reason } => {
            error!(index = %index, id = %id, %reason, "Document version conflict");
            DataObjectError::Conflict(format!("[{}][{}]: {}", index, id, reason))
        }
        EngineError::DocumentMissing { index, id } => {
            DataObjectError::NotFound(format!("Failed to find {} in index {}", id, index))
        }
        EngineError::IndexNotFound(index) => {
            DataObjectError::NotFound(format!("no such index [{}]", index))
        }
        EngineError::MapperParsing(msg) | EngineError::QueryParsing(msg) => {
            DataObjectError::Validation(msg)
        }
    }
}

fn to_bytes(index: &str, document: &Map<String, Value>) -> Result<Vec<u8>> {
    serde_json::to_vec(document).map_err(|e| {
        DataObjectError::Validation(format!(
            "Failed to serialize data object for index {}: {}",
            index, e
        ))
    })
}

/// [`DataObjectBackend`] over a shared [`DocumentEngine`]
#[derive(Debug, Clone)]
pub struct EmbeddedStoreBackend {
    engine: Arc<DocumentEngine>,
    multi_tenancy: bool,
}

impl EmbeddedStoreBackend {
    pub fn new(engine: Arc<DocumentEngine>, multi_tenancy: bool) -> Self {
        Self {
            engine,
            multi_tenancy,
        }
    }

    pub fn engine(&self) -> &Arc<DocumentEngine> {
        &self.engine
    }

    /// Run `f` against the engine on the blocking pool, in an elevated scope
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentEngine) -> std::result::Result<T, EngineError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            access::elevated_sync(|| {
                access::check(Capability::NativeEngine)?;
                f(&engine).map_err(map_engine_error)
            })
        })
        .await
        .map_err(|e| DataObjectError::BackendUnavailable(format!("Engine task failed: {}", e)))?
    }

    async fn ownership(&self, index: &str, id: &str, tenant_id: &str) -> Result<Ownership> {
        let request = GetRequest::new(index, id);
        let response = self.run(move |engine| engine.get(request)).await?;
        Ok(Ownership::of(response.found, response.source.as_ref(), tenant_id))
    }
}

#[async_trait]
impl DataObjectBackend for EmbeddedStoreBackend {
    fn name(&self) -> &str {
        "embedded"
    }

    async fn put(&self, request: PutDataObjectRequest) -> Result<PutDataObjectResponse> {
        let mut document = serialize_document(request.index(), request.data_object())?;
        if self.multi_tenancy {
            let tenant_id = tenant_or_default(request.tenant_id());
            stamp_tenant(&mut document, tenant_id)?;
            if let Some(id) = request.id() {
                if self.ownership(request.index(), id, tenant_id).await? == Ownership::Foreign {
                    return Err(DataObjectError::Conflict(format!(
                        "[{}][{}]: document id is already in use",
                        request.index(),
                        id
                    )));
                }
            }
        }

        let mut index_request = IndexRequest::new(request.index(), to_bytes(request.index(), &document)?);
        if let Some(id) = request.id() {
            index_request = index_request.with_id(id);
            if !request.overwrite_if_exists() {
                index_request = index_request.with_op_type(OpType::Create);
            }
        }

        let response = self.run(move |engine| engine.index(index_request)).await?;
        info!(
            backend = self.name(),
            index = %response.index,
            id = %response.id,
            seq_no = response.seq_no,
            "Indexed data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        Ok(PutDataObjectResponse::new(response.id, true, Some(parser)))
    }

    async fn get(&self, request: GetDataObjectRequest) -> Result<GetDataObjectResponse> {
        let fetch = request.fetch_source().clone();
        let mut get_request = GetRequest::new(request.index(), request.id());
        // ownership needs the tenant field, so project after the check in that case
        if !self.multi_tenancy {
            get_request = get_request.with_source_filter(SourceFilter {
                fetch: fetch.fetch_source,
                includes: fetch.includes.clone(),
                excludes: fetch.excludes.clone(),
            });
        }

        let mut response: GetResponse = self.run(move |engine| engine.get(get_request)).await?;
        debug!(
            backend = self.name(),
            index = request.index(),
            id = request.id(),
            found = response.found,
            "Fetched data object"
        );

        if self.multi_tenancy && response.found {
            let tenant_id = tenant_or_default(request.tenant_id());
            if Ownership::of(true, response.source.as_ref(), tenant_id) == Ownership::Owned {
                response.source = response
                    .source
                    .take()
                    .filter(|_| fetch.fetch_source)
                    .map(|mut source| {
                        strip_tenant(&mut source);
                        fetch.apply(source)
                    });
            } else {
                response = GetResponse {
                    index: response.index,
                    id: response.id,
                    found: false,
                    version: None,
                    seq_no: None,
                    primary_term: None,
                    source: None,
                };
            }
        }

        let parser = ResponseParser::from_serializable(&response)?;
        if !response.found {
            return Ok(GetDataObjectResponse::not_found(request.id(), Some(parser)));
        }
        Ok(GetDataObjectResponse::new(
            response.id,
            true,
            Some(parser),
            response.source.unwrap_or_default(),
        ))
    }

    async fn update(&self, request: UpdateDataObjectRequest) -> Result<UpdateDataObjectResponse> {
        let mut doc = serialize_document(request.index(), request.data_object())?;
        if self.multi_tenancy {
            let tenant_id = tenant_or_default(request.tenant_id());
            stamp_tenant(&mut doc, tenant_id)?;
            if self.ownership(request.index(), request.id(), tenant_id).await? != Ownership::Owned {
                return Err(DataObjectError::NotFound(format!(
                    "Failed to find {} in index {}",
                    request.id(),
                    request.index()
                )));
            }
        }

        let mut update_request =
            UpdateRequest::new(request.index(), request.id(), to_bytes(request.index(), &doc)?);
        if let Some(seq_no) = request.if_seq_no() {
            update_request = update_request.with_if_seq_no(seq_no);
        }
        if let Some(primary_term) = request.if_primary_term() {
            update_request = update_request.with_if_primary_term(primary_term);
        }

        let response = self.run(move |engine| engine.update(update_request)).await?;
        info!(
            backend = self.name(),
            index = %response.index,
            id = %response.id,
            result = ?response.result,
            "Updated data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        let updated = response.result != DocWriteResult::Noop;
        Ok(UpdateDataObjectResponse::new(response.id, updated, Some(parser)))
    }

    async fn delete(&self, request: DeleteDataObjectRequest) -> Result<DeleteDataObjectResponse> {
        if self.multi_tenancy {
            let tenant_id = tenant_or_default(request.tenant_id());
            if self.ownership(request.index(), request.id(), tenant_id).await? != Ownership::Owned {
                debug!(
                    backend = self.name(),
                    index = request.index(),
                    id = request.id(),
                    "Delete target missing for tenant"
                );
                return Ok(DeleteDataObjectResponse::new(request.id(), false, None));
            }
        }

        let delete_request = DeleteRequest::new(request.index(), request.id());
        let response = self.run(move |engine| engine.delete(delete_request)).await?;
        info!(
            backend = self.name(),
            index = %response.index,
            id = %response.id,
            result = ?response.result,
            "Deleted data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        let deleted = response.result == DocWriteResult::Deleted;
        Ok(DeleteDataObjectResponse::new(response.id, deleted, Some(parser)))
    }

    async fn search(&self, request: SearchDataObjectRequest) -> Result<SearchDataObjectResponse> {
        let mut source = request.source().clone();
        if self.multi_tenancy {
            scope_search_source(&mut source, tenant_or_default(request.tenant_id()));
        }
        let body = to_bytes("_search", &source)?;
        let search_request = SearchRequest::new(request.indices().to_vec(), body);

        let mut response = self.run(move |engine| engine.search(search_request)).await?;
        if self.multi_tenancy {
            for source in response.hits.hits.iter_mut().filter_map(|hit| hit.source.as_mut()) {
                strip_tenant(source);
            }
        }
        info!(
            backend = self.name(),
            index = %request.indices().join(","),
            total = response.hits.total.value,
            "Searched data objects"
        );

        Ok(SearchDataObjectResponse::new(
            ResponseParser::from_serializable(&response)?,
        ))
    }
}
