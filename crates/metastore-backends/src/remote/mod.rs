//! Backend over a remote document store reached through its REST API
//!
//! The same backend serves plain (optionally basic-auth) and SigV4-signed endpoints; only the
//! [`Transport`] differs. Requests are translated into the client's typed requests, and typed
//! responses are handed back through a serialize/parse round trip so callers only ever see the
//! uniform parseable handle.

mod client;
pub mod types;

pub use client::{RemoteClient, Transport};

use async_trait::async_trait;
use metastore_core::access;
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
use thiserror::Error;
use tracing::{debug, error, info};

use crate::aws::SignRequestError;
use types::{DeleteRequest, GetRequest, IndexRequest, OpType, SearchRequest, UpdateRequest};

/// Errors raised by [`RemoteClient`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Remote returned {status}: {reason}")]
    Status {
        status: u16,
        error_type: Option<String>,
        reason: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request signing failed: {0}")]
    Signing(#[from] SignRequestError),

    /// Refused by the access-level enforcement point
    #[error("{0}")]
    Denied(String),
}

impl RemoteError {
    fn into_data_object_error(self, index: &str, id: &str) -> DataObjectError {
        match self {
            RemoteError::Status { status: 409, reason, .. } => {
                error!(index, id, %reason, "Remote reported a version conflict");
                DataObjectError::Conflict(reason)
            }
            RemoteError::Status { status: 404, reason, .. } => DataObjectError::NotFound(format!(
                "Failed to find {} in index {}: {}",
                id, index, reason
            )),
            RemoteError::Status { status: 400, reason, .. } => DataObjectError::Validation(reason),
            RemoteError::InvalidRequest(msg) => DataObjectError::Validation(msg),
            RemoteError::Denied(msg) => DataObjectError::PermissionDenied(msg),
            other => DataObjectError::BackendUnavailable(other.to_string()),
        }
    }
}

/// [`DataObjectBackend`] over a [`RemoteClient`]
#[derive(Debug, Clone)]
pub struct RemoteStoreBackend {
    client: RemoteClient,
    multi_tenancy: bool,
}

impl RemoteStoreBackend {
    pub fn new(client: RemoteClient, multi_tenancy: bool) -> Self {
        Self {
            client,
            multi_tenancy,
        }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// How the stored document `id` relates to `tenant_id`
    async fn ownership(&self, index: &str, id: &str, tenant_id: &str) -> Result<Ownership> {
        let response = self
            .client
            .get(GetRequest {
                index: index.to_string(),
                id: id.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| e.into_data_object_error(index, id))?;
        Ok(Ownership::of(response.found, response.source.as_ref(), tenant_id))
    }
}

#[async_trait]
impl DataObjectBackend for RemoteStoreBackend {
    fn name(&self) -> &str {
        if self.client.is_signed() {
            "remote-signed"
        } else {
            "remote"
        }
    }

    async fn put(&self, request: PutDataObjectRequest) -> Result<PutDataObjectResponse> {
        let mut document = serialize_document(request.index(), request.data_object())?;
        if self.multi_tenancy {
            let tenant_id = tenant_or_default(request.tenant_id());
            stamp_tenant(&mut document, tenant_id)?;
            if let Some(id) = request.id() {
                let ownership =
                    access::elevated(self.ownership(request.index(), id, tenant_id)).await?;
                if ownership == Ownership::Foreign {
                    return Err(DataObjectError::Conflict(format!(
                        "[{}][{}]: document id is already in use",
                        request.index(),
                        id
                    )));
                }
            }
        }
        let op_type = match (request.id(), request.overwrite_if_exists()) {
            (Some(_), false) => Some(OpType::Create),
            _ => None,
        };
        let typed = IndexRequest {
            index: request.index().to_string(),
            id: request.id().map(str::to_string),
            op_type,
            document,
        };

        let response = access::elevated(self.client.index(typed))
            .await
            .map_err(|e| e.into_data_object_error(request.index(), request.id().unwrap_or("")))?;
        info!(
            backend = self.name(),
            index = %response.index,
            id = %response.id,
            result = %response.result,
            "Indexed data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        Ok(PutDataObjectResponse::new(response.id, true, Some(parser)))
    }

    async fn get(&self, request: GetDataObjectRequest) -> Result<GetDataObjectResponse> {
        let fetch = request.fetch_source();
        // ownership needs the tenant field, so project locally in that case
        let typed = if self.multi_tenancy {
            GetRequest {
                index: request.index().to_string(),
                id: request.id().to_string(),
                ..Default::default()
            }
        } else {
            GetRequest {
                index: request.index().to_string(),
                id: request.id().to_string(),
                source: (!fetch.fetch_source).then_some(false),
                source_includes: fetch.includes.clone(),
                source_excludes: fetch.excludes.clone(),
            }
        };

        let mut response = access::elevated(self.client.get(typed))
            .await
            .map_err(|e| e.into_data_object_error(request.index(), request.id()))?;
        debug!(
            backend = self.name(),
            index = request.index(),
            id = request.id(),
            found = response.found,
            "Fetched data object"
        );

        if self.multi_tenancy && response.found {
            let tenant_id = tenant_or_default(request.tenant_id());
            if Ownership::of(true, response.source.as_ref(), tenant_id) != Ownership::Owned {
                response.found = false;
                response.version = None;
                response.seq_no = None;
                response.primary_term = None;
                response.source = None;
            } else {
                response.source = response
                    .source
                    .take()
                    .filter(|_| fetch.fetch_source)
                    .map(|mut source| {
                        strip_tenant(&mut source);
                        fetch.apply(source)
                    });
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
            let ownership =
                access::elevated(self.ownership(request.index(), request.id(), tenant_id)).await?;
            if ownership != Ownership::Owned {
                return Err(DataObjectError::NotFound(format!(
                    "Failed to find {} in index {}",
                    request.id(),
                    request.index()
                )));
            }
        }

        let typed = UpdateRequest {
            index: request.index().to_string(),
            id: request.id().to_string(),
            doc,
            if_seq_no: request.if_seq_no(),
            if_primary_term: request.if_primary_term(),
        };
        let response = access::elevated(self.client.update(typed))
            .await
            .map_err(|e| e.into_data_object_error(request.index(), request.id()))?;
        info!(
            backend = self.name(),
            index = request.index(),
            id = request.id(),
            result = %response.result,
            "Updated data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        let updated = response.result != "noop";
        Ok(UpdateDataObjectResponse::new(response.id, updated, Some(parser)))
    }

    async fn delete(&self, request: DeleteDataObjectRequest) -> Result<DeleteDataObjectResponse> {
        if self.multi_tenancy {
            let tenant_id = tenant_or_default(request.tenant_id());
            let ownership =
                access::elevated(self.ownership(request.index(), request.id(), tenant_id)).await?;
            if ownership != Ownership::Owned {
                debug!(
                    backend = self.name(),
                    index = request.index(),
                    id = request.id(),
                    "Delete target missing for tenant"
                );
                return Ok(DeleteDataObjectResponse::new(request.id(), false, None));
            }
        }

        let typed = DeleteRequest {
            index: request.index().to_string(),
            id: request.id().to_string(),
        };
        let response = access::elevated(self.client.delete(typed))
            .await
            .map_err(|e| e.into_data_object_error(request.index(), request.id()))?;
        info!(
            backend = self.name(),
            index = request.index(),
            id = request.id(),
            result = %response.result,
            "Deleted data object"
        );

        let parser = ResponseParser::from_serializable(&response)?;
        let deleted = response.result == "deleted";
        Ok(DeleteDataObjectResponse::new(response.id, deleted, Some(parser)))
    }

    async fn search(&self, request: SearchDataObjectRequest) -> Result<SearchDataObjectResponse> {
        let mut source = request.source().clone();
        if self.multi_tenancy {
            scope_search_source(&mut source, tenant_or_default(request.tenant_id()));
        }
        let query = serde_json::Value::Object(source).to_string();
        let typed = SearchRequest::from_json(&query)
            .map_err(|e| DataObjectError::Validation(e.to_string()))?
            .with_index(request.indices().to_vec());

        let indices = request.indices().join(",");
        let mut response = access::elevated(self.client.search(typed))
            .await
            .map_err(|e| e.into_data_object_error(&indices, "_search"))?;
        if self.multi_tenancy {
            for source in response.hits.hits.iter_mut().filter_map(|hit| hit.source.as_mut()) {
                strip_tenant(source);
            }
        }
        info!(
            backend = self.name(),
            index = %indices,
            hits = response.hits.hits.len(),
            "Searched data objects"
        );

        Ok(SearchDataObjectResponse::new(
            ResponseParser::from_serializable(&response)?,
        ))
    }
}
