//! Backend-agnostic entry point

use metastore_core::access;
use metastore_core::{
    DataObjectBackend, DataObjectError, DeleteDataObjectRequest, DeleteDataObjectResponse,
    GetDataObjectRequest, GetDataObjectResponse, OperationHandle, PutDataObjectRequest,
    PutDataObjectResponse, Result, SearchDataObjectRequest, SearchDataObjectResponse,
    UpdateDataObjectRequest, UpdateDataObjectResponse, DEFAULT_TENANT,
};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::StoreConfig;
use crate::factory::create_backend;

/// Message of the validation error for a missing tenant under multi-tenancy
pub const TENANT_REQUIRED: &str = "A tenant ID is required when multitenancy is enabled.";

/// Requests that carry an optional tenant id
trait TenantScoped: Sized {
    fn tenant(&self) -> Option<&str>;
    fn scoped_to(self, tenant_id: &str) -> Self;
}

macro_rules! tenant_scoped {
    ($($request:ty),* $(,)?) => {
        $(
            impl TenantScoped for $request {
                fn tenant(&self) -> Option<&str> {
                    self.tenant_id()
                }

                fn scoped_to(self, tenant_id: &str) -> Self {
                    self.with_tenant_id(tenant_id)
                }
            }
        )*
    };
}

tenant_scoped!(
    PutDataObjectRequest,
    GetDataObjectRequest,
    UpdateDataObjectRequest,
    DeleteDataObjectRequest,
    SearchDataObjectRequest,
);

/// Data object client.
///
/// Wraps one [`DataObjectBackend`] and exposes every operation three ways: `*_async` returns an
/// [`OperationHandle`] immediately and runs on the client's executor (or the ambient runtime),
/// `*_async_on` runs on a caller-supplied runtime, and the plain `async fn` awaits the handle.
///
/// With multi-tenancy enabled every request must carry a non-empty tenant id. Otherwise a
/// missing tenant id is replaced by [`DEFAULT_TENANT`].
#[derive(Debug, Clone)]
pub struct DataObjectClient {
    backend: Arc<dyn DataObjectBackend>,
    multi_tenancy: bool,
    executor: Option<Handle>,
}

impl DataObjectClient {
    pub fn new(backend: Arc<dyn DataObjectBackend>, multi_tenancy: bool) -> Self {
        Self {
            backend,
            multi_tenancy,
            executor: None,
        }
    }

    /// Build the configured backend and wrap it
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(create_backend(config)?, config.multi_tenancy))
    }

    /// Default runtime for `*_async` calls
    pub fn with_executor(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn backend(&self) -> &Arc<dyn DataObjectBackend> {
        &self.backend
    }

    pub fn multi_tenancy(&self) -> bool {
        self.multi_tenancy
    }

    fn resolve_tenant<R: TenantScoped>(&self, request: R) -> Result<R> {
        match request.tenant() {
            Some(tenant) if !tenant.is_empty() => Ok(request),
            _ if self.multi_tenancy => Err(DataObjectError::Validation(TENANT_REQUIRED.to_string())),
            _ => Ok(request.scoped_to(DEFAULT_TENANT)),
        }
    }

    fn dispatch<R, T, F, Fut>(&self, request: R, runtime: Option<&Handle>, op: F) -> OperationHandle<T>
    where
        R: TenantScoped,
        T: Send + 'static,
        F: FnOnce(Arc<dyn DataObjectBackend>, R) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let request = match self.resolve_tenant(request) {
            Ok(request) => request,
            Err(e) => return OperationHandle::ready(Err(e)),
        };
        let runtime = match runtime
            .cloned()
            .or_else(|| self.executor.clone())
            .or_else(|| Handle::try_current().ok())
        {
            Some(runtime) => runtime,
            None => {
                return OperationHandle::ready(Err(DataObjectError::Configuration(
                    "No tokio runtime available to run the operation".to_string(),
                )))
            }
        };

        // spawned tasks do not inherit task-locals
        let level = access::current();
        debug!(backend = self.backend.name(), ?level, "Dispatching data object operation");
        OperationHandle::spawn(
            &runtime,
            access::with_level(level, op(self.backend.clone(), request)),
        )
    }

    pub fn put_data_object_async(
        &self,
        request: PutDataObjectRequest,
    ) -> OperationHandle<PutDataObjectResponse> {
        self.put_dispatch(request, None)
    }

    pub fn put_data_object_async_on(
        &self,
        request: PutDataObjectRequest,
        runtime: &Handle,
    ) -> OperationHandle<PutDataObjectResponse> {
        self.put_dispatch(request, Some(runtime))
    }

    /// Store a document; the id is generated when the request has none
    pub async fn put_data_object(
        &self,
        request: PutDataObjectRequest,
    ) -> Result<PutDataObjectResponse> {
        self.put_data_object_async(request).await
    }

    fn put_dispatch(
        &self,
        request: PutDataObjectRequest,
        runtime: Option<&Handle>,
    ) -> OperationHandle<PutDataObjectResponse> {
        self.dispatch(request, runtime, |backend, request| async move {
            backend.put(request).await
        })
    }

    pub fn get_data_object_async(
        &self,
        request: GetDataObjectRequest,
    ) -> OperationHandle<GetDataObjectResponse> {
        self.get_dispatch(request, None)
    }

    pub fn get_data_object_async_on(
        &self,
        request: GetDataObjectRequest,
        runtime: &Handle,
    ) -> OperationHandle<GetDataObjectResponse> {
        self.get_dispatch(request, Some(runtime))
    }

    /// Fetch a document. Absence is a response with `found() == false`, not an error.
    pub async fn get_data_object(
        &self,
        request: GetDataObjectRequest,
    ) -> Result<GetDataObjectResponse> {
        self.get_data_object_async(request).await
    }

    fn get_dispatch(
        &self,
        request: GetDataObjectRequest,
        runtime: Option<&Handle>,
    ) -> OperationHandle<GetDataObjectResponse> {
        self.dispatch(request, runtime, |backend, request| async move {
            backend.get(request).await
        })
    }

    pub fn update_data_object_async(
        &self,
        request: UpdateDataObjectRequest,
    ) -> OperationHandle<UpdateDataObjectResponse> {
        self.update_dispatch(request, None)
    }

    pub fn update_data_object_async_on(
        &self,
        request: UpdateDataObjectRequest,
        runtime: &Handle,
    ) -> OperationHandle<UpdateDataObjectResponse> {
        self.update_dispatch(request, Some(runtime))
    }

    /// Merge a partial document. A stale concurrency token fails with a conflict.
    pub async fn update_data_object(
        &self,
        request: UpdateDataObjectRequest,
    ) -> Result<UpdateDataObjectResponse> {
        self.update_data_object_async(request).await
    }

    fn update_dispatch(
        &self,
        request: UpdateDataObjectRequest,
        runtime: Option<&Handle>,
    ) -> OperationHandle<UpdateDataObjectResponse> {
        self.dispatch(request, runtime, |backend, request| async move {
            backend.update(request).await
        })
    }

    pub fn delete_data_object_async(
        &self,
        request: DeleteDataObjectRequest,
    ) -> OperationHandle<DeleteDataObjectResponse> {
        self.delete_dispatch(request, None)
    }

    pub fn delete_data_object_async_on(
        &self,
        request: DeleteDataObjectRequest,
        runtime: &Handle,
    ) -> OperationHandle<DeleteDataObjectResponse> {
        self.delete_dispatch(request, Some(runtime))
    }

    pub async fn delete_data_object(
        &self,
        request: DeleteDataObjectRequest,
    ) -> Result<DeleteDataObjectResponse> {
        self.delete_data_object_async(request).await
    }

    fn delete_dispatch(
        &self,
        request: DeleteDataObjectRequest,
        runtime: Option<&Handle>,
    ) -> OperationHandle<DeleteDataObjectResponse> {
        self.dispatch(request, runtime, |backend, request| async move {
            backend.delete(request).await
        })
    }

    pub fn search_data_object_async(
        &self,
        request: SearchDataObjectRequest,
    ) -> OperationHandle<SearchDataObjectResponse> {
        self.search_dispatch(request, None)
    }

    pub fn search_data_object_async_on(
        &self,
        request: SearchDataObjectRequest,
        runtime: &Handle,
    ) -> OperationHandle<SearchDataObjectResponse> {
        self.search_dispatch(request, Some(runtime))
    }

    pub async fn search_data_object(
        &self,
        request: SearchDataObjectRequest,
    ) -> Result<SearchDataObjectResponse> {
        self.search_data_object_async(request).await
    }

    fn search_dispatch(
        &self,
        request: SearchDataObjectRequest,
        runtime: Option<&Handle>,
    ) -> OperationHandle<SearchDataObjectResponse> {
        self.dispatch(request, runtime, |backend, request| async move {
            backend.search(request).await
        })
    }
}
