//! Backend strategy trait

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;
use crate::request::{
    DeleteDataObjectRequest, GetDataObjectRequest, PutDataObjectRequest, SearchDataObjectRequest,
    UpdateDataObjectRequest,
};
use crate::response::{
    DeleteDataObjectResponse, GetDataObjectResponse, PutDataObjectResponse,
    SearchDataObjectResponse, UpdateDataObjectResponse,
};

/// A storage technology able to serve the data object contract (Object Safe).
///
/// Every call is one request/response round trip. Implementations translate their native
/// errors into [`crate::DataObjectError`] before returning and run their I/O inside
/// [`crate::access::elevated`].
#[async_trait]
pub trait DataObjectBackend: Send + Sync + Debug {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Store a document, generating an id if the request has none
    async fn put(&self, request: PutDataObjectRequest) -> Result<PutDataObjectResponse>;

    /// Fetch a document. A missing document is `Ok` with `found() == false`.
    async fn get(&self, request: GetDataObjectRequest) -> Result<GetDataObjectResponse>;

    /// Merge a partial document, honoring concurrency tokens when present
    async fn update(&self, request: UpdateDataObjectRequest) -> Result<UpdateDataObjectResponse>;

    /// Remove a document
    async fn delete(&self, request: DeleteDataObjectRequest) -> Result<DeleteDataObjectResponse>;

    /// Run a structured query. Backends without query support must fail, not return no hits.
    async fn search(&self, request: SearchDataObjectRequest) -> Result<SearchDataObjectResponse>;
}
