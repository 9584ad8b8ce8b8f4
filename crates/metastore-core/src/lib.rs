//! # Metastore Core
//!
//! The storage-agnostic contract of the metastore data object layer.
//!
//! Callers build one of five requests, hand it to a [`DataObjectBackend`] (usually through the
//! facade in the `metastore` crate) and get back a response carrying a [`ResponseParser`] over the
//! raw backend result.
//!
//! ## Quick Start
//!
//! ```rust
//! use metastore_core::{GetDataObjectRequest, PutDataObjectRequest};
//! use serde_json::json;
//!
//! let put = PutDataObjectRequest::new("agents", json!({ "name": "a1" })).with_tenant_id("t1");
//! assert_eq!(put.index(), "agents");
//! assert!(put.id().is_none());
//!
//! let get = GetDataObjectRequest::new("agents", "abc").with_tenant_id("t1");
//! assert_eq!(get.tenant_id(), Some("t1"));
//! ```

pub mod access;
pub mod backend;
pub mod error;
pub mod handle;
pub mod parser;
pub mod request;
pub mod response;
pub mod tenant;

pub use access::{AccessLevel, Capability};
pub use backend::DataObjectBackend;
pub use error::{DataObjectError, ErrorKind, Result};
pub use handle::OperationHandle;
pub use parser::{
    GetResult, Hits, ResponseParser, SearchHit, SearchResult, ShardInfo, TotalHits, WriteResult,
};
pub use request::{
    DataObject, DeleteDataObjectRequest, FetchSource, GetDataObjectRequest, PutDataObjectRequest,
    SearchDataObjectRequest, UpdateDataObjectRequest,
};
pub use response::{
    DeleteDataObjectResponse, GetDataObjectResponse, PutDataObjectResponse,
    SearchDataObjectResponse, UpdateDataObjectResponse,
};
pub use tenant::{DEFAULT_TENANT, TENANT_ID_FIELD};
