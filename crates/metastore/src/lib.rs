//! # Metastore
//!
//! One async CRUD + search contract over interchangeable storage backends. Upstream code builds
//! requests, hands them to a [`DataObjectClient`] and never branches on which store is active.
//!
//! ## Backend Types
//!
//! | `backend_type`                 | Store                                               |
//! |--------------------------------|-----------------------------------------------------|
//! | `embedded`                     | in-process document engine                          |
//! | `remote-document-store`        | remote document store, optional basic auth          |
//! | `remote-document-store-signed` | remote document store, SigV4 (`es` or `aoss`)       |
//! | `key-value`                    | DynamoDB, search through an optional paired store   |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metastore::{DataObjectClient, GetDataObjectRequest, PutDataObjectRequest, StoreConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // METASTORE_BACKEND_TYPE, METASTORE_ENDPOINT, ... override the defaults
//!     let config = StoreConfig::from_env()?;
//!     let client = DataObjectClient::from_config(&config)?;
//!
//!     let put = client
//!         .put_data_object(PutDataObjectRequest::new("agents", json!({ "name": "a1" })))
//!         .await?;
//!     let get = client
//!         .get_data_object(GetDataObjectRequest::new("agents", put.id()))
//!         .await?;
//!     println!("{:?}", get.source());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod factory;

pub use client::{DataObjectClient, TENANT_REQUIRED};
pub use config::{BackendType, StoreConfig};
pub use factory::create_backend;

pub use metastore_core::{
    access, AccessLevel, DataObject, DataObjectBackend, DataObjectError, DeleteDataObjectRequest,
    DeleteDataObjectResponse, ErrorKind, FetchSource, GetDataObjectRequest, GetDataObjectResponse,
    GetResult, OperationHandle, PutDataObjectRequest, PutDataObjectResponse, ResponseParser,
    Result, SearchDataObjectRequest, SearchDataObjectResponse, SearchResult, UpdateDataObjectRequest,
    UpdateDataObjectResponse, WriteResult, DEFAULT_TENANT, TENANT_ID_FIELD,
};
