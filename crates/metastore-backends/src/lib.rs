//! # Metastore Backends
//!
//! Implementations of [`metastore_core::DataObjectBackend`] for three kinds of storage.
//!
//! ## Supported Backends
//!
//! - **EmbeddedStoreBackend**: in-process [`metastore_engine::DocumentEngine`], driven on the
//!   tokio blocking pool
//! - **RemoteStoreBackend**: a network-reachable document store over its REST API, plain or
//!   SigV4-signed
//! - **KeyValueBackend**: a DynamoDB-style key-value store, optionally paired with a remote
//!   document store for search
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use metastore_backends::EmbeddedStoreBackend;
//! use metastore_core::{DataObjectBackend, GetDataObjectRequest, PutDataObjectRequest};
//! use metastore_engine::DocumentEngine;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = EmbeddedStoreBackend::new(Arc::new(DocumentEngine::new()), false);
//!
//!     let put = backend
//!         .put(PutDataObjectRequest::new("agents", json!({ "name": "a1" })))
//!         .await?;
//!     let get = backend.get(GetDataObjectRequest::new("agents", put.id())).await?;
//!     println!("{:?}", get.source());
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "remote")]
pub mod aws;

#[cfg(feature = "embedded")]
mod embedded;

#[cfg(feature = "key-value")]
pub mod kv;

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedStoreBackend;

#[cfg(feature = "key-value")]
pub use kv::{DynamoDbStore, KeyValueBackend, KeyValueStore, KvStoreError, MemoryKeyValueStore};

#[cfg(feature = "remote")]
pub use remote::{RemoteClient, RemoteError, RemoteStoreBackend, Transport};
