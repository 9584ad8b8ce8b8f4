//! # Metastore Engine
//!
//! A synchronous, in-process document engine. Documents live in named indices, carry a
//! per-index sequence number and an engine-wide primary term, and are queried with a subset of
//! the usual JSON query DSL.
//!
//! All request payloads cross the API as JSON bytes and all responses are plain serde types that
//! render to the familiar `_index` / `_id` / `_seq_no` shapes.
//!
//! ```rust
//! use metastore_engine::{DocumentEngine, GetRequest, IndexRequest};
//!
//! let engine = DocumentEngine::new();
//! let written = engine
//!     .index(IndexRequest::new("agents", br#"{"name":"a1"}"#.to_vec()).with_id("1"))
//!     .unwrap();
//! assert_eq!(written.seq_no, 0);
//!
//! let fetched = engine.get(GetRequest::new("agents", "1")).unwrap();
//! assert!(fetched.found);
//! ```

mod engine;
mod error;
pub mod query;
mod source;
mod types;

pub use engine::DocumentEngine;
pub use error::EngineError;
pub use query::Query;
pub use source::SourceFilter;
pub use types::{
    DeleteRequest, DocWriteResult, GetRequest, GetResponse, Hit, HitsMetadata, IndexRequest,
    OpType, SearchRequest, SearchResponse, ShardStats, TotalHits, UpdateRequest, WriteResponse,
};
