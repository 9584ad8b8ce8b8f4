//! Request and response types for the engine API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::source::SourceFilter;

/// Whether an index request may replace an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    /// Create or replace
    #[default]
    Index,
    /// Fail if the id already exists
    Create,
}

/// Store a document
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub index: String,
    pub id: Option<String>,
    pub op_type: OpType,
    /// JSON object bytes
    pub source: Vec<u8>,
}

impl IndexRequest {
    pub fn new(index: impl Into<String>, source: Vec<u8>) -> Self {
        Self {
            index: index.into(),
            id: None,
            op_type: OpType::Index,
            source,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_op_type(mut self, op_type: OpType) -> Self {
        self.op_type = op_type;
        self
    }
}

/// Fetch a document
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub index: String,
    pub id: String,
    pub source_filter: SourceFilter,
}

impl GetRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            source_filter: SourceFilter::default(),
        }
    }

    pub fn with_source_filter(mut self, filter: SourceFilter) -> Self {
        self.source_filter = filter;
        self
    }
}

/// Merge a partial document into an existing one
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub index: String,
    pub id: String,
    /// JSON object bytes of the partial document
    pub doc: Vec<u8>,
    pub if_seq_no: Option<i64>,
    pub if_primary_term: Option<i64>,
}

impl UpdateRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>, doc: Vec<u8>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            doc,
            if_seq_no: None,
            if_primary_term: None,
        }
    }

    pub fn with_if_seq_no(mut self, seq_no: i64) -> Self {
        self.if_seq_no = Some(seq_no);
        self
    }

    pub fn with_if_primary_term(mut self, primary_term: i64) -> Self {
        self.if_primary_term = Some(primary_term);
        self
    }
}

/// Remove a document
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub index: String,
    pub id: String,
}

impl DeleteRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
        }
    }
}

/// Query one or more indices
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Index names, `*`-suffixed patterns or `_all`
    pub indices: Vec<String>,
    /// JSON search source bytes (empty means match everything)
    pub source: Vec<u8>,
}

impl SearchRequest {
    pub fn new<I, S>(indices: I, source: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            indices: indices.into_iter().map(Into::into).collect(),
            source,
        }
    }
}

/// Outcome of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocWriteResult {
    Created,
    Updated,
    Deleted,
    NotFound,
    Noop,
}

/// Shard accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub total: u32,
    pub successful: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u32>,
    pub failed: u32,
}

impl ShardStats {
    pub(crate) fn write() -> Self {
        Self {
            total: 1,
            successful: 1,
            skipped: None,
            failed: 0,
        }
    }

    pub(crate) fn search(total: u32) -> Self {
        Self {
            total,
            successful: total,
            skipped: Some(0),
            failed: 0,
        }
    }
}

/// Acknowledgement for index, update and delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: i64,
    pub result: DocWriteResult,
    #[serde(rename = "_shards")]
    pub shards: ShardStats,
    #[serde(rename = "_seq_no")]
    pub seq_no: i64,
    #[serde(rename = "_primary_term")]
    pub primary_term: i64,
}

/// Point lookup result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub found: bool,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,
}

/// Total hit count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    pub relation: String,
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,
}

/// Hits section of a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsMetadata {
    pub total: TotalHits,
    pub max_score: Option<f64>,
    pub hits: Vec<Hit>,
}

/// Search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub took: u64,
    pub timed_out: bool,
    #[serde(rename = "_shards")]
    pub shards: ShardStats,
    pub hits: HitsMetadata,
}
