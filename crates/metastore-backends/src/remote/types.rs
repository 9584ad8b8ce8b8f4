//! Typed requests and responses of the remote document store REST API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RemoteError;

/// `op_type` of an index call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Index,
    Create,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Index => "index",
            OpType::Create => "create",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub index: String,
    pub id: Option<String>,
    pub op_type: Option<OpType>,
    pub document: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    pub index: String,
    pub id: String,
    /// `Some(false)` suppresses the source
    pub source: Option<bool>,
    pub source_includes: Vec<String>,
    pub source_excludes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub index: String,
    pub id: String,
    pub doc: Map<String, Value>,
    pub if_seq_no: Option<i64>,
    pub if_primary_term: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub index: String,
    pub id: String,
}

/// Native search request. Known top-level keys are typed; everything else (aggregations,
/// highlighting, ...) is carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(skip)]
    pub index: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchRequest {
    /// Parse query text into a native request
    pub fn from_json(query: &str) -> Result<Self, RemoteError> {
        serde_json::from_str(query)
            .map_err(|e| RemoteError::InvalidRequest(format!("Invalid search source: {}", e)))
    }

    /// Replace the target index list
    pub fn with_index(mut self, index: Vec<String>) -> Self {
        self.index = index;
        self
    }
}

/// Shard accounting in write and search responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatistics {
    pub total: u32,
    pub successful: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u32>,
    pub failed: u32,
}

/// Acknowledgement of index, update and delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub result: String,
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardStatistics>,
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
}

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardStatistics>,
    pub hits: HitsMetadata,
}

/// Error body returned by the REST API
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorDetail {
    Structured {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_keeps_unknown_keys() {
        let request = SearchRequest::from_json(
            r#"{"query":{"match_all":{}},"size":5,"aggs":{"by_name":{"terms":{"field":"name"}}}}"#,
        )
        .unwrap()
        .with_index(vec!["agents".into()]);

        assert_eq!(request.size, Some(5));
        assert_eq!(request.index, vec!["agents".to_string()]);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["aggs"]["by_name"]["terms"]["field"], json!("name"));
        assert!(body.get("index").is_none());
    }

    #[test]
    fn test_search_request_rejects_bad_json() {
        assert!(SearchRequest::from_json("{").is_err());
    }

    #[test]
    fn test_error_body_forms() {
        let structured: ErrorBody = serde_json::from_str(
            r#"{"error":{"type":"version_conflict_engine_exception","reason":"conflict"},"status":409}"#,
        )
        .unwrap();
        assert!(matches!(
            structured.error,
            ErrorDetail::Structured { ref error_type, .. } if error_type == "version_conflict_engine_exception"
        ));

        let text: ErrorBody = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert!(matches!(text.error, ErrorDetail::Text(_)));
    }
}
