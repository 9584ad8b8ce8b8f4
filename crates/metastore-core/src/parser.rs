//! Parseable handle over raw backend results
//!
//! Every backend renders its native result into the document-engine JSON shapes below and wraps
//! the text in a [`ResponseParser`]. Nothing is deserialized until the caller asks.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{DataObjectError, Result};

/// Deferred-materialization wrapper over a raw JSON response
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseParser {
    raw: Arc<str>,
}

impl ResponseParser {
    /// Wrap already-rendered JSON text
    pub fn from_json(raw: impl Into<String>) -> Self {
        Self {
            raw: Arc::from(raw.into()),
        }
    }

    /// Render a value through its serializer and wrap the result.
    ///
    /// This is the generator half of the generator-to-parser round trip used to convert native
    /// response objects into the uniform shape.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let raw = serde_json::to_string(value).map_err(|e| {
            DataObjectError::BackendUnavailable(format!("Failed to render response: {}", e))
        })?;
        Ok(Self::from_json(raw))
    }

    /// The raw JSON text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Deserialize into any type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.raw).map_err(|e| {
            DataObjectError::Validation(format!("Response does not match requested type: {}", e))
        })
    }

    /// Deserialize into a generic JSON value
    pub fn to_value(&self) -> Result<Value> {
        self.parse()
    }
}

impl fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseParser")
            .field("len", &self.raw.len())
            .finish()
    }
}

/// Shard accounting attached to write results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
}

impl ShardInfo {
    /// A single successful copy
    pub fn single() -> Self {
        Self {
            total: 1,
            successful: 1,
            failed: 0,
        }
    }
}

/// Uniform shape of index/update/delete acknowledgements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// `created`, `updated`, `deleted`, `not_found` or `noop`
    pub result: String,
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardInfo>,
}

/// Uniform shape of a point lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
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

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,
}

/// Total hit count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    /// `eq` or `gte`
    pub relation: String,
}

/// Hits section of a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    pub hits: Vec<SearchHit>,
}

/// Uniform shape of a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: Hits,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_write_result() {
        let parser = ResponseParser::from_json(
            r#"{"_index":"agents","_id":"1","_version":1,"result":"created",
                "_seq_no":0,"_primary_term":1,"_shards":{"total":1,"successful":1,"failed":0}}"#,
        );
        let result: WriteResult = parser.parse().unwrap();
        assert_eq!(result.id, "1");
        assert_eq!(result.result, "created");
        assert_eq!(result.shards, Some(ShardInfo::single()));
    }

    #[test]
    fn test_round_trip_through_serializer() {
        let get = GetResult {
            index: "agents".to_string(),
            id: "x".to_string(),
            found: false,
            version: None,
            seq_no: None,
            primary_term: None,
            source: None,
        };
        let parser = ResponseParser::from_serializable(&get).unwrap();
        assert_eq!(parser.to_value().unwrap(), json!({"_index": "agents", "_id": "x", "found": false}));
        let back: GetResult = parser.parse().unwrap();
        assert_eq!(back, get);
    }

    #[test]
    fn test_mismatched_type_is_validation_error() {
        let parser = ResponseParser::from_json(r#"{"hits": 3}"#);
        let err = parser.parse::<SearchResult>().unwrap_err();
        assert!(matches!(err, DataObjectError::Validation(_)));
    }
}
