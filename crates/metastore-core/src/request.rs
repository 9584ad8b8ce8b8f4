//! Request types for the five data object operations

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{DataObjectError, Result};

/// A payload that can be stored as a document.
///
/// Implemented for every `Serialize` type. Serialization is deferred until a backend needs the
/// document, so a payload that does not serialize to a JSON object is reported by the backend as
/// a validation error.
pub trait DataObject: Send + Sync + Debug {
    /// Serialize into a JSON object
    fn to_document(&self) -> std::result::Result<Map<String, Value>, serde_json::Error>;
}

impl<T> DataObject for T
where
    T: Serialize + Send + Sync + Debug,
{
    fn to_document(&self) -> std::result::Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "data object must serialize to a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serialize a data object, mapping failures to validation errors
pub fn serialize_document(index: &str, data_object: &dyn DataObject) -> Result<Map<String, Value>> {
    data_object.to_document().map_err(|e| {
        DataObjectError::Validation(format!(
            "Failed to serialize data object for index {}: {}",
            index, e
        ))
    })
}

/// Source projection for get requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSource {
    /// Return the source at all
    pub fetch_source: bool,
    /// Fields to keep (empty = all). Dotted paths address nested fields.
    pub includes: Vec<String>,
    /// Fields to drop
    pub excludes: Vec<String>,
}

impl Default for FetchSource {
    fn default() -> Self {
        Self {
            fetch_source: true,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl FetchSource {
    /// Skip the source entirely
    pub fn none() -> Self {
        Self {
            fetch_source: false,
            ..Default::default()
        }
    }

    /// Keep only the listed fields
    pub fn includes<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            includes: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Drop the listed fields
    pub fn with_excludes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Apply this projection to a source map
    pub fn apply(&self, source: Map<String, Value>) -> Map<String, Value> {
        if !self.fetch_source {
            return Map::new();
        }
        let mut projected = if self.includes.is_empty() {
            source
        } else {
            let mut kept = Map::new();
            for path in &self.includes {
                copy_path(&source, &mut kept, path);
            }
            kept
        };
        for path in &self.excludes {
            remove_path(&mut projected, path);
        }
        projected
    }
}

fn copy_path(from: &Map<String, Value>, to: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = from.get(path) {
                to.insert(path.to_string(), value.clone());
            }
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = from.get(head) {
                let slot = to
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(slot) = slot {
                    copy_path(inner, slot, rest);
                }
            }
        }
    }
}

fn remove_path(map: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            map.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Create (or overwrite) a document
#[derive(Debug, Clone)]
pub struct PutDataObjectRequest {
    index: String,
    id: Option<String>,
    tenant_id: Option<String>,
    overwrite_if_exists: bool,
    data_object: Arc<dyn DataObject>,
}

impl PutDataObjectRequest {
    /// Store `data_object` in `index` under a generated id
    pub fn new(index: impl Into<String>, data_object: impl DataObject + 'static) -> Self {
        Self {
            index: index.into(),
            id: None,
            tenant_id: None,
            overwrite_if_exists: true,
            data_object: Arc::new(data_object),
        }
    }

    /// Store under an explicit id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// When false, document stores refuse to replace an existing id
    pub fn with_overwrite_if_exists(mut self, overwrite: bool) -> Self {
        self.overwrite_if_exists = overwrite;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn overwrite_if_exists(&self) -> bool {
        self.overwrite_if_exists
    }

    pub fn data_object(&self) -> &dyn DataObject {
        self.data_object.as_ref()
    }
}

/// Fetch a single document
#[derive(Debug, Clone)]
pub struct GetDataObjectRequest {
    index: String,
    id: String,
    tenant_id: Option<String>,
    fetch_source: FetchSource,
}

impl GetDataObjectRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            tenant_id: None,
            fetch_source: FetchSource::default(),
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_fetch_source(mut self, fetch_source: FetchSource) -> Self {
        self.fetch_source = fetch_source;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn fetch_source(&self) -> &FetchSource {
        &self.fetch_source
    }
}

/// Merge a partial document into an existing one
#[derive(Debug, Clone)]
pub struct UpdateDataObjectRequest {
    index: String,
    id: String,
    tenant_id: Option<String>,
    if_seq_no: Option<i64>,
    if_primary_term: Option<i64>,
    data_object: Arc<dyn DataObject>,
}

impl UpdateDataObjectRequest {
    pub fn new(
        index: impl Into<String>,
        id: impl Into<String>,
        data_object: impl DataObject + 'static,
    ) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            tenant_id: None,
            if_seq_no: None,
            if_primary_term: None,
            data_object: Arc::new(data_object),
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Only apply if the document still has this sequence number
    pub fn with_if_seq_no(mut self, seq_no: i64) -> Self {
        self.if_seq_no = Some(seq_no);
        self
    }

    /// Only apply if the document still has this primary term
    pub fn with_if_primary_term(mut self, primary_term: i64) -> Self {
        self.if_primary_term = Some(primary_term);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn if_seq_no(&self) -> Option<i64> {
        self.if_seq_no
    }

    pub fn if_primary_term(&self) -> Option<i64> {
        self.if_primary_term
    }

    pub fn data_object(&self) -> &dyn DataObject {
        self.data_object.as_ref()
    }
}

/// Remove a document
#[derive(Debug, Clone)]
pub struct DeleteDataObjectRequest {
    index: String,
    id: String,
    tenant_id: Option<String>,
}

impl DeleteDataObjectRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            tenant_id: None,
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Run an opaque structured query across one or more indices.
///
/// The search source (`query`, `size`, `sort`, ...) is forwarded untouched apart from tenant
/// scoping when multi-tenancy is on.
#[derive(Debug, Clone)]
pub struct SearchDataObjectRequest {
    indices: Vec<String>,
    tenant_id: Option<String>,
    source: Map<String, Value>,
}

impl SearchDataObjectRequest {
    /// Search `indices` with a JSON search source. A non-object source is a validation error.
    pub fn new<I, S>(indices: I, source: Value) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = match source {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DataObjectError::Validation(format!(
                    "search source must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        let indices: Vec<String> = indices.into_iter().map(Into::into).collect();
        if indices.is_empty() {
            return Err(DataObjectError::Validation(
                "search requires at least one index".to_string(),
            ));
        }
        Ok(Self {
            indices,
            tenant_id: None,
            source,
        })
    }

    /// Parse the search source from query text
    pub fn from_json<I, S>(indices: I, query: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source: Value = serde_json::from_str(query)
            .map_err(|e| DataObjectError::Validation(format!("Invalid search source: {}", e)))?;
        Self::new(indices, source)
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// The search source as query text
    pub fn source_json(&self) -> String {
        Value::Object(self.source.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, Serialize)]
    struct Agent {
        name: String,
        version: u32,
    }

    #[test]
    fn test_struct_serializes_to_document() {
        let agent = Agent {
            name: "a1".to_string(),
            version: 2,
        };
        let doc = agent.to_document().unwrap();
        assert_eq!(doc["name"], json!("a1"));
        assert_eq!(doc["version"], json!(2));
    }

    #[test]
    fn test_scalar_payload_is_validation_error() {
        let request = PutDataObjectRequest::new("agents", 42);
        let err = serialize_document(request.index(), request.data_object()).unwrap_err();
        assert!(matches!(err, DataObjectError::Validation(_)));
    }

    #[test]
    fn test_put_defaults() {
        let request = PutDataObjectRequest::new("agents", json!({ "name": "a1" }));
        assert!(request.id().is_none());
        assert!(request.tenant_id().is_none());
        assert!(request.overwrite_if_exists());
    }

    #[test]
    fn test_fetch_source_projection() {
        let source = json!({
            "name": "a1",
            "secret": "x",
            "meta": { "owner": "o", "created": 1 }
        });
        let source = match source {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let projected = FetchSource::includes(["name", "meta.owner"]).apply(source.clone());
        assert_eq!(
            Value::Object(projected),
            json!({ "name": "a1", "meta": { "owner": "o" } })
        );

        let projected = FetchSource::default()
            .with_excludes(["secret", "meta.created"])
            .apply(source.clone());
        assert_eq!(
            Value::Object(projected),
            json!({ "name": "a1", "meta": { "owner": "o" } })
        );

        assert!(FetchSource::none().apply(source).is_empty());
    }

    #[test]
    fn test_search_request_validation() {
        assert!(SearchDataObjectRequest::new(["agents"], json!([1, 2])).is_err());
        assert!(SearchDataObjectRequest::new(Vec::<String>::new(), json!({})).is_err());
        assert!(SearchDataObjectRequest::from_json(["agents"], "{not json").is_err());

        let request =
            SearchDataObjectRequest::from_json(["agents", "models"], r#"{"size": 3}"#).unwrap();
        assert_eq!(request.indices(), &["agents".to_string(), "models".to_string()]);
        assert_eq!(request.source()["size"], json!(3));
    }
}
