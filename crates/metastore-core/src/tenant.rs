//! Tenant scoping helpers

use serde_json::{json, Map, Value};

use crate::error::{DataObjectError, Result};

/// Sentinel tenant used when a request carries no tenant id and multi-tenancy is off
pub const DEFAULT_TENANT: &str = "DEFAULT_TENANT";

/// Document field holding the owning tenant in document-store backends
pub const TENANT_ID_FIELD: &str = "tenant_id";

/// Tenant id to use for storage keys
pub fn tenant_or_default(tenant_id: Option<&str>) -> &str {
    match tenant_id {
        Some(t) if !t.is_empty() => t,
        _ => DEFAULT_TENANT,
    }
}

/// Relation between a stored document and the requesting tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Missing,
    Owned,
    /// Stored under another tenant
    Foreign,
}

impl Ownership {
    /// Classify a fetched document
    pub fn of(found: bool, source: Option<&Map<String, Value>>, tenant_id: &str) -> Self {
        match source {
            Some(source) if found && owned_by(source, tenant_id) => Ownership::Owned,
            _ if found => Ownership::Foreign,
            _ => Ownership::Missing,
        }
    }
}

/// Stamp the owning tenant onto a document source.
///
/// The tenant field is reserved while multi-tenancy is on; a source that already carries it is
/// rejected with a validation error.
pub fn stamp_tenant(source: &mut Map<String, Value>, tenant_id: &str) -> Result<()> {
    if source.contains_key(TENANT_ID_FIELD) {
        return Err(DataObjectError::Validation(format!(
            "Field {} is reserved when multitenancy is enabled.",
            TENANT_ID_FIELD
        )));
    }
    source.insert(
        TENANT_ID_FIELD.to_string(),
        Value::String(tenant_id.to_string()),
    );
    Ok(())
}

/// Remove the stamped tenant field before a source leaves the backend
pub fn strip_tenant(source: &mut Map<String, Value>) {
    source.remove(TENANT_ID_FIELD);
}

/// Whether a stored source belongs to `tenant_id`
pub fn owned_by(source: &Map<String, Value>, tenant_id: &str) -> bool {
    source.get(TENANT_ID_FIELD).and_then(Value::as_str) == Some(tenant_id)
}

/// Restrict a search source to documents of one tenant.
///
/// An existing `bool` query gains a `term` filter; any other query is wrapped as the `must`
/// clause of a new `bool` query. A missing query becomes the bare `term` query.
pub fn scope_search_source(source: &mut Map<String, Value>, tenant_id: &str) {
    let tenant_term = json!({ "term": { TENANT_ID_FIELD: tenant_id } });

    let scoped = match source.remove("query") {
        None => tenant_term,
        Some(Value::Object(mut query)) if query.contains_key("bool") => {
            if let Some(Value::Object(bool_query)) = query.get_mut("bool") {
                match bool_query.remove("filter") {
                    Some(Value::Array(mut filters)) => {
                        filters.push(tenant_term);
                        bool_query.insert("filter".to_string(), Value::Array(filters));
                    }
                    Some(single) => {
                        bool_query.insert("filter".to_string(), json!([single, tenant_term]));
                    }
                    None => {
                        bool_query.insert("filter".to_string(), json!([tenant_term]));
                    }
                }
            }
            Value::Object(query)
        }
        Some(other) => json!({ "bool": { "must": [other], "filter": [tenant_term] } }),
    };

    source.insert("query".to_string(), scoped);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_tenant_or_default() {
        assert_eq!(tenant_or_default(None), DEFAULT_TENANT);
        assert_eq!(tenant_or_default(Some("")), DEFAULT_TENANT);
        assert_eq!(tenant_or_default(Some("t1")), "t1");
    }

    #[test]
    fn test_stamp_and_strip() {
        let original = as_map(json!({ "name": "a1" }));
        let mut stored = original.clone();
        stamp_tenant(&mut stored, "t1").unwrap();
        assert!(owned_by(&stored, "t1"));
        assert!(!owned_by(&stored, "t2"));

        strip_tenant(&mut stored);
        assert_eq!(stored, original);
    }

    #[test]
    fn test_stamp_rejects_supplied_tenant_field() {
        let mut source = as_map(json!({ "name": "a1", "tenant_id": "spoof" }));
        let err = stamp_tenant(&mut source, "t1").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(source["tenant_id"], "spoof");
    }

    #[test]
    fn test_ownership() {
        let stored = as_map(json!({ "tenant_id": "t1" }));
        assert_eq!(Ownership::of(true, Some(&stored), "t1"), Ownership::Owned);
        assert_eq!(Ownership::of(true, Some(&stored), "t2"), Ownership::Foreign);
        assert_eq!(Ownership::of(true, None, "t1"), Ownership::Foreign);
        assert_eq!(Ownership::of(false, None, "t1"), Ownership::Missing);
    }

    #[test]
    fn test_scope_without_query() {
        let mut source = as_map(json!({ "size": 5 }));
        scope_search_source(&mut source, "t1");
        assert_eq!(source["query"], json!({ "term": { "tenant_id": "t1" } }));
        assert_eq!(source["size"], json!(5));
    }

    #[test]
    fn test_scope_wraps_plain_query() {
        let mut source = as_map(json!({ "query": { "match": { "name": "a1" } } }));
        scope_search_source(&mut source, "t1");
        assert_eq!(
            source["query"],
            json!({ "bool": {
                "must": [{ "match": { "name": "a1" } }],
                "filter": [{ "term": { "tenant_id": "t1" } }]
            }})
        );
    }

    #[test]
    fn test_scope_extends_bool_filter() {
        let mut source = as_map(json!({ "query": { "bool": {
            "filter": { "term": { "kind": "agent" } }
        }}}));
        scope_search_source(&mut source, "t2");
        assert_eq!(
            source["query"]["bool"]["filter"],
            json!([{ "term": { "kind": "agent" } }, { "term": { "tenant_id": "t2" } }])
        );
    }
}
