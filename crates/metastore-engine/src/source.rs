//! Source filtering and document helpers

use serde_json::{Map, Value};

use crate::error::EngineError;

/// Which parts of `_source` to return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub fetch: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self {
            fetch: true,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl SourceFilter {
    /// Parse the `_source` element of a search source: a bool, a field or list of fields, or an
    /// object with `includes` / `excludes`
    pub fn from_json(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::Bool(fetch) => Ok(Self {
                fetch: *fetch,
                ..Default::default()
            }),
            Value::String(field) => Ok(Self {
                includes: vec![field.clone()],
                ..Default::default()
            }),
            Value::Array(_) => Ok(Self {
                includes: string_list(value, "_source")?,
                ..Default::default()
            }),
            Value::Object(spec) => Ok(Self {
                fetch: true,
                includes: spec
                    .get("includes")
                    .map(|v| string_list(v, "_source.includes"))
                    .transpose()?
                    .unwrap_or_default(),
                excludes: spec
                    .get("excludes")
                    .map(|v| string_list(v, "_source.excludes"))
                    .transpose()?
                    .unwrap_or_default(),
            }),
            other => Err(EngineError::QueryParsing(format!(
                "unsupported _source value: {}",
                other
            ))),
        }
    }

    /// Apply to a stored source; `None` when the source is not fetched
    pub fn apply(&self, source: &Map<String, Value>) -> Option<Map<String, Value>> {
        if !self.fetch {
            return None;
        }
        let mut out = if self.includes.is_empty() {
            source.clone()
        } else {
            let mut kept = Map::new();
            for path in &self.includes {
                copy_path(source, &mut kept, path);
            }
            kept
        };
        for path in &self.excludes {
            remove_path(&mut out, path);
        }
        Some(out)
    }
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>, EngineError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    EngineError::QueryParsing(format!("{} entries must be strings", what))
                })
            })
            .collect(),
        _ => Err(EngineError::QueryParsing(format!(
            "{} must be a string or an array of strings",
            what
        ))),
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
                if let Value::Object(slot) = to
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
                {
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

/// Parse source bytes into a JSON object
pub(crate) fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, EngineError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(EngineError::MapperParsing(format!(
            "root must be an object, got {}",
            other
        ))),
        Err(e) => Err(EngineError::MapperParsing(e.to_string())),
    }
}

/// Recursively merge `partial` into `target`. Objects merge key by key; anything else replaces.
pub(crate) fn deep_merge(target: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Values at a dotted path. Arrays along the way are flattened.
pub(crate) fn values_at<'a>(source: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = Vec::new();
    let mut parts = path.split('.');
    let first = match parts.next().and_then(|head| source.get(head)) {
        Some(v) => v,
        None => return current,
    };
    current.push(first);
    for part in parts {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(part) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            if let Some(v) = map.get(part) {
                                next.push(v);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_deep_merge() {
        let mut target = obj(json!({ "name": "a1", "meta": { "owner": "o", "tags": ["x"] } }));
        deep_merge(
            &mut target,
            obj(json!({ "meta": { "tags": ["y"], "stage": "prod" }, "version": 2 })),
        );
        assert_eq!(
            Value::Object(target),
            json!({ "name": "a1", "version": 2, "meta": { "owner": "o", "tags": ["y"], "stage": "prod" } })
        );
    }

    #[test]
    fn test_values_at_flattens_arrays() {
        let source = obj(json!({ "steps": [{ "tool": "search" }, { "tool": "calc" }], "tags": ["a", "b"] }));
        assert_eq!(values_at(&source, "steps.tool"), vec![&json!("search"), &json!("calc")]);
        assert_eq!(values_at(&source, "tags"), vec![&json!("a"), &json!("b")]);
        assert!(values_at(&source, "missing.path").is_empty());
    }

    #[test]
    fn test_source_filter_forms() {
        let source = obj(json!({ "name": "a1", "secret": "s", "meta": { "owner": "o" } }));

        let off = SourceFilter::from_json(&json!(false)).unwrap();
        assert!(off.apply(&source).is_none());

        let list = SourceFilter::from_json(&json!(["name", "meta.owner"])).unwrap();
        assert_eq!(
            Value::Object(list.apply(&source).unwrap()),
            json!({ "name": "a1", "meta": { "owner": "o" } })
        );

        let spec = SourceFilter::from_json(&json!({ "excludes": ["secret"] })).unwrap();
        assert_eq!(
            Value::Object(spec.apply(&source).unwrap()),
            json!({ "name": "a1", "meta": { "owner": "o" } })
        );

        assert!(SourceFilter::from_json(&json!(3)).is_err());
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object(b"[1,2]").is_err());
        assert!(parse_object(b"{oops").is_err());
        assert_eq!(parse_object(br#"{"a":1}"#).unwrap()["a"], json!(1));
    }
}
