//! JSON query DSL subset
//!
//! Supported: `match_all`, `match_none`, `term`, `terms`, `match`, `ids`, `exists`, `range`
//! and `bool` (`must`, `filter`, `should`, `must_not`, `minimum_should_match`). The pseudo-field
//! `_id` addresses the document id.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

use crate::error::EngineError;
use crate::source::values_at;

/// A parsed query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    MatchNone,
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Match {
        field: String,
        text: String,
        require_all: bool,
    },
    Ids(Vec<String>),
    Exists(String),
    Range {
        field: String,
        gt: Option<Value>,
        gte: Option<Value>,
        lt: Option<Value>,
        lte: Option<Value>,
    },
    Bool {
        must: Vec<Query>,
        filter: Vec<Query>,
        should: Vec<Query>,
        must_not: Vec<Query>,
        minimum_should_match: Option<usize>,
    },
}

fn parse_err(msg: impl Into<String>) -> EngineError {
    EngineError::QueryParsing(msg.into())
}

/// Split `{ "<field>": <body> }` into its single entry
fn single_field<'a>(kind: &str, body: &'a Value) -> Result<(&'a String, &'a Value), EngineError> {
    let map = body
        .as_object()
        .ok_or_else(|| parse_err(format!("[{}] query must be an object", kind)))?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(parse_err(format!(
            "[{}] query must name exactly one field",
            kind
        ))),
    }
}

fn clause_list(value: &Value) -> Result<Vec<Query>, EngineError> {
    match value {
        Value::Array(items) => items.iter().map(Query::parse).collect(),
        other => Ok(vec![Query::parse(other)?]),
    }
}

impl Query {
    /// Parse a query object such as `{"term": {"name": "a1"}}`
    pub fn parse(value: &Value) -> Result<Self, EngineError> {
        let (kind, body) = single_field("query", value)?;
        match kind.as_str() {
            "match_all" => Ok(Query::MatchAll),
            "match_none" => Ok(Query::MatchNone),
            "term" => {
                let (field, spec) = single_field("term", body)?;
                let value = match spec {
                    Value::Object(inner) => inner
                        .get("value")
                        .cloned()
                        .ok_or_else(|| parse_err("[term] object form requires [value]"))?,
                    other => other.clone(),
                };
                Ok(Query::Term {
                    field: field.clone(),
                    value,
                })
            }
            "terms" => {
                let (field, spec) = single_field("terms", body)?;
                let values = spec
                    .as_array()
                    .ok_or_else(|| parse_err("[terms] values must be an array"))?
                    .clone();
                Ok(Query::Terms {
                    field: field.clone(),
                    values,
                })
            }
            "match" => {
                let (field, spec) = single_field("match", body)?;
                let (text, require_all) = match spec {
                    Value::Object(inner) => {
                        let text = inner
                            .get("query")
                            .map(scalar_text)
                            .ok_or_else(|| parse_err("[match] object form requires [query]"))?;
                        let require_all = inner
                            .get("operator")
                            .and_then(Value::as_str)
                            .map(|op| op.eq_ignore_ascii_case("and"))
                            .unwrap_or(false);
                        (text, require_all)
                    }
                    other => (scalar_text(other), false),
                };
                Ok(Query::Match {
                    field: field.clone(),
                    text,
                    require_all,
                })
            }
            "ids" => {
                let values = body
                    .get("values")
                    .and_then(Value::as_array)
                    .ok_or_else(|| parse_err("[ids] requires a [values] array"))?;
                let ids = values
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| parse_err("[ids] values must be strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Query::Ids(ids))
            }
            "exists" => {
                let field = body
                    .get("field")
                    .and_then(Value::as_str)
                    .ok_or_else(|| parse_err("[exists] requires a [field]"))?;
                Ok(Query::Exists(field.to_string()))
            }
            "range" => {
                let (field, spec) = single_field("range", body)?;
                let bounds = spec
                    .as_object()
                    .ok_or_else(|| parse_err("[range] bounds must be an object"))?;
                Ok(Query::Range {
                    field: field.clone(),
                    gt: bounds.get("gt").cloned(),
                    gte: bounds.get("gte").cloned(),
                    lt: bounds.get("lt").cloned(),
                    lte: bounds.get("lte").cloned(),
                })
            }
            "bool" => {
                let spec = body
                    .as_object()
                    .ok_or_else(|| parse_err("[bool] query must be an object"))?;
                let clauses = |name: &str| -> Result<Vec<Query>, EngineError> {
                    spec.get(name).map(clause_list).transpose().map(Option::unwrap_or_default)
                };
                let minimum_should_match = match spec.get("minimum_should_match") {
                    None => None,
                    Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
                    Some(Value::String(s)) => s.parse::<usize>().ok(),
                    Some(_) => None,
                };
                Ok(Query::Bool {
                    must: clauses("must")?,
                    filter: clauses("filter")?,
                    should: clauses("should")?,
                    must_not: clauses("must_not")?,
                    minimum_should_match,
                })
            }
            other => Err(parse_err(format!("unknown query [{}]", other))),
        }
    }

    /// Whether the document `id` with `source` matches
    pub fn matches(&self, id: &str, source: &Map<String, Value>) -> bool {
        match self {
            Query::MatchAll => true,
            Query::MatchNone => false,
            Query::Term { field, value } => {
                field_values(id, source, field).any(|v| values_equal(&v, value))
            }
            Query::Terms { field, values } => field_values(id, source, field)
                .any(|v| values.iter().any(|wanted| values_equal(&v, wanted))),
            Query::Match {
                field,
                text,
                require_all,
            } => {
                let wanted = tokenize(text);
                if wanted.is_empty() {
                    return false;
                }
                let present: Vec<String> = field_values(id, source, field)
                    .flat_map(|v| tokenize(&scalar_text(&v)))
                    .collect();
                if *require_all {
                    wanted.iter().all(|t| present.contains(t))
                } else {
                    wanted.iter().any(|t| present.contains(t))
                }
            }
            Query::Ids(ids) => ids.iter().any(|candidate| candidate == id),
            Query::Exists(field) => field_values(id, source, field).any(|v| !v.is_null()),
            Query::Range {
                field,
                gt,
                gte,
                lt,
                lte,
            } => field_values(id, source, field).any(|v| {
                let check = |bound: &Option<Value>, accept: fn(Ordering) -> bool| {
                    bound
                        .as_ref()
                        .map(|b| compare_values(&v, b).map(accept).unwrap_or(false))
                        .unwrap_or(true)
                };
                check(gt, |o| o == Ordering::Greater)
                    && check(gte, |o| o != Ordering::Less)
                    && check(lt, |o| o == Ordering::Less)
                    && check(lte, |o| o != Ordering::Greater)
            }),
            Query::Bool {
                must,
                filter,
                should,
                must_not,
                minimum_should_match,
            } => {
                if !must.iter().chain(filter.iter()).all(|q| q.matches(id, source)) {
                    return false;
                }
                if must_not.iter().any(|q| q.matches(id, source)) {
                    return false;
                }
                let required = minimum_should_match.unwrap_or(
                    if must.is_empty() && filter.is_empty() && !should.is_empty() {
                        1
                    } else {
                        0
                    },
                );
                should.iter().filter(|q| q.matches(id, source)).count() >= required
            }
        }
    }
}

fn field_values<'a>(
    id: &str,
    source: &'a Map<String, Value>,
    field: &str,
) -> impl Iterator<Item = Cow<'a, Value>> {
    let values: Vec<Cow<'a, Value>> = if field == "_id" {
        vec![Cow::Owned(Value::String(id.to_string()))]
    } else {
        values_at(source, field).into_iter().map(Cow::Borrowed).collect()
    };
    values.into_iter()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two scalar JSON values of the same kind
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
