//! In-process document engine

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::debug;

use crate::error::EngineError;
use crate::query::{compare_values, Query};
use crate::source::{deep_merge, parse_object, values_at, SourceFilter};
use crate::types::{
    DeleteRequest, DocWriteResult, GetRequest, GetResponse, Hit, HitsMetadata, IndexRequest,
    OpType, SearchRequest, SearchResponse, ShardStats, TotalHits, UpdateRequest, WriteResponse,
};

const DEFAULT_SEARCH_SIZE: usize = 10;
/// Sequence number reported for operations that touched no index
const UNASSIGNED_SEQ_NO: i64 = -2;

#[derive(Debug, Clone)]
struct StoredDoc {
    source: Map<String, Value>,
    seq_no: i64,
    version: i64,
}

#[derive(Debug, Default)]
struct IndexData {
    docs: HashMap<String, StoredDoc>,
    next_seq_no: i64,
}

impl IndexData {
    fn allocate_seq_no(&mut self) -> i64 {
        let seq_no = self.next_seq_no;
        self.next_seq_no += 1;
        seq_no
    }
}

#[derive(Debug, Clone)]
struct SortKey {
    field: String,
    descending: bool,
}

/// Thread-safe document store with per-index sequence numbers
///
/// Indices are created on first write. Every write to an index (including a delete of a missing
/// document) allocates the next sequence number of that index.
#[derive(Debug)]
pub struct DocumentEngine {
    indices: RwLock<HashMap<String, IndexData>>,
    primary_term: i64,
}

impl Default for DocumentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentEngine {
    pub fn new() -> Self {
        Self::with_primary_term(1)
    }

    /// Engine whose writes all carry `primary_term`
    pub fn with_primary_term(primary_term: i64) -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            primary_term,
        }
    }

    pub fn primary_term(&self) -> i64 {
        self.primary_term
    }

    /// Names of all existing indices, sorted
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live documents in `index`, `None` if it does not exist
    pub fn doc_count(&self, index: &str) -> Option<usize> {
        self.indices.read().get(index).map(|data| data.docs.len())
    }

    /// Store a document, generating an id when none is given
    pub fn index(&self, request: IndexRequest) -> Result<WriteResponse, EngineError> {
        let source = parse_object(&request.source)?;
        let id = request
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let mut indices = self.indices.write();
        let data = indices.entry(request.index.clone()).or_default();

        let previous_version = match data.docs.get(&id) {
            Some(_) if request.op_type == OpType::Create => {
                return Err(EngineError::VersionConflict {
                    index: request.index,
                    id,
                    reason: "document already exists".to_string(),
                });
            }
            Some(existing) => Some(existing.version),
            None => None,
        };

        let seq_no = data.allocate_seq_no();
        let version = previous_version.map(|v| v + 1).unwrap_or(1);
        data.docs.insert(
            id.clone(),
            StoredDoc {
                source,
                seq_no,
                version,
            },
        );

        let result = if previous_version.is_some() {
            DocWriteResult::Updated
        } else {
            DocWriteResult::Created
        };
        debug!(index = %request.index, id = %id, seq_no, ?result, "Indexed document");

        Ok(WriteResponse {
            index: request.index,
            id,
            version,
            result,
            shards: ShardStats::write(),
            seq_no,
            primary_term: self.primary_term,
        })
    }

    /// Point lookup; a missing index or document yields `found: false`
    pub fn get(&self, request: GetRequest) -> Result<GetResponse, EngineError> {
        let indices = self.indices.read();
        let stored = indices
            .get(&request.index)
            .and_then(|data| data.docs.get(&request.id));

        Ok(match stored {
            Some(doc) => GetResponse {
                index: request.index,
                id: request.id,
                found: true,
                version: Some(doc.version),
                seq_no: Some(doc.seq_no),
                primary_term: Some(self.primary_term),
                source: request.source_filter.apply(&doc.source),
            },
            None => GetResponse {
                index: request.index,
                id: request.id,
                found: false,
                version: None,
                seq_no: None,
                primary_term: None,
                source: None,
            },
        })
    }

    /// Deep-merge a partial document into an existing one
    pub fn update(&self, request: UpdateRequest) -> Result<WriteResponse, EngineError> {
        let partial = parse_object(&request.doc)?;

        let mut indices = self.indices.write();
        let missing = || EngineError::DocumentMissing {
            index: request.index.clone(),
            id: request.id.clone(),
        };
        let data = indices.get_mut(&request.index).ok_or_else(missing)?;
        let existing = data.docs.get(&request.id).cloned().ok_or_else(missing)?;

        let seq_no_mismatch = request
            .if_seq_no
            .is_some_and(|wanted| wanted != existing.seq_no);
        let term_mismatch = request
            .if_primary_term
            .is_some_and(|wanted| wanted != self.primary_term);
        if seq_no_mismatch || term_mismatch {
            return Err(EngineError::VersionConflict {
                index: request.index.clone(),
                id: request.id.clone(),
                reason: format!(
                    "required seqNo [{}], primary term [{}]. current document has seqNo [{}] and primary term [{}]",
                    request.if_seq_no.unwrap_or(-2),
                    request.if_primary_term.unwrap_or(0),
                    existing.seq_no,
                    self.primary_term
                ),
            });
        }

        let mut merged = existing.source.clone();
        deep_merge(&mut merged, partial);

        if merged == existing.source {
            debug!(index = %request.index, id = %request.id, "Update was a noop");
            return Ok(WriteResponse {
                index: request.index,
                id: request.id,
                version: existing.version,
                result: DocWriteResult::Noop,
                shards: ShardStats {
                    total: 0,
                    successful: 0,
                    skipped: None,
                    failed: 0,
                },
                seq_no: existing.seq_no,
                primary_term: self.primary_term,
            });
        }

        let seq_no = data.allocate_seq_no();
        let version = existing.version + 1;
        data.docs.insert(
            request.id.clone(),
            StoredDoc {
                source: merged,
                seq_no,
                version,
            },
        );
        debug!(index = %request.index, id = %request.id, seq_no, "Updated document");

        Ok(WriteResponse {
            index: request.index,
            id: request.id,
            version,
            result: DocWriteResult::Updated,
            shards: ShardStats::write(),
            seq_no,
            primary_term: self.primary_term,
        })
    }

    /// Remove a document. Deleting a missing document succeeds with `not_found`.
    pub fn delete(&self, request: DeleteRequest) -> Result<WriteResponse, EngineError> {
        let mut indices = self.indices.write();
        let (result, version, seq_no, primary_term) = match indices.get_mut(&request.index) {
            Some(data) => {
                let removed = data.docs.remove(&request.id);
                let seq_no = data.allocate_seq_no();
                let (result, version) = match removed {
                    Some(doc) => (DocWriteResult::Deleted, doc.version + 1),
                    None => (DocWriteResult::NotFound, 1),
                };
                (result, version, seq_no, self.primary_term)
            }
            None => (DocWriteResult::NotFound, 1, UNASSIGNED_SEQ_NO, 0),
        };
        debug!(index = %request.index, id = %request.id, ?result, "Deleted document");

        Ok(WriteResponse {
            index: request.index,
            id: request.id,
            version,
            result,
            shards: ShardStats::write(),
            seq_no,
            primary_term,
        })
    }

    /// Run a search source against one or more indices
    pub fn search(&self, request: SearchRequest) -> Result<SearchResponse, EngineError> {
        let started = Instant::now();
        let source = parse_search_source(&request.source)?;

        let query = match source.get("query") {
            Some(q) => Query::parse(q)?,
            None => Query::MatchAll,
        };
        let from = usize_param(&source, "from")?.unwrap_or(0);
        let size = usize_param(&source, "size")?.unwrap_or(DEFAULT_SEARCH_SIZE);
        let sort = match source.get("sort") {
            Some(spec) => parse_sort(spec)?,
            None => Vec::new(),
        };
        let filter = match source.get("_source") {
            Some(spec) => SourceFilter::from_json(spec)?,
            None => SourceFilter::default(),
        };

        let indices = self.indices.read();
        let targets = resolve_indices(&indices, &request.indices)?;

        let mut matched: Vec<(&str, &str, &StoredDoc)> = Vec::new();
        for name in &targets {
            if let Some(data) = indices.get(name.as_str()) {
                for (id, doc) in &data.docs {
                    if query.matches(id, &doc.source) {
                        matched.push((name.as_str(), id.as_str(), doc));
                    }
                }
            }
        }

        matched.sort_by(|a, b| a.0.cmp(b.0).then(a.2.seq_no.cmp(&b.2.seq_no)));
        if !sort.is_empty() {
            matched.sort_by(|a, b| compare_by_keys(&sort, (a.1, a.2), (b.1, b.2)));
        }

        let total = matched.len() as u64;
        let scored = sort.is_empty();
        let hits: Vec<Hit> = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(index, id, doc)| Hit {
                index: index.to_string(),
                id: id.to_string(),
                score: scored.then_some(1.0),
                source: filter.apply(&doc.source),
            })
            .collect();
        let max_score = (scored && !hits.is_empty()).then_some(1.0);

        debug!(indices = ?targets, total, returned = hits.len(), "Search completed");

        Ok(SearchResponse {
            took: started.elapsed().as_millis() as u64,
            timed_out: false,
            shards: ShardStats::search(targets.len() as u32),
            hits: HitsMetadata {
                total: TotalHits {
                    value: total,
                    relation: "eq".to_string(),
                },
                max_score,
                hits,
            },
        })
    }
}

fn parse_search_source(bytes: &[u8]) -> Result<Map<String, Value>, EngineError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(EngineError::QueryParsing(format!(
            "search source must be an object, got {}",
            other
        ))),
        Err(e) => Err(EngineError::QueryParsing(e.to_string())),
    }
}

fn usize_param(source: &Map<String, Value>, name: &str) -> Result<Option<usize>, EngineError> {
    match source.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| EngineError::QueryParsing(format!("[{}] must be non-negative", name))),
        Some(other) => Err(EngineError::QueryParsing(format!(
            "[{}] must be a number, got {}",
            name, other
        ))),
    }
}

fn parse_sort(spec: &Value) -> Result<Vec<SortKey>, EngineError> {
    let entries: Vec<&Value> = match spec {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut keys = Vec::new();
    for entry in entries {
        let key = match entry {
            Value::String(field) => SortKey {
                field: field.clone(),
                descending: field == "_score",
            },
            Value::Object(map) if map.len() == 1 => {
                let (field, order) = map
                    .iter()
                    .next()
                    .ok_or_else(|| EngineError::QueryParsing("empty sort entry".to_string()))?;
                let order = match order {
                    Value::String(s) => s.as_str(),
                    Value::Object(opts) => opts.get("order").and_then(Value::as_str).unwrap_or("asc"),
                    _ => "asc",
                };
                let descending = match order {
                    "asc" => false,
                    "desc" => true,
                    other => {
                        return Err(EngineError::QueryParsing(format!(
                            "unknown sort order [{}]",
                            other
                        )))
                    }
                };
                SortKey {
                    field: field.clone(),
                    descending,
                }
            }
            other => {
                return Err(EngineError::QueryParsing(format!(
                    "unsupported sort entry {}",
                    other
                )))
            }
        };
        // every hit scores the same
        if key.field != "_score" {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn sort_value(id: &str, doc: &StoredDoc, field: &str) -> Option<Value> {
    if field == "_id" {
        return Some(Value::String(id.to_string()));
    }
    values_at(&doc.source, field).into_iter().next().cloned()
}

fn compare_by_keys(keys: &[SortKey], a: (&str, &StoredDoc), b: (&str, &StoredDoc)) -> Ordering {
    for key in keys {
        let left = sort_value(a.0, a.1, &key.field);
        let right = sort_value(b.0, b.1, &key.field);
        // missing values sort last in either direction
        let ordering = match (&left, &right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        };
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn resolve_indices(
    indices: &HashMap<String, IndexData>,
    expressions: &[String],
) -> Result<BTreeSet<String>, EngineError> {
    let mut resolved = BTreeSet::new();
    for expression in expressions.iter().flat_map(|e| e.split(',')) {
        let expression = expression.trim();
        if expression.is_empty() {
            continue;
        }
        if expression == "_all" || expression == "*" {
            resolved.extend(indices.keys().cloned());
        } else if let Some(prefix) = expression.strip_suffix('*') {
            resolved.extend(indices.keys().filter(|k| k.starts_with(prefix)).cloned());
        } else if indices.contains_key(expression) {
            resolved.insert(expression.to_string());
        } else {
            return Err(EngineError::IndexNotFound(expression.to_string()));
        }
    }
    Ok(resolved)
}
