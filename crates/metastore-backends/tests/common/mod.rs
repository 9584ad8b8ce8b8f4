//! In-process emulation of the document store REST API on top of `DocumentEngine`

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use metastore_backends::kv::{Item, KeyValueStore, KvStoreError, MemoryKeyValueStore};
use metastore_engine::{
    DeleteRequest, DocWriteResult, DocumentEngine, EngineError, GetRequest, IndexRequest, OpType,
    SearchRequest, SourceFilter, UpdateRequest,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct FakeRemote {
    pub engine: Arc<DocumentEngine>,
    /// `authorization` header of every request, in arrival order
    pub authorizations: Arc<Mutex<Vec<Option<String>>>>,
    /// Path and query of every request
    pub requests: Arc<Mutex<Vec<String>>>,
}

type Reply = (StatusCode, Json<Value>);
type Params = Query<HashMap<String, String>>;

fn error_reply(err: EngineError) -> Reply {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": { "type": err.error_type(), "reason": err.to_string() },
            "status": err.status(),
        })),
    )
}

fn reply<T: serde::Serialize>(status: StatusCode, body: &T) -> Reply {
    (status, Json(serde_json::to_value(body).unwrap()))
}

impl FakeRemote {
    fn record(&self, headers: &HeaderMap, line: String) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.authorizations.lock().unwrap().push(auth);
        self.requests.lock().unwrap().push(line);
    }
}

fn describe(method: &str, path: &str, params: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = params.iter().collect();
    keys.sort();
    let query: Vec<String> = keys.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{} {}?{}", method, path, query.join("&"))
}

async fn put_doc(
    State(fake): State<FakeRemote>,
    Path((index, id)): Path<(String, String)>,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    fake.record(&headers, describe("PUT", &format!("/{}/_doc/{}", index, id), &params));
    let mut request = IndexRequest::new(index, body.to_vec()).with_id(id);
    if params.get("op_type").map(String::as_str) == Some("create") {
        request = request.with_op_type(OpType::Create);
    }
    match fake.engine.index(request) {
        Ok(response) if response.result == DocWriteResult::Created => {
            reply(StatusCode::CREATED, &response)
        }
        Ok(response) => reply(StatusCode::OK, &response),
        Err(e) => error_reply(e),
    }
}

async fn post_doc(
    State(fake): State<FakeRemote>,
    Path(index): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    fake.record(&headers, describe("POST", &format!("/{}/_doc", index), &params));
    match fake.engine.index(IndexRequest::new(index, body.to_vec())) {
        Ok(response) => reply(StatusCode::CREATED, &response),
        Err(e) => error_reply(e),
    }
}

async fn get_doc(
    State(fake): State<FakeRemote>,
    Path((index, id)): Path<(String, String)>,
    Query(params): Params,
    headers: HeaderMap,
) -> Reply {
    fake.record(&headers, describe("GET", &format!("/{}/_doc/{}", index, id), &params));
    let split = |key: &str| -> Vec<String> {
        params
            .get(key)
            .map(|v| v.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    };
    let filter = SourceFilter {
        fetch: params.get("_source").map(String::as_str) != Some("false"),
        includes: split("_source_includes"),
        excludes: split("_source_excludes"),
    };
    match fake
        .engine
        .get(GetRequest::new(index, id).with_source_filter(filter))
    {
        Ok(response) if response.found => reply(StatusCode::OK, &response),
        Ok(response) => reply(StatusCode::NOT_FOUND, &response),
        Err(e) => error_reply(e),
    }
}

async fn update_doc(
    State(fake): State<FakeRemote>,
    Path((index, id)): Path<(String, String)>,
    Query(params): Params,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    fake.record(&headers, describe("POST", &format!("/{}/_update/{}", index, id), &params));
    let doc = serde_json::to_vec(&body["doc"]).unwrap();
    let mut request = UpdateRequest::new(index, id, doc);
    if let Some(seq_no) = params.get("if_seq_no").and_then(|v| v.parse().ok()) {
        request = request.with_if_seq_no(seq_no);
    }
    if let Some(term) = params.get("if_primary_term").and_then(|v| v.parse().ok()) {
        request = request.with_if_primary_term(term);
    }
    match fake.engine.update(request) {
        Ok(response) => reply(StatusCode::OK, &response),
        Err(e) => error_reply(e),
    }
}

async fn delete_doc(
    State(fake): State<FakeRemote>,
    Path((index, id)): Path<(String, String)>,
    Query(params): Params,
    headers: HeaderMap,
) -> Reply {
    fake.record(&headers, describe("DELETE", &format!("/{}/_doc/{}", index, id), &params));
    match fake.engine.delete(DeleteRequest::new(index, id)) {
        Ok(response) if response.result == DocWriteResult::Deleted => {
            reply(StatusCode::OK, &response)
        }
        Ok(response) => reply(StatusCode::NOT_FOUND, &response),
        Err(e) => error_reply(e),
    }
}

async fn search(
    State(fake): State<FakeRemote>,
    Path(index): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    fake.record(&headers, describe("POST", &format!("/{}/_search", index), &HashMap::new()));
    let indices: Vec<String> = index.split(',').map(str::to_string).collect();
    match fake.engine.search(SearchRequest::new(indices, body.to_vec())) {
        Ok(response) => reply(StatusCode::OK, &response),
        Err(e) => error_reply(e),
    }
}

/// Start the fake on an ephemeral port
pub async fn spawn_fake_remote() -> (SocketAddr, FakeRemote) {
    let fake = FakeRemote {
        engine: Arc::new(DocumentEngine::new()),
        authorizations: Arc::new(Mutex::new(Vec::new())),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/{index}/_doc", post(post_doc))
        .route("/{index}/_doc/{id}", put(put_doc).get(get_doc).delete(delete_doc))
        .route("/{index}/_update/{id}", post(update_doc))
        .route("/{index}/_search", post(search))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fake)
}

#[derive(Clone)]
pub struct FakeDynamoDb {
    pub store: Arc<MemoryKeyValueStore>,
    /// Tables that exist; calls against any other table fail with `ResourceNotFoundException`
    pub tables: Arc<Mutex<HashSet<String>>>,
    /// `(x-amz-target, authorization)` of every call
    pub calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

fn dynamo_error(code: &str, message: &str) -> Reply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "__type": format!("com.amazonaws.dynamodb.v20120810#{}", code),
            "message": message,
        })),
    )
}

fn store_reply(result: Result<Value, KvStoreError>) -> Reply {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => dynamo_error("ValidationException", &e.to_string()),
    }
}

async fn dynamo(State(fake): State<FakeDynamoDb>, headers: HeaderMap, body: Bytes) -> Reply {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let target = header("x-amz-target").unwrap_or_default();
    fake.calls
        .lock()
        .unwrap()
        .push((target.clone(), header("authorization")));

    let input: Value = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => return dynamo_error("SerializationException", &e.to_string()),
    };
    let table = input["TableName"].as_str().unwrap_or_default().to_string();
    if !fake.tables.lock().unwrap().contains(&table) {
        return dynamo_error("ResourceNotFoundException", "Requested resource not found");
    }
    let attributes = |field: &str| -> Item {
        serde_json::from_value(input[field].clone()).unwrap_or_default()
    };

    match target.as_str() {
        "DynamoDB_20120810.PutItem" => store_reply(
            fake.store
                .put_item(&table, attributes("Item"))
                .await
                .map(|_| json!({})),
        ),
        "DynamoDB_20120810.GetItem" => store_reply(
            fake.store
                .get_item(&table, attributes("Key"))
                .await
                .map(|item| match item {
                    Some(item) => json!({ "Item": item }),
                    None => json!({}),
                }),
        ),
        "DynamoDB_20120810.DeleteItem" => store_reply(
            fake.store
                .delete_item(&table, attributes("Key"))
                .await
                .map(|_| json!({})),
        ),
        other => dynamo_error("UnknownOperationException", other),
    }
}

/// Start a fake DynamoDB endpoint that knows `tables`
pub async fn spawn_fake_dynamodb(tables: &[&str]) -> (SocketAddr, FakeDynamoDb) {
    let fake = FakeDynamoDb {
        store: Arc::new(MemoryKeyValueStore::new()),
        tables: Arc::new(Mutex::new(tables.iter().map(|t| t.to_string()).collect())),
        calls: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/", post(dynamo))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fake)
}
