//! Remote document store backend against an in-process REST fake

mod common;

use common::{spawn_fake_remote, FakeRemote};
use metastore_backends::aws::{Credentials, RequestSigner, SigV4Signer, StaticProvider};
use metastore_backends::{RemoteClient, RemoteStoreBackend, Transport};
use metastore_core::{
    DataObjectBackend, DeleteDataObjectRequest, ErrorKind, FetchSource, GetDataObjectRequest,
    PutDataObjectRequest, SearchDataObjectRequest, UpdateDataObjectRequest,
};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;

async fn remote(transport: Transport, multi_tenancy: bool) -> (RemoteStoreBackend, FakeRemote) {
    let (addr, fake) = spawn_fake_remote().await;
    let endpoint = Url::parse(&format!("http://{}", addr)).unwrap();
    let client = RemoteClient::new(reqwest::Client::new(), endpoint, transport);
    (RemoteStoreBackend::new(client, multi_tenancy), fake)
}

fn plain() -> Transport {
    Transport::Plain { basic_auth: None }
}

#[tokio::test]
async fn test_put_get_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, fake) = remote(plain(), false).await;
    assert_eq!(backend.name(), "remote");

    let put = backend
        .put(PutDataObjectRequest::new("agents", json!({ "name": "a1", "llm": { "model": "m" } })))
        .await?;
    assert!(put.created());
    assert!(!put.id().is_empty());

    let get = backend.get(GetDataObjectRequest::new("agents", put.id())).await?;
    assert!(get.found());
    assert_eq!(
        Value::Object(get.source().clone()),
        json!({ "name": "a1", "llm": { "model": "m" } })
    );

    let result = get.get_result()?.expect("parser present");
    assert_eq!(result.seq_no, Some(0));
    assert_eq!(result.index, "agents");

    // every write asks for an immediate refresh
    let requests = fake.requests.lock().unwrap().clone();
    assert!(requests[0].starts_with("POST /agents/_doc?"));
    assert!(requests[0].contains("refresh=true"));
    Ok(())
}

#[tokio::test]
async fn test_get_projection_is_forwarded() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, fake) = remote(plain(), false).await;
    backend
        .put(PutDataObjectRequest::new("agents", json!({ "name": "a1", "secret": "s" })).with_id("x"))
        .await?;

    let get = backend
        .get(
            GetDataObjectRequest::new("agents", "x")
                .with_fetch_source(FetchSource::default().with_excludes(["secret"])),
        )
        .await?;
    assert_eq!(Value::Object(get.source().clone()), json!({ "name": "a1" }));

    let requests = fake.requests.lock().unwrap().clone();
    assert!(requests
        .iter()
        .any(|r| r.starts_with("GET /agents/_doc/x?") && r.contains("_source_excludes=secret")));
    Ok(())
}

#[tokio::test]
async fn test_get_missing_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, fake) = remote(plain(), false).await;
    fake.engine
        .index(metastore_engine::IndexRequest::new("agents", b"{}".to_vec()).with_id("other"))?;

    let get = backend.get(GetDataObjectRequest::new("agents", "nope")).await?;
    assert!(!get.found());
    assert!(get.source().is_empty());
    assert_eq!(get.id(), "nope");
    Ok(())
}

#[tokio::test]
async fn test_put_without_overwrite_conflicts() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, _fake) = remote(plain(), false).await;
    backend
        .put(PutDataObjectRequest::new("agents", json!({ "v": 1 })).with_id("x"))
        .await?;

    let err = backend
        .put(
            PutDataObjectRequest::new("agents", json!({ "v": 2 }))
                .with_id("x")
                .with_overwrite_if_exists(false),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    Ok(())
}

#[tokio::test]
async fn test_update_with_stale_token_conflicts() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, _fake) = remote(plain(), false).await;
    backend
        .put(PutDataObjectRequest::new("agents", json!({ "name": "a1" })).with_id("x"))
        .await?;

    let updated = backend
        .update(
            UpdateDataObjectRequest::new("agents", "x", json!({ "name": "a2" }))
                .with_if_seq_no(0)
                .with_if_primary_term(1),
        )
        .await?;
    assert!(updated.updated());
    let write = updated.write_result()?.expect("parser present");
    assert_eq!(write.result, "updated");
    assert_eq!(write.seq_no, Some(1));

    let err = backend
        .update(
            UpdateDataObjectRequest::new("agents", "x", json!({ "name": "a3" }))
                .with_if_seq_no(0)
                .with_if_primary_term(1),
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let get = backend.get(GetDataObjectRequest::new("agents", "x")).await?;
    assert_eq!(get.source()["name"], "a2");
    Ok(())
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let (backend, _fake) = remote(plain(), false).await;
    let err = backend
        .update(UpdateDataObjectRequest::new("agents", "ghost", json!({ "a": 1 })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_twice() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, _fake) = remote(plain(), false).await;
    backend
        .put(PutDataObjectRequest::new("agents", json!({ "name": "a1" })).with_id("x"))
        .await?;

    let first = backend.delete(DeleteDataObjectRequest::new("agents", "x")).await?;
    assert!(first.deleted());
    let second = backend.delete(DeleteDataObjectRequest::new("agents", "x")).await?;
    assert!(!second.deleted());
    assert_eq!(second.write_result()?.expect("parser present").result, "not_found");
    Ok(())
}

#[tokio::test]
async fn test_search_returns_hits() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, _fake) = remote(plain(), false).await;
    for (id, kind) in [("1", "flow"), ("2", "conversational"), ("3", "flow")] {
        backend
            .put(PutDataObjectRequest::new("agents", json!({ "type": kind })).with_id(id))
            .await?;
    }

    let search = SearchDataObjectRequest::new(
        ["agents"],
        json!({ "query": { "term": { "type": "flow" } } }),
    )?;
    let result = backend.search(search).await?.search_result()?;
    let mut ids: Vec<_> = result.hits.hits.iter().map(|h| h.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(result.hits.total.map(|t| t.value), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_search_missing_index_is_not_found() {
    let (backend, _fake) = remote(plain(), false).await;
    let search = SearchDataObjectRequest::new(["nothing-here"], json!({})).unwrap();
    let err = backend.search(search).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_tenants_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, _fake) = remote(plain(), true).await;
    backend
        .put(
            PutDataObjectRequest::new("agents", json!({ "name": "a1" }))
                .with_id("x")
                .with_tenant_id("t1"),
        )
        .await?;

    let other = backend
        .get(GetDataObjectRequest::new("agents", "x").with_tenant_id("t2"))
        .await?;
    assert!(!other.found());

    let owner = backend
        .get(GetDataObjectRequest::new("agents", "x").with_tenant_id("t1"))
        .await?;
    assert!(owner.found());
    assert_eq!(Value::Object(owner.source().clone()), json!({ "name": "a1" }));

    let err = backend
        .update(UpdateDataObjectRequest::new("agents", "x", json!({ "name": "b" })).with_tenant_id("t2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let deleted = backend
        .delete(DeleteDataObjectRequest::new("agents", "x").with_tenant_id("t2"))
        .await?;
    assert!(!deleted.deleted());

    let search = SearchDataObjectRequest::new(["agents"], json!({}))?.with_tenant_id("t2");
    let result = backend.search(search).await?.search_result()?;
    assert!(result.hits.hits.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_put_keeps_other_tenant_document() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, fake) = remote(plain(), true).await;
    backend
        .put(
            PutDataObjectRequest::new("agents", json!({ "owner": "one" }))
                .with_id("x")
                .with_tenant_id("t1"),
        )
        .await?;

    let err = backend
        .put(
            PutDataObjectRequest::new("agents", json!({ "owner": "two" }))
                .with_id("x")
                .with_tenant_id("t2"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let owner = backend
        .get(GetDataObjectRequest::new("agents", "x").with_tenant_id("t1"))
        .await?;
    assert_eq!(Value::Object(owner.source().clone()), json!({ "owner": "one" }));

    // rejected before any write reached the store
    let requests = fake.requests.lock().unwrap().clone();
    assert_eq!(requests.iter().filter(|r| r.starts_with("PUT ")).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tenant_field_stays_internal() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, fake) = remote(plain(), true).await;
    let document = json!({ "name": "a1", "llm": { "model": "m" } });
    let put = backend
        .put(PutDataObjectRequest::new("agents", document.clone()).with_tenant_id("t1"))
        .await?;

    let stored = fake
        .engine
        .get(metastore_engine::GetRequest::new("agents", put.id()))?
        .source
        .expect("stored source");
    assert_eq!(stored["tenant_id"], "t1");

    let get = backend
        .get(GetDataObjectRequest::new("agents", put.id()).with_tenant_id("t1"))
        .await?;
    assert_eq!(Value::Object(get.source().clone()), document);

    let search = SearchDataObjectRequest::new(["agents"], json!({}))?.with_tenant_id("t1");
    let result = backend.search(search).await?.search_result()?;
    assert_eq!(result.hits.hits.len(), 1);
    assert_eq!(Value::Object(result.hits.hits[0].source.clone().unwrap()), document);

    let err = backend
        .put(
            PutDataObjectRequest::new("agents", json!({ "name": "a1", "tenant_id": "spoof" }))
                .with_tenant_id("t1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

#[tokio::test]
async fn test_basic_auth_header() -> Result<(), Box<dyn std::error::Error>> {
    let transport = Transport::Plain {
        basic_auth: Some(("admin".to_string(), "secret".to_string())),
    };
    let (backend, fake) = remote(transport, false).await;
    backend.get(GetDataObjectRequest::new("agents", "x")).await?;

    let auth = fake.authorizations.lock().unwrap().clone();
    // base64("admin:secret")
    assert_eq!(auth, vec![Some("Basic YWRtaW46c2VjcmV0".to_string())]);
    Ok(())
}

#[tokio::test]
async fn test_signed_requests_carry_sigv4() -> Result<(), Box<dyn std::error::Error>> {
    let signer = RequestSigner::new(
        SigV4Signer::new("us-east-1", "es"),
        Arc::new(StaticProvider::new(Credentials::new("AKIDEXAMPLE", "secret"))),
    );
    let (backend, fake) = remote(Transport::Signed(signer), false).await;
    assert_eq!(backend.name(), "remote-signed");

    backend
        .put(PutDataObjectRequest::new("agents", json!({ "name": "a1" })).with_id("x"))
        .await?;

    let auth = fake.authorizations.lock().unwrap().clone();
    let header = auth[0].clone().expect("authorization header");
    assert!(header.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(header.contains("/us-east-1/es/aws4_request"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_endpoint_is_backend_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
    let backend = RemoteStoreBackend::new(RemoteClient::new(reqwest::Client::new(), endpoint, plain()), false);
    let err = backend
        .get(GetDataObjectRequest::new("agents", "x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.is_transient());
}
