//! HTTP client for a remote document store

use metastore_core::access::{self, Capability};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;

use super::types::{
    DeleteRequest, ErrorBody, ErrorDetail, GetRequest, GetResponse, IndexRequest, SearchRequest,
    SearchResponse, UpdateRequest, WriteResponse,
};
use super::RemoteError;
use crate::aws::RequestSigner;

/// How requests are authenticated
#[derive(Clone)]
pub enum Transport {
    /// Optional HTTP basic auth
    Plain { basic_auth: Option<(String, String)> },
    /// AWS SigV4
    Signed(RequestSigner),
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Plain { basic_auth } => f
                .debug_struct("Plain")
                .field("user", &basic_auth.as_ref().map(|(user, _)| user))
                .finish(),
            Transport::Signed(signer) => f
                .debug_struct("Signed")
                .field("region", &signer.signer().region())
                .field("service", &signer.signer().service())
                .finish(),
        }
    }
}

/// Client for the REST API of a remote document store
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    endpoint: Url,
    transport: Transport,
}

impl RemoteClient {
    pub fn new(http: reqwest::Client, endpoint: Url, transport: Transport) -> Self {
        Self {
            http,
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.transport, Transport::Signed(_))
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::InvalidRequest(format!("endpoint {} cannot be a base", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, Vec<u8>), RemoteError> {
        access::check(Capability::Network).map_err(|e| RemoteError::Denied(e.to_string()))?;

        let body = body.unwrap_or_default();
        let mut headers = Vec::new();
        if !body.is_empty() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        let mut builder = self.http.request(method.clone(), url.clone());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &self.transport {
            Transport::Plain {
                basic_auth: Some((user, password)),
            } => builder.basic_auth(user, Some(password)),
            Transport::Plain { basic_auth: None } => builder,
            Transport::Signed(signer) => {
                signer
                    .sign(builder, method.as_str(), &url, &headers, &body)
                    .await?
            }
        };
        if !body.is_empty() {
            builder = builder.body(body);
        }

        debug!(method = %method, path = url.path(), "Sending remote request");
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok((status, bytes.to_vec()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, RemoteError> {
        let (status, bytes) = self.send(method, url, body).await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// `PUT /{index}/_doc/{id}` or `POST /{index}/_doc`
    pub async fn index(&self, request: IndexRequest) -> Result<WriteResponse, RemoteError> {
        let mut query = vec![("refresh", "true".to_string())];
        if let Some(op_type) = request.op_type {
            query.push(("op_type", op_type.as_str().to_string()));
        }
        let body = to_body(&request.document)?;
        match &request.id {
            Some(id) => {
                let url = self.url(&[&request.index, "_doc", id], &query)?;
                self.call(Method::PUT, url, Some(body)).await
            }
            None => {
                let url = self.url(&[&request.index, "_doc"], &query)?;
                self.call(Method::POST, url, Some(body)).await
            }
        }
    }

    /// `GET /{index}/_doc/{id}`. A 404 for a missing document is returned as `found: false`.
    pub async fn get(&self, request: GetRequest) -> Result<GetResponse, RemoteError> {
        let mut query = Vec::new();
        if let Some(fetch) = request.source {
            query.push(("_source", fetch.to_string()));
        }
        if !request.source_includes.is_empty() {
            query.push(("_source_includes", request.source_includes.join(",")));
        }
        if !request.source_excludes.is_empty() {
            query.push(("_source_excludes", request.source_excludes.join(",")));
        }
        let url = self.url(&[&request.index, "_doc", &request.id], &query)?;
        let (status, bytes) = self.send(Method::GET, url, None).await?;

        if status == StatusCode::NOT_FOUND {
            // a missing document has a get body, a missing index has an error body
            return Ok(serde_json::from_slice::<GetResponse>(&bytes).unwrap_or(GetResponse {
                index: request.index,
                id: request.id,
                found: false,
                version: None,
                seq_no: None,
                primary_term: None,
                source: None,
            }));
        }
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// `POST /{index}/_update/{id}` with `{"doc": ...}`
    pub async fn update(&self, request: UpdateRequest) -> Result<WriteResponse, RemoteError> {
        let mut query = vec![("refresh", "true".to_string())];
        if let Some(seq_no) = request.if_seq_no {
            query.push(("if_seq_no", seq_no.to_string()));
        }
        if let Some(primary_term) = request.if_primary_term {
            query.push(("if_primary_term", primary_term.to_string()));
        }
        let url = self.url(&[&request.index, "_update", &request.id], &query)?;
        let body = to_body(&serde_json::json!({ "doc": request.doc }))?;
        self.call(Method::POST, url, Some(body)).await
    }

    /// `DELETE /{index}/_doc/{id}`. A 404 still carries a write response with `not_found`.
    pub async fn delete(&self, request: DeleteRequest) -> Result<WriteResponse, RemoteError> {
        let url = self.url(
            &[&request.index, "_doc", &request.id],
            &[("refresh", "true".to_string())],
        )?;
        let (status, bytes) = self.send(Method::DELETE, url, None).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            if let Ok(response) = serde_json::from_slice::<WriteResponse>(&bytes) {
                return Ok(response);
            }
        }
        Err(status_error(status, &bytes))
    }

    /// `POST /{i1,i2}/_search`
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, RemoteError> {
        if request.index.is_empty() {
            return Err(RemoteError::InvalidRequest(
                "search requires at least one index".to_string(),
            ));
        }
        let indices = request.index.join(",");
        let url = self.url(&[&indices, "_search"], &[])?;
        let body = to_body(&request)?;
        self.call(Method::POST, url, Some(body)).await
    }
}

fn to_body<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec(value).map_err(|e| RemoteError::InvalidRequest(e.to_string()))
}

fn status_error(status: StatusCode, body: &[u8]) -> RemoteError {
    let (error_type, reason) = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Structured { error_type, reason },
        }) => (Some(error_type), reason),
        Ok(ErrorBody {
            error: ErrorDetail::Text(text),
        }) => (None, Some(text)),
        Err(_) => (None, None),
    };
    RemoteError::Status {
        status: status.as_u16(),
        error_type,
        reason: reason.unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> RemoteClient {
        RemoteClient::new(
            reqwest::Client::new(),
            Url::parse(endpoint).unwrap(),
            Transport::Plain { basic_auth: None },
        )
    }

    #[test]
    fn test_url_encodes_segments_and_query() {
        let url = client("http://localhost:9200")
            .url(&["agents", "_doc", "a b/c"], &[("refresh", "true".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/agents/_doc/a%20b%2Fc?refresh=true"
        );
    }

    #[test]
    fn test_url_keeps_endpoint_path_prefix() {
        let url = client("https://proxy.example.com/search/")
            .url(&["a,b", "_search"], &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/search/a,b/_search");
    }

    #[test]
    fn test_status_error_parses_error_body() {
        let err = status_error(
            StatusCode::CONFLICT,
            br#"{"error":{"type":"version_conflict_engine_exception","reason":"[1]: version conflict"},"status":409}"#,
        );
        assert_eq!(
            err,
            RemoteError::Status {
                status: 409,
                error_type: Some("version_conflict_engine_exception".to_string()),
                reason: "[1]: version conflict".to_string(),
            }
        );

        let plain = status_error(StatusCode::BAD_GATEWAY, b"upstream down");
        assert!(matches!(plain, RemoteError::Status { status: 502, ref reason, .. } if reason == "upstream down"));
    }

    #[test]
    fn test_transport_debug_hides_password() {
        let transport = Transport::Plain {
            basic_auth: Some(("admin".to_string(), "hunter2".to_string())),
        };
        let rendered = format!("{:?}", transport);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
