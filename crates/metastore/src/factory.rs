//! Backend construction from [`StoreConfig`]

use metastore_backends::aws::{
    Credentials, CredentialsChain, ProvideCredentials, RequestSigner, SigV4Signer, StaticProvider,
};
use metastore_backends::{
    DynamoDbStore, EmbeddedStoreBackend, KeyValueBackend, RemoteClient, RemoteStoreBackend,
    Transport,
};
use metastore_core::{DataObjectBackend, DataObjectError, Result};
use metastore_engine::DocumentEngine;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{BackendType, StoreConfig};

/// Signing services accepted for `remote-document-store-signed`
pub const ALLOWED_SIGNING_SERVICES: &[&str] = &["es", "aoss"];

const KV_SIGNING_SERVICE: &str = "dynamodb";

/// Build the backend selected by `config`.
///
/// Fails with [`DataObjectError::Configuration`] when a parameter required by the selected
/// backend type is missing or malformed. No backend is constructed in that case.
pub fn create_backend(config: &StoreConfig) -> Result<Arc<dyn DataObjectBackend>> {
    let backend: Arc<dyn DataObjectBackend> = match config.backend_type {
        BackendType::Embedded => Arc::new(create_embedded(config, Arc::new(DocumentEngine::new()))),
        BackendType::RemoteDocumentStore => Arc::new(create_remote(config)?),
        BackendType::RemoteDocumentStoreSigned => Arc::new(create_remote_signed(config)?),
        BackendType::KeyValue => Arc::new(create_key_value(config)?),
    };
    info!(
        backend_type = %config.backend_type,
        backend = backend.name(),
        multi_tenancy = config.multi_tenancy,
        "Created data object backend"
    );
    Ok(backend)
}

/// Embedded backend over a caller-owned engine
pub fn create_embedded(config: &StoreConfig, engine: Arc<DocumentEngine>) -> EmbeddedStoreBackend {
    EmbeddedStoreBackend::new(engine, config.multi_tenancy)
}

/// Plain remote document store, with basic auth when a user is configured
pub fn create_remote(config: &StoreConfig) -> Result<RemoteStoreBackend> {
    let endpoint = required_endpoint(config)?;
    let basic_auth = match (&config.username, &config.password) {
        (Some(user), password) => Some((user.clone(), password.clone().unwrap_or_default())),
        (None, Some(_)) => {
            return Err(DataObjectError::Configuration(
                "A password was configured without a username".to_string(),
            ))
        }
        (None, None) => None,
    };
    let http = http_client(config)?;
    Ok(RemoteStoreBackend::new(
        RemoteClient::new(http, endpoint, Transport::Plain { basic_auth }),
        config.multi_tenancy,
    ))
}

/// Remote document store with SigV4-signed requests
pub fn create_remote_signed(config: &StoreConfig) -> Result<RemoteStoreBackend> {
    let endpoint = required_endpoint(config)?;
    let region = required(&config.region, "region")?;
    let service = required(&config.signing_service, "signing_service")?;
    if !ALLOWED_SIGNING_SERVICES.contains(&service) {
        return Err(DataObjectError::Configuration(format!(
            "Signing service {} is not one of {}",
            service,
            ALLOWED_SIGNING_SERVICES.join(", ")
        )));
    }

    let http = http_client(config)?;
    // serverless collections require the payload hash header
    let signer = SigV4Signer::new(region, service).with_payload_header(service == "aoss");
    let signer = RequestSigner::new(signer, credentials_provider(config, &http)?);
    Ok(RemoteStoreBackend::new(
        RemoteClient::new(http, endpoint, Transport::Signed(signer)),
        config.multi_tenancy,
    ))
}

/// Key-value backend, paired with a plain remote search backend when an endpoint is set
pub fn create_key_value(config: &StoreConfig) -> Result<KeyValueBackend> {
    let region = required(&config.region, "region")?;
    let http = http_client(config)?;
    let credentials = credentials_provider(config, &http)?;

    let store = match &config.kv_endpoint {
        Some(endpoint) => {
            let endpoint = parse_endpoint(endpoint)?;
            let signer =
                RequestSigner::new(SigV4Signer::new(region, KV_SIGNING_SERVICE), credentials);
            DynamoDbStore::new(http.clone(), endpoint, signer)
        }
        None => DynamoDbStore::for_region(http.clone(), region, credentials)
            .map_err(|e| DataObjectError::Configuration(e.to_string()))?,
    };

    let backend = KeyValueBackend::new(Arc::new(store));
    match &config.endpoint {
        Some(_) => {
            let search = RemoteStoreBackend::new(
                RemoteClient::new(
                    http,
                    required_endpoint(config)?,
                    Transport::Plain { basic_auth: None },
                ),
                config.multi_tenancy,
            );
            Ok(backend.with_search_backend(search))
        }
        None => Ok(backend),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DataObjectError::Configuration(format!(
            "Missing required setting: {}",
            name
        ))),
    }
}

fn required_endpoint(config: &StoreConfig) -> Result<Url> {
    parse_endpoint(required(&config.endpoint, "endpoint")?)
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| DataObjectError::Configuration(format!("Invalid endpoint {}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(DataObjectError::Configuration(format!(
            "Endpoint {} must be an http or https URL",
            raw
        ))),
    }
}

/// Static keys when configured, otherwise the environment/container/instance chain
fn credentials_provider(
    config: &StoreConfig,
    http: &reqwest::Client,
) -> Result<Arc<dyn ProvideCredentials>> {
    match (&config.access_key_id, &config.secret_access_key) {
        (Some(key), Some(secret)) => {
            let mut credentials = Credentials::new(key.clone(), secret.clone());
            if let Some(token) = &config.session_token {
                credentials = credentials.with_session_token(token.clone());
            }
            Ok(Arc::new(StaticProvider::new(credentials)))
        }
        (None, None) => Ok(Arc::new(CredentialsChain::default_chain(http.clone()))),
        _ => Err(DataObjectError::Configuration(
            "access_key_id and secret_access_key must be configured together".to_string(),
        )),
    }
}

/// One pooled client shared by every request of a backend
fn http_client(config: &StoreConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .read_timeout(Duration::from_millis(config.read_timeout_ms))
        .pool_max_idle_per_host(config.max_idle_connections);
    if config.trust_self_signed {
        warn!("Accepting self-signed TLS certificates; do not use this setting in production");
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder
        .build()
        .map_err(|e| DataObjectError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
