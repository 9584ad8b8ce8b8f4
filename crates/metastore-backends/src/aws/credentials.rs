//! AWS credential providers
//!
//! [`CredentialsChain::default_chain`] tries, in order: environment variables, the container
//! credentials endpoint, and the EC2 instance metadata service (IMDSv2). The first provider that
//! yields credentials wins and the result is cached until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Refresh cached credentials this long before they expire
const REFRESH_MARGIN_MINUTES: i64 = 5;

const CONTAINER_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";

/// Credential resolution errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    /// The provider does not apply in this environment
    #[error("{0}")]
    NotConfigured(String),

    #[error("Credentials endpoint request failed: {0}")]
    Http(String),

    #[error("Invalid credentials response: {0}")]
    InvalidResponse(String),

    /// Every provider of a chain failed
    #[error("No credentials available: {0}")]
    Exhausted(String),
}

/// A set of AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Whether these credentials are within the refresh margin of `now`
    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.expiration
            .map(|exp| exp - Duration::minutes(REFRESH_MARGIN_MINUTES) <= now)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// A source of credentials (Object Safe)
#[async_trait]
pub trait ProvideCredentials: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn provide(&self) -> Result<Credentials, CredentialsError>;
}

/// Fixed credentials
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ProvideCredentials for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.credentials.clone())
    }
}

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider {
    overrides: Option<HashMap<String, String>>,
}

impl EnvironmentProvider {
    /// Read the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from a fixed variable set instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self {
            overrides: Some(vars),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl ProvideCredentials for EnvironmentProvider {
    fn name(&self) -> &str {
        "environment"
    }

    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let access_key_id = self.var("AWS_ACCESS_KEY_ID").ok_or_else(|| {
            CredentialsError::NotConfigured("AWS_ACCESS_KEY_ID is not set".to_string())
        })?;
        let secret_access_key = self.var("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            CredentialsError::NotConfigured("AWS_SECRET_ACCESS_KEY is not set".to_string())
        })?;

        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = self.var("AWS_SESSION_TOKEN");
        Ok(credentials)
    }
}

/// Credentials document served by the container and instance metadata endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsDocument {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    code: Option<String>,
}

impl CredentialsDocument {
    fn into_credentials(self) -> Result<Credentials, CredentialsError> {
        if let Some(code) = self.code.filter(|c| c != "Success") {
            return Err(CredentialsError::InvalidResponse(format!(
                "credentials endpoint returned code {}",
                code
            )));
        }
        Ok(Credentials {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.token,
            expiration: self.expiration,
        })
    }
}

async fn fetch_document(request: reqwest::RequestBuilder) -> Result<CredentialsDocument, CredentialsError> {
    let response = request
        .send()
        .await
        .map_err(|e| CredentialsError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(CredentialsError::Http(format!("Status: {}", response.status())));
    }
    response
        .json()
        .await
        .map_err(|e| CredentialsError::InvalidResponse(e.to_string()))
}

/// ECS/EKS container credentials endpoint
#[derive(Debug, Clone)]
pub struct ContainerProvider {
    client: reqwest::Client,
    env: EnvironmentProvider,
}

impl ContainerProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            env: EnvironmentProvider::new(),
        }
    }

    /// Resolve the endpoint variables from a fixed set
    pub fn with_vars(client: reqwest::Client, vars: HashMap<String, String>) -> Self {
        Self {
            client,
            env: EnvironmentProvider::from_vars(vars),
        }
    }

    fn endpoint(&self) -> Result<String, CredentialsError> {
        if let Some(relative) = self.env.var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            return Ok(format!("{}{}", CONTAINER_HOST, relative));
        }
        self.env
            .var("AWS_CONTAINER_CREDENTIALS_FULL_URI")
            .ok_or_else(|| {
                CredentialsError::NotConfigured(
                    "no container credentials endpoint configured".to_string(),
                )
            })
    }
}

#[async_trait]
impl ProvideCredentials for ContainerProvider {
    fn name(&self) -> &str {
        "container"
    }

    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let endpoint = self.endpoint()?;
        let mut request = self.client.get(&endpoint);
        if let Some(token) = self.env.var("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            request = request.header("Authorization", token);
        }
        fetch_document(request).await?.into_credentials()
    }
}

/// EC2 instance metadata service, session-token (IMDSv2) flow
#[derive(Debug, Clone)]
pub struct InstanceProfileProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl InstanceProfileProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, IMDS_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn session_token(&self) -> Result<String, CredentialsError> {
        let response = self
            .client
            .put(format!("{}/latest/api/token", self.endpoint))
            .header("X-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS)
            .send()
            .await
            .map_err(|e| CredentialsError::NotConfigured(format!("instance metadata unavailable: {}", e)))?;
        if !response.status().is_success() {
            return Err(CredentialsError::Http(format!("Status: {}", response.status())));
        }
        response
            .text()
            .await
            .map_err(|e| CredentialsError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProvideCredentials for InstanceProfileProvider {
    fn name(&self) -> &str {
        "instance-profile"
    }

    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let token = self.session_token().await?;
        let base = format!("{}/latest/meta-data/iam/security-credentials/", self.endpoint);

        let roles = self
            .client
            .get(&base)
            .header("X-aws-ec2-metadata-token", &token)
            .send()
            .await
            .map_err(|e| CredentialsError::Http(e.to_string()))?
            .text()
            .await
            .map_err(|e| CredentialsError::InvalidResponse(e.to_string()))?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| {
                CredentialsError::NotConfigured("no instance profile role attached".to_string())
            })?;

        let request = self
            .client
            .get(format!("{}{}", base, role))
            .header("X-aws-ec2-metadata-token", &token);
        fetch_document(request).await?.into_credentials()
    }
}

/// Ordered provider chain with an expiry-aware cache
#[derive(Debug)]
pub struct CredentialsChain {
    providers: Vec<Arc<dyn ProvideCredentials>>,
    cached: RwLock<Option<Credentials>>,
}

impl CredentialsChain {
    pub fn new(providers: Vec<Arc<dyn ProvideCredentials>>) -> Self {
        Self {
            providers,
            cached: RwLock::new(None),
        }
    }

    /// Environment, then container, then instance profile
    pub fn default_chain(client: reqwest::Client) -> Self {
        let providers: Vec<Arc<dyn ProvideCredentials>> = vec![
            Arc::new(EnvironmentProvider::new()),
            Arc::new(ContainerProvider::new(client.clone())),
            Arc::new(InstanceProfileProvider::new(client)),
        ];
        Self::new(providers)
    }

    async fn resolve(&self) -> Result<Credentials, CredentialsError> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.provide().await {
                Ok(credentials) => {
                    debug!(provider = provider.name(), "Resolved AWS credentials");
                    return Ok(credentials);
                }
                Err(CredentialsError::NotConfigured(reason)) => {
                    debug!(provider = provider.name(), %reason, "Credentials provider skipped");
                    failures.push(format!("{}: {}", provider.name(), reason));
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Credentials provider failed");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(CredentialsError::Exhausted(failures.join("; ")))
    }
}

#[async_trait]
impl ProvideCredentials for CredentialsChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let now = Utc::now();
        if let Some(credentials) = self.cached.read().await.as_ref() {
            if !credentials.expires_soon(now) {
                return Ok(credentials.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // another task may have refreshed while we waited
        if let Some(credentials) = cached.as_ref() {
            if !credentials.expires_soon(now) {
                return Ok(credentials.clone());
            }
        }
        let fresh = self.resolve().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingProvider {
        calls: AtomicUsize,
        expires_in: Option<Duration>,
    }

    #[async_trait]
    impl ProvideCredentials for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn provide(&self) -> Result<Credentials, CredentialsError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut credentials = Credentials::new(format!("AKID{}", n), "secret");
            credentials.expiration = self.expires_in.map(|d| Utc::now() + d);
            Ok(credentials)
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_environment_provider() {
        let provider = EnvironmentProvider::from_vars(vars(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]));
        let credentials = provider.provide().await.unwrap();
        assert_eq!(credentials.access_key_id, "AKID");
        assert_eq!(credentials.session_token.as_deref(), Some("token"));

        let missing = EnvironmentProvider::from_vars(vars(&[("AWS_ACCESS_KEY_ID", "AKID")]));
        assert!(matches!(
            missing.provide().await,
            Err(CredentialsError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_falls_through_in_order() {
        let providers: Vec<Arc<dyn ProvideCredentials>> = vec![
            Arc::new(EnvironmentProvider::from_vars(HashMap::new())),
            Arc::new(StaticProvider::new(Credentials::new("AKSTATIC", "s"))),
        ];
        let chain = CredentialsChain::new(providers);
        assert_eq!(chain.provide().await.unwrap().access_key_id, "AKSTATIC");
    }

    #[tokio::test]
    async fn test_chain_reports_every_failure() {
        let providers: Vec<Arc<dyn ProvideCredentials>> = vec![
            Arc::new(EnvironmentProvider::from_vars(HashMap::new())),
            Arc::new(ContainerProvider::with_vars(reqwest::Client::new(), HashMap::new())),
        ];
        let chain = CredentialsChain::new(providers);
        match chain.provide().await {
            Err(CredentialsError::Exhausted(msg)) => {
                assert!(msg.contains("environment"));
                assert!(msg.contains("container"));
            }
            other => panic!("expected exhausted chain, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chain_caches_until_near_expiry() {
        let long_lived = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::hours(1)),
        });
        let chain = CredentialsChain::new(vec![long_lived.clone() as Arc<dyn ProvideCredentials>]);
        chain.provide().await.unwrap();
        chain.provide().await.unwrap();
        assert_eq!(long_lived.calls.load(Ordering::SeqCst), 1);

        let short_lived = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::minutes(2)),
        });
        let chain = CredentialsChain::new(vec![short_lived.clone() as Arc<dyn ProvideCredentials>]);
        chain.provide().await.unwrap();
        let second = chain.provide().await.unwrap();
        assert_eq!(short_lived.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.access_key_id, "AKID1");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("AKID", "super-secret").with_session_token("tok");
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("tok\""));
    }
}
