//! Store configuration
//!
//! [`StoreConfig`] is layered by the `config` crate: serde defaults, then an optional file
//! (format picked from the extension), then `METASTORE_*` environment variables.

use metastore_core::{DataObjectError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "METASTORE";

/// Which storage technology backs the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// In-process document engine
    #[default]
    Embedded,
    /// Remote document store over plain HTTP(S)
    RemoteDocumentStore,
    /// Remote document store with SigV4-signed requests
    RemoteDocumentStoreSigned,
    /// DynamoDB-style key-value store
    KeyValue,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Embedded => "embedded",
            BackendType::RemoteDocumentStore => "remote-document-store",
            BackendType::RemoteDocumentStoreSigned => "remote-document-store-signed",
            BackendType::KeyValue => "key-value",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = DataObjectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "embedded" => Ok(BackendType::Embedded),
            "remote-document-store" => Ok(BackendType::RemoteDocumentStore),
            "remote-document-store-signed" => Ok(BackendType::RemoteDocumentStoreSigned),
            "key-value" => Ok(BackendType::KeyValue),
            other => Err(DataObjectError::Configuration(format!(
                "Unknown backend type: {}",
                other
            ))),
        }
    }
}

/// Connection and behavior settings for one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend_type: BackendType,
    /// Remote document store URL; for `key-value` it pairs a search backend
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// SigV4 service name, `es` or `aoss`
    pub signing_service: Option<String>,
    /// Basic auth for `remote-document-store`
    pub username: Option<String>,
    pub password: Option<String>,
    /// Static AWS credentials; the provider chain is used when absent
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub multi_tenancy: bool,
    /// Accept self-signed TLS certificates. Never enable in production.
    pub trust_self_signed: bool,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_idle_connections: usize,
    /// Override of the DynamoDB endpoint (e.g. a local emulator)
    pub kv_endpoint: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::Embedded,
            endpoint: None,
            region: None,
            signing_service: None,
            username: None,
            password: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            multi_tenancy: false,
            trust_self_signed: false,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
            max_idle_connections: 50,
            kv_endpoint: None,
        }
    }
}

impl StoreConfig {
    /// Embedded configuration
    pub fn embedded() -> Self {
        Self::default()
    }

    /// Plain remote document store at `endpoint`
    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self {
            backend_type: BackendType::RemoteDocumentStore,
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Signed remote document store
    pub fn remote_signed(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        signing_service: impl Into<String>,
    ) -> Self {
        Self {
            backend_type: BackendType::RemoteDocumentStoreSigned,
            endpoint: Some(endpoint.into()),
            region: Some(region.into()),
            signing_service: Some(signing_service.into()),
            ..Self::default()
        }
    }

    /// Key-value store in `region`
    pub fn key_value(region: impl Into<String>) -> Self {
        Self {
            backend_type: BackendType::KeyValue,
            region: Some(region.into()),
            ..Self::default()
        }
    }

    pub fn with_multi_tenancy(mut self, enabled: bool) -> Self {
        self.multi_tenancy = enabled;
        self
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Load from an optional file with `METASTORE_*` environment variables on top
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(|e| {
            DataObjectError::Configuration(format!("Failed to build config: {}", e))
        })?;
        config.try_deserialize().map_err(|e| {
            DataObjectError::Configuration(format!("Failed to deserialize config: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_core::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_backend_type_names() {
        for backend_type in [
            BackendType::Embedded,
            BackendType::RemoteDocumentStore,
            BackendType::RemoteDocumentStoreSigned,
            BackendType::KeyValue,
        ] {
            assert_eq!(backend_type.as_str().parse::<BackendType>().unwrap(), backend_type);
            let json = serde_json::to_value(backend_type).unwrap();
            assert_eq!(json, backend_type.as_str());
        }

        let err = "cassandra".parse::<BackendType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.backend_type, BackendType::Embedded);
        assert!(!config.multi_tenancy);
        assert!(!config.trust_self_signed);
        assert_eq!(config.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "metastore-config-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "backend_type = \"remote-document-store-signed\"\n\
             endpoint = \"https://search.example.com\"\n\
             region = \"us-east-1\"\n\
             signing_service = \"aoss\"\n\
             multi_tenancy = true"
        )
        .unwrap();

        let config = StoreConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.backend_type, BackendType::RemoteDocumentStoreSigned);
        assert_eq!(config.signing_service.as_deref(), Some("aoss"));
        assert!(config.multi_tenancy);
        assert_eq!(config.read_timeout_ms, 30_000);
    }

    #[test]
    fn test_unknown_backend_type_in_file_is_configuration_error() {
        let path = std::env::temp_dir().join(format!(
            "metastore-bad-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "backend_type": "cassandra" }"#).unwrap();

        let err = StoreConfig::load(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = StoreConfig::load(Some("/nonexistent/metastore.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
