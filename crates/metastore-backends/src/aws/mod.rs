//! AWS request signing and credential resolution shared by the signed remote transport and the
//! DynamoDB store

pub mod credentials;
pub mod sigv4;

pub use credentials::{
    ContainerProvider, Credentials, CredentialsChain, CredentialsError, EnvironmentProvider,
    InstanceProfileProvider, ProvideCredentials, StaticProvider,
};
pub use sigv4::{SigV4Signer, SigningError};

use chrono::Utc;
use reqwest::{RequestBuilder, Url};
use std::sync::Arc;

/// Region value that selects a local DynamoDB-compatible endpoint
pub const LOCAL_REGION: &str = "local";

/// Signer plus the credentials it signs with
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signer: SigV4Signer,
    credentials: Arc<dyn ProvideCredentials>,
}

/// Why a request could not be signed
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SignRequestError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl RequestSigner {
    pub fn new(signer: SigV4Signer, credentials: Arc<dyn ProvideCredentials>) -> Self {
        Self {
            signer,
            credentials,
        }
    }

    pub fn signer(&self) -> &SigV4Signer {
        &self.signer
    }

    /// Resolve credentials and attach the signature headers to `builder`
    pub async fn sign(
        &self,
        builder: RequestBuilder,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<RequestBuilder, SignRequestError> {
        let credentials = self.credentials.provide().await?;
        let added = self
            .signer
            .sign(&credentials, method, url, headers, body, Utc::now())?;
        Ok(added
            .into_iter()
            // reqwest derives Host from the URL
            .filter(|(name, _)| name != "host")
            .fold(builder, |builder, (name, value)| builder.header(name, value)))
    }
}
