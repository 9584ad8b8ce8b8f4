//! AWS Signature Version 4 request signing

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

use super::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Request URL has no host: {0}")]
    MissingHost(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Signs requests for one service in one region
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    region: String,
    service: String,
    sign_payload_header: bool,
}

impl SigV4Signer {
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
            sign_payload_header: false,
        }
    }

    /// Also send and sign `x-amz-content-sha256` (required by some services)
    pub fn with_payload_header(mut self, enabled: bool) -> Self {
        self.sign_payload_header = enabled;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Compute the headers to attach to a request.
    ///
    /// `headers` are the caller's own headers that should be covered by the signature. The
    /// returned list holds `host`, `x-amz-date`, the optional token and payload headers, and
    /// `authorization`; the caller's headers are not repeated.
    pub fn sign(
        &self,
        credentials: &Credentials,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: &[u8],
        time: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, SigningError> {
        let amz_date = time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = time.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(body));

        let mut added = vec![
            ("host".to_string(), host_header(url)?),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &credentials.session_token {
            added.push(("x-amz-security-token".to_string(), token.clone()));
        }
        if self.sign_payload_header {
            added.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
        }

        let canonical_headers = canonicalize_headers(headers.iter().chain(added.iter()));
        let signed_headers = canonical_headers
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.to_uppercase(),
            canonical_uri(url),
            canonical_query(url),
            canonical_headers
                .iter()
                .map(|(name, value)| format!("{}:{}\n", name, value))
                .collect::<String>(),
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&credentials.secret_access_key, &date, &self.region, &self.service)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        added.push((
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
            ),
        ));
        Ok(added)
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the per-day signing key
pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac(format!("AWS4{}", secret_access_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn host_header(url: &Url) -> Result<String, SigningError> {
    let host = url
        .host_str()
        .ok_or_else(|| SigningError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// RFC 3986 encoding of everything but unreserved characters
fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_string()
    } else {
        uri_encode(path, true)
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, false), uri_encode(&v, false)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonicalize_headers<'a>(
    headers: impl Iterator<Item = &'a (String, String)>,
) -> BTreeMap<String, String> {
    let mut canonical: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        canonical
            .entry(name.to_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    canonical
}
