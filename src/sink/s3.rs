//! S3-compatible object store sink
//!
//! Uploads are a single `PUT {endpoint}/{bucket}/{key}` signed with AWS
//! Signature Version 4. Path-style addressing is used for every endpoint so
//! that self-hosted stores and the default AWS endpoint behave the same.

use crate::config::{Credentials, S3SinkConfig, UserAgentConfig};
use crate::sink::{PersistenceFailure, Sink};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::Path;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Headers produced by signing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub content_sha256: String,
    pub authorization: String,
}

/// Signs a request with AWS Signature Version 4
///
/// `host`, `x-amz-content-sha256` and `x-amz-date` are always signed;
/// `extra_headers` (lowercase names) are signed alongside them.
///
/// # Arguments
///
/// * `method` - HTTP method, upper case
/// * `host` - Host header value, including any explicit port
/// * `canonical_uri` - Already percent-encoded request path
/// * `payload_hash` - Hex SHA-256 of the request body
pub fn sign_request(
    method: &str,
    host: &str,
    canonical_uri: &str,
    extra_headers: &[(&str, &str)],
    payload_hash: &str,
    credentials: &Credentials,
    at: DateTime<Utc>,
) -> Result<SignedHeaders, PersistenceFailure> {
    let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
    let date = at.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = vec![
        ("host".to_string(), host.to_string()),
        ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    headers.extend(
        extra_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string())),
    );
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let scope = format!("{}/{}/{}/aws4_request", date, credentials.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", credentials.secret_key);
    let key = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let key = hmac_sha256(&key, credentials.region.as_bytes())?;
    let key = hmac_sha256(&key, SERVICE.as_bytes())?;
    let key = hmac_sha256(&key, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        amz_date,
        content_sha256: payload_hash.to_string(),
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key, scope, signed_headers, signature
        ),
    })
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PersistenceFailure> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| PersistenceFailure::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encodes an object key, keeping `/` separators
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Uploads artifacts to a bucket
#[derive(Debug)]
pub struct S3Sink {
    client: Client,
    endpoint: Url,
    bucket: String,
    credentials: Credentials,
}

impl S3Sink {
    pub fn new(
        config: &S3SinkConfig,
        credentials: Credentials,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, HarvestError> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => Url::parse(endpoint)?,
            None => Url::parse(&format!("https://s3.{}.amazonaws.com", credentials.region))?,
        };

        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Host header value; explicit ports are part of the signed host
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn object_path(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            encode_key(&self.bucket),
            encode_key(key.trim_start_matches('/'))
        )
    }
}

impl Sink for S3Sink {
    fn store(
        &self,
        path: &Path,
        key: &str,
    ) -> impl Future<Output = Result<(), PersistenceFailure>> + Send {
        let path = path.to_path_buf();
        let key = key.to_string();

        async move {
            let body = tokio::fs::read(&path)
                .await
                .map_err(|source| PersistenceFailure::Read {
                    path: path.display().to_string(),
                    source,
                })?;

            let host = self.host();
            let object_path = self.object_path(&key);
            let payload_hash = hex::encode(Sha256::digest(&body));
            let signed = sign_request(
                "PUT",
                &host,
                &object_path,
                &[],
                &payload_hash,
                &self.credentials,
                Utc::now(),
            )?;

            let url = format!("{}://{}{}", self.endpoint.scheme(), host, object_path);
            tracing::info!("Uploading {} ({} bytes) to {}", key, body.len(), url);

            let response = self
                .client
                .put(&url)
                .header("x-amz-date", &signed.amz_date)
                .header("x-amz-content-sha256", &signed.content_sha256)
                .header("authorization", &signed.authorization)
                .header("content-type", "text/csv")
                .body(body)
                .send()
                .await
                .map_err(|e| PersistenceFailure::Transport {
                    key: key.clone(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PersistenceFailure::Rejected {
                    key,
                    status: status.as_u16(),
                    body,
                });
            }

            tracing::info!("Stored {} in bucket {}", key, self.bucket);
            Ok(())
        }
    }

    fn describe(&self) -> String {
        format!("bucket {} at {}", self.bucket, self.endpoint)
    }
}
