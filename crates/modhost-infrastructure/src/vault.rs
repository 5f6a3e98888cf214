//! HTTP vault client
//!
//! Reads KV version 2 secrets: `GET {address}/v1/{mount}/data/{path}` with the
//! token in `X-Vault-Token`; the key is taken from `data.data`.
//!
//! The response body is held in a zeroizing buffer and the secret table is
//! kept as raw JSON slices of it, so only the requested key is decoded.

use std::time::Duration;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::value::RawValue;
use zeroize::Zeroizing;

use modhost_domain::ports::VaultClient;
use modhost_domain::ports::secrets::VaultError;
use modhost_domain::{Error, Result};

use crate::config::VaultConfig;
use crate::constants::VAULT_TOKEN_HEADER;
use crate::error_ext::ErrorContext;

/// Transport-level vault failure
#[derive(Debug, thiserror::Error)]
pub enum VaultTransportError {
    #[error("vault request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vault returned HTTP {status} for {mount}/{path}")]
    Status {
        status: u16,
        mount: String,
        path: String,
    },

    #[error("key '{key}' not present in {mount}/{path}")]
    MissingKey {
        key: String,
        mount: String,
        path: String,
    },

    #[error("malformed KV v2 response for {mount}/{path}: {source}")]
    Malformed {
        mount: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("key '{key}' in {mount}/{path} is not a string")]
    NotAString {
        key: String,
        mount: String,
        path: String,
    },
}

/// Vault client over reqwest
pub struct HttpVaultClient {
    client: reqwest::Client,
    address: String,
    token: Zeroizing<String>,
}

impl HttpVaultClient {
    /// Client for `address` authenticating with `token`
    pub fn new(address: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build vault HTTP client")?;
        Ok(Self {
            client,
            address: address.into().trim_end_matches('/').to_string(),
            token: Zeroizing::new(token.into()),
        })
    }

    /// Client from host configuration, reading the token from its variable
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            Error::configuration(format!(
                "vault token variable '{}' is not set",
                config.token_env
            ))
        })?;
        Self::new(
            config.address.as_str(),
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// KV v2 read URL for a secret
    pub fn secret_url(&self, mount: &str, path: &str) -> String {
        format!("{}/v1/{mount}/data/{path}", self.address)
    }

    async fn read_key(
        &self,
        mount: &str,
        path: &str,
        key: &str,
    ) -> std::result::Result<Zeroizing<Vec<u8>>, VaultTransportError> {
        let response = self
            .client
            .get(self.secret_url(mount, path))
            .header(VAULT_TOKEN_HEADER, self.token.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultTransportError::Status {
                status: status.as_u16(),
                mount: mount.to_string(),
                path: path.to_string(),
            });
        }

        let body = Zeroizing::new(Vec::from(response.bytes().await?));
        extract_key(&body, mount, path, key)
    }
}

#[derive(Deserialize)]
struct KvResponse<'a> {
    #[serde(borrow)]
    data: KvData<'a>,
}

#[derive(Deserialize)]
struct KvData<'a> {
    #[serde(borrow)]
    data: HashMap<String, &'a RawValue>,
}

/// Decode `data.data[key]` out of a KV v2 response body
fn extract_key(
    body: &[u8],
    mount: &str,
    path: &str,
    key: &str,
) -> std::result::Result<Zeroizing<Vec<u8>>, VaultTransportError> {
    let response: KvResponse<'_> =
        serde_json::from_slice(body).map_err(|source| VaultTransportError::Malformed {
            mount: mount.to_string(),
            path: path.to_string(),
            source,
        })?;

    let raw = response
        .data
        .data
        .get(key)
        .ok_or_else(|| VaultTransportError::MissingKey {
            key: key.to_string(),
            mount: mount.to_string(),
            path: path.to_string(),
        })?;

    match serde_json::from_str::<String>(raw.get()) {
        Ok(secret) => Ok(Zeroizing::new(secret.into_bytes())),
        Err(_) => Err(VaultTransportError::NotAString {
            key: key.to_string(),
            mount: mount.to_string(),
            path: path.to_string(),
        }),
    }
}

#[async_trait]
impl VaultClient for HttpVaultClient {
    async fn read(
        &self,
        mount: &str,
        path: &str,
        key: &str,
    ) -> std::result::Result<Zeroizing<Vec<u8>>, VaultError> {
        self.read_key(mount, path, key)
            .await
            .map_err(|e| Box::new(e) as VaultError)
    }

    fn client_name(&self) -> &str {
        "http-kv2"
    }
}

impl std::fmt::Debug for HttpVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVaultClient")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
