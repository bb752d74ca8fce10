//! Wallet provider seam: an EIP-1193 style `request(method, params)`.
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// The wallet does not know the requested chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// The user declined the request in the wallet.
pub const USER_REJECTED: i64 = 4001;
/// JSON-RPC internal error, also used for transport failures.
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("wallet error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Talks JSON-RPC 2.0 over HTTP to a wallet that signs on the user's behalf.
#[derive(Debug)]
pub struct HttpWalletProvider {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(id, method, "Wallet request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(method, error = %e, "Wallet unreachable");
                ProviderError::new(INTERNAL_ERROR, e.to_string())
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                INTERNAL_ERROR,
                format!("wallet answered HTTP {status}"),
            ));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(INTERNAL_ERROR, e.to_string()))?;
        if let Some(error) = rpc.error {
            debug!(method, code = error.code, "Wallet returned an error");
            return Err(ProviderError::new(error.code, error.message));
        }
        Ok(rpc.result.unwrap_or(Value::Null))
    }
}
