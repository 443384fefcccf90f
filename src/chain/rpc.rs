//! JSON-RPC balance clients
//!
//! Thin `query(address) -> balance` clients for EVM nodes (`eth_getBalance`)
//! and Solana nodes (`getBalance`). Timeouts here are a transport backstop;
//! the adapter applies the contractual timeout on top.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{Address, Amount};
use crate::error::{BalanceQueryError, Error};

/// JSON-RPC "invalid params" error code
const INVALID_PARAMS: i64 = -32602;

/// Network client used by an adapter to read balances
#[async_trait]
pub trait BalanceClient: Send + Sync {
    /// Native balance of `address`, in the chain's native unit
    async fn query(&self, address: &Address) -> Result<Amount, BalanceQueryError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC 2.0 transport
#[derive(Debug, Clone)]
struct JsonRpc {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl JsonRpc {
    fn new(endpoint: impl Into<String>, timeout: Duration) -> crate::error::Result<Self> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("Invalid RPC endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BalanceQueryError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!("RPC {} -> {}", method, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BalanceQueryError::NetworkUnavailable(format!(
                "RPC HTTP {}: {}",
                status, text
            )));
        }

        let value: Value = response.json().await.map_err(|e| {
            BalanceQueryError::MalformedResponse(format!("Failed to parse RPC response: {}", e))
        })?;

        parse_rpc_response(value)
    }

    fn transport_error(&self, e: reqwest::Error) -> BalanceQueryError {
        if e.is_timeout() {
            BalanceQueryError::Timeout(self.timeout)
        } else {
            BalanceQueryError::NetworkUnavailable(e.to_string())
        }
    }
}

fn parse_rpc_response<T: DeserializeOwned>(value: Value) -> Result<T, BalanceQueryError> {
    let response: RpcResponse<T> = serde_json::from_value(value)
        .map_err(|e| BalanceQueryError::MalformedResponse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(if error.code == INVALID_PARAMS {
            BalanceQueryError::InvalidAddress(error.message)
        } else {
            BalanceQueryError::NetworkUnavailable(format!(
                "RPC error {}: {}",
                error.code, error.message
            ))
        });
    }

    response
        .result
        .ok_or_else(|| BalanceQueryError::MalformedResponse("Missing result".to_string()))
}

/// Convert a hex quantity of base units (e.g. wei) into native units
fn parse_hex_quantity(quantity: &str, decimals: u32) -> Result<Amount, BalanceQueryError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| BalanceQueryError::MalformedResponse(format!("Not a hex quantity: {}", quantity)))?;

    let raw = if digits.is_empty() {
        0
    } else {
        u128::from_str_radix(digits, 16).map_err(|e| {
            BalanceQueryError::MalformedResponse(format!("Bad quantity {}: {}", quantity, e))
        })?
    };

    let raw = i128::try_from(raw)
        .map_err(|_| BalanceQueryError::MalformedResponse(format!("Quantity overflow: {}", quantity)))?;

    Decimal::try_from_i128_with_scale(raw, decimals)
        .map(|d| d.normalize())
        .map_err(|e| BalanceQueryError::MalformedResponse(format!("Quantity overflow: {}", e)))
}

/// Convert lamports into SOL
fn lamports_to_sol(lamports: u64) -> Amount {
    Decimal::from_i128_with_scale(lamports as i128, 9).normalize()
}

/// Balance client for EVM JSON-RPC nodes
#[derive(Debug, Clone)]
pub struct EvmRpcClient {
    rpc: JsonRpc,
    decimals: u32,
}

impl EvmRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> crate::error::Result<Self> {
        Ok(Self {
            rpc: JsonRpc::new(endpoint, timeout)?,
            decimals: 18,
        })
    }
}

#[async_trait]
impl BalanceClient for EvmRpcClient {
    async fn query(&self, address: &Address) -> Result<Amount, BalanceQueryError> {
        let quantity: String = self
            .rpc
            .call("eth_getBalance", json!([address.as_str(), "latest"]))
            .await?;
        parse_hex_quantity(&quantity, self.decimals)
    }
}

#[derive(Debug, Deserialize)]
struct SolanaBalance {
    value: u64,
}

/// Balance client for Solana JSON-RPC nodes
#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    rpc: JsonRpc,
}

impl SolanaRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> crate::error::Result<Self> {
        Ok(Self {
            rpc: JsonRpc::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl BalanceClient for SolanaRpcClient {
    async fn query(&self, address: &Address) -> Result<Amount, BalanceQueryError> {
        let balance: SolanaBalance = self
            .rpc
            .call(
                "getBalance",
                json!([address.as_str(), { "commitment": "confirmed" }]),
            )
            .await?;
        Ok(lamports_to_sol(balance.value))
    }
}
