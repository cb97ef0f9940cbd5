//! L2 operator client
//!
//! [`SyncProvider`] is the capability set the wallet and the orchestration
//! need from the zkSync operator. [`HttpSyncProvider`] speaks its JSON-RPC 2.0
//! API over HTTP.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::types::{
    AccountState, ContractAddress, Fee, OperationReceipt, SyncTx, SyncTxHash, Tokens,
    TxEthSignature, TxFeeType,
};

/// The operator refused or failed an L2 operation
///
/// Carried inside an `eyre::Report`; recover it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} rejected by the L2 operator: {reason}")]
pub struct TxRejected {
    pub operation: String,
    pub reason: String,
}

impl TxRejected {
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Capabilities consumed from the L2 operator
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Settlement contract the operator is bound to
    async fn contract_address(&self) -> Result<ContractAddress>;

    /// Tokens the network accepts, keyed by symbol
    async fn tokens(&self) -> Result<Tokens>;

    /// Committed and verified state of an account
    async fn account_info(&self, address: Address) -> Result<AccountState>;

    /// Fee quote for an operation paid in `token`
    async fn get_tx_fee(&self, tx_type: TxFeeType, address: Address, token: &str) -> Result<Fee>;

    /// Submit a signed transaction. A refusal is a [`TxRejected`] error.
    async fn submit_tx(
        &self,
        tx: SyncTx,
        eth_signature: Option<TxEthSignature>,
    ) -> Result<SyncTxHash>;

    /// Status of a submitted transaction
    async fn tx_info(&self, hash: &SyncTxHash) -> Result<OperationReceipt>;

    /// Status of a priority operation by the serial id the base chain assigned
    async fn ethop_info(&self, serial_id: u64) -> Result<OperationReceipt>;

    /// Release the connection. Later requests fail.
    async fn disconnect(&self) -> Result<()>;
}

/// Operator endpoints for the public networks and the local dev operator
pub fn network_url(network: &str) -> Option<&'static str> {
    match network {
        "mainnet" => Some("https://api.zksync.io/jsrpc"),
        "rinkeby" => Some("https://rinkeby-api.zksync.io/jsrpc"),
        "ropsten" => Some("https://ropsten-api.zksync.io/jsrpc"),
        "localhost" => Some("http://127.0.0.1:3030"),
        _ => None,
    }
}

/// JSON-RPC response wrapper
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

/// JSON-RPC operator client
pub struct HttpSyncProvider {
    url: Url,
    client: Client,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpSyncProvider {
    /// Client for an explicit operator URL
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            url,
            client,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Client for a named network (`rinkeby`, `ropsten`, `mainnet`,
    /// `localhost`); anything else is parsed as an operator URL
    pub fn get_default_provider(network: &str) -> Result<Self> {
        let raw = network_url(network).unwrap_or(network);
        let url = Url::parse(raw)
            .wrap_err_with(|| format!("'{}' is neither a known network nor a URL", network))?;
        Self::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call `method` and return the raw result, with the RPC error (if any)
    /// kept separate from transport failures
    async fn call(&self, method: &str, params: Value) -> Result<std::result::Result<Value, RpcError>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(eyre!("L2 provider is disconnected"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        debug!(method = method, id = id, "L2 RPC request");

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("L2 RPC {} to {} failed", method, self.url))?
            .json::<RpcResponse<Value>>()
            .await
            .wrap_err_with(|| format!("Malformed L2 RPC {} response", method))?;

        if let Some(error) = response.error {
            return Ok(Err(error));
        }
        Ok(Ok(response.result.unwrap_or(Value::Null)))
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        match self.call(method, params).await? {
            Ok(result) => serde_json::from_value(result)
                .wrap_err_with(|| format!("Unexpected L2 RPC {} result", method)),
            Err(error) => Err(eyre!(
                "L2 RPC {} error {}: {}",
                method,
                error.code,
                error.message
            )),
        }
    }
}

#[async_trait]
impl SyncProvider for HttpSyncProvider {
    async fn contract_address(&self) -> Result<ContractAddress> {
        self.request("contract_address", json!([])).await
    }

    async fn tokens(&self) -> Result<Tokens> {
        self.request("tokens", json!([])).await
    }

    async fn account_info(&self, address: Address) -> Result<AccountState> {
        self.request("account_info", json!([address])).await
    }

    async fn get_tx_fee(&self, tx_type: TxFeeType, address: Address, token: &str) -> Result<Fee> {
        self.request("get_tx_fee", json!([tx_type, address, token]))
            .await
    }

    async fn submit_tx(
        &self,
        tx: SyncTx,
        eth_signature: Option<TxEthSignature>,
    ) -> Result<SyncTxHash> {
        let operation = tx.kind();
        match self
            .call("tx_submit", json!([tx, eth_signature]))
            .await?
        {
            Ok(result) => serde_json::from_value(result)
                .wrap_err("Unexpected tx_submit result"),
            Err(error) => Err(TxRejected::new(operation, error.message).into()),
        }
    }

    async fn tx_info(&self, hash: &SyncTxHash) -> Result<OperationReceipt> {
        self.request("tx_info", json!([hash])).await
    }

    async fn ethop_info(&self, serial_id: u64) -> Result<OperationReceipt> {
        self.request("ethop_info", json!([serial_id])).await
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(url = %self.url, "Disconnected from L2 operator");
        }
        Ok(())
    }
}
