//! Base-chain RPC client
//!
//! [`BaseChainClient`] is the seam the orchestration talks to: balance
//! queries, read-only contract calls and signed transactions that resolve to a
//! mined receipt. [`HttpBaseChain`] implements it over JSON-RPC with alloy.

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, Log, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};
use url::Url;

use crate::identity::Identity;

/// Mined transaction receipt, trimmed to what the token lifecycle inspects
#[derive(Debug, Clone)]
pub struct BaseReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub status: bool,
    pub logs: Vec<Log>,
}

impl BaseReceipt {
    /// Wei spent on gas by this transaction
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }

    /// Decode every log in the receipt that matches event `E`
    pub fn decode_logs<E: SolEvent>(&self) -> Vec<E> {
        self.logs
            .iter()
            .filter_map(|log| E::decode_log_data(&log.data, true).ok())
            .collect()
    }
}

/// Capabilities the orchestration needs from the base chain
#[async_trait]
pub trait BaseChainClient: Send + Sync {
    /// Native chain ID transactions are signed for
    fn chain_id(&self) -> u64;

    /// Native token (ETH) balance of an address
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Execute a read-only call against a contract and return the raw output
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Sign `data` as `from`, send it to `to` with `value` attached and wait
    /// until it is mined. A reverted transaction is an error.
    async fn send_transaction(
        &self,
        from: &Identity,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<BaseReceipt>;
}

/// JSON-RPC base-chain client
pub struct HttpBaseChain {
    rpc_url: Url,
    chain_id: u64,
    provider: RootProvider<Http<Client>>,
}

impl HttpBaseChain {
    /// Create a client against `rpc_url`. The node is not contacted until
    /// [`HttpBaseChain::connect`] or the first request.
    pub fn new(rpc_url: Url, chain_id: u64) -> Self {
        let provider = ProviderBuilder::new().on_http(rpc_url.clone());
        Self {
            rpc_url,
            chain_id,
            provider,
        }
    }

    /// Create a client and check the node answers with the expected chain ID
    pub async fn connect(rpc_url: Url, chain_id: u64) -> Result<Self> {
        let client = Self::new(rpc_url, chain_id);
        let remote = client
            .provider
            .get_chain_id()
            .await
            .wrap_err_with(|| format!("Base-chain node at {} is unreachable", client.rpc_url))?;

        if remote != chain_id {
            return Err(eyre!(
                "Base-chain node reports chain id {}, expected {}",
                remote,
                chain_id
            ));
        }

        info!(rpc_url = %client.rpc_url, chain_id = chain_id, "Connected to base chain");
        Ok(client)
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }
}

#[async_trait]
impl BaseChainClient for HttpBaseChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        let balance = self
            .provider
            .get_balance(address)
            .await
            .wrap_err("Failed to get balance")?;
        Ok(balance)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        let output = self
            .provider
            .call(&tx)
            .await
            .wrap_err_with(|| format!("eth_call to {} failed", to))?;
        Ok(output)
    }

    async fn send_transaction(
        &self,
        from: &Identity,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<BaseReceipt> {
        let wallet = EthereumWallet::from(from.signer().clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .with_from(from.address())
            .with_to(to)
            .with_input(data)
            .with_value(value)
            .with_chain_id(self.chain_id);

        let pending = provider
            .send_transaction(tx)
            .await
            .wrap_err("Failed to send transaction")?;
        debug!(tx_hash = %pending.tx_hash(), to = %to, "Transaction sent, waiting to be mined");

        let receipt = pending
            .get_receipt()
            .await
            .wrap_err("Failed to get transaction receipt")?;

        if !receipt.status() {
            return Err(eyre!(
                "Transaction {} reverted",
                receipt.transaction_hash
            ));
        }

        Ok(BaseReceipt::from(&receipt))
    }
}

impl From<&TransactionReceipt> for BaseReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used as u64,
            effective_gas_price: receipt.effective_gas_price,
            status: receipt.status(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::contracts::ZkSync;

    #[test]
    fn test_gas_cost() {
        let receipt = BaseReceipt {
            tx_hash: B256::ZERO,
            block_number: Some(1),
            gas_used: 21_000,
            effective_gas_price: 2_000_000_000,
            status: true,
            logs: vec![],
        };
        assert_eq!(receipt.gas_cost(), U256::from(42_000_000_000_000u64));
    }

    #[test]
    fn test_receipt_from_rpc() {
        let json = serde_json::json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "22".repeat(32)),
            "blockNumber": "0x7",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x77359400",
            "from": format!("0x{}", "aa".repeat(20)),
            "to": format!("0x{}", "bb".repeat(20)),
            "contractAddress": null
        });
        let rpc: TransactionReceipt = serde_json::from_value(json).unwrap();

        let receipt = BaseReceipt::from(&rpc);
        assert_eq!(receipt.tx_hash, B256::repeat_byte(0x11));
        assert_eq!(receipt.block_number, Some(7));
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.effective_gas_price, 2_000_000_000);
        assert!(receipt.status);
        assert_eq!(receipt.gas_cost(), U256::from(42_000_000_000_000u64));
    }

    #[test]
    fn test_decode_priority_request_log() {
        let event = ZkSync::NewPriorityRequest {
            sender: Address::repeat_byte(0xaa),
            serialId: 17,
            opType: 1,
            pubData: Bytes::new(),
            expirationBlock: U256::from(100u64),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let receipt = BaseReceipt {
            tx_hash: B256::ZERO,
            block_number: None,
            gas_used: 0,
            effective_gas_price: 0,
            status: true,
            logs: vec![log],
        };

        let decoded = receipt.decode_logs::<ZkSync::NewPriorityRequest>();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].serialId, 17);
    }

    #[test]
    fn test_new_does_not_contact_node() {
        let client = HttpBaseChain::new(Url::parse("http://localhost:8545").unwrap(), 4);
        assert_eq!(client.chain_id(), 4);
        assert_eq!(client.rpc_url().as_str(), "http://localhost:8545/");
    }
}
