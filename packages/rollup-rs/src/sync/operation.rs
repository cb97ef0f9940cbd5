//! In-flight L2 operations
//!
//! Every mutating wallet call returns a [`PendingOperation`]. Dependent steps
//! must wait on it: `await_receipt` until the operator commits the operation,
//! `await_verify_receipt` until its proof is verified on the base chain.
//! Neither has a deadline; they poll until the operator answers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::{debug, info};

use super::provider::{SyncProvider, TxRejected};
use super::types::{OperationReceipt, SyncTxHash};
use crate::evm::BaseReceipt;

/// How the operator tracks an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationHandle {
    /// Submitted through `tx_submit`
    Tx(SyncTxHash),
    /// Priority operation queued on the base chain, by serial id
    Priority(u64),
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationHandle::Tx(hash) => write!(f, "{}", hash),
            OperationHandle::Priority(serial) => write!(f, "priority op #{}", serial),
        }
    }
}

pub struct PendingOperation {
    provider: Arc<dyn SyncProvider>,
    operation: &'static str,
    handle: OperationHandle,
    poll_interval: Duration,
    base_receipt: Option<BaseReceipt>,
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("operation", &self.operation)
            .field("handle", &self.handle)
            .finish()
    }
}

impl PendingOperation {
    pub fn new(
        provider: Arc<dyn SyncProvider>,
        operation: &'static str,
        handle: OperationHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            operation,
            handle,
            poll_interval,
            base_receipt: None,
        }
    }

    /// Attach the base-chain receipt of the transaction that queued a
    /// priority operation
    pub fn with_base_receipt(mut self, receipt: BaseReceipt) -> Self {
        self.base_receipt = Some(receipt);
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn base_receipt(&self) -> Option<&BaseReceipt> {
        self.base_receipt.as_ref()
    }

    /// Wait until the operator has committed the operation
    pub async fn await_receipt(&self) -> Result<OperationReceipt> {
        self.wait_until(OperationReceipt::is_committed, "committed")
            .await
    }

    /// Wait until the operation's block is verified on the base chain
    pub async fn await_verify_receipt(&self) -> Result<OperationReceipt> {
        self.wait_until(OperationReceipt::is_verified, "verified")
            .await
    }

    async fn poll(&self) -> Result<OperationReceipt> {
        match &self.handle {
            OperationHandle::Tx(hash) => self.provider.tx_info(hash).await,
            OperationHandle::Priority(serial) => self.provider.ethop_info(*serial).await,
        }
    }

    async fn wait_until(
        &self,
        done: fn(&OperationReceipt) -> bool,
        stage: &'static str,
    ) -> Result<OperationReceipt> {
        let mut polls = 0u64;
        loop {
            let receipt = self
                .poll()
                .await
                .wrap_err_with(|| format!("Failed to query {} {}", self.operation, self.handle))?;
            polls += 1;

            if receipt.failed() {
                let reason = receipt
                    .fail_reason
                    .clone()
                    .unwrap_or_else(|| "unknown reason".to_string());
                return Err(TxRejected::new(self.operation, reason).into());
            }

            if done(&receipt) {
                info!(
                    operation = self.operation,
                    handle = %self.handle,
                    block = receipt.block.map(|b| b.block_number),
                    "Operation {}",
                    stage
                );
                return Ok(receipt);
            }

            debug!(
                operation = self.operation,
                handle = %self.handle,
                polls = polls,
                "Waiting for operation to be {}",
                stage
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
