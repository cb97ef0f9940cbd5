//! Exit stage
//!
//! Moves a wallet's L2 balance back to the base chain, either through the
//! operator (withdrawal) or around it (exodus: a full exit requested on the
//! settlement contract, then a direct claim of the recovered balance).

use std::fmt;

use alloy::primitives::U256;
use rollup_rs::sync::{BalanceView, TxFeeType, Wallet};
use tracing::{info, warn};

use crate::error::{PocError, PocResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPath {
    Withdraw,
    Exodus,
}

impl fmt::Display for ExitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitPath::Withdraw => write!(f, "withdraw"),
            ExitPath::Exodus => write!(f, "exodus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Withdrawn through the operator; `fee` was paid on L2
    Withdrawn { amount: U256, fee: U256 },
    /// Claimed from the settlement contract; `gas_cost` was paid in ETH
    Recovered { amount: U256, gas_cost: U256 },
}

impl ExitOutcome {
    pub fn amount(&self) -> U256 {
        match self {
            ExitOutcome::Withdrawn { amount, .. } | ExitOutcome::Recovered { amount, .. } => *amount,
        }
    }
}

pub async fn exit(wallet: &Wallet, token: &str, path: ExitPath) -> PocResult<ExitOutcome> {
    match path {
        ExitPath::Withdraw => withdraw(wallet, token).await,
        ExitPath::Exodus => exodus(wallet, token).await,
    }
}

/// Withdraw the whole committed balance minus the quoted fee to the wallet's
/// own base-chain address and wait until the withdrawal is verified
pub async fn withdraw(wallet: &Wallet, token: &str) -> PocResult<ExitOutcome> {
    let address = wallet.address();
    let balance = wallet.get_balance(token, BalanceView::Committed).await?;
    let fee = wallet.quote_fee(TxFeeType::Withdraw, token).await?;

    if fee >= balance {
        return Err(PocError::FeeExceedsBalance {
            address,
            balance,
            fee,
        });
    }
    let amount = balance - fee;

    info!(
        address = %address,
        balance = %balance,
        fee = %fee,
        amount = %amount,
        token = token,
        "Withdrawing from L2"
    );
    wallet
        .withdraw_from_sync_to_ethereum(address, token, amount, Some(fee))
        .await?
        .await_verify_receipt()
        .await?;

    Ok(ExitOutcome::Withdrawn { amount, fee })
}

/// Force the whole balance out through the settlement contract, then claim
/// what it recovered
pub async fn exodus(wallet: &Wallet, token: &str) -> PocResult<ExitOutcome> {
    let address = wallet.address();

    info!(address = %address, token = token, "Starting emergency withdrawal");
    wallet
        .emergency_withdraw(token)
        .await?
        .await_verify_receipt()
        .await?;

    let amount = wallet.balance_to_withdraw(token).await?;
    if amount.is_zero() {
        warn!(address = %address, token = token, "Nothing to recover from the settlement contract");
        return Ok(ExitOutcome::Recovered {
            amount,
            gas_cost: U256::ZERO,
        });
    }

    let receipt = wallet.withdraw_pending_balance(token, amount).await?;
    let gas_cost = receipt.gas_cost();
    info!(
        address = %address,
        amount = %amount,
        tx_hash = %receipt.tx_hash,
        gas_cost = %gas_cost,
        "Recovered balance claimed"
    );

    Ok(ExitOutcome::Recovered { amount, gas_cost })
}
