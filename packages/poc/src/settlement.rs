//! Settlement stage
//!
//! Deposit into L2, activate the signing key and transfer. Each step waits
//! for the operator to commit its operation before returning, so the next
//! step always sees its effect.

use alloy::primitives::{Address, U256};
use rollup_rs::sync::{closest_packable_token_amount, PendingOperation, TxFeeType, Wallet};
use tracing::{debug, info};

use crate::error::{PocError, PocResult};

/// Fee token used when activation is free
const FREE_ACTIVATION_TOKEN: &str = "ETH";

/// Outcome of [`ensure_signing_key`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    AlreadySet,
    Activated { fee: U256 },
}

/// Deposit `amount` of `token` into the wallet's own L2 account. The caller
/// awaits the returned operation before relying on the L2 balance.
pub async fn deposit(wallet: &Wallet, token: &str, amount: U256) -> PocResult<PendingOperation> {
    let pending = wallet
        .deposit_to_sync_from_ethereum(wallet.address(), token, amount)
        .await?;
    debug!(
        address = %wallet.address(),
        handle = %pending.handle(),
        "Deposit queued"
    );
    Ok(pending)
}

/// Set the wallet's L2 signing key unless it is already set. The account
/// must exist on L2, i.e. a deposit to it has been committed.
pub async fn ensure_signing_key(wallet: &Wallet, fee_token: Option<&str>) -> PocResult<Activation> {
    let address = wallet.address();

    if wallet.is_signing_key_set().await? {
        info!(address = %address, "Signing key already set");
        return Ok(Activation::AlreadySet);
    }

    if wallet.get_account_id().await?.is_none() {
        return Err(PocError::UnknownAccount { address });
    }

    let (token, fee) = match fee_token {
        Some(token) => {
            let fee = wallet
                .quote_fee(
                    TxFeeType::ChangePubKey {
                        onchain_pubkey_auth: false,
                    },
                    token,
                )
                .await?;
            (token, fee)
        }
        None => (FREE_ACTIVATION_TOKEN, U256::ZERO),
    };

    info!(address = %address, fee = %fee, fee_token = token, "Setting signing key");
    wallet.set_signing_key(token, fee).await?.await_receipt().await?;

    Ok(Activation::Activated { fee })
}

/// Transfer `amount` of `token` from `from` to `to` on L2, rounded down to a
/// packable amount. Returns the amount actually sent.
pub async fn transfer(from: &Wallet, to: Address, token: &str, amount: U256) -> PocResult<U256> {
    let packed = closest_packable_token_amount(amount);
    if packed != amount {
        debug!(requested = %amount, packed = %packed, "Transfer amount rounded");
    }

    info!(from = %from.address(), to = %to, amount = %packed, token = token, "Transferring on L2");
    from.sync_transfer(to, token, packed, None)
        .await?
        .await_receipt()
        .await?;

    Ok(packed)
}
