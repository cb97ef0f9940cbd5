//! Allowance stage
//!
//! Deposits of an ERC20 are pulled by the settlement contract, which needs an
//! allowance over the depositor's tokens first.

use alloy::primitives::{Address, U256};
use rollup_rs::evm::{self, BaseReceipt};
use rollup_rs::Identity;
use tracing::info;

use crate::error::PocResult;
use crate::session::Session;

/// Raise `spender`'s allowance over `identity`'s secondary tokens by `amount`
/// and wait for the transaction to be mined
pub async fn increase_allowance(
    session: &Session,
    identity: &Identity,
    spender: Address,
    amount: U256,
) -> PocResult<BaseReceipt> {
    let token = session.config().ngnt_address;
    let receipt = evm::increase_allowance(session.base(), identity, token, spender, amount).await?;

    info!(
        owner = %identity.address(),
        spender = %spender,
        amount = %amount,
        tx_hash = %receipt.tx_hash,
        "Allowance increased"
    );
    Ok(receipt)
}
