//! Balance checkpoints logged between stages

use alloy::primitives::U256;
use rollup_rs::evm::get_token_balance;
use rollup_rs::sync::{BalanceView, Wallet};
use tracing::info;

use crate::error::PocResult;
use crate::session::Session;
use crate::utils::display_amount;

/// Committed and verified L2 balances of one wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Balances {
    pub committed: U256,
    pub verified: U256,
}

pub async fn l2_balances(wallet: &Wallet, token: &str) -> PocResult<L2Balances> {
    Ok(L2Balances {
        committed: wallet.get_balance(token, BalanceView::Committed).await?,
        verified: wallet.get_balance(token, BalanceView::Verified).await?,
    })
}

/// Log both views for every wallet at the checkpoint `label`
pub async fn report_balances(session: &Session, label: &str, wallets: &[&Wallet]) -> PocResult<()> {
    let token = session.token()?;

    for wallet in wallets {
        let balances = l2_balances(wallet, &token.symbol).await?;
        info!(
            checkpoint = label,
            role = %wallet.identity().role(),
            address = %wallet.address(),
            committed = %display_amount(balances.committed, token.decimals, &token.symbol),
            verified = %display_amount(balances.verified, token.decimals, &token.symbol),
            "L2 balance"
        );
    }
    Ok(())
}

/// Log and return the base-chain balance of the secondary token
pub async fn report_base_token_balance(session: &Session, wallet: &Wallet) -> PocResult<U256> {
    let token = session.token()?;
    let balance =
        get_token_balance(session.base(), session.config().ngnt_address, wallet.address()).await?;

    info!(
        role = %wallet.identity().role(),
        address = %wallet.address(),
        balance = %display_amount(balance, token.decimals, &token.symbol),
        "Base-chain token balance"
    );
    Ok(balance)
}
