//! Funding stage
//!
//! Tops identities up from the testnet faucets: base-chain ETH from the HTTP
//! faucet (bounded retries, then a fixed confirmation wait) and the
//! secondary token from its minting contract.

use alloy::primitives::U256;
use alloy::sol_types::SolCall;
use rollup_rs::evm::contracts::Faucet;
use rollup_rs::evm::{get_token_balance, to_token_units, BaseReceipt};
use rollup_rs::Identity;
use tracing::{debug, info, warn};

use crate::error::{PocError, PocResult};
use crate::session::Session;
use crate::utils::wait_with_progress;

/// Faucet response text when funds were sent
pub const SUCCESS_MARKER: &str = "txhash";
/// Faucet response text when the address needs nothing
pub const SUFFICIENT_MARKER: &str = "sufficient";

/// Make sure `identity` holds at least `MIN_ETH_BALANCE`. Returns the final
/// balance; a balance already above the threshold means no faucet traffic.
pub async fn ensure_base_funds(session: &Session, identity: &Identity) -> PocResult<U256> {
    let config = session.config();
    let address = identity.address();

    let balance = session.base().get_balance(address).await?;
    if balance >= config.min_eth_balance {
        debug!(address = %address, balance = %balance, "Base funds sufficient, skipping faucet");
        return Ok(balance);
    }

    info!(
        address = %address,
        balance = %balance,
        required = %config.min_eth_balance,
        "Requesting base funds from faucet"
    );

    let mut attempts = 0u32;
    while attempts < config.faucet_max_attempts {
        attempts += 1;
        match session.faucet().request_funds(address).await {
            Ok(body) if body.contains(SUCCESS_MARKER) => {
                info!(address = %address, attempt = attempts, "Faucet sent funds");
                break;
            }
            Ok(body) if body.to_lowercase().contains(SUFFICIENT_MARKER) => {
                info!(address = %address, attempt = attempts, "Faucet reports funds already sufficient");
                break;
            }
            Ok(body) => {
                warn!(
                    address = %address,
                    attempt = attempts,
                    max_attempts = config.faucet_max_attempts,
                    response = %body.trim(),
                    "Faucet did not send funds"
                );
            }
            Err(e) => {
                warn!(
                    address = %address,
                    attempt = attempts,
                    max_attempts = config.faucet_max_attempts,
                    error = %e,
                    "Faucet request failed"
                );
            }
        }

        if attempts < config.faucet_max_attempts {
            tokio::time::sleep(config.faucet_retry_interval).await;
        }
    }

    wait_with_progress(
        config.faucet_confirmation,
        config.progress_interval,
        "Waiting for faucet transaction to confirm",
    )
    .await;

    let balance = session.base().get_balance(address).await?;
    if balance < config.min_eth_balance {
        return Err(PocError::Funding {
            address,
            balance,
            required: config.min_eth_balance,
            attempts,
        });
    }

    info!(address = %address, balance = %balance, "Base funds confirmed");
    Ok(balance)
}

/// Mint secondary tokens for `identity` when it holds less than
/// `MAX_TOKEN_BALANCE`. Minting costs gas, so the ETH balance must cover
/// `MIN_GAS_BALANCE`. Returns the mint receipt, or `None` when nothing was
/// needed.
pub async fn ensure_secondary_token(
    session: &Session,
    identity: &Identity,
) -> PocResult<Option<BaseReceipt>> {
    let config = session.config();
    let address = identity.address();
    let token = session.token()?;

    let balance = get_token_balance(session.base(), config.ngnt_address, address).await?;
    let ceiling = to_token_units(&config.max_token_balance, token.decimals)?;
    if balance >= ceiling {
        debug!(
            address = %address,
            balance = %balance,
            ceiling = %ceiling,
            "Token balance at ceiling, skipping token faucet"
        );
        return Ok(None);
    }

    let gas = session.base().get_balance(address).await?;
    if gas < config.min_gas_balance {
        return Err(PocError::InsufficientGas {
            address,
            balance: gas,
            required: config.min_gas_balance,
        });
    }

    info!(address = %address, faucet = %config.faucet_address, "Requesting {} from token faucet", token.symbol);
    let data = Faucet::createCall {}.abi_encode();
    let receipt = session
        .base()
        .send_transaction(identity, config.faucet_address, data.into(), U256::ZERO)
        .await?;

    info!(
        address = %address,
        tx_hash = %receipt.tx_hash,
        gas_used = receipt.gas_used,
        "Token faucet transaction mined"
    );
    Ok(Some(receipt))
}
