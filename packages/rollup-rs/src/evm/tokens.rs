//! ERC20 Token Helpers
//!
//! Balance and allowance queries plus allowance changes, all encoded with the
//! `sol!` bindings and routed through a [`BaseChainClient`].

use crate::evm::client::{BaseChainClient, BaseReceipt};
use crate::evm::contracts::ERC20;
use crate::identity::Identity;
use alloy::{
    primitives::{
        utils::{format_units, parse_units},
        Address, U256,
    },
    sol_types::SolCall,
};
use eyre::{eyre, Result, WrapErr};

/// Get the ERC20 token balance of an address
pub async fn get_token_balance(
    client: &dyn BaseChainClient,
    token_address: Address,
    account: Address,
) -> Result<U256> {
    let data = ERC20::balanceOfCall { account }.abi_encode();
    let output = client
        .call(token_address, data.into())
        .await
        .wrap_err("Failed to get token balance")?;
    let balance = ERC20::balanceOfCall::abi_decode_returns(&output, true)
        .map_err(|e| eyre!("Malformed balanceOf output: {}", e))?;
    Ok(balance._0)
}

/// Get the ERC20 token allowance
pub async fn get_token_allowance(
    client: &dyn BaseChainClient,
    token_address: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    let data = ERC20::allowanceCall { owner, spender }.abi_encode();
    let output = client
        .call(token_address, data.into())
        .await
        .wrap_err("Failed to get allowance")?;
    let allowance = ERC20::allowanceCall::abi_decode_returns(&output, true)
        .map_err(|e| eyre!("Malformed allowance output: {}", e))?;
    Ok(allowance._0)
}

/// Raise `spender`'s allowance over `owner`'s tokens by `amount`
pub async fn increase_allowance(
    client: &dyn BaseChainClient,
    owner: &Identity,
    token_address: Address,
    spender: Address,
    amount: U256,
) -> Result<BaseReceipt> {
    let data = ERC20::increaseAllowanceCall {
        spender,
        addedValue: amount,
    }
    .abi_encode();
    client
        .send_transaction(owner, token_address, data.into(), U256::ZERO)
        .await
        .wrap_err("increaseAllowance transaction failed")
}

/// Convert a human-readable amount ("10.5") to raw token units
pub fn to_token_units(amount: &str, decimals: u8) -> Result<U256> {
    let parsed = parse_units(amount, decimals)
        .map_err(|e| eyre!("Invalid amount '{}': {}", amount, e))?;
    Ok(parsed.get_absolute())
}

/// Convert raw token units to a human-readable amount
pub fn from_token_units(raw: U256, decimals: u8) -> String {
    format_units(raw, decimals).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_token_units() {
        assert_eq!(
            to_token_units("1.5", 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(to_token_units("100", 6).unwrap(), U256::from(100_000_000u64));
        assert!(to_token_units("ten", 18).is_err());
    }

    #[test]
    fn test_from_token_units() {
        let formatted = from_token_units(U256::from(1_500_000_000_000_000_000u128), 18);
        assert!(formatted.starts_with("1.5"));

        let formatted = from_token_units(U256::from(100_000_000u64), 6);
        assert!(formatted.starts_with("100"));
    }
}
