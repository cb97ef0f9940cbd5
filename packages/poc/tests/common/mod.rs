//! Shared fixtures for the scenario tests
//!
//! Every scenario runs the real stages against one `SimulatedNetwork`
//! playing the base chain, the L2 operator and the faucet. Waits and poll
//! intervals are shrunk to a millisecond.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::U256;
use l2_poc::{Identities, PocConfig, Session};
use rollup_rs::testing::SimulatedNetwork;
use rollup_rs::{Identity, Role};

pub const REQUESTOR_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const PROVIDER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn milli_ether(milli: u64) -> U256 {
    U256::from(milli) * U256::from(10u64).pow(U256::from(15u64))
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> PocConfig {
    let mut vars: HashMap<String, String> = [
        ("FAUCET_RETRY_INTERVAL_MS", "1"),
        ("FAUCET_CONFIRMATION_SECS", "0"),
        ("PROGRESS_INTERVAL_MS", "1"),
        ("RECEIPT_POLL_INTERVAL_MS", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    PocConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn test_config() -> PocConfig {
    test_config_with(&[])
}

pub async fn session_with(sim: &SimulatedNetwork, config: PocConfig) -> Session {
    Session::from_parts(
        config,
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
    )
    .await
    .unwrap()
}

pub async fn session(sim: &SimulatedNetwork) -> Session {
    session_with(sim, test_config()).await
}

pub fn requestor() -> Identity {
    Identity::from_private_key(Role::Requestor, REQUESTOR_KEY).unwrap()
}

pub fn provider() -> Identity {
    Identity::from_private_key(Role::Provider, PROVIDER_KEY).unwrap()
}

/// Both identities holding 1 ETH, above every faucet threshold
pub fn funded_identities(sim: &SimulatedNetwork) -> Identities {
    let identities = Identities {
        requestor: requestor(),
        provider: provider(),
    };
    sim.fund_eth(identities.requestor.address(), ether(1));
    sim.fund_eth(identities.provider.address(), ether(1));
    identities
}

/// Fund, approve and deposit `amount` GNT for `identity`, waiting for the
/// operator to commit the deposit
pub async fn deposited_wallet(
    sim: &SimulatedNetwork,
    session: &Session,
    identity: Identity,
    amount: U256,
) -> rollup_rs::Wallet {
    sim.fund_eth(identity.address(), ether(1));
    sim.mint_tokens(identity.address(), amount);

    l2_poc::allowance::increase_allowance(session, &identity, sim.main_contract(), amount)
        .await
        .unwrap();
    let wallet = session.wallet(identity).unwrap();
    l2_poc::settlement::deposit(&wallet, "GNT", amount)
        .await
        .unwrap()
        .await_receipt()
        .await
        .unwrap();
    wallet
}
