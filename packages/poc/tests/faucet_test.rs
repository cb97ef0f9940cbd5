//! Funding stage against the simulated faucets

mod common;

use alloy::primitives::U256;
use l2_poc::faucet::{ensure_base_funds, ensure_secondary_token};
use l2_poc::PocError;
use rollup_rs::testing::{FaucetBehaviour, SimulatedNetwork};

use common::{ether, requestor, session, session_with, test_config_with};

#[tokio::test]
async fn test_sufficient_balance_skips_faucet() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();
    sim.fund_eth(identity.address(), ether(1));

    let balance = ensure_base_funds(&session, &identity).await.unwrap();

    assert_eq!(balance, ether(1));
    assert_eq!(sim.faucet_calls(), 0);
}

#[tokio::test]
async fn test_funded_on_first_attempt() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();

    let balance = ensure_base_funds(&session, &identity).await.unwrap();

    assert_eq!(balance, sim.config().faucet_drip);
    assert_eq!(sim.faucet_calls(), 1);
}

#[tokio::test]
async fn test_failing_faucet_stops_after_attempt_budget() {
    for behaviour in [FaucetBehaviour::Fail, FaucetBehaviour::Unreachable] {
        let sim = SimulatedNetwork::new();
        sim.set_faucet_behaviour(behaviour);
        let session = session(&sim).await;
        let identity = requestor();

        let err = ensure_base_funds(&session, &identity).await.unwrap_err();

        match err {
            PocError::Funding {
                address,
                balance,
                attempts,
                ..
            } => {
                assert_eq!(address, identity.address());
                assert_eq!(balance, U256::ZERO);
                assert_eq!(attempts, 10);
            }
            other => panic!("expected a funding error for {:?}, got {:?}", behaviour, other),
        }
        assert_eq!(sim.faucet_calls(), 10, "{:?}", behaviour);
    }
}

#[tokio::test]
async fn test_attempt_budget_is_configurable() {
    let sim = SimulatedNetwork::new();
    sim.set_faucet_behaviour(FaucetBehaviour::Fail);
    let session = session_with(&sim, test_config_with(&[("FAUCET_MAX_ATTEMPTS", "3")])).await;

    let err = ensure_base_funds(&session, &requestor()).await.unwrap_err();

    assert!(matches!(err, PocError::Funding { attempts: 3, .. }));
    assert_eq!(sim.faucet_calls(), 3);
}

#[tokio::test]
async fn test_already_sufficient_answer_stops_retrying() {
    let sim = SimulatedNetwork::new();
    sim.set_faucet_behaviour(FaucetBehaviour::AlreadySufficient);
    let session = session(&sim).await;

    // The faucet claims enough while the balance stays short
    let err = ensure_base_funds(&session, &requestor()).await.unwrap_err();

    assert!(matches!(err, PocError::Funding { attempts: 1, .. }));
    assert_eq!(sim.faucet_calls(), 1);
}

#[tokio::test]
async fn test_secondary_token_needs_gas() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();

    let err = ensure_secondary_token(&session, &identity).await.unwrap_err();

    assert!(matches!(err, PocError::InsufficientGas { .. }));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(sim.token_faucet_calls(), 0);
    assert_eq!(sim.token_balance(identity.address()), U256::ZERO);
}

#[tokio::test]
async fn test_secondary_token_minted() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();
    sim.fund_eth(identity.address(), ether(1));

    let receipt = ensure_secondary_token(&session, &identity).await.unwrap();

    assert!(receipt.is_some());
    assert_eq!(sim.token_faucet_calls(), 1);
    assert_eq!(sim.token_balance(identity.address()), sim.config().token_faucet_mint);
    assert_eq!(
        sim.eth_balance(identity.address()),
        ether(1) - sim.gas_cost_per_tx()
    );
}

#[tokio::test]
async fn test_secondary_token_skipped_at_ceiling() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();
    sim.mint_tokens(identity.address(), ether(100));

    // No gas either: the ceiling check comes first
    let receipt = ensure_secondary_token(&session, &identity).await.unwrap();

    assert!(receipt.is_none());
    assert_eq!(sim.token_faucet_calls(), 0);
}
