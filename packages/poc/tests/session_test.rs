//! Session construction over the simulated network

mod common;

use std::sync::Arc;

use l2_poc::{PocError, Session};
use rollup_rs::testing::{SimulatedNetwork, MAIN_CONTRACT};

use common::{session, test_config, test_config_with};

#[tokio::test]
async fn test_session_reads_operator_metadata() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;

    assert_eq!(session.contracts().main_contract, MAIN_CONTRACT);
    assert_eq!(session.token().unwrap().id, sim.gnt().id);
    assert!(session.tokens().resolve("ETH").is_ok());
}

#[tokio::test]
async fn test_unknown_token_symbol_is_a_config_error() {
    let sim = SimulatedNetwork::new();
    let result = Session::from_parts(
        test_config_with(&[("TOKEN_SYMBOL", "DOGE")]),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
    )
    .await;

    assert!(matches!(result, Err(PocError::Config(_))));
    // The rejected session still released the operator connection
    assert_eq!(sim.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_unreachable_operator_is_a_connection_error() {
    let sim = SimulatedNetwork::new();
    rollup_rs::SyncProvider::disconnect(&sim).await.unwrap();

    let result = Session::from_parts(
        test_config(),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
    )
    .await;

    match result {
        Err(err @ PocError::Connection(_)) => assert_eq!(err.exit_code(), 2),
        Err(other) => panic!("expected a connection error, got {:?}", other),
        Ok(_) => panic!("expected a connection error"),
    }
    assert_eq!(sim.disconnect_calls(), 2);
}

#[tokio::test]
async fn test_disconnect_never_fails() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;

    session.disconnect().await;
    session.disconnect().await;

    assert_eq!(sim.disconnect_calls(), 2);
}
