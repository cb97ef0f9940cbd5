//! Configuration loaded from the process environment

use std::env;
use std::time::Duration;

use l2_poc::{PocConfig, PocError};
use serial_test::serial;

const VARS: &[&str] = &["CHAIN_ID", "FEE_TOKEN", "FAUCET_CONFIRMATION_SECS", "ZKSYNC_RPC_URL"];

fn clear() {
    for key in VARS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear();
    env::set_var("CHAIN_ID", "31337");
    env::set_var("FEE_TOKEN", "");
    env::set_var("FAUCET_CONFIRMATION_SECS", "20");
    env::set_var("ZKSYNC_RPC_URL", "localhost");

    let config = PocConfig::from_env();
    clear();
    let config = config.unwrap();

    assert_eq!(config.chain_id, 31337);
    assert!(config.fee_token.is_none());
    assert_eq!(config.faucet_confirmation, Duration::from_secs(20));
    assert_eq!(config.zksync_rpc_url, "localhost");
}

#[test]
#[serial]
fn test_from_env_rejects_malformed_values() {
    clear();
    env::set_var("CHAIN_ID", "four");

    let result = PocConfig::from_env();
    clear();

    match result {
        Err(err @ PocError::Config(_)) => {
            assert!(err.to_string().contains("CHAIN_ID"));
            assert_eq!(err.exit_code(), 7);
        }
        other => panic!("expected a configuration error, got {:?}", other),
    }
}
