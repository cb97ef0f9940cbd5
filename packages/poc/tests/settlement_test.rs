//! Deposit, activation and transfer ordering

mod common;

use alloy::primitives::U256;
use l2_poc::settlement::{deposit, ensure_signing_key, transfer, Activation};
use l2_poc::PocError;
use rollup_rs::sync::SyncTx;
use rollup_rs::testing::SimulatedNetwork;
use rollup_rs::{BalanceView, TxRejected};

use common::{deposited_wallet, ether, milli_ether, provider, requestor, session};

#[tokio::test]
async fn test_activation_without_account_fails() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();
    let address = identity.address();
    let wallet = session.wallet(identity).unwrap();

    let err = ensure_signing_key(&wallet, Some("GNT")).await.unwrap_err();

    match err {
        PocError::UnknownAccount { address: reported } => assert_eq!(reported, address),
        other => panic!("expected UnknownAccount, got {:?}", other),
    }
    assert_eq!(sim.key_change_submissions(), 0);
}

#[tokio::test]
async fn test_activation_is_idempotent() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let wallet = deposited_wallet(&sim, &session, requestor(), ether(10)).await;

    let first = ensure_signing_key(&wallet, Some("GNT")).await.unwrap();
    let second = ensure_signing_key(&wallet, Some("GNT")).await.unwrap();

    assert_eq!(
        first,
        Activation::Activated {
            fee: milli_ether(1)
        }
    );
    assert_eq!(second, Activation::AlreadySet);
    assert_eq!(sim.key_change_submissions(), 1);
    assert_eq!(
        sim.l2_balance(wallet.address(), "GNT", BalanceView::Committed),
        ether(10) - milli_ether(1)
    );
}

#[tokio::test]
async fn test_free_activation_without_fee_token() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let wallet = deposited_wallet(&sim, &session, requestor(), ether(10)).await;

    let activation = ensure_signing_key(&wallet, None).await.unwrap();

    assert_eq!(activation, Activation::Activated { fee: U256::ZERO });
    assert!(wallet.is_signing_key_set().await.unwrap());
    assert_eq!(
        sim.l2_balance(wallet.address(), "GNT", BalanceView::Committed),
        ether(10)
    );
}

#[tokio::test]
async fn test_transfer_before_deposit_receipt_is_rejected() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let identity = requestor();
    let receiver = provider().address();

    // Active account holding 10 - 0.001 GNT
    let wallet = deposited_wallet(&sim, &session, identity.clone(), ether(10)).await;
    ensure_signing_key(&wallet, Some("GNT")).await.unwrap();

    // A second deposit, not yet awaited
    sim.mint_tokens(identity.address(), ether(10));
    l2_poc::allowance::increase_allowance(&session, &identity, sim.main_contract(), ether(10))
        .await
        .unwrap();
    let pending = deposit(&wallet, "GNT", ether(10)).await.unwrap();

    let err = transfer(&wallet, receiver, "GNT", ether(15)).await.unwrap_err();
    let rejected = err
        .as_report()
        .and_then(|report| report.downcast_ref::<TxRejected>())
        .unwrap_or_else(|| panic!("expected an operator rejection, got {:?}", err));
    assert_eq!(rejected.reason, "Not enough balance");
    assert_eq!(sim.l2_balance(receiver, "GNT", BalanceView::Committed), U256::ZERO);

    pending.await_receipt().await.unwrap();
    let sent = transfer(&wallet, receiver, "GNT", ether(15)).await.unwrap();

    assert_eq!(sent, ether(15));
    assert_eq!(sim.l2_balance(receiver, "GNT", BalanceView::Committed), ether(15));
}

#[tokio::test]
async fn test_transfer_rounds_to_packable_amount() {
    let sim = SimulatedNetwork::new();
    let session = session(&sim).await;
    let wallet = deposited_wallet(&sim, &session, requestor(), ether(10)).await;
    ensure_signing_key(&wallet, Some("GNT")).await.unwrap();
    let receiver = provider().address();

    let requested = U256::from(123_456_789_012_345u64);
    let sent = transfer(&wallet, receiver, "GNT", requested).await.unwrap();

    assert_eq!(sent, U256::from(123_400_000_000_000u64));
    assert_eq!(sim.l2_balance(receiver, "GNT", BalanceView::Committed), sent);

    let transfers: Vec<_> = sim
        .submitted_txs()
        .into_iter()
        .filter_map(|tx| match tx {
            SyncTx::Transfer(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, sent);
    assert_eq!(transfers[0].fee, milli_ether(1));
}
