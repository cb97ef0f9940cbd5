//! Rollup-RS: Base-Chain and L2 Client Layer for the zkSync Token Lifecycle PoC
//!
//! This crate provides the collaborators the orchestration in `l2-poc` drives:
//!
//! - **EVM Module** - Base-chain client seam, contract bindings, ERC20 helpers
//! - **Sync Module** - L2 operator client seam, wire types, packable amounts,
//!   the L2 account handle and receipt-awaiting pending operations
//! - **Faucet** - Testnet base-token faucet client seam
//! - **Identity** - Key material from a mnemonic, a private key or fresh randomness
//! - **Redact** - Keeps secrets out of logs
//! - **Testing Module** - An in-memory network implementing every seam
//!
//! ## Feature Flags
//!
//! - `testing` - Enable the simulated network and assertions for tests

pub mod evm;
pub mod faucet;
pub mod identity;
pub mod redact;
pub mod sync;

#[cfg(feature = "testing")]
pub mod testing;

pub use evm::{BaseChainClient, BaseReceipt, HttpBaseChain};
pub use faucet::{FaucetApi, HttpFaucet};
pub use identity::{Identity, Role, SecretSource};
pub use redact::Redacted;
pub use sync::{
    closest_packable_fee_amount, closest_packable_token_amount, BalanceView, ContractAddress,
    EthDerivedSigner, HttpSyncProvider, OperationReceipt, PendingOperation, SyncProvider,
    SyncSigner, Token, Tokens, TxFeeType, TxRejected, Wallet,
};
