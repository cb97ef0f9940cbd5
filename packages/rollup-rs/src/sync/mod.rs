//! L2 (zkSync) Support Module
//!
//! ## Submodules
//!
//! - `types` - Operator JSON-RPC wire types
//! - `packing` - Packable amount rounding
//! - `provider` - Operator client seam and its JSON-RPC implementation
//! - `signer` - L2 key seam and base-chain co-signatures
//! - `operation` - Receipt-awaiting handles for in-flight operations
//! - `wallet` - The L2 account handle

pub mod operation;
pub mod packing;
pub mod provider;
pub mod signer;
pub mod types;
pub mod wallet;

pub use operation::{OperationHandle, PendingOperation};
pub use packing::{
    closest_packable_fee_amount, closest_packable_token_amount, is_fee_amount_packable,
    is_token_amount_packable,
};
pub use provider::{network_url, HttpSyncProvider, SyncProvider, TxRejected};
pub use signer::{EthDerivedSigner, SyncSigner};
pub use types::{
    AccountState, BalanceView, ContractAddress, Fee, OperationReceipt, PubKeyHash, SyncTx,
    SyncTxHash, Token, Tokens, TxFeeType,
};
pub use wallet::Wallet;
