//! Base-Chain Support Module
//!
//! ## Submodules
//!
//! - `client` - Base-chain client seam and its JSON-RPC implementation
//! - `contracts` - ERC20, faucet and zkSync contract bindings (alloy sol! macro)
//! - `tokens` - ERC20 balance/allowance helpers and unit conversion

pub mod client;
pub mod contracts;
pub mod tokens;

pub use client::{BaseChainClient, BaseReceipt, HttpBaseChain};
pub use contracts::{Faucet, ZkSync, ERC20};
pub use tokens::{
    from_token_units, get_token_allowance, get_token_balance, increase_allowance, to_token_units,
};
