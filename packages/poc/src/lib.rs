//! zkSync Token Lifecycle Proof of Concept
//!
//! Two identities, a requestor and a provider, walk a token through L2:
//! faucet funding, deposit, signing-key activation, transfer, and an exit
//! either through the operator or through the settlement contract (exodus).
//! Balances are logged at every checkpoint.
//!
//! Stages are plain async functions over a [`Session`]; `flow::execute`
//! sequences them.

pub mod allowance;
pub mod config;
pub mod error;
pub mod exit;
pub mod faucet;
pub mod flow;
pub mod identity;
pub mod report;
pub mod session;
pub mod settlement;
pub mod utils;

pub use config::PocConfig;
pub use error::{PocError, PocResult};
pub use exit::{ExitOutcome, ExitPath};
pub use flow::{execute, RunSummary, Stage};
pub use identity::{provision_all, save_keystores, Identities};
pub use session::Session;
pub use settlement::Activation;
