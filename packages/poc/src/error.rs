//! Run failures
//!
//! Each stage returns a [`PocError`]; the binary branches on the kind to
//! pick its exit code. Failures of collaborators that have no meaning of
//! their own to the run (RPC errors, rejected transactions) travel as
//! [`PocError::External`] with their full `eyre` context.

use alloy::primitives::{Address, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PocError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error(
        "Faucet funding failed for {address}: balance {balance} wei is below {required} wei after {attempts} attempts"
    )]
    Funding {
        address: Address,
        balance: U256,
        required: U256,
        attempts: u32,
    },

    #[error("Insufficient gas for {address}: balance {balance} wei, need at least {required} wei")]
    InsufficientGas {
        address: Address,
        balance: U256,
        required: U256,
    },

    #[error("Account {address} has no L2 account id; a deposit must be processed before its signing key can be set")]
    UnknownAccount { address: Address },

    #[error("Withdrawal fee {fee} exceeds the L2 balance {balance} of {address}")]
    FeeExceedsBalance {
        address: Address,
        balance: U256,
        fee: U256,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0:#}")]
    External(eyre::Report),
}

impl From<eyre::Report> for PocError {
    fn from(report: eyre::Report) -> Self {
        PocError::External(report)
    }
}

impl PocError {
    /// Short stable name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            PocError::Connection(_) => "connection",
            PocError::Funding { .. } => "funding",
            PocError::InsufficientGas { .. } => "insufficient_gas",
            PocError::UnknownAccount { .. } => "unknown_account",
            PocError::FeeExceedsBalance { .. } => "fee_exceeds_balance",
            PocError::Config(_) => "config",
            PocError::External(_) => "external",
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            PocError::External(_) => 1,
            PocError::Connection(_) => 2,
            PocError::Funding { .. } => 3,
            PocError::InsufficientGas { .. } => 4,
            PocError::UnknownAccount { .. } => 5,
            PocError::FeeExceedsBalance { .. } => 6,
            PocError::Config(_) => 7,
        }
    }

    /// The underlying report, for downcasting collaborator errors
    pub fn as_report(&self) -> Option<&eyre::Report> {
        match self {
            PocError::External(report) => Some(report),
            _ => None,
        }
    }
}

pub type PocResult<T> = std::result::Result<T, PocError>;

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{eyre, WrapErr};

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            PocError::Connection("down".into()),
            PocError::Funding {
                address: Address::ZERO,
                balance: U256::ZERO,
                required: U256::from(1u64),
                attempts: 10,
            },
            PocError::InsufficientGas {
                address: Address::ZERO,
                balance: U256::ZERO,
                required: U256::from(1u64),
            },
            PocError::UnknownAccount {
                address: Address::ZERO,
            },
            PocError::FeeExceedsBalance {
                address: Address::ZERO,
                balance: U256::from(1u64),
                fee: U256::from(2u64),
            },
            PocError::Config("bad".into()),
            PocError::External(eyre!("boom")),
        ];

        let mut codes: Vec<i32> = errors.iter().map(PocError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_external_keeps_context() {
        let report = Err::<(), _>(eyre!("connection reset"))
            .wrap_err("Failed to query balance")
            .unwrap_err();
        let err: PocError = report.into();
        assert_eq!(err.kind(), "external");

        let message = err.to_string();
        assert!(message.contains("Failed to query balance"));
        assert!(message.contains("connection reset"));
    }
}
