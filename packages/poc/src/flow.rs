//! The token lifecycle, stage by stage
//!
//! `run` executes the stages strictly in order and stops at the first
//! failure; `execute` wraps it with the cleanup that must happen on every
//! outcome. Each stage boundary is logged so a failed run shows the last
//! stage that completed. Nothing resumes: a new run starts over.

use std::fmt;

use alloy::primitives::U256;
use rollup_rs::evm::to_token_units;
use tracing::{error, info};

use crate::allowance::increase_allowance;
use crate::error::PocResult;
use crate::exit::{exit, ExitOutcome, ExitPath};
use crate::faucet::{ensure_base_funds, ensure_secondary_token};
use crate::identity::Identities;
use crate::report::{report_balances, report_base_token_balance};
use crate::session::Session;
use crate::settlement::{deposit, ensure_signing_key, transfer, Activation};
use crate::utils::display_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Funding,
    Allowance,
    Deposit,
    RequestorActivation,
    Transfer,
    ProviderActivation,
    Exit,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Funding => "funding",
            Stage::Allowance => "allowance",
            Stage::Deposit => "deposit",
            Stage::RequestorActivation => "requestor-activation",
            Stage::Transfer => "transfer",
            Stage::ProviderActivation => "provider-activation",
            Stage::Exit => "exit",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// What a completed run moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub path: ExitPath,
    pub deposited: U256,
    pub transferred: U256,
    pub requestor_activation: Activation,
    pub provider_activation: Activation,
    pub exit: ExitOutcome,
    /// Provider's base-chain token balance after the exit
    pub provider_token_balance: U256,
}

/// Stage bookkeeping for failure diagnostics
#[derive(Debug, Default)]
pub struct Progress {
    current: Option<Stage>,
    completed: Option<Stage>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        if let Some(done) = self.current.take() {
            self.completed = Some(done);
        }
        self.current = Some(stage);
        info!(stage = %stage, "Stage started");
    }

    fn finish(&mut self) {
        self.completed = self.current.take();
    }

    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    pub fn last_completed(&self) -> Option<Stage> {
        self.completed
    }
}

/// Run every stage, then disconnect from the operator whatever the outcome
pub async fn execute(
    session: &Session,
    identities: &Identities,
    path: ExitPath,
) -> PocResult<RunSummary> {
    let mut progress = Progress::default();
    let result = run(session, identities, path, &mut progress).await;

    match &result {
        Ok(summary) => log_summary(session, summary),
        Err(e) => error!(
            failed_stage = %progress.current().map(|s| s.to_string()).unwrap_or_default(),
            last_completed = %progress.last_completed().map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
            kind = e.kind(),
            error = %e,
            "Run failed"
        ),
    }

    session.disconnect().await;
    result
}

pub async fn run(
    session: &Session,
    identities: &Identities,
    path: ExitPath,
    progress: &mut Progress,
) -> PocResult<RunSummary> {
    let config = session.config();
    let token = session.token()?.clone();

    progress.enter(Stage::Funding);
    ensure_base_funds(session, &identities.requestor).await?;
    ensure_base_funds(session, &identities.provider).await?;
    ensure_secondary_token(session, &identities.requestor).await?;

    let requestor = session.wallet(identities.requestor.clone())?;
    let provider = session.wallet(identities.provider.clone())?;
    report_balances(session, "start", &[&requestor, &provider]).await?;

    progress.enter(Stage::Allowance);
    let deposit_amount = to_token_units(&config.deposit_amount, token.decimals)?;
    increase_allowance(
        session,
        &identities.requestor,
        session.contracts().main_contract,
        deposit_amount,
    )
    .await?;

    progress.enter(Stage::Deposit);
    deposit(&requestor, &token.symbol, deposit_amount)
        .await?
        .await_receipt()
        .await?;
    report_balances(session, "deposit", &[&requestor, &provider]).await?;

    progress.enter(Stage::RequestorActivation);
    let requestor_activation = ensure_signing_key(&requestor, config.fee_token.as_deref()).await?;

    progress.enter(Stage::Transfer);
    let transfer_amount = to_token_units(&config.transfer_amount, token.decimals)?;
    let transferred = transfer(&requestor, provider.address(), &token.symbol, transfer_amount).await?;
    report_balances(session, "transfer", &[&requestor, &provider]).await?;

    progress.enter(Stage::ProviderActivation);
    let provider_activation = ensure_signing_key(&provider, config.fee_token.as_deref()).await?;

    progress.enter(Stage::Exit);
    info!(path = %path, "Exiting L2");
    let outcome = exit(&provider, &token.symbol, path).await?;

    progress.enter(Stage::Report);
    report_balances(session, "exit", &[&requestor, &provider]).await?;
    let provider_token_balance = report_base_token_balance(session, &provider).await?;
    progress.finish();

    Ok(RunSummary {
        path,
        deposited: deposit_amount,
        transferred,
        requestor_activation,
        provider_activation,
        exit: outcome,
        provider_token_balance,
    })
}

fn log_summary(session: &Session, summary: &RunSummary) {
    let Ok(token) = session.token() else {
        return;
    };
    let amount = |value: U256| display_amount(value, token.decimals, &token.symbol);

    let (exit_amount, exit_cost) = match &summary.exit {
        ExitOutcome::Withdrawn { amount: a, fee } => (amount(*a), format!("fee {}", amount(*fee))),
        ExitOutcome::Recovered { amount: a, gas_cost } => {
            (amount(*a), format!("gas {}", display_amount(*gas_cost, 18, "ETH")))
        }
    };

    info!(
        path = %summary.path,
        deposited = %amount(summary.deposited),
        transferred = %amount(summary.transferred),
        exited = %exit_amount,
        exit_cost = %exit_cost,
        provider_token_balance = %amount(summary.provider_token_balance),
        "Run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracks_last_completed_stage() {
        let mut progress = Progress::default();
        assert_eq!(progress.last_completed(), None);

        progress.enter(Stage::Funding);
        progress.enter(Stage::Allowance);
        assert_eq!(progress.current(), Some(Stage::Allowance));
        assert_eq!(progress.last_completed(), Some(Stage::Funding));

        progress.finish();
        assert_eq!(progress.current(), None);
        assert_eq!(progress.last_completed(), Some(Stage::Allowance));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::RequestorActivation.to_string(), "requestor-activation");
        assert_eq!(Stage::Exit.to_string(), "exit");
    }
}
