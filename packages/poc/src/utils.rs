//! Shared helpers

use std::time::Duration;

use alloy::primitives::U256;
use rollup_rs::evm::from_token_units;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Sleep for `duration`, logging progress every `tick`. The ticker is
/// display only and stops with the sleep.
pub async fn wait_with_progress(duration: Duration, tick: Duration, label: &str) {
    if duration.is_zero() {
        return;
    }

    info!(
        wait_secs = duration.as_secs_f64(),
        "{}",
        label
    );

    let started = Instant::now();
    let deadline = sleep(duration);
    tokio::pin!(deadline);

    let mut ticker = interval(tick.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                debug!(
                    elapsed_secs = started.elapsed().as_secs(),
                    total_secs = duration.as_secs(),
                    "{}",
                    label
                );
            }
        }
    }
}

/// Human-readable amount with symbol, e.g. `6.0 GNT`
pub fn display_amount(amount: U256, decimals: u8, symbol: &str) -> String {
    let formatted = from_token_units(amount, decimals);
    let trimmed = match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => formatted,
    };
    format!("{} {}", trimmed, symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_wait_returns_immediately() {
        let started = std::time::Instant::now();
        wait_with_progress(Duration::ZERO, Duration::from_secs(1), "nothing").await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_lasts_about_the_duration() {
        let started = std::time::Instant::now();
        wait_with_progress(Duration::from_millis(30), Duration::from_millis(5), "short").await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_display_amount() {
        let six = U256::from(6_000_000_000_000_000_000u128);
        assert_eq!(display_amount(six, 18, "GNT"), "6.0 GNT");

        let fee = U256::from(1_500_000_000_000_000u128);
        assert_eq!(display_amount(fee, 18, "GNT"), "0.0015 GNT");
    }
}
