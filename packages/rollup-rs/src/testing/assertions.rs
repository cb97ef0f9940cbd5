//! Common Test Assertions
//!
//! Balance checks for lifecycle scenarios. Each returns a descriptive error
//! instead of panicking so scenario tests can add context with `?`.

use alloy::primitives::U256;
use eyre::{eyre, Result};

/// Assert that a balance went up by exactly `expected_increase`
pub fn assert_balance_increased(before: U256, after: U256, expected_increase: U256) -> Result<()> {
    if after < before {
        return Err(eyre!(
            "Balance decreased: before {}, after {} (expected +{})",
            before,
            after,
            expected_increase
        ));
    }
    let actual = after - before;
    if actual != expected_increase {
        return Err(eyre!(
            "Balance increase mismatch: expected {}, got {} (before: {}, after: {})",
            expected_increase,
            actual,
            before,
            after
        ));
    }
    Ok(())
}

/// Assert that a balance went down by exactly `expected_decrease`
pub fn assert_balance_decreased(before: U256, after: U256, expected_decrease: U256) -> Result<()> {
    if after > before {
        return Err(eyre!(
            "Balance increased: before {}, after {} (expected -{})",
            before,
            after,
            expected_decrease
        ));
    }
    let actual = before - after;
    if actual != expected_decrease {
        return Err(eyre!(
            "Balance decrease mismatch: expected {}, got {} (before: {}, after: {})",
            expected_decrease,
            actual,
            before,
            after
        ));
    }
    Ok(())
}

pub fn assert_balance_unchanged(before: U256, after: U256) -> Result<()> {
    if before != after {
        return Err(eyre!(
            "Balance changed: before {}, after {}",
            before,
            after
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_balance_increased() {
        let before = U256::from(100u64);
        assert!(assert_balance_increased(before, U256::from(150u64), U256::from(50u64)).is_ok());
        assert!(assert_balance_increased(before, U256::from(149u64), U256::from(50u64)).is_err());
        assert!(assert_balance_increased(before, U256::from(90u64), U256::from(10u64)).is_err());
    }

    #[test]
    fn test_assert_balance_decreased() {
        let before = U256::from(100u64);
        assert!(assert_balance_decreased(before, U256::from(60u64), U256::from(40u64)).is_ok());
        assert!(assert_balance_decreased(before, U256::from(110u64), U256::from(10u64)).is_err());
    }

    #[test]
    fn test_assert_balance_unchanged() {
        assert!(assert_balance_unchanged(U256::from(5u64), U256::from(5u64)).is_ok());
        assert!(assert_balance_unchanged(U256::from(5u64), U256::from(6u64)).is_err());
    }
}
