//! Packable amounts
//!
//! L2 transactions carry amounts as `mantissa * 10^exponent` in a few bytes.
//! Token amounts get a 35-bit mantissa, fees an 11-bit one, both with a 5-bit
//! exponent. An amount that does not fit is rejected by the operator, so
//! callers round down to the closest representable value first.

use alloy::primitives::U256;

const EXPONENT_BITS: u32 = 5;
const TOKEN_MANTISSA_BITS: u32 = 35;
const FEE_MANTISSA_BITS: u32 = 11;

fn closest_packable(amount: U256, mantissa_bits: u32) -> U256 {
    let max_mantissa = (U256::from(1u64) << mantissa_bits as usize) - U256::from(1u64);
    let max_exponent = (1u32 << EXPONENT_BITS) - 1;
    let ten = U256::from(10u64);

    let mut mantissa = amount;
    let mut exponent = 0u32;
    while mantissa > max_mantissa && exponent < max_exponent {
        mantissa /= ten;
        exponent += 1;
    }
    // Beyond 10^31 scaling the value cannot be represented at all
    if mantissa > max_mantissa {
        mantissa = max_mantissa;
    }

    mantissa * ten.pow(U256::from(exponent))
}

/// Round a token amount down to the closest value a transfer or withdrawal
/// can carry
pub fn closest_packable_token_amount(amount: U256) -> U256 {
    closest_packable(amount, TOKEN_MANTISSA_BITS)
}

/// Round a fee down to the closest value a transaction fee field can carry
pub fn closest_packable_fee_amount(fee: U256) -> U256 {
    closest_packable(fee, FEE_MANTISSA_BITS)
}

pub fn is_token_amount_packable(amount: U256) -> bool {
    closest_packable_token_amount(amount) == amount
}

pub fn is_fee_amount_packable(fee: U256) -> bool {
    closest_packable_fee_amount(fee) == fee
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn wei(s: &str) -> U256 {
        U256::from_str(s).unwrap()
    }

    #[test]
    fn test_round_amounts_are_already_packable() {
        // 6.0 and 10.0 tokens with 18 decimals
        let six = wei("6000000000000000000");
        let ten = wei("10000000000000000000");
        assert_eq!(closest_packable_token_amount(six), six);
        assert_eq!(closest_packable_token_amount(ten), ten);
        assert!(is_token_amount_packable(six));
    }

    #[test]
    fn test_token_amount_rounds_down() {
        // 2^35 = 34359738368 needs one digit dropped
        let amount = wei("34359738368");
        let packed = closest_packable_token_amount(amount);
        assert_eq!(packed, wei("34359738360"));
        assert!(packed <= amount);
        assert!(!is_token_amount_packable(amount));

        let odd = wei("1234567890123456789");
        let packed = closest_packable_token_amount(odd);
        assert_eq!(packed, wei("1234567890100000000"));
    }

    #[test]
    fn test_small_amounts_untouched() {
        assert_eq!(closest_packable_token_amount(U256::ZERO), U256::ZERO);
        assert_eq!(closest_packable_fee_amount(U256::from(2047u64)), U256::from(2047u64));
    }

    #[test]
    fn test_fee_amount_rounds_to_eleven_bits() {
        assert_eq!(closest_packable_fee_amount(U256::from(2048u64)), U256::from(2040u64));
        assert_eq!(
            closest_packable_fee_amount(wei("123456789012345")),
            wei("123400000000000")
        );
        assert!(!is_fee_amount_packable(U256::from(123_456u64)));
        assert!(is_fee_amount_packable(U256::from(123_000u64)));
    }
}
