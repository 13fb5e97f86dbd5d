use num_bigint::{BigInt, BigUint, Sign};
use std::sync::LazyLock;

// 10^18 is the native currency case, worth precomputing.
static POW10_18: LazyLock<BigUint> = LazyLock::new(|| BigUint::from(10u32).pow(18));

fn pow10(decimals: u32) -> BigUint {
    if decimals == 18 {
        return POW10_18.clone();
    }

    BigUint::from(10u32).pow(decimals)
}

/// Renders a token amount held in its smallest unit as a fixed-point decimal
/// string, without ever losing precision relative to the integer value.
///
/// `truncate` keeps only the first N fractional digits (truncation, not
/// rounding); `truncate == 0` shows all `decimals` digits.
pub fn format_token_amount(value: Option<&BigInt>, decimals: u32, truncate: usize) -> String {
    let Some(value) = value else {
        return String::new();
    };

    if decimals == 0 {
        return value.to_string();
    }

    let scale = pow10(decimals);
    let magnitude = value.magnitude();
    let whole = magnitude / &scale;
    let remainder = (magnitude % &scale).to_string();

    let mut fractional = "0".repeat(decimals as usize - remainder.len());
    fractional.push_str(&remainder);
    if truncate != 0 && fractional.len() > truncate {
        fractional.truncate(truncate);
    }

    let sign = if value.sign() == Sign::Minus { "-" } else { "" };
    format!("{sign}{whole}.{fractional}")
}

/// Parses a wire amount, either a `0x`-prefixed hex quantity or a plain
/// base-10 string. Returns `None` when the input is not a valid number.
pub fn parse_amount(input: &str) -> Option<BigInt> {
    match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => BigInt::parse_bytes(digits.as_bytes(), 16),
        None => BigInt::parse_bytes(input.as_bytes(), 10),
    }
}
