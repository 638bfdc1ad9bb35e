//! Amount conversion between human decimal strings and on-chain base units.
//!
//! All conversions go through this module. Amounts are carried internally as
//! `u128` base units (wei-scale for 18-decimal assets); stored records keep
//! human decimal strings so historical data stays readable and portable.
//!
//! ## Design principles
//! 1. The asset registry is the single source of truth for decimals
//! 2. No silent truncation: excess precision is an explicit error on parse
//! 3. USD math uses `rust_decimal::Decimal`; unit math stays integral

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// Amount conversion errors
#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("amount too large, would overflow")]
    Overflow,

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Convert a human decimal string to base units.
///
/// Rejects zero, negative values and excess precision. `"1.5"` with
/// `decimals = 18` yields `1_500_000_000_000_000_000`.
pub fn parse_units(amount_str: &str, decimals: u32) -> Result<u128, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // Require both sides of the dot to be non-empty: ".5" and "5."
            // are ambiguous formats
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u128 = whole.parse::<u128>().map_err(|e| {
        let err_str = e.to_string();
        if err_str.contains("too large") || err_str.contains("overflow") {
            MoneyError::Overflow
        } else {
            MoneyError::InvalidFormat(format!("invalid character in whole part: {}", whole))
        }
    })?;

    let frac_num: u128 = if decimals == 0 || frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded[..decimals as usize]
            .parse::<u128>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = unit(decimals);
    let amount = whole_num
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Format base units as a human decimal string, trailing zeros trimmed.
///
/// `1_500_000_000_000_000_000` with `decimals = 18` yields `"1.5"`.
pub fn format_units(amount: u128, decimals: u32) -> String {
    let multiplier = unit(decimals);
    let whole = amount / multiplier;
    let frac = amount % multiplier;

    if frac == 0 {
        return whole.to_string();
    }

    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    let frac_trimmed = frac_str.trim_end_matches('0');
    format!("{}.{}", whole, frac_trimmed)
}

/// Convert a positive `Decimal` to base units, truncating precision beyond
/// `decimals` (fee conversions round down in the user's favor).
pub fn decimal_to_units(value: Decimal, decimals: u32) -> Result<u128, MoneyError> {
    if value.is_sign_negative() {
        return Err(MoneyError::InvalidAmount);
    }
    let multiplier = Decimal::from(10u64.pow(decimals.min(18)));
    let scaled = value.checked_mul(multiplier).ok_or(MoneyError::Overflow)?;
    scaled.trunc().to_u128().ok_or(MoneyError::Overflow)
}

/// Convert base units to a `Decimal` for display and USD math.
pub fn units_to_decimal(amount: u128, decimals: u32) -> Decimal {
    // Round-trip through the canonical string form; base-unit values exceed
    // Decimal's 96-bit mantissa only for absurd supplies
    format_units(amount, decimals)
        .parse()
        .unwrap_or(Decimal::ZERO)
}

/// `10^decimals` as `u128`.
#[inline]
pub fn unit(decimals: u32) -> u128 {
    10u128.pow(decimals)
}
