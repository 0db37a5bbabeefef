//! Conversion between raw integer token amounts and decimal strings.
//!
//! Integer arithmetic only; no float ever touches an amount.

use thiserror::Error;

/// Highest decimal precision accepted by [`parse_amount`].
pub const MAX_DECIMALS: u8 = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Empty amount string")]
    Empty,

    #[error("Invalid amount string: {0:?}")]
    Invalid(String),

    #[error("Amount {value:?} has more than {decimals} fractional digits")]
    TooPrecise { value: String, decimals: u8 },

    #[error("Amount {0:?} does not fit in a u64")]
    Overflow(String),

    #[error("Unsupported decimals: {0} (max {MAX_DECIMALS})")]
    UnsupportedDecimals(u8),
}

/// Format a raw amount as a decimal string with trailing zeros stripped.
///
/// `format_amount(1_500_000, 6) == "1.5"`, `format_amount(700_000_000, 6) == "700"`.
pub fn format_amount(raw: u64, decimals: u8) -> String {
    let digits = raw.to_string();
    if decimals == 0 {
        return digits;
    }

    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Parse a decimal string into a raw amount at the given precision.
///
/// Fractional digits beyond `decimals` are accepted only when they are zeros.
pub fn parse_amount(value: &str, decimals: u8) -> Result<u64, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    if value.is_empty() {
        return Err(AmountError::Empty);
    }

    let (int_part, frac_part) = match value.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (value, ""),
    };

    if int_part.is_empty() || !is_digits(int_part) || !is_digits(frac_part) {
        return Err(AmountError::Invalid(value.to_string()));
    }

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            value: value.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(value.to_string());
    let scale = 10u128.pow(decimals as u32);
    let frac_scale = 10u128.pow((decimals as usize - frac_part.len()) as u32);

    let int_value: u128 = int_part.parse().map_err(|_| overflow())?;
    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| overflow())?
    };

    let total = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value * frac_scale))
        .ok_or_else(overflow)?;

    u64::try_from(total).map_err(|_| overflow())
}

/// Parse the integer amount string carried in RPC token balances.
pub fn parse_raw(value: &str) -> Result<u64, AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    if !is_digits(value) {
        return Err(AmountError::Invalid(value.to_string()));
    }
    value
        .parse::<u64>()
        .map_err(|_| AmountError::Overflow(value.to_string()))
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(2_500_000, 6), "2.5");
        assert_eq!(format_amount(700_000_000, 6), "700");
        assert_eq!(format_amount(0, 6), "0");
        assert_eq!(format_amount(1, 9), "0.000000001");
        assert_eq!(format_amount(123, 0), "123");
        assert_eq!(format_amount(100_000_000, 9), "0.1");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 6), Ok(1_500_000));
        assert_eq!(parse_amount("700", 6), Ok(700_000_000));
        assert_eq!(parse_amount("5.0", 6), Ok(5_000_000));
        assert_eq!(parse_amount("0.000000001", 9), Ok(1));
        assert_eq!(parse_amount("1.500", 1), Ok(15));
    }

    #[test]
    fn test_parse_amount_rejects_malformed() {
        assert_eq!(parse_amount("", 6), Err(AmountError::Empty));
        assert!(matches!(parse_amount("-1", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount(".5", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("1.2.3", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("1e6", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(
            parse_amount("0.0000001", 6),
            Err(AmountError::TooPrecise { .. })
        ));
        assert!(matches!(
            parse_amount("18446744073709551616", 0),
            Err(AmountError::Overflow(_))
        ));
        assert_eq!(parse_amount("1", 19), Err(AmountError::UnsupportedDecimals(19)));
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(parse_raw("2500000"), Ok(2_500_000));
        assert_eq!(parse_raw("18446744073709551615"), Ok(u64::MAX));
        assert!(matches!(parse_raw("12a"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_raw("1.0"), Err(AmountError::Invalid(_))));
        assert!(matches!(
            parse_raw("18446744073709551616"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_round_trip_across_decimals() {
        let samples = [
            0u64,
            1,
            9,
            10,
            999_999,
            1_000_000,
            1_500_000,
            123_456_789_012,
            u64::MAX / 7,
            u64::MAX - 1,
        ];
        for decimals in 0..=MAX_DECIMALS {
            for raw in samples {
                let formatted = format_amount(raw, decimals);
                assert_eq!(
                    parse_amount(&formatted, decimals),
                    Ok(raw),
                    "raw={} decimals={} formatted={}",
                    raw,
                    decimals,
                    formatted
                );
            }
        }
    }
}
