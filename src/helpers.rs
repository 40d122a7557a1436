//! Shared numeric helpers.
//!
//! Readings and coordinates are stored as `NUMERIC` (`Decimal`) and served as
//! JSON numbers (`f64`). Forecast values shown to clients are rounded to one
//! decimal place with the same correctly-rounded formatting used for display.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Round an f64 to 1 decimal place.
///
/// Goes through `{:.1}` formatting, which rounds exact ties to even
/// (2.25 → 2.2, 2.35 → 2.4 since 2.35 is stored slightly above the tie).
pub(crate) fn round_1dp(v: f64) -> f64 {
    if !v.is_finite() {
        return v;
    }
    format!("{:.1}", v).parse().unwrap_or(v)
}

/// Convert an f64 to Decimal, keeping the shortest decimal form that
/// round-trips (51.5074 stays 51.5074 rather than its binary expansion).
///
/// Returns `Decimal::ZERO` for non-finite inputs (NaN, ±Inf).
pub(crate) fn f64_to_decimal(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_str(&v.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(v))
        .unwrap_or_else(|| Decimal::new(v as i64, 0))
}

/// Convert an optional f64 to Decimal, returning None if input is None.
pub(crate) fn opt_f64_to_decimal(v: Option<f64>) -> Option<Decimal> {
    v.map(f64_to_decimal)
}

/// Convert a provider JSON number to Decimal without going through f64.
pub(crate) fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    Decimal::from_str(&n.to_string())
        .ok()
        .or_else(|| n.as_f64().map(f64_to_decimal))
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert an Option<Decimal> to Option<f64>.
pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_1dp() {
        assert_eq!(round_1dp(14.56), 14.6);
        assert_eq!(round_1dp(-3.14), -3.1);
        assert_eq!(round_1dp(7.0), 7.0);
    }

    #[test]
    fn test_round_1dp_exact_tie_goes_to_even() {
        assert_eq!(round_1dp(2.25), 2.2);
        assert_eq!(round_1dp(0.75), 0.8);
        assert_eq!(round_1dp(2.35), 2.4);
    }

    #[test]
    fn test_round_1dp_non_finite_passthrough() {
        assert!(round_1dp(f64::NAN).is_nan());
        assert_eq!(round_1dp(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_f64_to_decimal_normal() {
        let d = f64_to_decimal(51.5074);
        assert_eq!(d, Decimal::from_str("51.5074").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_nan() {
        assert_eq!(f64_to_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_f64_to_decimal_infinity() {
        assert_eq!(f64_to_decimal(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_opt_f64_to_decimal() {
        assert_eq!(opt_f64_to_decimal(None), None);
        assert_eq!(
            opt_f64_to_decimal(Some(-0.12)),
            Some(Decimal::from_str("-0.12").unwrap())
        );
    }

    #[test]
    fn test_number_to_decimal() {
        let n = serde_json::Number::from(1013);
        assert_eq!(number_to_decimal(&n), Some(Decimal::from(1013)));
        let n = serde_json::Number::from_f64(0.35).unwrap();
        assert_eq!(number_to_decimal(&n), Some(Decimal::from_str("0.35").unwrap()));
    }

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("3.14").unwrap();
        assert!((dec_to_f64(d) - 3.14).abs() < 1e-10);
    }

    #[test]
    fn test_opt_dec_to_f64() {
        assert_eq!(opt_dec_to_f64(None), None);
        let d = Decimal::from_str("1013").unwrap();
        assert_eq!(opt_dec_to_f64(Some(d)), Some(1013.0));
    }
}
