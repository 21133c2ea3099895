//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.
//!
//! Decimal columns are stored as canonical strings: SQLite has no exact
//! decimal type and would otherwise round every amount through `f64`.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Reject zero or negative values with a labeled `InvalidAmount`.
pub(crate) fn ensure_positive(value: Decimal, label: &str) -> ResultEngine<()> {
    if value <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!("{label} must be > 0")));
    }
    Ok(())
}

/// Reject negative values with a labeled `InvalidAmount`.
pub(crate) fn ensure_non_negative(value: Decimal, label: &str) -> ResultEngine<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(EngineError::InvalidAmount(format!("{label} must be >= 0")));
    }
    Ok(())
}

fn overflow(label: &str) -> EngineError {
    EngineError::InvalidAmount(format!("{label} overflows"))
}

/// `a * b`, or `InvalidAmount` when the product does not fit a `Decimal`.
pub(crate) fn checked_mul(a: Decimal, b: Decimal, label: &str) -> ResultEngine<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(label))
}

pub(crate) fn checked_add(a: Decimal, b: Decimal, label: &str) -> ResultEngine<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(label))
}

pub(crate) fn checked_div(a: Decimal, b: Decimal, label: &str) -> ResultEngine<Decimal> {
    a.checked_div(b).ok_or_else(|| overflow(label))
}

/// Sum `values`, failing instead of panicking on overflow.
pub(crate) fn checked_sum(
    values: impl IntoIterator<Item = Decimal>,
    label: &str,
) -> ResultEngine<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| checked_add(acc, value, label))
}

/// Serialize a decimal for a string column.
pub(crate) fn decimal_to_column(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Parse a decimal from a string column and return a labeled error on failure.
pub(crate) fn decimal_from_column(value: &str, label: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| EngineError::InvalidAmount(format!("invalid stored {label}: {value}")))
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::KeyNotFound(format!("invalid {label} id")))
}

/// Trim optional free text, dropping it when empty.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn decimal_column_keeps_full_precision() {
        let unit_cost = Decimal::ONE / dec!(15.5);
        let stored = decimal_to_column(unit_cost);
        assert_eq!(decimal_from_column(&stored, "unit cost").unwrap(), unit_cost);
    }

    #[test]
    fn decimal_column_drops_trailing_zeros() {
        assert_eq!(decimal_to_column(dec!(12.500)), "12.5");
    }

    #[test]
    fn ensure_positive_rejects_zero() {
        assert_eq!(
            ensure_positive(Decimal::ZERO, "rate"),
            Err(EngineError::InvalidAmount("rate must be > 0".to_string()))
        );
        assert!(ensure_non_negative(Decimal::ZERO, "paid").is_ok());
        assert!(ensure_non_negative(dec!(-0.01), "paid").is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(
            checked_mul(Decimal::MAX, dec!(2), "total"),
            Err(EngineError::InvalidAmount("total overflows".to_string()))
        );
        assert!(checked_sum([Decimal::MAX, Decimal::ONE], "total").is_err());
        assert_eq!(checked_sum([dec!(1.5), dec!(2)], "total"), Ok(dec!(3.5)));
        assert!(checked_div(Decimal::ONE, Decimal::ZERO, "unit cost").is_err());
    }

    #[test]
    fn normalize_optional_text_drops_blank() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(
            normalize_optional_text(Some(" cash ")),
            Some("cash".to_string())
        );
    }
}
