//! # Money Arithmetic
//!
//! Amounts are plain `i64` in the shop's minor unit. Every total that mixes
//! more than one stored amount goes through this module, so an overflow is
//! reported instead of wrapping or panicking.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  write path    Sale::validate ──▶ line × qty, Σ lines overflow?        │
//! │                                   └── ValidationError::Inconsistent     │
//! │                                                                         │
//! │  stock/balance checked_add ──▶ DbError::Rejected                       │
//! │                                                                         │
//! │  statements    income / balance sheet ──▶ CoreError::AmountOverflow     │
//! │                                                                         │
//! │  dashboards    counters clamp at i64::MIN / i64::MAX                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};

/// `Σ amounts`, or `None` on overflow.
pub fn checked_total<I>(amounts: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    amounts.into_iter().try_fold(0i64, i64::checked_add)
}

/// `Σ amounts`, clamped at the `i64` bounds. Dashboard figures only.
pub fn clamped_total<I>(amounts: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    amounts.into_iter().fold(0i64, i64::saturating_add)
}

/// `Σ amounts` for the named statement figure.
pub fn total<I>(figure: &str, amounts: I) -> CoreResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    checked_total(amounts).ok_or_else(|| overflow(figure))
}

pub fn add(figure: &str, a: i64, b: i64) -> CoreResult<i64> {
    a.checked_add(b).ok_or_else(|| overflow(figure))
}

pub fn sub(figure: &str, a: i64, b: i64) -> CoreResult<i64> {
    a.checked_sub(b).ok_or_else(|| overflow(figure))
}

/// Adds `amount` into an accumulator for the named figure.
pub fn accumulate(figure: &str, into: &mut i64, amount: i64) -> CoreResult<()> {
    *into = add(figure, *into, amount)?;
    Ok(())
}

fn overflow(figure: &str) -> CoreError {
    CoreError::AmountOverflow {
        figure: figure.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_total() {
        assert_eq!(checked_total([100, 250, -50]), Some(300));
        assert_eq!(checked_total(std::iter::empty()), Some(0));
        assert_eq!(checked_total([i64::MAX, 1]), None);
        assert_eq!(checked_total([i64::MIN, -1]), None);
        assert_eq!(clamped_total([i64::MAX, 5]), i64::MAX);
    }

    #[test]
    fn test_overflow_names_the_figure() {
        let err = total("cogs", [i64::MAX, i64::MAX]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { ref figure } if figure == "cogs"));

        let mut running = i64::MAX - 1;
        accumulate("cash", &mut running, 1).unwrap();
        assert_eq!(running, i64::MAX);
        assert!(accumulate("cash", &mut running, 1).is_err());
        assert!(sub("net", i64::MIN, 1).is_err());
    }
}
