//! Money arithmetic for commission accounting.
//!
//! All amounts are fixed-point decimals. The commission is rounded to two
//! places with banker's rounding and the net takes the remainder, so
//! `gross == commission + net` holds exactly for every split.

use rust_decimal::{Decimal, RoundingStrategy};

/// Result of splitting a gross amount into net and commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    /// Gross amount paid by the payer.
    pub gross: Decimal,
    /// Commission retained by the system.
    pub commission: Decimal,
    /// Net amount owed to the receiver.
    pub net: Decimal,
}

impl CommissionSplit {
    /// Split `gross` at `rate`.
    ///
    /// The commission is `round_half_even(gross × rate, 2)`; the net is the
    /// remainder, so no centavo is ever lost.
    ///
    /// # Examples
    /// ```
    /// use rust_decimal_macros::dec;
    /// use errand_core::domain::money::CommissionSplit;
    ///
    /// let split = CommissionSplit::of(dec!(100), dec!(0.10));
    /// assert_eq!(split.commission, dec!(10.00));
    /// assert_eq!(split.net, dec!(90.00));
    /// ```
    pub fn of(gross: Decimal, rate: Decimal) -> Self {
        let commission = round_half_even(gross * rate);
        Self {
            gross,
            commission,
            net: gross - commission,
        }
    }
}

/// Round to two decimal places with banker's rounding.
pub fn round_half_even(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
