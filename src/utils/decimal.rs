//! Decimal arithmetic utilities for allocation and sizing math.

use rust_decimal::Decimal;

/// Round down to lot size (quantity precision).
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// `part` as a percentage (0-100) of `whole`; zero when `whole` is zero.
pub fn pct_of(part: Decimal, whole: Decimal) -> Decimal {
    safe_div(part, whole) * Decimal::ONE_HUNDRED
}

/// Round a percentage for display in reasons and logs.
pub fn display_pct(value: Decimal) -> Decimal {
    value.round_dp(2).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_down_to_lot() {
        assert_eq!(round_down_to_lot(dec!(0.016667), dec!(0.0001)), dec!(0.0166));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.1)), dec!(1.5));
        assert_eq!(round_down_to_lot(dec!(1.567), Decimal::ZERO), dec!(1.567));
    }

    #[test]
    fn test_pct_of() {
        assert_eq!(pct_of(dec!(11000), dec!(51000)).round_dp(2), dec!(21.57));
        assert_eq!(pct_of(dec!(5), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_display_pct() {
        assert_eq!(display_pct(dec!(21.568627)), dec!(21.57));
        assert_eq!(display_pct(dec!(40.00)).to_string(), "40");
    }
}
