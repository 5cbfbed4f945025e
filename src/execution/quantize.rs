//! Exchange quantization helpers.
//!
//! Sizes and prices are always rounded toward zero onto the market grid so the
//! exchange never sees an increment finer than it allows. Fees go the other
//! way and round up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits needed to express `increment`
pub fn decimal_places(increment: Decimal) -> u32 {
    increment.normalize().scale()
}

/// Largest multiple of `increment` that is <= `value` (for non-negative values)
pub fn quantize_down(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    value - (value % increment)
}

/// Size quantized down to `step_size` and printed with exactly its precision
pub fn format_size(raw_size: Decimal, step_size: Decimal) -> String {
    let mut size = quantize_down(raw_size, step_size);
    size.rescale(decimal_places(step_size));
    size.to_string()
}

/// Digits implied by a currency resolution: 1000000 -> 6
pub fn resolution_digits(resolution: u64) -> u32 {
    (resolution.to_string().len() as u32).saturating_sub(1)
}

/// Round `value` up to `digits` fractional digits, printed with exactly that many
pub fn round_up(value: Decimal, digits: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(digits, RoundingStrategy::ToPositiveInfinity);
    rounded.rescale(digits);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(dec!(0.001)), 3);
        assert_eq!(decimal_places(dec!(0.0010)), 3);
        assert_eq!(decimal_places(dec!(1)), 0);
        assert_eq!(decimal_places(dec!(0.5)), 1);
    }

    #[test]
    fn test_quantize_down_laws() {
        let steps = [dec!(0.001), dec!(0.01), dec!(0.5), dec!(1), dec!(0.005), dec!(25)];
        let values = [
            dec!(0),
            dec!(0.0004),
            dec!(1.2345678),
            dec!(499.9999),
            dec!(52500.7),
            dec!(3),
        ];

        for step in steps {
            for value in values {
                let q = quantize_down(value, step);
                assert!(q <= value, "{} > {} for step {}", q, value, step);
                assert!(q > value - step, "{} too far below {} for step {}", q, value, step);
                assert_eq!(q % step, Decimal::ZERO, "{} not a multiple of {}", q, step);
            }
        }
    }

    #[test]
    fn test_quantize_down_on_grid_is_identity() {
        assert_eq!(quantize_down(dec!(52500), dec!(1)), dec!(52500));
        assert_eq!(quantize_down(dec!(0.5), dec!(0.001)), dec!(0.5));
    }

    #[test]
    fn test_format_size_uses_step_precision() {
        assert_eq!(format_size(dec!(0.5), dec!(0.001)), "0.500");
        assert_eq!(format_size(dec!(1.23456), dec!(0.01)), "1.23");
        assert_eq!(format_size(dec!(1.239), dec!(0.005)), "1.235");
        assert_eq!(format_size(dec!(12.9), dec!(1)), "12");
    }

    #[test]
    fn test_resolution_digits() {
        assert_eq!(resolution_digits(1_000_000), 6);
        assert_eq!(resolution_digits(100), 2);
        assert_eq!(resolution_digits(1), 0);
    }

    #[test]
    fn test_round_up_law() {
        let cases = [
            (dec!(13.1250001), 6, "13.125001"),
            (dec!(13.125), 6, "13.125000"),
            (dec!(0.0000001), 6, "0.000001"),
            (dec!(2.1), 0, "3"),
        ];

        for (value, digits, expected) in cases {
            let out = round_up(value, digits);
            assert_eq!(out, expected);

            let parsed = Decimal::from_str(&out).unwrap();
            assert!(parsed >= value);
            let fractional = out.split('.').nth(1).map(|f| f.len()).unwrap_or(0);
            assert_eq!(fractional as u32, digits);
        }
    }
}
