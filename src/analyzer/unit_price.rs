// Price-per-unit derivation

/// Rounds half-up to two decimals (non-negative inputs).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `price / quantity` rounded to cents. `None` when either input is missing
/// or the quantity is not a positive finite number; never 0 as a stand-in.
pub fn derive_unit_price(
    price_absolute: Option<f64>,
    package_quantity: Option<f64>,
) -> Option<f64> {
    let price = price_absolute?;
    let quantity = package_quantity?;
    if !price.is_finite() || !quantity.is_finite() || quantity <= 0.0 {
        return None;
    }
    Some(round2(price / quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divides_and_rounds_to_cents() {
        assert_eq!(derive_unit_price(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(derive_unit_price(Some(12.99), Some(12.0)), Some(1.08));
    }

    #[test]
    fn exact_halves_round_up() {
        // 0.25 / 2 = 0.125 -> 0.13
        assert_eq!(derive_unit_price(Some(0.25), Some(2.0)), Some(0.13));
    }

    #[test]
    fn missing_inputs_yield_none() {
        assert_eq!(derive_unit_price(None, Some(2.0)), None);
        assert_eq!(derive_unit_price(Some(5.0), None), None);
        assert_eq!(derive_unit_price(None, None), None);
    }

    #[test]
    fn non_positive_quantity_yields_none() {
        assert_eq!(derive_unit_price(Some(5.0), Some(0.0)), None);
        assert_eq!(derive_unit_price(Some(5.0), Some(-3.0)), None);
    }
}
