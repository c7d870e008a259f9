//! Amount and currency helpers for the payments module.
//!
//! Request bodies carry major units (dollars). Stripe wants minor units.

use crate::config::CENTS_PER_DOLLAR;

/// Convert a major-unit amount to minor units, rounding half away from zero.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * CENTS_PER_DOLLAR).round() as i64
}

/// Settlement currency used for bank accounts in `country`.
pub fn currency_for_country(country: &str) -> &'static str {
    match country.to_ascii_uppercase().as_str() {
        "US" => "usd",
        "CA" => "cad",
        "GB" => "gbp",
        "AU" => "aud",
        "DE" | "FR" | "IT" | "ES" | "NL" | "BE" | "AT" | "FI" | "IE" | "PT" => "eur",
        "JP" => "jpy",
        "CN" => "cny",
        "IN" => "inr",
        "BR" => "brl",
        "MX" => "mxn",
        _ => "usd",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(19.99), 1999);
        assert_eq!(to_minor_units(0.5), 50);
        assert_eq!(to_minor_units(1.005), 100);
        assert_eq!(to_minor_units(2.5), 250);
    }

    #[test]
    fn test_currency_for_country() {
        assert_eq!(currency_for_country("US"), "usd");
        assert_eq!(currency_for_country("gb"), "gbp");
        assert_eq!(currency_for_country("fr"), "eur");
        assert_eq!(currency_for_country("JP"), "jpy");
        assert_eq!(currency_for_country("ZZ"), "usd");
    }
}
