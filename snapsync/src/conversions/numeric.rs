use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

/// Strings that mean "no value", compared trimmed and case-insensitively.
pub const NO_VALUE_TOKENS: &[&str] = &["", "n/a", "no disponible", "none", "nan"];

/// Currency symbols removed before parsing numeric text.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '¢', '₡', '₲', '₱', '₹', '₩'];

/// Thousands separators removed before parsing numeric text.
const THOUSANDS_SEPARATORS: &[char] = &[',', '\u{a0}', '\u{202f}'];

/// Returns whether `value` is one of the [`NO_VALUE_TOKENS`].
pub fn is_no_value(value: &str) -> bool {
    let value = value.trim();
    NO_VALUE_TOKENS
        .iter()
        .any(|token| value.eq_ignore_ascii_case(token))
}

/// Removes currency symbols, thousands separators and surrounding whitespace.
///
/// Returns [`None`] for no-value tokens.
fn clean_numeric_text(value: &str) -> Option<String> {
    if is_no_value(value) {
        return None;
    }

    let cleaned: String = value
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && !THOUSANDS_SEPARATORS.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Parses numeric text such as `"$45,000.00"` into a finite float.
pub fn parse_float_text(value: &str) -> Option<f64> {
    let cleaned = clean_numeric_text(value)?;
    f64::from_str(&cleaned).ok().filter(|value| value.is_finite())
}

/// Parses numeric text into an integer, truncating toward zero.
///
/// Values outside the `i64` range yield [`None`].
pub fn parse_integer_text(value: &str) -> Option<i64> {
    let cleaned = clean_numeric_text(value)?;
    let decimal = BigDecimal::from_str(&cleaned).ok()?;
    decimal_to_integer(&decimal)
}

/// Converts a decimal to a finite float.
pub fn decimal_to_float(value: &BigDecimal) -> Option<f64> {
    value.to_f64().filter(|value| value.is_finite())
}

/// Converts a decimal to an integer, truncating toward zero.
pub fn decimal_to_integer(value: &BigDecimal) -> Option<i64> {
    value.with_scale_round(0, RoundingMode::Down).to_i64()
}

/// Renders a decimal as plain text without trailing zeros.
pub fn decimal_to_text(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_and_separators() {
        assert_eq!(parse_float_text("$45,000.00"), Some(45000.0));
        assert_eq!(parse_float_text(" € 1,250.5 "), Some(1250.5));
        assert_eq!(parse_float_text("-$5"), Some(-5.0));
    }

    #[test]
    fn no_value_tokens_are_absent() {
        for token in ["", "  ", "N/A", "No disponible", "none", "NaN"] {
            assert_eq!(parse_float_text(token), None, "token {token:?}");
            assert_eq!(parse_integer_text(token), None, "token {token:?}");
        }
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        assert_eq!(parse_float_text("inf"), None);
        assert_eq!(parse_float_text("1e400"), None);
    }

    #[test]
    fn integers_truncate_toward_zero() {
        assert_eq!(parse_integer_text("3.9"), Some(3));
        assert_eq!(parse_integer_text("-3.9"), Some(-3));
        assert_eq!(parse_integer_text("1,200"), Some(1200));
        assert_eq!(parse_integer_text("2 años"), None);
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        assert_eq!(parse_integer_text("99999999999999999999"), None);
        assert_eq!(
            decimal_to_integer(&BigDecimal::from_str("1e30").unwrap()),
            None
        );
    }

    #[test]
    fn decimals_render_without_trailing_zeros() {
        assert_eq!(
            decimal_to_text(&BigDecimal::from_str("45000.10").unwrap()),
            "45000.1"
        );
        assert_eq!(decimal_to_text(&BigDecimal::from(12)), "12");
    }
}
