//! Locale-aware rendering of numeric values as currency strings.

use serde::Deserialize;

use crate::model::CellValue;

/// Explicit formatting configuration replacing process-wide locale state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    /// Prefix written before the digits.
    pub symbol: String,
    /// Separator inserted between groups of three integer digits.
    pub thousands_separator: String,
    /// Separator between the integer and fractional digits.
    pub decimal_separator: String,
    /// Text substituted for empty values.
    pub not_available: String,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            not_available: "N/A".to_string(),
        }
    }
}

impl CurrencyFormat {
    /// Renders a number, without decimals when it is whole and with exactly
    /// two decimals otherwise.
    pub fn format_number(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }

        let whole = value.fract() == 0.0;
        let digits = if whole {
            format!("{:.0}", value.abs())
        } else {
            format!("{:.2}", value.abs())
        };
        let (integer, fraction) = match digits.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (digits.as_str(), None),
        };

        let mut rendered = String::new();
        if value < 0.0 && digits.chars().any(|digit| digit != '0' && digit != '.') {
            rendered.push('-');
        }
        rendered.push_str(&self.symbol);
        rendered.push_str(&self.group_thousands(integer));
        if let Some(fraction) = fraction {
            rendered.push_str(&self.decimal_separator);
            rendered.push_str(fraction);
        }
        rendered
    }

    /// Renders a cell for document substitution: numbers as currency, empty
    /// cells as the "not available" marker, everything else as plain text.
    pub fn format_value(&self, value: &CellValue) -> String {
        match value {
            CellValue::Number(number) => self.format_number(*number),
            value if value.is_empty() => self.not_available.clone(),
            other => other.display_text(),
        }
    }

    fn group_thousands(&self, integer: &str) -> String {
        let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
        let length = integer.len();
        for (position, digit) in integer.chars().enumerate() {
            if position > 0 && (length - position) % 3 == 0 {
                grouped.push_str(&self.thousands_separator);
            }
            grouped.push(digit);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_have_no_decimals() {
        let format = CurrencyFormat::default();
        assert_eq!(format.format_number(1000.0), "$1,000");
        assert_eq!(format.format_number(0.0), "$0");
        assert_eq!(format.format_number(999.0), "$999");
        assert_eq!(format.format_number(1_234_567.0), "$1,234,567");
    }

    #[test]
    fn fractional_numbers_have_two_decimals() {
        let format = CurrencyFormat::default();
        assert_eq!(format.format_number(1000.5), "$1,000.50");
        assert_eq!(format.format_number(0.126), "$0.13");
        assert_eq!(format.format_number(12.3456), "$12.35");
    }

    #[test]
    fn negative_numbers_keep_their_sign() {
        let format = CurrencyFormat::default();
        assert_eq!(format.format_number(-1500.0), "-$1,500");
        assert_eq!(format.format_number(-0.001), "$0.00");
    }

    #[test]
    fn separators_follow_the_configuration() {
        let format = CurrencyFormat {
            symbol: "€".into(),
            thousands_separator: ".".into(),
            decimal_separator: ",".into(),
            not_available: "n/a".into(),
        };
        assert_eq!(format.format_number(1234.5), "€1.234,50");
        assert_eq!(format.format_value(&CellValue::Empty), "n/a");
    }

    #[test]
    fn non_numeric_values_pass_through() {
        let format = CurrencyFormat::default();
        assert_eq!(format.format_value(&CellValue::Text("Gold".into())), "Gold");
        assert_eq!(format.format_value(&CellValue::Text(String::new())), "N/A");
        assert_eq!(format.format_value(&CellValue::Empty), "N/A");
        assert_eq!(format.format_value(&CellValue::Number(2500.0)), "$2,500");
    }
}
