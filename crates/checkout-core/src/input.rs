//! Input Normalization
//!
//! Phone number formatting and validation, amount parsing, and the editable
//! form state that feeds a checkout submission.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::model::CheckoutRequest;

/// Country code substituted for the local trunk prefix
pub const COUNTRY_CODE: &str = "254";

/// Smallest amount the gateway accepts (KES)
pub const MIN_AMOUNT: Decimal = dec!(10);

/// Preset increments offered next to the amount field
pub const QUICK_AMOUNTS: [u32; 4] = [100, 200, 500, 1000];

pub const MISSING_FIELDS_MESSAGE: &str = "Please enter both a valid phone number and amount.";
pub const INVALID_PHONE_MESSAGE: &str =
    "Please enter a valid phone number (e.g., 0712345678 or 254712345678).";

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:254|07)\d{8}$").expect("phone pattern compiles"));

/// Replace a leading `0` with the country code; anything else is returned as-is.
pub fn format_phone_number(input: &str) -> String {
    match input.strip_prefix('0') {
        Some(rest) => format!("{COUNTRY_CODE}{rest}"),
        None => input.to_string(),
    }
}

/// Accepts `07` + 8 digits or `254` + 8 digits.
///
/// Checked against the number as typed, before [`format_phone_number`].
pub fn is_valid_phone_number(input: &str) -> bool {
    PHONE_PATTERN.is_match(input)
}

/// Parse an amount and enforce the minimum.
pub fn parse_amount(input: &str, min: Decimal) -> Result<Decimal> {
    let invalid = || CheckoutError::Validation(format!("Please enter a valid amount (minimum KES {min})."));

    let trimmed = input.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| invalid())?;

    if amount < min {
        return Err(invalid());
    }

    Ok(amount)
}

/// Editable checkout form state, kept as typed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutInput {
    pub phone_number: String,
    pub amount: String,
}

impl CheckoutInput {
    pub fn new(phone_number: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            amount: amount.into(),
        }
    }

    /// Add a preset to the current amount. An unparseable amount counts as
    /// zero; a sum that would overflow leaves the amount unchanged.
    pub fn add_amount(&mut self, value: u32) {
        let current = Decimal::from_str(self.amount.trim()).unwrap_or(Decimal::ZERO);
        if let Some(sum) = current.checked_add(Decimal::from(value)) {
            self.amount = sum.normalize().to_string();
        }
    }

    pub fn clear(&mut self) {
        self.phone_number.clear();
        self.amount.clear();
    }

    /// Validate in form order: presence, phone pattern, amount.
    pub fn validate(&self, min_amount: Decimal) -> Result<CheckoutRequest> {
        if self.phone_number.is_empty() || self.amount.is_empty() {
            return Err(CheckoutError::Validation(MISSING_FIELDS_MESSAGE.into()));
        }

        if !is_valid_phone_number(&self.phone_number) {
            return Err(CheckoutError::Validation(INVALID_PHONE_MESSAGE.into()));
        }

        let amount = parse_amount(&self.amount, min_amount)?;

        Ok(CheckoutRequest::new(&self.phone_number, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_replaces_trunk_prefix() {
        assert_eq!(format_phone_number("0712345678"), "254712345678");
        assert_eq!(format_phone_number("0"), "254");
    }

    #[test]
    fn test_format_leaves_other_input_alone() {
        for input in ["254712345678", "712345678", "", "+254712345678", "abc"] {
            assert_eq!(format_phone_number(input), input);
        }
    }

    #[test]
    fn test_format_every_trunk_number() {
        for n in [0u32, 1, 12_345_678, 712_345_678, 999_999_999] {
            let tail = format!("{n:09}");
            let input = format!("0{tail}");
            assert_eq!(format_phone_number(&input), format!("254{tail}"));
        }
    }

    #[test]
    fn test_phone_pattern() {
        assert!(is_valid_phone_number("0712345678"));
        assert!(is_valid_phone_number("25412345678"));
        assert!(!is_valid_phone_number("254712345678"));
        assert!(!is_valid_phone_number("0812345678"));
        assert!(!is_valid_phone_number("071234567"));
        assert!(!is_valid_phone_number("07123456789"));
        assert!(!is_valid_phone_number(" 0712345678"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10", MIN_AMOUNT).unwrap(), dec!(10));
        assert_eq!(parse_amount(" 150.50 ", MIN_AMOUNT).unwrap(), dec!(150.50));
        assert_eq!(parse_amount("1e3", MIN_AMOUNT).unwrap(), dec!(1000));
        assert!(parse_amount("9.99", MIN_AMOUNT).is_err());
        assert!(parse_amount("-50", MIN_AMOUNT).is_err());
        assert!(parse_amount("ten", MIN_AMOUNT).is_err());
        assert!(parse_amount("NaN", MIN_AMOUNT).is_err());
        assert!(parse_amount("", MIN_AMOUNT).is_err());
    }

    #[test]
    fn test_validate_order() {
        let err = CheckoutInput::new("", "100").validate(MIN_AMOUNT).unwrap_err();
        assert_eq!(err, CheckoutError::Validation(MISSING_FIELDS_MESSAGE.into()));

        let err = CheckoutInput::new("12345", "5").validate(MIN_AMOUNT).unwrap_err();
        assert_eq!(err, CheckoutError::Validation(INVALID_PHONE_MESSAGE.into()));

        let err = CheckoutInput::new("0712345678", "5").validate(MIN_AMOUNT).unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(msg) if msg.contains("minimum KES 10")));
    }

    #[test]
    fn test_validate_normalizes_phone() {
        let request = CheckoutInput::new("0712345678", "250")
            .validate(MIN_AMOUNT)
            .unwrap();
        assert_eq!(request.phone_number(), "254712345678");
        assert_eq!(request.entered_phone_number(), "0712345678");
        assert_eq!(request.amount(), dec!(250));
    }

    #[test]
    fn test_quick_add() {
        let mut input = CheckoutInput::default();
        input.add_amount(100);
        input.add_amount(500);
        assert_eq!(input.amount, "600");

        input.amount = "not a number".into();
        input.add_amount(200);
        assert_eq!(input.amount, "200");

        input.amount = "10.5".into();
        input.add_amount(1000);
        assert_eq!(input.amount, "1010.5");

        input.amount = "79228162514264337593543950335".into();
        input.add_amount(1000);
        assert_eq!(input.amount, "79228162514264337593543950335");
    }
}
