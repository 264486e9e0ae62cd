//! Bangladeshi mobile number validation.
//!
//! Accepted shapes are the local `01[3-9]XXXXXXXX` (11 digits) and the international
//! `+8801[3-9]XXXXXXXX` (14 characters). Rejections carry a message meant to be shown to the
//! shopper as-is.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number can only contain digits or '+' at start.")]
    IllegalCharacter,
    #[error("Phone number can't contain multiple '+' symbols.")]
    MultiplePlus,
    #[error("Plus sign (+) must be at the beginning only.")]
    MisplacedPlus,
    #[error("International format must start with +880.")]
    InternationalPrefix,
    #[error("International number must be 14 characters (+8801XXXXXXXXX).")]
    InternationalLength,
    #[error("Invalid Bangladeshi operator code in international number.")]
    InternationalOperator,
    #[error("Local Bangladeshi numbers must start with 01.")]
    LocalPrefix,
    #[error("Local Bangladeshi numbers must be exactly 11 digits.")]
    LocalLength,
    #[error("Invalid Bangladeshi operator code.")]
    LocalOperator,
}

/// Validates `raw` and returns the trimmed number on success.
pub fn validate_bd_phone(raw: &str) -> Result<&str, PhoneError> {
    let phone = raw.trim();

    if phone.chars().any(|c| !c.is_ascii_digit() && c != '+') {
        return Err(PhoneError::IllegalCharacter);
    }
    if phone.matches('+').count() > 1 {
        return Err(PhoneError::MultiplePlus);
    }
    if phone.contains('+') && !phone.starts_with('+') {
        return Err(PhoneError::MisplacedPlus);
    }

    if let Some(international) = phone.strip_prefix('+') {
        if !international.starts_with("880") {
            return Err(PhoneError::InternationalPrefix);
        }
        // Country code is 88; the national number keeps its leading 0.
        let national = &international[2..];
        if phone.len() != 14 {
            return Err(PhoneError::InternationalLength);
        }
        if !is_local_shape(national) {
            return Err(PhoneError::InternationalOperator);
        }
        return Ok(phone);
    }

    if !phone.starts_with("01") {
        return Err(PhoneError::LocalPrefix);
    }
    if phone.len() != 11 {
        return Err(PhoneError::LocalLength);
    }
    if !is_local_shape(phone) {
        return Err(PhoneError::LocalOperator);
    }

    Ok(phone)
}

/// `01[3-9]` followed by eight digits; callers have already ruled out non-digit characters.
fn is_local_shape(digits: &str) -> bool {
    let bytes = digits.as_bytes();
    bytes.len() == 11
        && bytes.starts_with(b"01")
        && (b'3'..=b'9').contains(&bytes[2])
        && bytes.iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_local_and_international_forms() {
        assert_eq!(validate_bd_phone("01712345678"), Ok("01712345678"));
        assert_eq!(validate_bd_phone("  01312345678 "), Ok("01312345678"));
        assert_eq!(validate_bd_phone("+8801912345678"), Ok("+8801912345678"));
    }

    #[test]
    fn short_number_is_a_prefix_error() {
        assert_eq!(validate_bd_phone("123"), Err(PhoneError::LocalPrefix));
    }

    #[test]
    fn each_rejection_has_its_own_reason() {
        let cases = [
            ("0171-234567", PhoneError::IllegalCharacter),
            ("++8801712345678", PhoneError::MultiplePlus),
            ("01712+345678", PhoneError::MisplacedPlus),
            ("+9101712345678", PhoneError::InternationalPrefix),
            ("+88017123456789", PhoneError::InternationalLength),
            ("+8801212345678", PhoneError::InternationalOperator),
            ("+8800712345678", PhoneError::InternationalOperator),
            ("02712345678", PhoneError::LocalPrefix),
            ("0171234567", PhoneError::LocalLength),
            ("01212345678", PhoneError::LocalOperator),
        ];

        for (input, expected) in cases {
            assert_eq!(validate_bd_phone(input), Err(expected), "input {input:?}");
        }
    }

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            PhoneError::LocalLength.to_string(),
            "Local Bangladeshi numbers must be exactly 11 digits."
        );
        assert_eq!(
            PhoneError::InternationalPrefix.to_string(),
            "International format must start with +880."
        );
    }

    proptest! {
        #[test]
        fn valid_local_numbers_pass(op in 3u8..=9, rest in "[0-9]{8}") {
            let phone = format!("01{op}{rest}");
            prop_assert_eq!(validate_bd_phone(&phone), Ok(phone.as_str()));
        }

        #[test]
        fn valid_international_numbers_pass(op in 3u8..=9, rest in "[0-9]{8}") {
            let phone = format!("+8801{op}{rest}");
            prop_assert_eq!(validate_bd_phone(&phone), Ok(phone.as_str()));
        }

        #[test]
        fn bad_operator_digit_is_rejected(op in 0u8..=2, rest in "[0-9]{8}") {
            let phone = format!("01{op}{rest}");
            prop_assert_eq!(validate_bd_phone(&phone), Err(PhoneError::LocalOperator));
        }

        #[test]
        fn foreign_characters_are_rejected(
            head in "[0-9]{0,6}",
            bad in "[a-zA-Z#\\-()./*]",
            tail in "[0-9]{0,6}",
        ) {
            let phone = format!("{head}{bad}{tail}");
            prop_assert_eq!(validate_bd_phone(&phone), Err(PhoneError::IllegalCharacter));
        }
    }
}
