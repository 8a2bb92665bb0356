//! Field validators for checkout input.
//!
//! All functions here are pure: malformed input produces a typed error,
//! never a panic. Card numbers and phone numbers are normalized by
//! stripping every non-digit character before any check runs.

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;

const MIN_CARD_DIGITS: usize = 13;
const MAX_CARD_DIGITS: usize = 19;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Amex => "amex",
            CardBrand::Discover => "discover",
        }
    }

    /// CVV length the brand expects: 4 for Amex, 3 for everyone else.
    pub fn cvv_length(&self) -> usize {
        match self {
            CardBrand::Amex => 4,
            _ => 3,
        }
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("Invalid card number length")]
    InvalidLength,
    #[error("Invalid card number")]
    FailedLuhnCheck,
    #[error("Unsupported card type")]
    UnsupportedBrand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpiryError {
    #[error("Invalid expiry format (MM/YY)")]
    InvalidFormat,
    #[error("Invalid expiry month")]
    InvalidMonth,
    #[error("Card has expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CvvError {
    #[error("CVV must be 4 digits for American Express")]
    AmexLength,
    #[error("CVV must be 3 digits")]
    StandardLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid phone number")]
    InvalidPhone,
}

fn digits_of(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Length check, then Luhn checksum, then brand classification.
/// Spaces and dashes in the input are ignored.
pub fn validate_card_number(raw: &str) -> Result<CardBrand, CardError> {
    let digits = digits_of(raw);
    if digits.len() < MIN_CARD_DIGITS || digits.len() > MAX_CARD_DIGITS {
        return Err(CardError::InvalidLength);
    }
    if !luhn_check(&digits) {
        return Err(CardError::FailedLuhnCheck);
    }
    card_brand(&digits).ok_or(CardError::UnsupportedBrand)
}

/// Classifies a digit string by issuer prefix.
pub fn card_brand(digits: &str) -> Option<CardBrand> {
    if digits.starts_with('4') {
        Some(CardBrand::Visa)
    } else if matches!(digits.get(0..2), Some("51" | "52" | "53" | "54" | "55")) {
        Some(CardBrand::Mastercard)
    } else if matches!(digits.get(0..2), Some("34" | "37")) {
        Some(CardBrand::Amex)
    } else if digits.starts_with("6011") || digits.starts_with("65") {
        Some(CardBrand::Discover)
    } else {
        None
    }
}

/// Luhn mod-10 checksum over an all-digit string: walking right to left,
/// every second digit is doubled and digits above 9 have 9 subtracted.
pub fn luhn_check(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let mut d = match c.to_digit(10) {
            Some(d) => d,
            None => return false,
        };
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

/// Parses `MM/YY` and rejects months already in the past. The current
/// month is still valid. Two-digit years map to 2000-2099.
pub fn validate_expiry(raw: &str, now: DateTime<Utc>) -> Result<(), ExpiryError> {
    let (month_part, year_part) = raw.split_once('/').ok_or(ExpiryError::InvalidFormat)?;
    if month_part.len() != 2 || year_part.len() != 2 {
        return Err(ExpiryError::InvalidFormat);
    }
    let month: u32 = month_part.parse().map_err(|_| ExpiryError::InvalidFormat)?;
    let year: i32 = year_part
        .parse::<i32>()
        .map(|y| 2000 + y)
        .map_err(|_| ExpiryError::InvalidFormat)?;
    if !(1..=12).contains(&month) {
        return Err(ExpiryError::InvalidMonth);
    }
    if year < now.year() || (year == now.year() && month < now.month()) {
        return Err(ExpiryError::Expired);
    }
    Ok(())
}

/// Checks CVV length against the brand's expectation. With no brand
/// (card validation failed upstream) the standard 3-digit length applies.
pub fn validate_cvv(raw: &str, brand: Option<CardBrand>) -> Result<(), CvvError> {
    let digits = digits_of(raw);
    let expected = brand.map(|b| b.cvv_length()).unwrap_or(3);
    if digits.len() == expected {
        Ok(())
    } else if expected == 4 {
        Err(CvvError::AmexLength)
    } else {
        Err(CvvError::StandardLength)
    }
}

pub fn validate_email(raw: &str) -> Result<(), ContactError> {
    if validator::validate_email(raw) {
        Ok(())
    } else {
        Err(ContactError::InvalidEmail)
    }
}

/// Accepts any formatting; the digit count must land between 10 and 15.
pub fn validate_phone(raw: &str) -> Result<(), ContactError> {
    let digits = digits_of(raw);
    if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        Ok(())
    } else {
        Err(ContactError::InvalidPhone)
    }
}
