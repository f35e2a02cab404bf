use crate::{error::ServiceError, types::SmsType};

const PHONE_MIN_DIGITS: usize = 10;
const PHONE_MAX_DIGITS: usize = 20;
const MESSAGE_MAX_CHARS: usize = 70;

/// A phone number may contain digits, `+`, `-` and spaces; after stripping
/// the separators it must be 10 to 20 digits.
pub fn validate_phone_number(raw: &str) -> Result<(), ServiceError> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::validation(
            "phone_number",
            "phone_number must contain only digits, spaces, hyphens, or plus sign",
        ));
    }
    let digits = stripped.chars().count();
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
        return Err(ServiceError::validation(
            "phone_number",
            format!("phone_number must contain {PHONE_MIN_DIGITS} to {PHONE_MAX_DIGITS} digits"),
        ));
    }
    Ok(())
}

/// Single-segment GSM message: 1 to 70 characters.
pub fn validate_message(message: &str) -> Result<(), ServiceError> {
    let chars = message.chars().count();
    if chars == 0 || chars > MESSAGE_MAX_CHARS {
        return Err(ServiceError::validation(
            "message",
            format!("message must be 1 to {MESSAGE_MAX_CHARS} characters long"),
        ));
    }
    Ok(())
}

pub fn parse_sms_type(raw: Option<i16>) -> Result<SmsType, ServiceError> {
    match raw {
        None => Ok(SmsType::default()),
        Some(value) => SmsType::try_from(value).map_err(|_| {
            ServiceError::validation("sms_type", "sms_type must be 1 (regular) or 2 (express)")
        }),
    }
}
