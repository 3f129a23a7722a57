use crate::error::{AppError, AppResult};
use regex::Regex;

/// Uzbek mobile numbers: `+998` followed by nine digits.
pub fn validate_uz_phone(phone: &str) -> AppResult<()> {
    let phone_regex = Regex::new(r"^\+998\d{9}$")
        .map_err(|e| AppError::InternalError(format!("phone pattern: {e}")))?;

    if !phone_regex.is_match(phone) {
        return Err(AppError::ValidationError(
            "Invalid phone number, expected +998XXXXXXXXX".to_string(),
        ));
    }

    Ok(())
}

/// Normalizes common spellings (`998…`, `9 digits`, spaces, dashes) to `+998XXXXXXXXX`.
pub fn format_uz_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 12 && digits.starts_with("998") {
        format!("+{digits}")
    } else if digits.len() == 9 {
        format!("+998{digits}")
    } else {
        phone.to_string()
    }
}
