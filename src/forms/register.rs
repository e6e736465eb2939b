use validator::{Validate, ValidationErrors};

use crate::forms::rule_violation;
use crate::models::RegisterRequest;

/// Full client-side validation of a registration payload, run before any
/// network call. The declarative field rules live on [`RegisterRequest`];
/// the pattern and password-content rules are added here into the same
/// error map.
pub fn validate_registration(request: &RegisterRequest) -> Result<(), ValidationErrors> {
    let mut errors = request
        .validate()
        .err()
        .unwrap_or_else(ValidationErrors::new);

    if !request.username.is_empty()
        && !request
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        errors.add(
            "username",
            rule_violation(
                "pattern",
                "Username can only contain letters, numbers, dots, and underscores",
            ),
        );
    }

    if !request.phone_number.is_empty() && !is_international_phone(&request.phone_number) {
        errors.add(
            "phone_number",
            rule_violation(
                "pattern",
                "Phone number must be in format: +12334567890 (+ followed by country code and number)",
            ),
        );
    }

    if !request.password.is_empty() {
        let mut has_upper = false;
        let mut has_lower = false;
        let mut has_digit = false;
        for c in request.password.chars() {
            if c.is_ascii_uppercase() {
                has_upper = true;
            } else if c.is_ascii_lowercase() {
                has_lower = true;
            } else if c.is_ascii_digit() {
                has_digit = true;
            }
        }
        if !has_upper {
            errors.add(
                "password",
                rule_violation(
                    "password_strength",
                    "Password must contain at least one uppercase letter",
                ),
            );
        }
        if !has_lower {
            errors.add(
                "password",
                rule_violation(
                    "password_strength",
                    "Password must contain at least one lowercase letter",
                ),
            );
        }
        if !has_digit {
            errors.add(
                "password",
                rule_violation(
                    "password_strength",
                    "Password must contain at least one number",
                ),
            );
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// `+` then a 1-3 digit country code then a 6-14 digit number.
fn is_international_phone(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    digits.chars().all(|c| c.is_ascii_digit()) && (7..=17).contains(&digits.len())
}
