//! Client-side validation
//!
//! Everything here runs before any collaborator is called, so a failure
//! never costs a store or provider round trip.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::ValidationError;

/// Validate a candidate link and return the value to persist
///
/// The candidate is trimmed; the trimmed text (not a normalized URL) is
/// what gets stored.
pub fn validate_link(candidate: &str) -> Result<String, ValidationError> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|_| ValidationError::Malformed(trimmed.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                scheme: other.to_string(),
            })
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Credentials collected by the sign-in form
#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Fields collected by the sign-up form
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern is a valid regex: {e}"))
    })
}

fn check_email(email: &str) -> Option<ValidationError> {
    (!email_pattern().is_match(email)).then_some(ValidationError::Field {
        field: "email",
        message: "Valid email is required",
    })
}

fn check_required(
    field: &'static str,
    value: &str,
    message: &'static str,
) -> Option<ValidationError> {
    value
        .trim()
        .is_empty()
        .then_some(ValidationError::Field { field, message })
}

/// Validate the sign-in form, returning every failing field
pub fn validate_sign_in(form: &SignInForm) -> Vec<ValidationError> {
    [
        check_email(&form.email),
        check_required("password", &form.password, "Password is required"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Validate the sign-up form, returning every failing field
pub fn validate_sign_up(form: &SignUpForm) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = [
        check_required("name", &form.name, "Name is required"),
        check_email(&form.email),
        check_required("password", &form.password, "Password is required"),
        check_required(
            "confirm_password",
            &form.confirm_password,
            "Confirm Password is required",
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !form.confirm_password.trim().is_empty() && form.password != form.confirm_password {
        errors.push(ValidationError::Field {
            field: "confirm_password",
            message: "Passwords do not match",
        });
    }

    errors
}
