//! Client-side field validation.
//!
//! Checks run before any request is sent; violations are reported per field
//! as [`Error::Validation`](crate::Error::Validation).

use crate::error::{FieldErrors, Result};
use crate::types::{PostInput, SignInRequest, SignUpRequest};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 200;
pub const MIN_BODY_LEN: usize = 10;
pub const MAX_SUMMARY_LEN: usize = 500;

/// Types that can check their own field constraints.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for SignInRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_credentials(&self.email, &self.password, &mut errors);
        errors.into_result()
    }
}

impl Validate for SignUpRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_credentials(&self.email, &self.password, &mut errors);
        if let Some(name) = &self.name
            && name.trim().chars().count() < MIN_NAME_LEN
        {
            errors.add(
                "name",
                format!("must be at least {} characters", MIN_NAME_LEN),
            );
        }
        errors.into_result()
    }
}

impl Validate for PostInput {
    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();

        let title_len = self.title.trim().chars().count();
        if title_len < MIN_TITLE_LEN {
            errors.add(
                "title",
                format!("must be at least {} characters", MIN_TITLE_LEN),
            );
        } else if title_len > MAX_TITLE_LEN {
            errors.add("title", format!("must be at most {} characters", MAX_TITLE_LEN));
        }

        if self.body.trim().chars().count() < MIN_BODY_LEN {
            errors.add("body", format!("must be at least {} characters", MIN_BODY_LEN));
        }

        if let Some(summary) = &self.summary
            && summary.chars().count() > MAX_SUMMARY_LEN
        {
            errors.add(
                "summary",
                format!("must be at most {} characters", MAX_SUMMARY_LEN),
            );
        }

        errors.into_result()
    }
}

fn check_credentials(email: &str, password: &str, errors: &mut FieldErrors) {
    if !is_valid_email(email) {
        errors.add("email", "invalid email");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

/// Structural email check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
