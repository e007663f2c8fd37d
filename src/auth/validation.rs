//! Validation helpers for authentication requests.
//!
//! Password strength is checked against the configurable
//! [`PasswordPolicyConfig`] rather than a fixed rule set; violations are
//! reported as a single weak-password error listing every unmet
//! requirement so clients can fix them in one pass.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

use crate::auth::roles::Role;
use crate::config::PasswordPolicyConfig;
use crate::errors::{AssayGateError, Result};

lazy_static! {
    // Confirmation, reset, and TOTP codes are short numeric strings
    static ref CODE_REGEX: Regex =
        Regex::new(r"^[0-9]{4,10}$").expect("CODE_REGEX should be a valid regex pattern");
}

/// Maximum password length to prevent DoS via expensive hashing
const MAX_PASSWORD_LENGTH: usize = 128;

/// Check a candidate password against the platform policy.
///
/// All unmet requirements are collected into one weak-password error.
pub fn enforce_password_policy(password: &str, policy: &PasswordPolicyConfig) -> Result<()> {
    let mut unmet = Vec::new();

    if password.chars().count() < policy.min_length {
        unmet.push(format!("at least {} characters", policy.min_length));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        unmet.push(format!("at most {} characters", MAX_PASSWORD_LENGTH));
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        unmet.push("an uppercase letter".to_string());
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        unmet.push("a lowercase letter".to_string());
    }
    if policy.require_digit && !password.chars().any(|c| c.is_numeric()) {
        unmet.push("a digit".to_string());
    }
    if policy.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        unmet.push("a special character".to_string());
    }

    if unmet.is_empty() {
        Ok(())
    } else {
        Err(AssayGateError::weak_password(format!(
            "Password does not meet the policy: requires {}",
            unmet.join(", ")
        )))
    }
}

/// Validate a display name (non-empty after trimming, reasonable length)
pub fn validate_display_name(name: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("display_name_empty"));
    }
    if trimmed.len() > 128 {
        return Err(ValidationError::new("display_name_too_long"));
    }
    Ok(())
}

/// Validate a confirmation/reset/TOTP code format
pub fn validate_numeric_code(code: &str) -> std::result::Result<(), ValidationError> {
    if CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_code"))
    }
}

/// Self-service registration may not create administrator accounts
pub fn validate_registerable_role(role: &Role) -> std::result::Result<(), ValidationError> {
    match role {
        Role::SystemAdmin | Role::PharmaAdmin | Role::CroAdmin => {
            Err(ValidationError::new("role_not_registerable"))
        }
        Role::PharmaScientist | Role::CroTechnician | Role::Auditor => Ok(()),
    }
}
