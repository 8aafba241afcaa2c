use lazy_static::lazy_static;
use regex::Regex;

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 6;
pub const OTP_LENGTH: usize = 6;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Every rule the username breaks, in a stable order. Empty means valid.
pub fn username_errors(username: &str) -> Vec<&'static str> {
    let len = username.chars().count();
    let mut errors = Vec::new();
    if len < USERNAME_MIN {
        errors.push("username must be at least 2 characters");
    }
    if len > USERNAME_MAX {
        errors.push("username must be at most 20 characters");
    }
    if !USERNAME_RE.is_match(username) {
        errors.push("Username must not contain special characters");
    }
    errors
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
