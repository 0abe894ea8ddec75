use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::dto::RegisterRequest;
use super::repo_types::EMAIL_COLUMN_MAX;

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 15;
pub const EMAIL_MAX: usize = EMAIL_COLUMN_MAX;

/// A single failed rule, keyed by the JSON field name of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every failing field of one payload. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {}", joined)
    }
}

impl std::error::Error for ValidationErrors {}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

type Rule = fn(&RegisterRequest) -> Option<FieldError>;

/// Checked in order; each rule reports at most one failure for its field.
const RULES: &[Rule] = &[
    first_name,
    last_name,
    email,
    password,
    repeat_password,
    passwords_match,
];

pub fn validate_registration(req: &RegisterRequest) -> Result<(), ValidationErrors> {
    let errors: Vec<FieldError> = RULES.iter().filter_map(|rule| rule(req)).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn name_rule(field: &'static str, label: &str, value: &str) -> Option<FieldError> {
    let value = value.trim();
    let len = value.chars().count();
    if value.is_empty() {
        Some(FieldError::new(field, format!("{} is required", label)))
    } else if len < NAME_MIN {
        Some(FieldError::new(
            field,
            format!("{} must not be less than {} characters", label, NAME_MIN),
        ))
    } else if len > NAME_MAX {
        Some(FieldError::new(
            field,
            format!("{} must not be more than {} characters", label, NAME_MAX),
        ))
    } else {
        None
    }
}

fn password_rule(field: &'static str, label: &str, value: &str) -> Option<FieldError> {
    if value.is_empty() {
        return Some(FieldError::new(field, format!("{} is required", label)));
    }
    if !password_len_ok(value) {
        return Some(FieldError::new(
            field,
            format!(
                "{} must be equal to or greater than {} characters and less than {} characters",
                label,
                PASSWORD_MIN,
                PASSWORD_MAX + 1
            ),
        ));
    }
    None
}

fn password_len_ok(value: &str) -> bool {
    (PASSWORD_MIN..=PASSWORD_MAX).contains(&value.chars().count())
}

fn first_name(req: &RegisterRequest) -> Option<FieldError> {
    name_rule("firstName", "First name", &req.first_name)
}

fn last_name(req: &RegisterRequest) -> Option<FieldError> {
    name_rule("lastName", "Last name", &req.last_name)
}

fn email(req: &RegisterRequest) -> Option<FieldError> {
    if req.email.trim().is_empty() {
        Some(FieldError::new("email", "Email is required"))
    } else if req.email.chars().count() > EMAIL_MAX {
        Some(FieldError::new(
            "email",
            format!("Email must not be more than {} characters", EMAIL_MAX),
        ))
    } else if !is_valid_email(&req.email) {
        Some(FieldError::new("email", "Email must be a valid address"))
    } else {
        None
    }
}

fn password(req: &RegisterRequest) -> Option<FieldError> {
    password_rule("password", "Password", &req.password)
}

fn repeat_password(req: &RegisterRequest) -> Option<FieldError> {
    password_rule("repeatPassword", "Repeat Password", &req.repeat_password)
}

// Only meaningful once both fields pass their own rules.
fn passwords_match(req: &RegisterRequest) -> Option<FieldError> {
    let both_ok = password_len_ok(&req.password) && password_len_ok(&req.repeat_password);
    if both_ok && req.password != req.repeat_password {
        Some(FieldError::new("repeatPassword", "Passwords do not match"))
    } else {
        None
    }
}
