//! Field rules shared by the record manager and the reference service.
//!
//! Both sides normalize (trim) before checking, so a value that passes here is
//! stored exactly as it was sent.

use thiserror::Error;

use crate::domain::{FieldPatch, RecordFields};

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("update must change at least one field")]
    EmptyPatch,
}

impl ValidationError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::Missing { field } | ValidationError::Invalid { field, .. } => {
                Some(field)
            }
            ValidationError::EmptyPatch => None,
        }
    }
}

pub fn normalize_fields(mut fields: RecordFields) -> Result<RecordFields, ValidationError> {
    fields.name = normalize_name(&fields.name)?;
    if let Some(email) = fields.email.take() {
        fields.email = Some(normalize_email(&email)?);
    }
    Ok(fields)
}

pub fn normalize_patch(mut patch: FieldPatch) -> Result<FieldPatch, ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    if let Some(name) = patch.name.take() {
        patch.name = Some(normalize_name(&name)?);
    }
    if let Some(email) = patch.email.take() {
        patch.email = Some(normalize_email(&email)?);
    }
    Ok(patch)
}

fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::Missing { field: "name" });
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::Invalid {
            field: "name",
            reason: format!("longer than {MAX_NAME_CHARS} characters"),
        });
    }
    Ok(name.to_string())
}

fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationError::Missing { field: "email" });
    }
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Err(ValidationError::Invalid {
            field: "email",
            reason: format!("longer than {MAX_EMAIL_CHARS} characters"),
        });
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::Invalid {
            field: "email",
            reason: "must not contain whitespace".to_string(),
        });
    }
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next();
    match (local.is_empty(), domain, parts.next()) {
        (false, Some(domain), None) if !domain.is_empty() => Ok(email.to_string()),
        _ => Err(ValidationError::Invalid {
            field: "email",
            reason: "expected exactly one '@' between a local part and a domain".to_string(),
        }),
    }
}
