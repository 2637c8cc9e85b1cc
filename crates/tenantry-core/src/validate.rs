//! Field rules shared by request payloads, used through
//! `#[validate(custom(function = ...))]`.

use validator::ValidationError;

/// Rejects values that are empty once surrounding whitespace is removed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Address rules the storage layer enforces on top of the `email`
/// validator: a dotted domain and no empty dot-separated local atoms.
pub fn mailbox(value: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return Err(ValidationError::new("mailbox"));
    };
    if local.split('.').any(str::is_empty) {
        return Err(ValidationError::new("mailbox"));
    }
    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(ValidationError::new("mailbox"));
    }
    Ok(())
}
