//! Tenant domain model.
//!
//! A tenant is the isolation boundary: every task, project and user
//! belongs to exactly one tenant and is invisible to the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validate::not_blank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable company name.
    pub name: String,
    /// Lowercase alphanumeric slug derived from `name`.
    pub subdomain: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant. The subdomain is always
/// derived from the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateTenant {
    #[validate(custom(function = "not_blank", message = "Company name is required"))]
    pub name: Option<String>,
}

/// Derive the subdomain slug for a tenant name: lowercase, with every
/// character outside `[a-z0-9]` removed.
pub fn derive_subdomain(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_is_lowercased() {
        assert_eq!(derive_subdomain("Acme"), "acme");
    }

    #[test]
    fn subdomain_strips_non_alphanumerics() {
        assert_eq!(derive_subdomain("Acme Corp, Ltd. #2"), "acmecorpltd2");
        assert_eq!(derive_subdomain("über-café"), "bercaf");
    }

    #[test]
    fn subdomain_can_be_empty() {
        assert_eq!(derive_subdomain("!!!"), "");
    }
}
