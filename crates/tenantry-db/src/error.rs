//! Database-specific error types and conversions.

use tenantry_core::error::AppError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Unique-index violation or transaction write conflict.
    #[error("Conflict on {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    /// A field ASSERT in the schema rejected the value.
    #[error("Invalid value for {field}")]
    Constraint { field: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),
}

impl DbError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn decode(what: &str, err: impl std::fmt::Display) -> Self {
        DbError::Decode(format!("{what}: {err}"))
    }
}

/// Classify a statement failure reported by SurrealDB.
pub(crate) fn classify(message: &str) -> DbError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("already contains") || lower.contains("conflict") {
        let entity = if lower.contains("idx_user_email") {
            "user"
        } else if lower.contains("idx_tenant_subdomain") {
            "tenant"
        } else {
            "record"
        };
        DbError::Conflict {
            entity: entity.to_string(),
            detail: message.to_string(),
        }
    } else if lower.contains("must conform to") {
        let field = message
            .split_once("for field `")
            .and_then(|(_, rest)| rest.split_once('`'))
            .map(|(field, _)| field)
            .unwrap_or("field");
        DbError::Constraint {
            field: field.to_string(),
        }
    } else {
        DbError::Query(message.to_string())
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => AppError::NotFound { entity, id },
            DbError::Conflict { entity, .. } => AppError::Conflict { entity },
            DbError::Constraint { field } => AppError::validation(format!("invalid {field}")),
            other => AppError::Database(other.to_string()),
        }
    }
}
