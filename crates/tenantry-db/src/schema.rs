//! Tenantry schema and its versioned migrations.
//!
//! Every table is SCHEMAFULL. UUIDs and timestamps are stored as
//! strings (UUID text and RFC 3339 with microseconds, so lexical order
//! is chronological). Enums are strings with ASSERT constraints.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, Deserialize)]
struct AppliedVersion {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- Tenants (exempt from tenant scoping)
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD subdomain ON TABLE tenant TYPE string \
    ASSERT string::len($value) > 0;
DEFINE FIELD created_at ON TABLE tenant TYPE string;
DEFINE FIELD updated_at ON TABLE tenant TYPE string;
DEFINE INDEX idx_tenant_subdomain ON TABLE tenant \
    COLUMNS subdomain UNIQUE;

-- Users (tenant scope, email unique across tenants)
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string \
    ASSERT string::is::email($value);
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['USER', 'ADMIN'];
DEFINE FIELD refresh_token_hash ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE string;
DEFINE FIELD updated_at ON TABLE user TYPE string;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_tenant ON TABLE user COLUMNS tenant_id;

-- Projects (tenant scope)
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE project TYPE string;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD description ON TABLE project TYPE string;
DEFINE FIELD owner_id ON TABLE project TYPE string;
DEFINE FIELD created_at ON TABLE project TYPE string;
DEFINE FIELD updated_at ON TABLE project TYPE string;
DEFINE INDEX idx_project_tenant ON TABLE project COLUMNS tenant_id;

-- Tasks (tenant scope)
DEFINE TABLE task SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE task TYPE string;
DEFINE FIELD title ON TABLE task TYPE string;
DEFINE FIELD description ON TABLE task TYPE string;
DEFINE FIELD status ON TABLE task TYPE string \
    ASSERT $value IN ['TODO', 'IN_PROGRESS', 'DONE'];
DEFINE FIELD priority ON TABLE task TYPE string \
    ASSERT $value IN ['LOW', 'MEDIUM', 'HIGH'];
DEFINE FIELD due_date ON TABLE task TYPE string;
DEFINE FIELD project_id ON TABLE task TYPE option<string>;
DEFINE FIELD assigned_to_id ON TABLE task TYPE option<string>;
DEFINE FIELD created_at ON TABLE task TYPE string;
DEFINE FIELD updated_at ON TABLE task TYPE string;
DEFINE INDEX idx_task_tenant ON TABLE task COLUMNS tenant_id;
";

/// Apply all pending migrations in order.
///
/// Each migration commits together with its `_migration` row, so a
/// failed migration leaves neither behind. Versions already recorded are
/// skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let applied: Option<AppliedVersion> = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?
        .take(0)?;
    let current = applied.map_or(0, |row| row.version);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(version = migration.version, name = migration.name, "applying migration");

        let script = format!(
            "BEGIN TRANSACTION;\n{}\nCREATE _migration SET version = $version, name = $name;\nCOMMIT TRANSACTION;",
            migration.sql
        );
        db.query(script)
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "v{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
    }

    if current < latest_version() {
        info!(from = current, to = latest_version(), "schema up to date");
    }
    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
