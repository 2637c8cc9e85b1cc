//! SurrealDB repository implementations.
//!
//! Every repository holds a [`GatedStore`](crate::GatedStore) and
//! describes its work as gated data operations; none of them reads the
//! tenant itself.

mod project;
mod registration;
mod task;
mod tenant;
mod user;

pub use project::SurrealProjectRepository;
pub use registration::SurrealRegistrationStore;
pub use task::SurrealTaskRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tenantry_core::gate::{Page, Record};
use tenantry_core::repository::Pagination;
use uuid::Uuid;

use crate::error::DbError;

/// Storage form of a timestamp: RFC 3339, UTC, microsecond precision.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to what storage keeps, so values returned to
/// callers equal what a later read yields.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::parse_from_rfc3339(&timestamp(now))
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now)
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::decode(field, e))
}

pub(crate) fn parse_optional_uuid(field: &str, raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(|r| parse_uuid(field, r)).transpose()
}

pub(crate) fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub(crate) fn page(pagination: Pagination) -> Page {
    Page {
        offset: pagination.offset,
        limit: pagination.limit,
    }
}
