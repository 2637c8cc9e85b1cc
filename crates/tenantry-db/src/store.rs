//! The gated store: the single path from repositories to SurrealDB.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use surrealdb::method::Query;
use surrealdb::{Connection, Surreal};
use tenantry_core::gate::{DataOperation, GateDecision, GatePolicy, Record, TenantGate};
use tracing::debug;

use crate::compile::{CompiledQuery, compile};
use crate::error::{DbError, classify};

/// Message SurrealDB reports for statements skipped after an earlier
/// statement of the same transaction failed.
const CANCELLED_MARKER: &str = "not executed due to a failed transaction";

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

/// Applies the tenant gate to every operation before compiling and
/// running it.
#[derive(Clone)]
pub struct GatedStore<C: Connection> {
    db: Surreal<C>,
    gate: TenantGate,
}

impl<C: Connection> GatedStore<C> {
    pub fn new(db: Surreal<C>, policy: GatePolicy) -> Self {
        Self {
            db,
            gate: TenantGate::new(policy),
        }
    }

    pub fn gate(&self) -> &TenantGate {
        &self.gate
    }

    fn prepare(&self, mut op: DataOperation, prefix: &str) -> Result<CompiledQuery, DbError> {
        let decision = self.gate.apply(&mut op);
        if decision == GateDecision::NoTenant && op.entity.is_tenant_scoped() {
            debug!(
                table = op.entity.table(),
                action = ?op.action,
                "unscoped operation on tenant-scoped table"
            );
        }
        compile(&op, prefix)
    }

    fn bind<'r>(query: Query<'r, C>, bindings: Record) -> Query<'r, C> {
        if bindings.is_empty() {
            query
        } else {
            query.bind(bindings)
        }
    }

    /// Run a gated read or write and decode the returned rows.
    pub async fn fetch<T: DeserializeOwned>(&self, op: DataOperation) -> Result<Vec<T>, DbError> {
        let CompiledQuery { sql, bindings } = self.prepare(op, "")?;
        let mut response = Self::bind(self.db.query(sql), bindings).await?;
        check(&mut response)?;
        Ok(response.take(0)?)
    }

    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        op: DataOperation,
    ) -> Result<Option<T>, DbError> {
        Ok(self.fetch(op).await?.into_iter().next())
    }

    pub async fn count(&self, op: DataOperation) -> Result<u64, DbError> {
        let rows: Vec<CountRow> = self.fetch(op).await?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    /// Run every operation in one transaction. Nothing is persisted
    /// unless all of them succeed.
    pub async fn transaction(&self, ops: Vec<DataOperation>) -> Result<(), DbError> {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        let mut bindings = Record::new();
        for (i, op) in ops.into_iter().enumerate() {
            let compiled = self.prepare(op, &format!("t{i}_"))?;
            sql.push_str(&compiled.sql);
            sql.push_str(";\n");
            bindings.extend(compiled.bindings);
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut response = Self::bind(self.db.query(sql), bindings).await?;
        check(&mut response)
    }
}

/// Turn statement errors into a [`DbError`], preferring the root cause
/// over the generic message of cancelled transaction statements.
fn check(response: &mut surrealdb::Response) -> Result<(), DbError> {
    let mut errors: Vec<(usize, String)> = response
        .take_errors()
        .into_iter()
        .map(|(index, err)| (index, err.to_string()))
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort_by_key(|(index, _)| *index);

    if let Some((_, message)) = errors
        .iter()
        .find(|(_, m)| matches!(classify(m), DbError::Conflict { .. }))
    {
        return Err(classify(message));
    }

    let (_, message) = errors
        .iter()
        .find(|(_, m)| !m.contains(CANCELLED_MARKER))
        .unwrap_or(&errors[0]);
    Err(classify(message))
}
