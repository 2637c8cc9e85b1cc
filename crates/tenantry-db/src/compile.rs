//! Compilation of gated [`DataOperation`]s into SurrealQL.
//!
//! Every value is passed as a bound parameter; only table and field
//! names are interpolated, and those are checked to be plain
//! identifiers. Parameter names carry a per-statement prefix so that
//! several compiled statements can share one transaction.

use serde_json::Value;
use tenantry_core::gate::{Action, DataOperation, Filter, ID_FIELD, Record};

use crate::error::DbError;

/// One SurrealQL statement and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Record,
}

const PROJECTION: &str = "meta::id(id) AS record_id, *";

fn check_ident(name: &str) -> Result<&str, DbError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(DbError::Query(format!("invalid identifier: {name:?}")))
    }
}

struct Params<'a> {
    prefix: &'a str,
    bindings: Record,
}

impl<'a> Params<'a> {
    fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            bindings: Record::new(),
        }
    }

    fn push(&mut self, kind: &str, value: Value) -> String {
        let name = format!("{}{}{}", self.prefix, kind, self.bindings.len());
        self.bindings.insert(name.clone(), value);
        format!("${name}")
    }
}

fn where_clause(table: &str, filter: &Filter, params: &mut Params<'_>) -> Result<String, DbError> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.conditions().len());
    for condition in filter.conditions() {
        let field = check_ident(&condition.field)?;
        let param = params.push("w", condition.value.clone());
        if field == ID_FIELD {
            parts.push(format!("id = type::thing('{table}', {param})"));
        } else {
            parts.push(format!("{field} = {param}"));
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// Drop `null` entries; absent optional fields are stored as NONE.
fn strip_nulls(row: &Record) -> Record {
    row.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Compile `op` using `prefix` for every parameter name.
pub fn compile(op: &DataOperation, prefix: &str) -> Result<CompiledQuery, DbError> {
    let table = check_ident(op.entity.table())?;
    let mut params = Params::new(prefix);

    let sql = match op.action {
        Action::FindMany | Action::FindFirst | Action::FindUnique => {
            let mut sql = format!("SELECT {PROJECTION} FROM {table}");
            sql.push_str(&where_clause(table, &op.filter, &mut params)?);
            sql.push_str(" ORDER BY created_at ASC");
            if op.action == Action::FindMany {
                if let Some(page) = op.page {
                    sql.push_str(&format!(" LIMIT {} START {}", page.limit, page.offset));
                }
            } else {
                sql.push_str(" LIMIT 1");
            }
            sql
        }
        Action::Count => {
            let mut sql = format!("SELECT count() AS total FROM {table}");
            sql.push_str(&where_clause(table, &op.filter, &mut params)?);
            sql.push_str(" GROUP ALL");
            sql
        }
        Action::Create | Action::CreateMany => {
            if op.data.is_empty() {
                return Err(DbError::Query(format!("create on {table} without data")));
            }
            for row in &op.data {
                for field in row.keys() {
                    check_ident(field)?;
                }
            }
            let rows = op.data.iter().map(strip_nulls).map(Value::Object).collect();
            let rows = params.push("rows", Value::Array(rows));
            format!("SELECT {PROJECTION} FROM (INSERT INTO {table} {rows})")
        }
        Action::Update | Action::UpdateMany => {
            let patch = op
                .data
                .first()
                .ok_or_else(|| DbError::Query(format!("update on {table} without data")))?;
            if patch.is_empty() {
                return Err(DbError::Query(format!("update on {table} with empty patch")));
            }
            let mut assignments = Vec::with_capacity(patch.len());
            for (field, value) in patch {
                let field = check_ident(field)?;
                if value.is_null() {
                    assignments.push(format!("{field} = NONE"));
                } else {
                    let param = params.push("s", value.clone());
                    assignments.push(format!("{field} = {param}"));
                }
            }
            let filter = where_clause(table, &op.filter, &mut params)?;
            format!(
                "SELECT {PROJECTION} FROM (UPDATE {table} SET {}{filter} RETURN AFTER)",
                assignments.join(", ")
            )
        }
        Action::Delete | Action::DeleteMany => {
            let filter = where_clause(table, &op.filter, &mut params)?;
            format!("SELECT {PROJECTION} FROM (DELETE {table}{filter} RETURN BEFORE)")
        }
    };

    Ok(CompiledQuery {
        sql,
        bindings: params.bindings,
    })
}
