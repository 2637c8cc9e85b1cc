//! Integration tests for schema initialization using in-memory SurrealDB.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[derive(Debug, Deserialize)]
struct VersionRow {
    version: u32,
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenantry_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<serde_json::Value> = result.take(0).unwrap();
    let info_str = info.expect("INFO FOR DB should return a value").to_string();

    for table in ["tenant", "user", "project", "task", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenantry_db::run_migrations(&db).await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT version FROM _migration").await.unwrap();
    let rows: Vec<VersionRow> = result.take(0).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].version, tenantry_db::latest_version());
}

#[tokio::test]
async fn user_email_is_unique_across_tenants() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();

    let insert = "INSERT INTO user { tenant_id: $tenant, email: 'same@x.com', name: 'n', \
                  password_hash: 'h', role: 'USER', created_at: 'c', updated_at: 'u' }";
    db.query(insert)
        .bind(("tenant", "t1"))
        .await
        .unwrap()
        .check()
        .unwrap();
    let second = db
        .query(insert)
        .bind(("tenant", "t2"))
        .await
        .unwrap()
        .check();
    assert!(second.is_err());
}
