//! SurrealDB connection management.

use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tenantry_core::gate::GatePolicy;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::store::GatedStore;

/// Configuration for connecting to SurrealDB.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Engine endpoint: `mem://` for the embedded store, or
    /// `ws://host:port` for a server.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; skipped for the embedded engine when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Tenant gate behaviour.
    pub gate: GatePolicy,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".into(),
            namespace: "tenantry".into(),
            database: "main".into(),
            username: None,
            password: None,
            gate: GatePolicy::default(),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("endpoint", &self.endpoint)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("gate", &self.gate)
            .finish()
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    gate: GatePolicy,
}

impl DbManager {
    /// Connect, authenticate if credentials are configured, select the
    /// namespace and database, and apply pending migrations.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self {
            db,
            gate: config.gate,
        })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    /// A gated store over this connection.
    pub fn store(&self) -> GatedStore<Any> {
        GatedStore::new(self.db.clone(), self.gate)
    }
}
