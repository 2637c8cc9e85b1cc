//! Tenant gate: the interception layer in front of every persistence
//! operation.
//!
//! Repositories never talk to the store directly. They describe each
//! operation as a [`DataOperation`] and hand it to a gated store, which
//! passes it through [`TenantGate::apply`] before compiling it. The
//! gate reads the active tenant from [`AmbientContext`] and rewrites the
//! operation so that it can only see or touch rows of that tenant:
//!
//! * reads and counts get `tenant_id = <active>` conjoined to the filter;
//! * creates have `tenant_id` forced to the active tenant on every row;
//! * updates and deletes get the same filter conjunct, so a cross-tenant
//!   target matches zero rows instead of raising.
//!
//! Operations run without an active tenant, and operations on the
//! [`Entity::Tenant`] table, pass through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::context::AmbientContext;

/// Field holding the owning tenant on every tenant-scoped entity.
pub const TENANT_FIELD: &str = "tenant_id";

/// Field holding the primary key.
pub const ID_FIELD: &str = "id";

/// One row of payload data, keyed by column name.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Tenant,
    User,
    Project,
    Task,
}

impl Entity {
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Tenant => "tenant",
            Entity::User => "user",
            Entity::Project => "project",
            Entity::Task => "task",
        }
    }

    /// Every entity except the tenant itself carries a `tenant_id`.
    pub fn is_tenant_scoped(&self) -> bool {
        !matches!(self, Entity::Tenant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FindMany,
    FindFirst,
    /// Exact primary-key lookup.
    FindUnique,
    Count,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Action::FindMany | Action::FindFirst | Action::FindUnique | Action::Count
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Action::Create | Action::CreateMany)
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Action::Update | Action::UpdateMany)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Action::Delete | Action::DeleteMany)
    }
}

/// A single `field = value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: Value,
}

/// Conjunction of equality predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Filter::and`].
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.and(field, value);
        self
    }

    /// Conjoin `field = value`. Existing predicates on the same field are
    /// kept, so the filter can only ever narrow.
    pub fn and(&mut self, field: &str, value: impl Into<Value>) {
        self.conditions.push(Condition {
            field: field.to_string(),
            value: value.into(),
        });
    }

    pub fn has(&self, field: &str) -> bool {
        self.conditions.iter().any(|c| c.field == field)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

/// Description of one persistence operation, before it is compiled to
/// the store's query language.
#[derive(Debug, Clone, PartialEq)]
pub struct DataOperation {
    pub entity: Entity,
    pub action: Action,
    pub filter: Filter,
    /// Rows to insert (create) or a single patch (update).
    pub data: Vec<Record>,
    pub page: Option<Page>,
}

impl DataOperation {
    fn new(entity: Entity, action: Action) -> Self {
        Self {
            entity,
            action,
            filter: Filter::new(),
            data: Vec::new(),
            page: None,
        }
    }

    pub fn find_many(entity: Entity, filter: Filter) -> Self {
        Self {
            filter,
            ..Self::new(entity, Action::FindMany)
        }
    }

    pub fn find_first(entity: Entity, filter: Filter) -> Self {
        Self {
            filter,
            ..Self::new(entity, Action::FindFirst)
        }
    }

    pub fn find_unique(entity: Entity, id: Uuid) -> Self {
        Self {
            filter: Filter::new().eq(ID_FIELD, id.to_string()),
            ..Self::new(entity, Action::FindUnique)
        }
    }

    pub fn count(entity: Entity, filter: Filter) -> Self {
        Self {
            filter,
            ..Self::new(entity, Action::Count)
        }
    }

    pub fn create(entity: Entity, row: Record) -> Self {
        Self {
            data: vec![row],
            ..Self::new(entity, Action::Create)
        }
    }

    pub fn create_many(entity: Entity, rows: Vec<Record>) -> Self {
        Self {
            data: rows,
            ..Self::new(entity, Action::CreateMany)
        }
    }

    pub fn update(entity: Entity, id: Uuid, patch: Record) -> Self {
        Self {
            filter: Filter::new().eq(ID_FIELD, id.to_string()),
            data: vec![patch],
            ..Self::new(entity, Action::Update)
        }
    }

    pub fn update_many(entity: Entity, filter: Filter, patch: Record) -> Self {
        Self {
            filter,
            data: vec![patch],
            ..Self::new(entity, Action::UpdateMany)
        }
    }

    pub fn delete(entity: Entity, id: Uuid) -> Self {
        Self {
            filter: Filter::new().eq(ID_FIELD, id.to_string()),
            ..Self::new(entity, Action::Delete)
        }
    }

    pub fn delete_many(entity: Entity, filter: Filter) -> Self {
        Self {
            filter,
            ..Self::new(entity, Action::DeleteMany)
        }
    }

    pub fn paginate(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Reads that target a single row by its id.
    pub fn is_primary_key_lookup(&self) -> bool {
        match self.action {
            Action::FindUnique => true,
            Action::FindFirst => self.filter.has(ID_FIELD),
            _ => false,
        }
    }
}

/// How the gate treats exact primary-key lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyPolicy {
    /// Primary-key lookups are tenant-filtered like any other read.
    #[default]
    Scoped,
    /// Primary-key lookups bypass the gate. A caller holding another
    /// tenant's row id can read that row.
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    pub primary_key_lookups: PrimaryKeyPolicy,
}

/// What the gate did to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No tenant in the ambient context.
    NoTenant,
    /// The entity is not tenant-scoped.
    Exempt,
    /// Primary-key lookup forwarded under [`PrimaryKeyPolicy::PassThrough`].
    PrimaryKeyPassThrough,
    /// Tenant predicate conjoined to the filter.
    FilterScoped,
    /// Tenant id forced onto every payload row.
    PayloadStamped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TenantGate {
    policy: GatePolicy,
}

impl TenantGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Rewrite `op` against the tenant of the caller's ambient context.
    pub fn apply(&self, op: &mut DataOperation) -> GateDecision {
        self.apply_for(op, AmbientContext::tenant_id())
    }

    /// Rewrite `op` against an explicit tenant.
    pub fn apply_for(&self, op: &mut DataOperation, tenant: Option<Uuid>) -> GateDecision {
        let table = op.entity.table();

        let Some(tenant) = tenant else {
            trace!(table, action = ?op.action, "no active tenant, operation not scoped");
            return GateDecision::NoTenant;
        };

        if !op.entity.is_tenant_scoped() {
            trace!(table, action = ?op.action, "entity exempt from tenant scoping");
            return GateDecision::Exempt;
        }

        if op.is_primary_key_lookup()
            && self.policy.primary_key_lookups == PrimaryKeyPolicy::PassThrough
        {
            trace!(table, action = ?op.action, "primary-key lookup passed through");
            return GateDecision::PrimaryKeyPassThrough;
        }

        let tenant_value = Value::String(tenant.to_string());

        if op.action.is_create() {
            for row in &mut op.data {
                row.insert(TENANT_FIELD.to_string(), tenant_value.clone());
            }
            debug!(table, tenant_id = %tenant, rows = op.data.len(), "stamped tenant on payload");
            return GateDecision::PayloadStamped;
        }

        if op.action.is_update() {
            // A patch must not move rows into another tenant.
            for patch in &mut op.data {
                if patch.contains_key(TENANT_FIELD) {
                    patch.insert(TENANT_FIELD.to_string(), tenant_value.clone());
                }
            }
        }

        op.filter.and(TENANT_FIELD, tenant_value);
        debug!(table, tenant_id = %tenant, action = ?op.action, "scoped filter to tenant");
        GateDecision::FilterScoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn tenant_conditions(op: &DataOperation) -> Vec<&Value> {
        op.filter
            .conditions()
            .iter()
            .filter(|c| c.field == TENANT_FIELD)
            .map(|c| &c.value)
            .collect()
    }

    #[test]
    fn no_tenant_passes_through() {
        let gate = TenantGate::default();
        let mut op = DataOperation::find_many(Entity::Task, Filter::new());
        let before = op.clone();

        assert_eq!(gate.apply_for(&mut op, None), GateDecision::NoTenant);
        assert_eq!(op, before);
    }

    #[test]
    fn tenant_entity_is_exempt() {
        let gate = TenantGate::default();
        let mut op = DataOperation::find_many(Entity::Tenant, Filter::new());
        let before = op.clone();

        assert_eq!(
            gate.apply_for(&mut op, Some(Uuid::new_v4())),
            GateDecision::Exempt
        );
        assert_eq!(op, before);
    }

    #[test]
    fn reads_and_counts_are_scoped() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();

        for mut op in [
            DataOperation::find_many(Entity::Task, Filter::new()),
            DataOperation::find_first(Entity::User, Filter::new().eq("email", "a@x.com")),
            DataOperation::count(Entity::Project, Filter::new()),
        ] {
            assert_eq!(gate.apply_for(&mut op, Some(tenant)), GateDecision::FilterScoped);
            assert_eq!(tenant_conditions(&op), vec![&json!(tenant.to_string())]);
        }
    }

    #[test]
    fn create_overrides_client_tenant() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();
        let forged = Uuid::new_v4();
        let mut op = DataOperation::create(
            Entity::Task,
            row(json!({ "title": "t", "tenant_id": forged.to_string() })),
        );

        assert_eq!(gate.apply_for(&mut op, Some(tenant)), GateDecision::PayloadStamped);
        assert_eq!(op.data[0][TENANT_FIELD], json!(tenant.to_string()));
        assert!(op.filter.is_empty());
    }

    #[test]
    fn create_many_stamps_every_row() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();
        let mut op = DataOperation::create_many(
            Entity::Task,
            vec![row(json!({ "title": "a" })), row(json!({ "title": "b" }))],
        );

        gate.apply_for(&mut op, Some(tenant));
        assert!(
            op.data
                .iter()
                .all(|r| r[TENANT_FIELD] == json!(tenant.to_string()))
        );
    }

    #[test]
    fn updates_and_deletes_are_scoped() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();

        for mut op in [
            DataOperation::update(Entity::Task, id, row(json!({ "title": "new" }))),
            DataOperation::update_many(Entity::Task, Filter::new(), row(json!({}))),
            DataOperation::delete(Entity::Project, id),
            DataOperation::delete_many(Entity::Task, Filter::new().eq("project_id", "p")),
        ] {
            assert_eq!(gate.apply_for(&mut op, Some(tenant)), GateDecision::FilterScoped);
            assert_eq!(tenant_conditions(&op), vec![&json!(tenant.to_string())]);
        }
    }

    #[test]
    fn update_patch_cannot_move_rows_between_tenants() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();
        let mut op = DataOperation::update(
            Entity::Task,
            Uuid::new_v4(),
            row(json!({ "tenant_id": Uuid::new_v4().to_string() })),
        );

        gate.apply_for(&mut op, Some(tenant));
        assert_eq!(op.data[0][TENANT_FIELD], json!(tenant.to_string()));
    }

    #[test]
    fn filter_only_narrows() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut op = DataOperation::find_many(
            Entity::Task,
            Filter::new().eq(TENANT_FIELD, other.to_string()),
        );

        gate.apply_for(&mut op, Some(tenant));
        assert_eq!(
            tenant_conditions(&op),
            vec![&json!(other.to_string()), &json!(tenant.to_string())]
        );
    }

    #[test]
    fn primary_key_lookup_scoped_by_default() {
        let gate = TenantGate::default();
        let mut op = DataOperation::find_unique(Entity::Task, Uuid::new_v4());

        assert_eq!(
            gate.apply_for(&mut op, Some(Uuid::new_v4())),
            GateDecision::FilterScoped
        );
        assert!(op.filter.has(TENANT_FIELD));
    }

    #[test]
    fn primary_key_lookup_pass_through_policy() {
        let gate = TenantGate::new(GatePolicy {
            primary_key_lookups: PrimaryKeyPolicy::PassThrough,
        });
        let tenant = Some(Uuid::new_v4());

        let mut unique = DataOperation::find_unique(Entity::Task, Uuid::new_v4());
        assert_eq!(
            gate.apply_for(&mut unique, tenant),
            GateDecision::PrimaryKeyPassThrough
        );
        assert!(!unique.filter.has(TENANT_FIELD));

        let mut first_by_id = DataOperation::find_first(
            Entity::Task,
            Filter::new().eq(ID_FIELD, Uuid::new_v4().to_string()),
        );
        assert_eq!(
            gate.apply_for(&mut first_by_id, tenant),
            GateDecision::PrimaryKeyPassThrough
        );

        // Writes by id are always scoped.
        let mut delete = DataOperation::delete(Entity::Task, Uuid::new_v4());
        assert_eq!(gate.apply_for(&mut delete, tenant), GateDecision::FilterScoped);
    }

    #[tokio::test]
    async fn apply_reads_ambient_tenant() {
        let gate = TenantGate::default();
        let tenant = Uuid::new_v4();

        let mut outside = DataOperation::find_many(Entity::Task, Filter::new());
        assert_eq!(gate.apply(&mut outside), GateDecision::NoTenant);

        let scoped = AmbientContext::bind(async move {
            AmbientContext::set_tenant_id(tenant).unwrap();
            let mut op = DataOperation::find_many(Entity::Task, Filter::new());
            gate.apply(&mut op);
            op
        })
        .await;
        assert_eq!(tenant_conditions(&scoped), vec![&json!(tenant.to_string())]);
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: GatePolicy =
            serde_json::from_str(r#"{"primary_key_lookups": "pass_through"}"#).unwrap();
        assert_eq!(policy.primary_key_lookups, PrimaryKeyPolicy::PassThrough);
        let default: GatePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(default.primary_key_lookups, PrimaryKeyPolicy::Scoped);
    }
}
