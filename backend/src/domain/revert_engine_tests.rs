//! Unit tests for recorded, inferred, and chained reverts.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::{RevertEngine, RevertResult};
use crate::domain::field_mapping::{
    ColumnOverride, FieldMapping, FieldOverrides, resolve_field_mapping,
};
use crate::domain::migration_error::MigrationError;
use crate::domain::migration_executor::MigrationExecutor;
use crate::domain::migration_id::MigrationId;
use crate::domain::migration_plan::plan_migration;
use crate::domain::ports::{ProvenanceRepository, SchemaStore, ScriptedApprovalChannel};
use crate::domain::provenance::ProvenanceStore;
use crate::domain::schema_state::probe;
use crate::outbound::persistence::InMemorySchemaStore;

const FAMILY: &str = "user_identity_columns";

fn id(version: u64) -> MigrationId {
    MigrationId::new(FAMILY, version).expect("valid id")
}

#[fixture]
fn provenance() -> ProvenanceStore {
    ProvenanceStore::new(Arc::new(mockable::DefaultClock))
}

fn host_mapping() -> FieldMapping {
    let overrides = FieldOverrides::new()
        .with("full_name", ColumnOverride::named("username"))
        .with("avatar", ColumnOverride::named("avatar").with_nullable(true))
        .with("bio", ColumnOverride::named("bio").with_nullable(true));
    resolve_field_mapping(&overrides).expect("mapping resolves")
}

fn engine(provenance: &ProvenanceStore, mapping: FieldMapping, allow_inferred: bool) -> RevertEngine {
    RevertEngine::new(provenance.clone(), mapping, "users", allow_inferred)
}

fn apply(
    provenance: &ProvenanceStore,
    store: &mut InMemorySchemaStore,
    mapping: &FieldMapping,
    version: u64,
) {
    let state = probe(store, "users").expect("probe succeeds");
    let plan = plan_migration(mapping, &state);
    MigrationExecutor::new(provenance.clone())
        .apply(store, &plan, &id(version))
        .expect("apply succeeds");
}

fn existing_host_table() -> InMemorySchemaStore {
    InMemorySchemaStore::new().with_table(
        "users",
        &["id", "username", "created_at", "updated_at"],
        0,
    )
}

#[rstest]
fn reverting_a_created_table_drops_it(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new();
    apply(&provenance, &mut store, &FieldMapping::defaults(), 1);
    let channel = ScriptedApprovalChannel::default();

    let result = engine(&provenance, FieldMapping::defaults(), true)
        .revert(&mut store, &channel, &id(1))
        .expect("revert succeeds");

    assert_eq!(
        result,
        RevertResult::DroppedTable {
            table_name: "users".to_owned(),
            migration_id: Some(id(1)),
        }
    );
    assert_eq!(store.table_columns("users"), None);
    assert!(channel.questions().is_empty());
}

#[rstest]
fn reverting_added_columns_keeps_host_columns(provenance: ProvenanceStore) {
    let mut store = existing_host_table();
    apply(&provenance, &mut store, &host_mapping(), 1);

    let result = engine(&provenance, host_mapping(), true)
        .revert(&mut store, &ScriptedApprovalChannel::default(), &id(1))
        .expect("revert succeeds");

    assert_eq!(
        result,
        RevertResult::DroppedColumns {
            table_name: "users".to_owned(),
            columns: vec!["avatar".to_owned(), "bio".to_owned()],
            migration_id: Some(id(1)),
        }
    );
    assert_eq!(
        store.table_columns("users"),
        Some(vec![
            "id".to_owned(),
            "username".to_owned(),
            "created_at".to_owned(),
            "updated_at".to_owned(),
        ])
    );
}

#[rstest]
fn recorded_columns_win_over_a_changed_mapping(provenance: ProvenanceStore) {
    let mut store = existing_host_table();
    apply(&provenance, &mut store, &host_mapping(), 1);
    let drifted = resolve_field_mapping(
        &FieldOverrides::new().with("bio", ColumnOverride::named("about").with_nullable(true)),
    )
    .expect("mapping resolves");

    let result = engine(&provenance, drifted, true)
        .revert(&mut store, &ScriptedApprovalChannel::default(), &id(1))
        .expect("revert succeeds");

    assert!(matches!(
        result,
        RevertResult::DroppedColumns { ref columns, .. } if columns == &["avatar", "bio"]
    ));
}

#[rstest]
fn second_revert_reports_already_reverted(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new();
    apply(&provenance, &mut store, &FieldMapping::defaults(), 1);
    let revert_engine = engine(&provenance, FieldMapping::defaults(), true);
    let channel = ScriptedApprovalChannel::default();
    revert_engine
        .revert(&mut store, &channel, &id(1))
        .expect("first revert succeeds");

    let second = revert_engine
        .revert(&mut store, &channel, &id(1))
        .expect("second revert succeeds");

    assert_eq!(
        second,
        RevertResult::AlreadyReverted {
            table_name: "users".to_owned(),
            migration_id: Some(id(1)),
        }
    );
    let record = store
        .find_provenance(&id(1))
        .expect("lookup succeeds")
        .expect("record retained");
    assert!(record.reverted_at.is_some());
}

#[rstest]
fn latest_revert_after_everything_reverted_keeps_host_table(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new().with_table(
        "users",
        &["id", "username", "created_at", "updated_at"],
        10,
    );
    apply(&provenance, &mut store, &host_mapping(), 1);
    let revert_engine = engine(&provenance, host_mapping(), true);
    let channel = ScriptedApprovalChannel::new([true, true]);
    revert_engine
        .revert_latest(&mut store, &channel, FAMILY)
        .expect("first revert succeeds");

    let second = revert_engine
        .revert_latest(&mut store, &channel, FAMILY)
        .expect("second revert succeeds");

    assert_eq!(
        second,
        RevertResult::AlreadyReverted {
            table_name: "users".to_owned(),
            migration_id: Some(id(1)),
        }
    );
    assert!(channel.questions().is_empty());
    assert_eq!(
        store.table_columns("users"),
        Some(vec![
            "id".to_owned(),
            "username".to_owned(),
            "created_at".to_owned(),
            "updated_at".to_owned(),
        ])
    );
    assert_eq!(store.row_count("users"), Ok(10));
}

#[rstest]
fn reverting_added_columns_never_drops_the_host_table(provenance: ProvenanceStore) {
    let mut store =
        InMemorySchemaStore::new().with_table("users", &["id", "created_at", "updated_at"], 10);
    apply(&provenance, &mut store, &FieldMapping::defaults(), 1);

    let result = engine(&provenance, FieldMapping::defaults(), true)
        .revert_latest(&mut store, &ScriptedApprovalChannel::default(), FAMILY)
        .expect("revert succeeds");

    assert_eq!(
        result,
        RevertResult::DroppedColumns {
            table_name: "users".to_owned(),
            columns: vec!["full_name".to_owned(), "avatar".to_owned(), "bio".to_owned()],
            migration_id: Some(id(1)),
        }
    );
    assert_eq!(
        store.table_columns("users"),
        Some(vec![
            "id".to_owned(),
            "created_at".to_owned(),
            "updated_at".to_owned(),
        ])
    );
    assert_eq!(store.row_count("users"), Ok(10));
}

#[rstest]
fn declined_inferred_revert_reports_missing_provenance(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new().with_table(
        "users",
        &["id", "full_name", "avatar", "bio", "created_at", "updated_at"],
        3,
    );
    let channel = ScriptedApprovalChannel::new([false]);

    let error = engine(&provenance, FieldMapping::defaults(), true)
        .revert(&mut store, &channel, &id(9))
        .expect_err("revert refused");

    assert_eq!(
        error,
        MigrationError::provenance_not_found("user_identity_columns@9")
    );
    assert_eq!(store.table_columns("users").map(|columns| columns.len()), Some(6));
    let questions = channel.questions();
    assert_eq!(questions.len(), 1);
    assert!(questions[0].contains("full_name, avatar, bio"));
}

#[rstest]
fn confirmed_inferred_revert_drops_derived_columns(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new().with_table(
        "users",
        &["id", "email", "full_name", "avatar", "bio", "created_at", "updated_at"],
        3,
    );

    let result = engine(&provenance, FieldMapping::defaults(), true)
        .revert_latest(&mut store, &ScriptedApprovalChannel::new([true]), FAMILY)
        .expect("revert succeeds");

    assert_eq!(
        result,
        RevertResult::DroppedColumns {
            table_name: "users".to_owned(),
            columns: vec!["full_name".to_owned(), "avatar".to_owned(), "bio".to_owned()],
            migration_id: None,
        }
    );
}

#[rstest]
fn disabled_inferred_revert_never_prompts(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new().with_table("users", &["id", "bio"], 0);
    let channel = ScriptedApprovalChannel::new([true]);

    let error = engine(&provenance, FieldMapping::defaults(), false)
        .revert(&mut store, &channel, &id(2))
        .expect_err("revert refused");

    assert_eq!(error.exit_code(), 5);
    assert!(channel.questions().is_empty());
    assert_eq!(
        store.table_columns("users"),
        Some(vec!["id".to_owned(), "bio".to_owned()])
    );
}

#[rstest]
fn chain_stops_when_operator_declines(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new().with_table(
        "users",
        &["id", "created_at", "updated_at", "username"],
        0,
    );
    let bio_only = resolve_field_mapping(
        &FieldOverrides::new()
            .with("full_name", ColumnOverride::named("username"))
            .with("avatar", ColumnOverride::named("username")),
    )
    .expect("mapping resolves");
    apply(&provenance, &mut store, &bio_only, 1);
    apply(&provenance, &mut store, &host_mapping(), 2);
    let channel = ScriptedApprovalChannel::new([false]);

    let results = engine(&provenance, host_mapping(), true)
        .revert_chain(&mut store, &channel, FAMILY)
        .expect("chain succeeds");

    assert_eq!(results.len(), 1);
    assert!(matches!(
        &results[0],
        RevertResult::DroppedColumns { migration_id: Some(reverted), .. } if reverted == &id(2)
    ));
    assert!(channel.questions()[0].contains("user_identity_columns@1"));
    assert!(
        store
            .table_columns("users")
            .is_some_and(|columns| columns.contains(&"bio".to_owned()))
    );
}

#[rstest]
fn chain_continues_while_operator_agrees(provenance: ProvenanceStore) {
    let mut store = InMemorySchemaStore::new();
    apply(&provenance, &mut store, &FieldMapping::defaults(), 1);
    let wider = resolve_field_mapping(
        &FieldOverrides::new().with("bio", ColumnOverride::named("about").with_nullable(true)),
    )
    .expect("mapping resolves");
    apply(&provenance, &mut store, &wider, 2);

    let results = engine(&provenance, wider, true)
        .revert_chain(&mut store, &ScriptedApprovalChannel::new([true]), FAMILY)
        .expect("chain succeeds");

    assert_eq!(results.len(), 2);
    assert!(matches!(results[1], RevertResult::DroppedTable { .. }));
    assert_eq!(store.table_columns("users"), None);
}
