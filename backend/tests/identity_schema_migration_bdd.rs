//! Behavioural tests for applying and reverting identity-column migrations.
//!
//! Scenarios run against the in-memory store with scripted operator answers,
//! so they need no database.

use std::sync::Arc;

use chat_backend::domain::ports::{ProvenanceKind, SchemaStore, ScriptedApprovalChannel};
use chat_backend::domain::{
    ApplyOutcome, ColumnOverride, ConfigurationError, EngineOptions, FieldOverrides,
    IdentitySchemaService, MigrationError, MigrationId, RevertResult,
};
use chat_backend::outbound::persistence::InMemorySchemaStore;
use mockable::DefaultClock;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const TABLE: &str = "users";
const HOST_COLUMNS: [&str; 4] = ["id", "username", "created_at", "updated_at"];

struct MigrationWorld {
    store: InMemorySchemaStore,
    overrides: FieldOverrides,
    service: Option<Result<IdentitySchemaService, MigrationError>>,
    channel: ScriptedApprovalChannel,
    applied: Option<Result<ApplyOutcome, MigrationError>>,
    reverts: Vec<Result<RevertResult, MigrationError>>,
}

impl MigrationWorld {
    fn new() -> Self {
        Self {
            store: InMemorySchemaStore::new(),
            overrides: FieldOverrides::new(),
            service: None,
            channel: ScriptedApprovalChannel::default(),
            applied: None,
            reverts: Vec::new(),
        }
    }

    fn build_service(&mut self) {
        self.service = Some(IdentitySchemaService::new(
            &self.overrides,
            EngineOptions::default(),
            Arc::new(DefaultClock),
        ));
    }

    fn service(&mut self) -> IdentitySchemaService {
        if self.service.is_none() {
            self.build_service();
        }
        self.service
            .as_ref()
            .expect("service should be built")
            .as_ref()
            .expect("service should build from the mapping")
            .clone()
    }

    fn apply(&mut self, answers: &[bool]) {
        let service = self.service();
        self.channel = ScriptedApprovalChannel::new(answers.iter().copied());
        self.applied = Some(service.apply(&mut self.store, &self.channel, Some(7)));
    }

    fn revert(&mut self, migration_id: Option<&MigrationId>, answers: &[bool]) {
        let service = self.service();
        self.channel = ScriptedApprovalChannel::new(answers.iter().copied());
        let result = service.revert(&mut self.store, &self.channel, migration_id);
        self.reverts.push(result);
    }

    fn applied_id(&self) -> MigrationId {
        match self.applied.as_ref().expect("apply should have run") {
            Ok(ApplyOutcome::Applied(record)) => record.migration_id.clone(),
            other => panic!("expected an applied migration, got {other:?}"),
        }
    }

    fn apply_error(&self) -> &MigrationError {
        match self.applied.as_ref().expect("apply should have run") {
            Ok(outcome) => panic!("expected apply to fail, got {outcome:?}"),
            Err(error) => error,
        }
    }

    fn last_revert(&self) -> &Result<RevertResult, MigrationError> {
        self.reverts.last().expect("revert should have run")
    }

    fn sorted_columns(&self) -> Option<Vec<String>> {
        self.store.table_columns(TABLE).map(|mut columns| {
            columns.sort();
            columns
        })
    }
}

fn sorted(names: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = names.iter().map(|name| (*name).to_owned()).collect();
    names.sort();
    names
}

#[fixture]
fn world() -> MigrationWorld {
    MigrationWorld::new()
}

#[given("an empty schema store")]
fn an_empty_schema_store(world: &mut MigrationWorld) {
    world.store = InMemorySchemaStore::new();
}

#[given("a populated host users table with a username column")]
fn a_populated_host_users_table(world: &mut MigrationWorld) {
    world.store = InMemorySchemaStore::new().with_table(TABLE, &HOST_COLUMNS, 10);
}

#[given("a host users table that already has the identity columns")]
fn a_host_table_with_identity_columns(world: &mut MigrationWorld) {
    world.store = InMemorySchemaStore::new().with_table(
        TABLE,
        &["id", "full_name", "avatar", "bio", "created_at", "updated_at"],
        3,
    );
}

#[given("the default field mapping")]
fn the_default_field_mapping(world: &mut MigrationWorld) {
    world.overrides = FieldOverrides::new();
}

#[given("a mapping that stores the full name in username")]
fn a_mapping_that_stores_full_name_in_username(world: &mut MigrationWorld) {
    world.overrides = FieldOverrides::new().with("full_name", ColumnOverride::named("username"));
}

#[given("a mapping that makes bio required without a default")]
fn a_mapping_that_makes_bio_required(world: &mut MigrationWorld) {
    world.overrides = FieldOverrides::new()
        .with("full_name", ColumnOverride::named("username"))
        .with("bio", ColumnOverride::named("bio").with_nullable(false));
}

#[given("a mapping with an email key")]
fn a_mapping_with_an_email_key(world: &mut MigrationWorld) {
    world.overrides = FieldOverrides::new().with("email", ColumnOverride::named("email_address"));
}

#[when("the service is built")]
fn the_service_is_built(world: &mut MigrationWorld) {
    world.build_service();
}

#[when("the operator applies the migration and approves")]
fn the_operator_applies_and_approves(world: &mut MigrationWorld) {
    world.apply(&[true]);
}

#[when("the operator reverts the latest migration")]
fn the_operator_reverts_the_latest(world: &mut MigrationWorld) {
    world.revert(None, &[]);
}

#[when("the operator reverts the latest migration and declines")]
fn the_operator_reverts_and_declines(world: &mut MigrationWorld) {
    world.revert(None, &[false]);
}

#[when("the operator reverts the latest migration again, approving any prompt")]
fn the_operator_reverts_the_latest_again(world: &mut MigrationWorld) {
    world.revert(None, &[true]);
}

#[when("the operator reverts the applied migration")]
fn the_operator_reverts_the_applied_migration(world: &mut MigrationWorld) {
    let migration_id = world.applied_id();
    world.revert(Some(&migration_id), &[]);
}

#[when("the operator reverts the applied migration again")]
fn the_operator_reverts_the_applied_migration_again(world: &mut MigrationWorld) {
    let migration_id = world.applied_id();
    world.revert(Some(&migration_id), &[]);
}

#[then("the users table holds the identity and system columns")]
fn the_users_table_holds_identity_and_system_columns(world: &mut MigrationWorld) {
    assert_eq!(
        world.sorted_columns(),
        Some(sorted(&[
            "full_name",
            "avatar",
            "bio",
            "id",
            "created_at",
            "updated_at"
        ]))
    );
}

#[then("one active provenance record describes a created table")]
fn one_active_record_describes_a_created_table(world: &mut MigrationWorld) {
    let service = world.service();
    let history = service
        .history(&mut world.store)
        .expect("history should load");
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.kind, ProvenanceKind::CreatedTable);
    assert_eq!(record.table_name, TABLE);
    assert_eq!(record.added_columns.len(), 6);
    assert!(record.is_active());
}

#[then("the users table no longer exists")]
fn the_users_table_no_longer_exists(world: &mut MigrationWorld) {
    assert!(matches!(
        world.last_revert(),
        Ok(RevertResult::DroppedTable { .. })
    ));
    assert_eq!(world.store.table_columns(TABLE), None);
}

#[then("the operator was asked about the missing avatar and bio columns")]
fn the_operator_was_asked_about_missing_columns(world: &mut MigrationWorld) {
    let questions = world.channel.questions();
    assert_eq!(questions.len(), 1);
    let question = &questions[0];
    assert!(question.contains("holds 10 row(s)"), "{question}");
    assert!(question.contains("avatar"), "{question}");
    assert!(question.contains("bio"), "{question}");
    assert!(!question.contains("full_name"), "{question}");
}

#[then("the users table gained the avatar and bio columns")]
fn the_users_table_gained_avatar_and_bio(world: &mut MigrationWorld) {
    assert!(matches!(
        world.applied,
        Some(Ok(ApplyOutcome::Applied(ref record)))
            if record.kind == ProvenanceKind::AddedColumns
                && record.added_columns == ["avatar", "bio"]
    ));
    assert_eq!(
        world.sorted_columns(),
        Some(sorted(&[
            "id",
            "username",
            "created_at",
            "updated_at",
            "avatar",
            "bio"
        ]))
    );
}

#[then("the users table keeps only its host columns")]
fn the_users_table_keeps_only_host_columns(world: &mut MigrationWorld) {
    assert!(matches!(
        world.last_revert(),
        Ok(RevertResult::DroppedColumns { columns, .. }) if columns == &["avatar", "bio"]
    ));
    assert_eq!(world.sorted_columns(), Some(sorted(&HOST_COLUMNS)));
}

#[then("the migration fails with a schema conflict on bio")]
fn the_migration_fails_with_a_schema_conflict(world: &mut MigrationWorld) {
    let error = world.apply_error();
    assert!(matches!(
        error,
        MigrationError::SchemaConflict { table, column } if table == TABLE && column == "bio"
    ));
    assert_eq!(error.exit_code(), 4);
    assert!(world.channel.questions().is_empty());
}

#[then("no DDL was executed")]
fn no_ddl_was_executed(world: &mut MigrationWorld) {
    assert!(world.store.ddl_statements().is_empty());
    assert_eq!(world.sorted_columns(), Some(sorted(&HOST_COLUMNS)));
}

#[then("building fails with a configuration error naming email")]
fn building_fails_naming_email(world: &mut MigrationWorld) {
    let outcome = world.service.as_ref().expect("service build should have run");
    assert!(matches!(
        outcome,
        Err(MigrationError::Configuration(ConfigurationError::UnknownFields { keys }))
            if keys == &["email"]
    ));
    assert!(world.store.ddl_statements().is_empty());
    assert_eq!(world.store.table_columns(TABLE), None);
}

#[then("the revert fails because no provenance was found")]
fn the_revert_fails_because_no_provenance(world: &mut MigrationWorld) {
    let outcome = world.last_revert();
    assert!(matches!(
        outcome,
        Err(MigrationError::ProvenanceNotFound { .. })
    ));
    if let Err(error) = outcome {
        assert_eq!(error.exit_code(), 5);
    }
    assert_eq!(world.channel.questions().len(), 1);
}

#[then("the users table still has the identity columns")]
fn the_users_table_still_has_identity_columns(world: &mut MigrationWorld) {
    assert!(world.store.ddl_statements().is_empty());
    assert_eq!(
        world.sorted_columns(),
        Some(sorted(&[
            "id",
            "full_name",
            "avatar",
            "bio",
            "created_at",
            "updated_at"
        ]))
    );
}

#[then("the second revert reports the migration as already reverted")]
fn the_second_revert_reports_already_reverted(world: &mut MigrationWorld) {
    let migration_id = world.applied_id();
    assert_eq!(world.reverts.len(), 2);
    assert!(matches!(
        world.reverts[0],
        Ok(RevertResult::DroppedTable { .. })
    ));
    assert_eq!(
        world.reverts[1],
        Ok(RevertResult::AlreadyReverted {
            table_name: TABLE.to_owned(),
            migration_id: Some(migration_id),
        })
    );
}

#[then("the latest revert reports the migration as already reverted")]
fn the_latest_revert_reports_already_reverted(world: &mut MigrationWorld) {
    let migration_id = world.applied_id();
    assert_eq!(
        world.last_revert(),
        &Ok(RevertResult::AlreadyReverted {
            table_name: TABLE.to_owned(),
            migration_id: Some(migration_id),
        })
    );
    assert!(world.channel.questions().is_empty());
    assert_eq!(world.sorted_columns(), Some(sorted(&HOST_COLUMNS)));
    assert_eq!(world.store.row_count(TABLE), Ok(10));
}

#[then("the provenance record is kept with a revert timestamp")]
fn the_record_is_kept_with_a_revert_timestamp(world: &mut MigrationWorld) {
    let service = world.service();
    let history = service
        .history(&mut world.store)
        .expect("history should load");
    assert_eq!(history.len(), 1);
    assert!(history[0].reverted_at.is_some());
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Fresh store gets a managed table that revert removes again"
)]
fn fresh_store_gets_a_managed_table(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Host table gains only the missing identity columns"
)]
fn host_table_gains_only_missing_columns(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Populated table with an unsafe required column is refused"
)]
fn populated_table_with_unsafe_column_is_refused(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Unknown mapping keys are rejected before the store is probed"
)]
fn unknown_mapping_keys_are_rejected(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Declined inferred revert leaves the schema untouched"
)]
fn declined_inferred_revert_leaves_schema_untouched(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Reverting the same migration twice reports it as already reverted"
)]
fn reverting_twice_reports_already_reverted(world: MigrationWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/identity_schema_migration.feature",
    name = "Reverting the latest migration after it was reverted keeps the host table"
)]
fn reverting_latest_twice_keeps_host_table(world: MigrationWorld) {
    drop(world);
}
