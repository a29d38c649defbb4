//! Orchestrates the apply and revert paths for one managed table.
//!
//! Apply runs resolve → probe → plan → gate → execute. The mapping is
//! resolved when the service is built, so invalid overrides fail before
//! any store is touched.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::info;

use super::column::ColumnName;
use super::field_mapping::{ConfigurationError, FieldMapping, FieldOverrides, resolve_field_mapping};
use super::identity_record::IdentityRecordType;
use super::migration_error::MigrationError;
use super::migration_executor::{ApplyOutcome, MigrationExecutor};
use super::migration_id::{DEFAULT_MIGRATION_FAMILY, MigrationId, validate_family};
use super::migration_plan::{MigrationPlan, plan_migration};
use super::ports::{ApprovalChannel, MigrationStore, ProvenanceRecord};
use super::provenance::ProvenanceStore;
use super::revert_engine::{RevertEngine, RevertResult};
use super::safety_gate::{GateDecision, SafetyGate};
use super::schema_state::{SchemaState, probe};

/// Table managed when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "users";

/// Engine settings that are not part of the field mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Managed table.
    pub table_name: String,
    /// Family stamped on every migration id.
    pub migration_family: String,
    /// Whether revert may fall back to columns derived from the mapping.
    pub allow_inferred_revert: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_owned(),
            migration_family: DEFAULT_MIGRATION_FAMILY.to_owned(),
            allow_inferred_revert: true,
        }
    }
}

/// Dry-run view: what the store holds and what apply would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Probed state.
    pub state: SchemaState,
    /// Plan derived from it.
    pub plan: MigrationPlan,
}

/// Entry point for planning, applying, reverting, and listing migrations.
#[derive(Clone)]
pub struct IdentitySchemaService {
    mapping: FieldMapping,
    options: EngineOptions,
    clock: Arc<dyn Clock>,
    provenance: ProvenanceStore,
    executor: MigrationExecutor,
    revert_engine: RevertEngine,
}

impl IdentitySchemaService {
    /// Resolve `overrides` and validate `options`.
    pub fn new(
        overrides: &FieldOverrides,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MigrationError> {
        let mapping = resolve_field_mapping(overrides)?;
        ColumnName::new(options.table_name.as_str()).map_err(|error| {
            ConfigurationError::InvalidSetting {
                setting: "table_name".to_owned(),
                message: error.to_string(),
            }
        })?;
        validate_family(&options.migration_family)?;

        let provenance = ProvenanceStore::new(Arc::clone(&clock));
        let executor = MigrationExecutor::new(provenance.clone());
        let revert_engine = RevertEngine::new(
            provenance.clone(),
            mapping.clone(),
            options.table_name.clone(),
            options.allow_inferred_revert,
        );
        Ok(Self {
            mapping,
            options,
            clock,
            provenance,
            executor,
            revert_engine,
        })
    }

    /// Resolved mapping.
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Record type wired to the resolved mapping.
    pub fn record_type(&self) -> IdentityRecordType {
        IdentityRecordType::build(&self.mapping)
    }

    /// Probe and plan without asking or changing anything.
    pub fn plan<S>(&self, store: &mut S) -> Result<PlanReport, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let state = probe(store, &self.options.table_name)?;
        let plan = plan_migration(&self.mapping, &state);
        info!(table = %state.table_name, plan = plan.label(), columns = ?plan.column_names(), "plan computed");
        Ok(PlanReport { state, plan })
    }

    /// Bring the table in line with the mapping.
    ///
    /// `version` defaults to the current UTC time in milliseconds.
    pub fn apply<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        version: Option<u64>,
    ) -> Result<ApplyOutcome, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let PlanReport { state, plan } = self.plan(store)?;

        if SafetyGate.approve(&plan, &state, channel)? == GateDecision::Declined {
            let stage = match plan {
                MigrationPlan::CreateTable { .. } => "table creation",
                _ => "column addition",
            };
            return Err(MigrationError::user_declined(stage));
        }

        let migration_id = self.migration_id(version)?;
        self.executor.apply(store, &plan, &migration_id)
    }

    /// Revert `migration_id`, or the newest active migration when `None`.
    pub fn revert<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        migration_id: Option<&MigrationId>,
    ) -> Result<RevertResult, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        match migration_id {
            Some(migration_id) => self.revert_engine.revert(store, channel, migration_id),
            None => self.revert_engine.revert_latest(
                store,
                channel,
                &self.options.migration_family,
            ),
        }
    }

    /// Revert newest first, asking before each further step.
    pub fn revert_chain<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
    ) -> Result<Vec<RevertResult>, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        self.revert_engine
            .revert_chain(store, channel, &self.options.migration_family)
    }

    /// Provenance of the configured family, newest first.
    pub fn history<S>(&self, store: &mut S) -> Result<Vec<ProvenanceRecord>, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        Ok(self.provenance.list(store, &self.options.migration_family)?)
    }

    fn migration_id(&self, version: Option<u64>) -> Result<MigrationId, MigrationError> {
        let version = match version {
            Some(version) => version,
            None => {
                let now = self.clock.utc();
                u64::try_from(now.timestamp_millis()).map_err(|_| {
                    ConfigurationError::InvalidSetting {
                        setting: "version".to_owned(),
                        message: format!(
                            "clock reads {} which predates the Unix epoch; pass an explicit version",
                            now.to_rfc3339()
                        ),
                    }
                })?
            }
        };
        Ok(MigrationId::new(self.options.migration_family.as_str(), version)?)
    }
}

#[cfg(test)]
#[path = "identity_schema_service_tests.rs"]
mod tests;
