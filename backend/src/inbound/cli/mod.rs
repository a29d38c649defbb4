//! Command-line inbound adapter.
//!
//! Turns an [`Operation`] into service calls and renders the result as
//! `key=value` lines for stdout.

mod console_approval;

pub use console_approval::ConsoleApprovalChannel;

use crate::domain::ports::{ApprovalChannel, MigrationStore, ProvenanceRecord};
use crate::domain::{
    ApplyOutcome, IdentitySchemaService, MigrationError, MigrationId, PlanReport, RevertResult,
};

/// One operator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Probe and print the plan.
    Plan,
    /// Apply the plan, optionally with an explicit version.
    Apply {
        /// Version for the new migration id.
        version: Option<u64>,
    },
    /// Revert one migration, or the latest when no id is given.
    Revert {
        /// Migration to revert; latest active when absent.
        migration_id: Option<MigrationId>,
    },
    /// Revert the latest migration, then older ones while the operator agrees.
    RevertChain,
    /// List provenance records.
    History,
}

/// Run `operation` and render its output lines.
pub fn run_operation<S>(
    service: &IdentitySchemaService,
    store: &mut S,
    channel: &dyn ApprovalChannel,
    operation: &Operation,
) -> Result<Vec<String>, MigrationError>
where
    S: MigrationStore + ?Sized,
{
    match operation {
        Operation::Plan => service.plan(store).map(|report| render_plan(&report)),
        Operation::Apply { version } => service
            .apply(store, channel, *version)
            .map(|outcome| render_apply(&outcome)),
        Operation::RevertChain => service
            .revert_chain(store, channel)
            .map(|results| results.iter().flat_map(render_revert).collect()),
        Operation::Revert { migration_id } => service
            .revert(store, channel, migration_id.as_ref())
            .map(|result| render_revert(&result)),
        Operation::History => service
            .history(store)
            .map(|records| records.iter().map(render_record).collect()),
    }
}

fn render_plan(report: &PlanReport) -> Vec<String> {
    vec![
        format!("table={}", report.state.table_name),
        format!("table_exists={}", report.state.exists),
        format!("row_count={}", report.state.row_count),
        format!("plan={}", report.plan.label()),
        format!("columns={}", report.plan.column_names().join(",")),
    ]
}

fn render_apply(outcome: &ApplyOutcome) -> Vec<String> {
    match outcome {
        ApplyOutcome::Applied(record) => vec![
            "outcome=applied".to_owned(),
            format!("migration_id={}", record.migration_id),
            format!("table={}", record.table_name),
            format!("kind={}", record.kind),
            format!("added_columns={}", record.added_columns.join(",")),
            format!("applied_at={}", record.applied_at.to_rfc3339()),
        ],
        ApplyOutcome::Noop { table_name } => {
            vec!["outcome=noop".to_owned(), format!("table={table_name}")]
        }
    }
}

fn render_revert(result: &RevertResult) -> Vec<String> {
    let render_id = |migration_id: &Option<MigrationId>| {
        migration_id
            .as_ref()
            .map_or_else(|| "inferred".to_owned(), ToString::to_string)
    };
    match result {
        RevertResult::DroppedTable {
            table_name,
            migration_id,
        } => vec![
            "outcome=dropped_table".to_owned(),
            format!("table={table_name}"),
            format!("migration_id={}", render_id(migration_id)),
        ],
        RevertResult::DroppedColumns {
            table_name,
            columns,
            migration_id,
        } => vec![
            "outcome=dropped_columns".to_owned(),
            format!("table={table_name}"),
            format!("columns={}", columns.join(",")),
            format!("migration_id={}", render_id(migration_id)),
        ],
        RevertResult::AlreadyReverted {
            table_name,
            migration_id,
        } => vec![
            "outcome=already_reverted".to_owned(),
            format!("table={table_name}"),
            format!("migration_id={}", render_id(migration_id)),
        ],
    }
}

fn render_record(record: &ProvenanceRecord) -> String {
    format!(
        "migration_id={} table={} kind={} added_columns={} applied_at={} reverted_at={}",
        record.migration_id,
        record.table_name,
        record.kind,
        record.added_columns.join(","),
        record.applied_at.to_rfc3339(),
        record
            .reverted_at
            .map_or_else(|| "-".to_owned(), |at| at.to_rfc3339())
    )
}
