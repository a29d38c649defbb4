//! Approval checkpoint between planning and execution.

use serde::Serialize;
use tracing::{info, warn};

use super::column::ColumnDefinition;
use super::migration_error::MigrationError;
use super::migration_plan::MigrationPlan;
use super::ports::ApprovalChannel;
use super::schema_state::SchemaState;

/// Outcome of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// DDL may proceed.
    Approved,
    /// The operator declined; nothing may run.
    Declined,
}

/// Decides whether a plan may run against the observed schema.
///
/// Table creation always asks. Adding columns to a populated table asks
/// only when every addition has a value for existing rows; otherwise the
/// request is rejected outright. Empty tables and no-ops pass silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    /// Evaluate `plan` against `state`, asking `channel` when required.
    pub fn approve(
        &self,
        plan: &MigrationPlan,
        state: &SchemaState,
        channel: &dyn ApprovalChannel,
    ) -> Result<GateDecision, MigrationError> {
        let question = match plan {
            MigrationPlan::Noop { .. } => return Ok(GateDecision::Approved),
            MigrationPlan::CreateTable {
                table_name,
                columns,
            } => format!(
                "Table '{table_name}' does not exist. It will be created with the following columns: {}. Proceed? (y/n): ",
                describe(columns)
            ),
            MigrationPlan::AddColumns {
                table_name,
                columns,
            } => {
                if !state.is_populated() {
                    return Ok(GateDecision::Approved);
                }
                reject_unsafe_additions(table_name, columns)?;
                format!(
                    "Table '{table_name}' holds {} row(s) and is missing the following columns: {}. Add them? (y/n): ",
                    state.row_count,
                    describe(columns)
                )
            }
        };

        info!(table = plan.table_name(), plan = plan.label(), "requesting approval");
        if channel.ask(&question) {
            info!(table = plan.table_name(), plan = plan.label(), "approval granted");
            Ok(GateDecision::Approved)
        } else {
            info!(table = plan.table_name(), plan = plan.label(), "approval declined");
            Ok(GateDecision::Declined)
        }
    }
}

fn reject_unsafe_additions(
    table_name: &str,
    columns: &[ColumnDefinition],
) -> Result<(), MigrationError> {
    match columns
        .iter()
        .find(|column| !column.is_safe_for_populated_table())
    {
        Some(column) => {
            warn!(
                table = table_name,
                column = column.name.as_str(),
                "column has no default and is not nullable"
            );
            Err(MigrationError::SchemaConflict {
                table: table_name.to_owned(),
                column: column.name.to_string(),
            })
        }
        None => Ok(()),
    }
}

fn describe(columns: &[ColumnDefinition]) -> String {
    columns
        .iter()
        .map(|column| format!("{} ({})", column.name, column.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ")
}
