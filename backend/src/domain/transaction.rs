//! Transaction scoping over the [`SchemaStore`] port.

use tracing::{debug, error, warn};

use super::migration_error::MigrationError;
use super::ports::SchemaStore;

/// Run `body` inside one store transaction.
///
/// Commits when `body` succeeds; rolls back on any error from `body` or from
/// the commit itself, then returns the original error. A failed rollback is
/// logged and does not mask that error.
pub(crate) fn in_transaction<S, T, F>(
    store: &mut S,
    operation: &str,
    body: F,
) -> Result<T, MigrationError>
where
    S: SchemaStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T, MigrationError>,
{
    store.begin()?;
    debug!(operation, "transaction opened");

    let outcome = body(&mut *store).and_then(|value| {
        store.commit()?;
        Ok(value)
    });

    match outcome {
        Ok(value) => {
            debug!(operation, "transaction committed");
            Ok(value)
        }
        Err(failure) => {
            warn!(operation, error = %failure, "rolling back");
            if let Err(rollback_error) = store.rollback() {
                error!(operation, error = %rollback_error, "rollback failed");
            }
            Err(failure)
        }
    }
}
