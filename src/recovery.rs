//! Recovery — the startup routine that re-submits Runs left in RUNNING.
//! Runs exactly once, before the external interface opens.

use std::sync::Arc;

use tracing::info;

use crate::error::RecoveryError;
use crate::models::RunStatus;
use crate::store::SqliteStore;
use crate::supervisor::Supervisor;

/// Scans the Store for every Run with status RUNNING and submits each to
/// the Supervisor, blocking until all submissions are accepted (not:
/// completed). Returns the number of runs resubmitted — zero is the
/// expected result when nothing crashed mid-run.
pub async fn recover_all(
    store: &SqliteStore,
    supervisor: &Supervisor,
) -> Result<usize, RecoveryError> {
    let running = store.list_runs_with_status(RunStatus::Running).await?;
    info!(count = running.len(), "recovery scan complete");

    for run in &running {
        supervisor.submit(run.id).await;
    }

    Ok(running.len())
}
