//! RunWorker — executes one Run end-to-end.
//!
//! Grounded on `engine::run_flow`'s topological iteration loop, generalized
//! from an in-memory `HashMap<String, StepResult>` to the durable `Store`
//! and from "run every step once" to "repeat a step while `StepExecutor`
//! returns RETRY".

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::error::ExecutorError;
use crate::executor::{StepExecutor, StepOutcome};
use crate::models::{RunStatus, StepStatus};
use crate::store::SqliteStore;

pub struct RunWorker {
    store: Arc<SqliteStore>,
    executor: Arc<StepExecutor>,
    run_id: Uuid,
}

impl RunWorker {
    pub fn new(store: Arc<SqliteStore>, executor: Arc<StepExecutor>, run_id: Uuid) -> Self {
        Self {
            store,
            executor,
            run_id,
        }
    }

    /// Runs to a terminal Run status. Never returns leaving the Run in
    /// RUNNING: any internal failure is caught and turned into a FAILED
    /// transition before returning.
    pub async fn run(self) {
        let run_id = self.run_id;
        if let Err(err) = self.run_inner().await {
            error!(run_id = %run_id, error = %err, "run worker failed internally");
            let now = chrono::Utc::now();
            // Best-effort: if this also fails, the run is caught by recovery
            // on the next process start since it remains RUNNING.
            let _ = self.store.set_run_terminal(run_id, RunStatus::Failed, now).await;
        }
    }

    async fn run_inner(&self) -> Result<(), ExecutorError> {
        let now = chrono::Utc::now();
        self.store.set_run_running(self.run_id, now).await?;

        let run = self.store.get_run(self.run_id).await?;
        let steps = self.store.get_steps_for_run(self.run_id).await?;

        let mut any_failed = false;

        for step in &steps {
            if matches!(step.status, StepStatus::Completed) {
                continue;
            }

            loop {
                let current = self.store.get_step(step.id).await?;
                match self
                    .executor
                    .execute_once(self.run_id, run.business_object_id, &current)
                    .await?
                {
                    StepOutcome::Success => break,
                    StepOutcome::Retry => continue,
                    StepOutcome::PermanentFailure => {
                        any_failed = true;
                        break;
                    }
                }
            }

            if any_failed {
                break;
            }
        }

        let final_status = if any_failed {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let now = chrono::Utc::now();
        self.store.set_run_terminal(self.run_id, final_status, now).await?;
        info!(run_id = %self.run_id, status = ?final_status, "run finished");
        Ok(())
    }
}
