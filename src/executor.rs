//! StepExecutor — drives a single Step from PENDING/RUNNING to a terminal
//! state, issuing a fresh idempotency key per attempt and committing
//! success atomically alongside any action dispatch.
//!
//! `engine.rs` only has an in-memory `HashMap<String, StepResult>` and no
//! retry/idempotency machinery, so this module is new; it reuses the same
//! `tracing`-based logging style and the `TaskRunner` generalized from
//! `simulate_step_execution`.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::clock::{Clock, RandomSource};
use crate::error::ExecutorError;
use crate::models::StepRow;
use crate::store::SqliteStore;
use crate::task_runner::{run_task, TaskOutcome, TaskSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Retry,
    PermanentFailure,
}

pub struct StepExecutor {
    store: Arc<SqliteStore>,
    actions: Arc<ActionRegistry>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl StepExecutor {
    pub fn new(
        store: Arc<SqliteStore>,
        actions: Arc<ActionRegistry>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            actions,
            clock,
            rng,
        }
    }

    /// One invocation per step attempt.
    pub async fn execute_once(
        &self,
        run_id: Uuid,
        business_object_id: Option<Uuid>,
        step: &StepRow,
    ) -> Result<StepOutcome, ExecutorError> {
        let now = self.clock.now();

        // Step 1: issue a fresh idempotency key (Write A).
        let key = Uuid::new_v4();
        self.store.issue_idempotency_key(step.id, key, now).await?;

        // Step 2: probe the result table for this key. Under the normal
        // protocol a fresh key can never already have a result — this is
        // the belt-and-braces guard for the crash window between Write A
        // and Write B (see DESIGN.md Q1).
        if let Some(_existing) = self.store.find_step_result(key).await? {
            info!(step_id = %step.step_id, "⏮ probe hit: step already completed under this key");
            self.store.mark_completed_from_probe(step.id, self.clock.now()).await?;
            return Ok(StepOutcome::Success);
        }

        // Step 3: invoke TaskRunner.
        info!(step_id = %step.step_id, kind = %step.kind, "▶️ running step");
        let spec = TaskSpec {
            duration_seconds: step.duration_seconds,
            fail_probability: step.fail_probability,
        };
        let outcome = run_task(&spec, self.rng.as_ref()).await;

        match outcome {
            TaskOutcome::Success => self.commit_success(run_id, business_object_id, step, key).await,
            TaskOutcome::Fail => {
                self.handle_failure(step, "simulated task failure".to_string())
                    .await
            }
        }
    }

    async fn commit_success(
        &self,
        _run_id: Uuid,
        business_object_id: Option<Uuid>,
        step: &StepRow,
        key: Uuid,
    ) -> Result<StepOutcome, ExecutorError> {
        let action = step
            .action
            .as_deref()
            .and_then(|name| self.actions.get(name))
            .zip(business_object_id);

        let now = self.clock.now();
        match self
            .store
            .commit_step_success(step.id, key, now, None, action)
            .await
        {
            Ok(()) => {
                info!(step_id = %step.step_id, "✅ step succeeded");
                Ok(StepOutcome::Success)
            }
            Err(err) => {
                warn!(step_id = %step.step_id, error = %err, "❌ atomic commit failed, treating as task failure");
                self.handle_failure(step, err.to_string()).await
            }
        }
    }

    async fn handle_failure(
        &self,
        step: &StepRow,
        error_message: String,
    ) -> Result<StepOutcome, ExecutorError> {
        if step.retry_count < step.max_retries {
            warn!(step_id = %step.step_id, retry_count = step.retry_count, "step failed, will retry");
            self.store.retry_step(step.id, &error_message).await?;
            Ok(StepOutcome::Retry)
        } else {
            warn!(step_id = %step.step_id, "step failed, retries exhausted");
            let now = self.clock.now();
            self.store
                .fail_step_permanently(step.id, &error_message, now)
                .await?;
            Ok(StepOutcome::PermanentFailure)
        }
    }
}
