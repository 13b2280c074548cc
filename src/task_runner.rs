//! TaskRunner — runs a single simulated task: sleep for a configured
//! duration, then succeed or fail based on probability.
//!
//! Grounded on `engine::simulate_step_execution`, generalized from a
//! hardcoded `kind == "fail_test"` check to a configurable
//! `fail_probability`, via the `RandomSource` trait so tests don't depend
//! on real randomness.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::clock::RandomSource;

#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    pub duration_seconds: f64,
    pub fail_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Fail,
}

/// Suspends for `spec.duration_seconds`, then returns `Success` with
/// probability `1 - fail_probability`.
pub async fn run_task(spec: &TaskSpec, rng: &dyn RandomSource) -> TaskOutcome {
    debug!(
        duration_seconds = spec.duration_seconds,
        fail_probability = spec.fail_probability,
        "running simulated task"
    );
    sleep(Duration::from_secs_f64(spec.duration_seconds.max(0.0))).await;

    if rng.gen_bool(spec.fail_probability) {
        TaskOutcome::Fail
    } else {
        TaskOutcome::Success
    }
}
