//! Supervisor — accepts "start this run" requests and ensures exactly one
//! live RunWorker per run id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::executor::StepExecutor;
use crate::models::RunStatus;
use crate::store::SqliteStore;
use crate::worker::RunWorker;

pub struct Supervisor {
    store: Arc<SqliteStore>,
    executor: Arc<StepExecutor>,
    live: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(store: Arc<SqliteStore>, executor: Arc<StepExecutor>) -> Self {
        Self {
            store,
            executor,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent: a no-op if a worker is already live for this run id.
    pub async fn submit(&self, run_id: Uuid) {
        let mut live = self.live.lock().await;

        if let Some(handle) = live.get(&run_id) {
            if !handle.is_finished() {
                info!(run_id = %run_id, "submission ignored, worker already live");
                return;
            }
        }

        let worker = RunWorker::new(self.store.clone(), self.executor.clone(), run_id);
        let handle = tokio::spawn(async move {
            worker.run().await;
        });

        live.insert(run_id, handle);
    }

    pub async fn watch_for_panics(self: &Arc<Self>) {
        // Periodically sweep finished handles that ended via panic (no
        // corresponding terminal Run status) and fail the Run explicitly.
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(200));
        loop {
            interval.tick().await;
            let mut live = self.live.lock().await;
            let mut to_remove = Vec::new();
            for (run_id, handle) in live.iter() {
                if handle.is_finished() {
                    to_remove.push(*run_id);
                }
            }
            for run_id in to_remove {
                if let Some(handle) = live.remove(&run_id) {
                    if let Err(join_err) = handle.await {
                        if join_err.is_panic() {
                            error!(run_id = %run_id, "worker panicked, marking run failed");
                            let now = chrono::Utc::now();
                            if let Ok(run) = self.store.get_run(run_id).await {
                                if !run.status.is_terminal() {
                                    let _ = self
                                        .store
                                        .set_run_terminal(run_id, RunStatus::Failed, now)
                                        .await;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
