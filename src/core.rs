//! `Core` — the facade an HTTP layer (or, in this repo, the CLI) calls to
//! drive workflows, runs, and business objects, without needing to know
//! about the Supervisor/Recovery/Executor wiring underneath.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::clock::{Clock, RandomSource, SystemClock, ThreadRandom};
use crate::error::CoreError;
use crate::executor::StepExecutor;
use crate::models::{
    BusinessObjectSnapshot, RunSnapshot, StepSnapshot, WorkflowDefinition, WorkflowSnapshot,
};
use crate::planner::plan;
use crate::recovery::recover_all;
use crate::store::SqliteStore;
use crate::supervisor::Supervisor;

pub struct Core {
    store: Arc<SqliteStore>,
    supervisor: Arc<Supervisor>,
}

impl Core {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let store = Arc::new(SqliteStore::connect(database_url).await?);
        Ok(Self::from_store(store))
    }

    pub fn from_store(store: Arc<SqliteStore>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let rng: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
        let actions = Arc::new(ActionRegistry::new());
        let executor = Arc::new(StepExecutor::new(
            store.clone(),
            actions,
            clock,
            rng,
        ));
        let supervisor = Arc::new(Supervisor::new(store.clone(), executor));

        // Sweeps finished worker handles for uncaught panics and marks the
        // owning Run FAILED; `RunWorker::run` already catches ordinary
        // errors itself, so this only ever fires on a genuine panic.
        let watcher = supervisor.clone();
        tokio::spawn(async move {
            watcher.watch_for_panics().await;
        });

        Self { store, supervisor }
    }

    /// Runs recovery once; must be called before any external request is
    /// served.
    pub async fn recover(&self) -> Result<usize, CoreError> {
        Ok(recover_all(&self.store, &self.supervisor).await?)
    }

    pub async fn create_workflow(
        &self,
        name: &str,
        definition: WorkflowDefinition,
    ) -> Result<Uuid, CoreError> {
        // Validate via TopoPlanner; nothing is persisted on failure.
        plan(&definition)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.store.insert_workflow(id, name, &definition, now).await?;
        Ok(id)
    }

    pub async fn start_run(
        &self,
        workflow_id: Uuid,
        business_object_id: Option<Uuid>,
    ) -> Result<Uuid, CoreError> {
        let workflow = self.store.get_workflow(workflow_id).await?;
        let ordered = plan(&workflow.definition)?;

        if let Some(business_object_id) = business_object_id {
            // Existence check up front; a missing object would otherwise
            // only surface as a step failure deep inside the first action.
            self.store.get_business_object(business_object_id).await?;
        }

        let now = Utc::now();
        let run_id = self
            .store
            .create_run(workflow_id, business_object_id, &ordered, now)
            .await?;

        self.supervisor.submit(run_id).await;
        Ok(run_id)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<RunSnapshot, CoreError> {
        let run = self.store.get_run(run_id).await?;
        let steps = self.store.get_steps_for_run(run_id).await?;
        Ok(RunSnapshot {
            id: run.id,
            workflow_id: run.workflow_id,
            status: run.status.as_str().to_string(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            created_at: run.created_at,
            business_object_id: run.business_object_id,
            steps: steps
                .into_iter()
                .map(|s| StepSnapshot {
                    step_id: s.step_id,
                    step_index: s.step_index,
                    status: s.status.as_str().to_string(),
                    retry_count: s.retry_count,
                    max_retries: s.max_retries,
                    error_message: s.error_message,
                })
                .collect(),
        })
    }

    pub async fn list_runs(&self) -> Result<Vec<RunSnapshot>, CoreError> {
        let runs = self.store.list_runs().await?;
        let mut snapshots = Vec::with_capacity(runs.len());
        for run in runs {
            snapshots.push(self.get_run(run.id).await?);
        }
        Ok(snapshots)
    }

    pub async fn get_workflow(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot, CoreError> {
        let workflow = self.store.get_workflow(workflow_id).await?;
        Ok(WorkflowSnapshot {
            id: workflow.id,
            name: workflow.name,
            definition: workflow.definition,
            created_at: workflow.created_at,
        })
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowSnapshot>, CoreError> {
        let workflows = self.store.list_workflows().await?;
        Ok(workflows
            .into_iter()
            .map(|w| WorkflowSnapshot {
                id: w.id,
                name: w.name,
                definition: w.definition,
                created_at: w.created_at,
            })
            .collect())
    }

    pub async fn create_business_object(&self, amount: f64) -> Result<Uuid, CoreError> {
        if amount <= 0.0 {
            return Err(CoreError::InvalidDefinition(format!(
                "amount must be > 0, got {amount}"
            )));
        }
        let now = Utc::now();
        Ok(self.store.create_business_object(amount, now).await?)
    }

    pub async fn get_business_object(&self, id: Uuid) -> Result<BusinessObjectSnapshot, CoreError> {
        let obj = self.store.get_business_object(id).await?;
        Ok(BusinessObjectSnapshot {
            id: obj.id,
            status: obj.status.as_str().to_string(),
            amount: obj.amount,
            created_at: obj.created_at,
            updated_at: obj.updated_at,
        })
    }
}
