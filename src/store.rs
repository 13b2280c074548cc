//! Store — the persistent tabular state backing the engine: workflows,
//! runs, steps, step results, and business objects.
//!
//! Backed by `sqlx::SqlitePool`. SQLite's single-writer-at-a-time behavior
//! gives a write transaction that either commits atomically or leaves no
//! visible effect for free; the pool additionally queues concurrent
//! writers rather than surfacing `SQLITE_BUSY`.
//!
//! Built on the `sqlx` dependency (`["sqlite", "runtime-tokio", "macros",
//! "chrono", "uuid"]` features) declared but otherwise unused upstream, and
//! on the migrate-on-`connect` pattern common to store modules that favor
//! an explicit schema-on-startup over a separate migration runner.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::actions::ActionFn;
use crate::error::{ActionError, StoreError};
use crate::models::{
    BusinessObjectRow, BusinessObjectStatus, RunRow, RunStatus, StepDef, StepResultRow, StepRow,
    StepStatus, WorkflowDefinition, WorkflowRow,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("timestamps are always written via to_rfc3339")
        .with_timezone(&Utc)
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Exposed so tests can build a store from an already-open in-memory pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS business_objects (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                amount REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL REFERENCES workflows(id),
                status TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                business_object_id TEXT REFERENCES business_objects(id)
            );

            CREATE TABLE IF NOT EXISTS steps (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES runs(id),
                step_id TEXT NOT NULL,
                step_index INTEGER NOT NULL,
                status TEXT NOT NULL,
                idempotency_key TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 0,
                started_at TEXT,
                completed_at TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                kind TEXT NOT NULL,
                action TEXT,
                duration_seconds REAL NOT NULL,
                fail_probability REAL NOT NULL,
                UNIQUE(run_id, step_id)
            );

            CREATE TABLE IF NOT EXISTS step_results (
                idempotency_key TEXT PRIMARY KEY,
                step_id TEXT NOT NULL REFERENCES steps(id),
                result_data TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
            CREATE INDEX IF NOT EXISTS idx_steps_run_id ON steps(run_id);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Workflows
    // ---------------------------------------------------------------

    pub async fn insert_workflow(
        &self,
        id: Uuid,
        name: &str,
        definition: &WorkflowDefinition,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let definition_json = serde_json::to_string(definition)?;
        sqlx::query(
            "INSERT INTO workflows (id, name, definition, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(definition_json)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, StoreError> {
        let row = sqlx::query("SELECT id, name, definition, created_at FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("workflow {id}")))?;
        Ok(workflow_row_from_sql(row)?)
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, StoreError> {
        let rows = sqlx::query("SELECT id, name, definition, created_at FROM workflows ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(workflow_row_from_sql).collect()
    }

    // ---------------------------------------------------------------
    // Runs + Steps (bulk creation; step_index is contiguous and stable)
    // ---------------------------------------------------------------

    pub async fn create_run(
        &self,
        workflow_id: Uuid,
        business_object_id: Option<Uuid>,
        ordered_steps: &[StepDef],
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let run_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO runs (id, workflow_id, status, started_at, completed_at, created_at, business_object_id)
             VALUES (?, ?, ?, NULL, NULL, ?, ?)",
        )
        .bind(run_id.to_string())
        .bind(workflow_id.to_string())
        .bind(RunStatus::Pending.as_str())
        .bind(now.to_rfc3339())
        .bind(business_object_id.map(|u| u.to_string()))
        .execute(&mut *tx)
        .await?;

        for (index, step) in ordered_steps.iter().enumerate() {
            let step_row_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO steps (id, run_id, step_id, step_index, status, idempotency_key,
                                     retry_count, max_retries, started_at, completed_at,
                                     error_message, created_at, kind, action, duration_seconds,
                                     fail_probability)
                 VALUES (?, ?, ?, ?, ?, NULL, 0, ?, NULL, NULL, NULL, ?, ?, ?, ?, ?)",
            )
            .bind(step_row_id.to_string())
            .bind(run_id.to_string())
            .bind(&step.id)
            .bind(index as i64)
            .bind(StepStatus::Pending.as_str())
            .bind(step.config.max_retries as i64)
            .bind(now.to_rfc3339())
            .bind(&step.kind)
            .bind(&step.config.action)
            .bind(step.config.duration_seconds)
            .bind(step.config.fail_probability)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(run_id)
    }

    pub async fn get_run(&self, id: Uuid) -> Result<RunRow, StoreError> {
        let row = sqlx::query(
            "SELECT id, workflow_id, status, started_at, completed_at, created_at, business_object_id
             FROM runs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run_row_from_sql(row)
    }

    pub async fn list_runs(&self) -> Result<Vec<RunRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, workflow_id, status, started_at, completed_at, created_at, business_object_id
             FROM runs ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(run_row_from_sql).collect()
    }

    pub async fn list_runs_with_status(&self, status: RunStatus) -> Result<Vec<RunRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, workflow_id, status, started_at, completed_at, created_at, business_object_id
             FROM runs WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(run_row_from_sql).collect()
    }

    pub async fn set_run_running(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE runs SET status = ?, started_at = COALESCE(started_at, ?) WHERE id = ?",
        )
        .bind(RunStatus::Running.as_str())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_run_terminal(
        &self,
        id: Uuid,
        status: RunStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE runs SET status = ?, completed_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Steps
    // ---------------------------------------------------------------

    pub async fn get_steps_for_run(&self, run_id: Uuid) -> Result<Vec<StepRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, run_id, step_id, step_index, status, idempotency_key, retry_count,
                    max_retries, started_at, completed_at, error_message, created_at, kind,
                    action, duration_seconds, fail_probability
             FROM steps WHERE run_id = ? ORDER BY step_index ASC",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(step_row_from_sql).collect()
    }

    pub async fn get_step(&self, step_row_id: Uuid) -> Result<StepRow, StoreError> {
        let row = sqlx::query(
            "SELECT id, run_id, step_id, step_index, status, idempotency_key, retry_count,
                    max_retries, started_at, completed_at, error_message, created_at, kind,
                    action, duration_seconds, fail_probability
             FROM steps WHERE id = ?",
        )
        .bind(step_row_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("step {step_row_id}")))?;
        step_row_from_sql(row)
    }

    /// Write A: issue a fresh idempotency key, mark RUNNING, set
    /// `started_at` if this is the step's first attempt.
    pub async fn issue_idempotency_key(
        &self,
        step_row_id: Uuid,
        key: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE steps SET idempotency_key = ?, status = ?, started_at = COALESCE(started_at, ?)
             WHERE id = ?",
        )
        .bind(key.to_string())
        .bind(StepStatus::Running.as_str())
        .bind(now.to_rfc3339())
        .bind(step_row_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Probe for a `StepResult` already recorded under this key.
    pub async fn find_step_result(&self, key: Uuid) -> Result<Option<StepResultRow>, StoreError> {
        let row = sqlx::query(
            "SELECT idempotency_key, step_id, result_data, created_at FROM step_results WHERE idempotency_key = ?",
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(step_result_row_from_sql).transpose()
    }

    /// Marks a step COMPLETED when the probe finds a pre-existing result
    /// (the belt-and-braces recovery path for a crash between Write A and
    /// Write B).
    pub async fn mark_completed_from_probe(
        &self,
        step_row_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE steps SET status = ?, completed_at = ? WHERE id = ?")
            .bind(StepStatus::Completed.as_str())
            .bind(now.to_rfc3339())
            .bind(step_row_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Write B: one atomic transaction containing the `StepResult` insert,
    /// the step completion update, and — if the step names a registered
    /// action and the run carries a business object — the action's
    /// business-object mutation. Any failure anywhere in here rolls the
    /// whole thing back.
    #[allow(clippy::too_many_arguments)]
    pub async fn commit_step_success(
        &self,
        step_row_id: Uuid,
        key: Uuid,
        now: DateTime<Utc>,
        result_data: Option<&str>,
        action: Option<(ActionFn, Uuid)>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO step_results (idempotency_key, step_id, result_data, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(key.to_string())
        .bind(step_row_id.to_string())
        .bind(result_data)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE steps SET status = ?, completed_at = ? WHERE id = ?")
            .bind(StepStatus::Completed.as_str())
            .bind(now.to_rfc3339())
            .bind(step_row_id.to_string())
            .execute(&mut *tx)
            .await?;

        if let Some((action_fn, business_object_id)) = action {
            let row = sqlx::query(
                "SELECT id, status, amount, created_at, updated_at FROM business_objects WHERE id = ?",
            )
            .bind(business_object_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ActionError::ObjectNotFound(business_object_id))?;

            let mut object = business_object_row_from_sql(row)?;
            action_fn(&mut object)?;
            object.updated_at = now;

            sqlx::query("UPDATE business_objects SET status = ?, amount = ?, updated_at = ? WHERE id = ?")
                .bind(object.status.as_str())
                .bind(object.amount)
                .bind(object.updated_at.to_rfc3339())
                .bind(object.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// A retriable failure — bump `retry_count`, clear the idempotency key
    /// so the next attempt issues a fresh one, return to PENDING.
    pub async fn retry_step(&self, step_row_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE steps SET retry_count = retry_count + 1, status = ?, idempotency_key = NULL,
                    error_message = ? WHERE id = ?",
        )
        .bind(StepStatus::Pending.as_str())
        .bind(error_message)
        .bind(step_row_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Retries exhausted, terminal FAILED.
    pub async fn fail_step_permanently(
        &self,
        step_row_id: Uuid,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE steps SET status = ?, error_message = ?, completed_at = ? WHERE id = ?",
        )
        .bind(StepStatus::Failed.as_str())
        .bind(error_message)
        .bind(now.to_rfc3339())
        .bind(step_row_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Business objects
    // ---------------------------------------------------------------

    pub async fn create_business_object(
        &self,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO business_objects (id, status, amount, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(BusinessObjectStatus::Pending.as_str())
        .bind(amount)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_business_object(&self, id: Uuid) -> Result<BusinessObjectRow, StoreError> {
        let row = sqlx::query(
            "SELECT id, status, amount, created_at, updated_at FROM business_objects WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("business object {id}")))?;
        business_object_row_from_sql(row)
    }
}

fn workflow_row_from_sql(row: SqliteRow) -> Result<WorkflowRow, StoreError> {
    let id: String = row.try_get("id")?;
    let definition: String = row.try_get("definition")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(WorkflowRow {
        id: Uuid::parse_str(&id).expect("store-written uuid"),
        name: row.try_get("name")?,
        definition: serde_json::from_str(&definition)?,
        created_at: parse_ts(&created_at),
    })
}

fn run_row_from_sql(row: SqliteRow) -> Result<RunRow, StoreError> {
    let id: String = row.try_get("id")?;
    let workflow_id: String = row.try_get("workflow_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let business_object_id: Option<String> = row.try_get("business_object_id")?;
    Ok(RunRow {
        id: Uuid::parse_str(&id).expect("store-written uuid"),
        workflow_id: Uuid::parse_str(&workflow_id).expect("store-written uuid"),
        status: RunStatus::parse(&status),
        started_at: parse_opt_ts(started_at),
        completed_at: parse_opt_ts(completed_at),
        created_at: parse_ts(&created_at),
        business_object_id: business_object_id
            .map(|s| Uuid::parse_str(&s).expect("store-written uuid")),
    })
}

fn step_row_from_sql(row: SqliteRow) -> Result<StepRow, StoreError> {
    let id: String = row.try_get("id")?;
    let run_id: String = row.try_get("run_id")?;
    let status: String = row.try_get("status")?;
    let idempotency_key: Option<String> = row.try_get("idempotency_key")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(StepRow {
        id: Uuid::parse_str(&id).expect("store-written uuid"),
        run_id: Uuid::parse_str(&run_id).expect("store-written uuid"),
        step_id: row.try_get("step_id")?,
        step_index: row.try_get("step_index")?,
        status: StepStatus::parse(&status),
        idempotency_key: idempotency_key.map(|s| Uuid::parse_str(&s).expect("store-written uuid")),
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        started_at: parse_opt_ts(started_at),
        completed_at: parse_opt_ts(completed_at),
        error_message: row.try_get("error_message")?,
        created_at: parse_ts(&created_at),
        kind: row.try_get("kind")?,
        action: row.try_get("action")?,
        duration_seconds: row.try_get("duration_seconds")?,
        fail_probability: row.try_get("fail_probability")?,
    })
}

fn step_result_row_from_sql(row: SqliteRow) -> Result<StepResultRow, StoreError> {
    let idempotency_key: String = row.try_get("idempotency_key")?;
    let step_id: String = row.try_get("step_id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(StepResultRow {
        idempotency_key: Uuid::parse_str(&idempotency_key).expect("store-written uuid"),
        step_id: Uuid::parse_str(&step_id).expect("store-written uuid"),
        result_data: row.try_get("result_data")?,
        created_at: parse_ts(&created_at),
    })
}

fn business_object_row_from_sql(row: SqliteRow) -> Result<BusinessObjectRow, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(BusinessObjectRow {
        id: Uuid::parse_str(&id).expect("store-written uuid"),
        status: BusinessObjectStatus::parse(&status),
        amount: row.try_get("amount")?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}
