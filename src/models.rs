//! Shared data model: the workflow definition document, the planner's step
//! descriptor, and the persisted row shapes returned by the store.
//!
//! `WorkflowDefinition`/`StepDef` correspond to the document a caller
//! submits to create a workflow. The `*Status` enums and `*Row` structs
//! correspond to the engine's core entities (Workflow, Run, Step,
//! StepResult, BusinessObject).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_duration() -> f64 {
    1.0
}

fn default_fail_probability() -> f64 {
    0.0
}

fn default_max_retries() -> u32 {
    0
}

/// A workflow definition as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub steps: Vec<StepDef>,
}

/// One step descriptor inside a `WorkflowDefinition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub config: StepConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_seconds: f64,
    #[serde(default = "default_fail_probability")]
    pub fail_probability: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        StepConfig {
            action: None,
            duration_seconds: default_duration(),
            fail_probability: default_fail_probability(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => RunStatus::Pending,
            "RUNNING" => RunStatus::Running,
            "COMPLETED" => RunStatus::Completed,
            "FAILED" => RunStatus::Failed,
            other => panic!("unknown run status in store: {other}"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => StepStatus::Pending,
            "RUNNING" => StepStatus::Running,
            "COMPLETED" => StepStatus::Completed,
            "FAILED" => StepStatus::Failed,
            other => panic!("unknown step status in store: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessObjectStatus {
    Pending,
    Validated,
    Charged,
    Shipped,
}

impl BusinessObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessObjectStatus::Pending => "PENDING",
            BusinessObjectStatus::Validated => "VALIDATED",
            BusinessObjectStatus::Charged => "CHARGED",
            BusinessObjectStatus::Shipped => "SHIPPED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => BusinessObjectStatus::Pending,
            "VALIDATED" => BusinessObjectStatus::Validated,
            "CHARGED" => BusinessObjectStatus::Charged,
            "SHIPPED" => BusinessObjectStatus::Shipped,
            other => panic!("unknown business object status in store: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub definition: WorkflowDefinition,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub business_object_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct StepRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub step_id: String,
    pub step_index: i64,
    pub status: StepStatus,
    pub idempotency_key: Option<Uuid>,
    pub retry_count: i64,
    pub max_retries: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    // Carried alongside the row (not a column) so the executor/task runner
    // don't need to re-parse `definition.steps` on every attempt.
    pub kind: String,
    pub action: Option<String>,
    pub duration_seconds: f64,
    pub fail_probability: f64,
}

#[derive(Debug, Clone)]
pub struct StepResultRow {
    pub idempotency_key: Uuid,
    pub step_id: Uuid,
    pub result_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BusinessObjectRow {
    pub id: Uuid,
    pub status: BusinessObjectStatus,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only snapshot returned by `Core::get_run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub business_object_id: Option<Uuid>,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    pub step_id: String,
    pub step_index: i64,
    pub status: String,
    pub retry_count: i64,
    pub max_retries: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub id: Uuid,
    pub name: String,
    pub definition: WorkflowDefinition,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessObjectSnapshot {
    pub id: Uuid,
    pub status: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
