//! Error taxonomy for the engine.
//!
//! Validation errors surface immediately and are never persisted or
//! retried; store/task failures are folded into retry accounting inside
//! the executor; worker-internal errors are caught at the supervisor
//! boundary.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
    #[error("cycle detected: {0}")]
    CycleDetected(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("action failed: {0}")]
    ActionFailed(#[from] ActionError),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    Unknown(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("business object not found: {0}")]
    ObjectNotFound(Uuid),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("step not found: {0}")]
    StepNotFound(Uuid),
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),
    #[error("run not found: {0}")]
    RunNotFound(Uuid),
    #[error("business object not found: {0}")]
    BusinessObjectNotFound(Uuid),
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}
