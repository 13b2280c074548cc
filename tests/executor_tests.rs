use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use tiny_agent_graph::actions::ActionRegistry;
use tiny_agent_graph::clock::testing::{ConstantRandom, SequenceRandom};
use tiny_agent_graph::clock::SystemClock;
use tiny_agent_graph::executor::{StepExecutor, StepOutcome};
use tiny_agent_graph::models::{StepConfig, StepDef, StepStatus, WorkflowDefinition};
use tiny_agent_graph::planner::plan;
use tiny_agent_graph::store::SqliteStore;

async fn test_store() -> Arc<SqliteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::from_pool(pool);
    store.migrate().await.unwrap();
    Arc::new(store)
}

fn step_def(id: &str, fail_probability: f64, max_retries: u32) -> StepDef {
    StepDef {
        id: id.to_string(),
        kind: "noop".to_string(),
        depends_on: vec![],
        config: StepConfig {
            action: None,
            duration_seconds: 0.0,
            fail_probability,
            max_retries,
        },
    }
}

#[tokio::test]
async fn always_succeeding_step_commits_one_result() {
    let store = test_store().await;
    let wf_id = Uuid::new_v4();
    let def = WorkflowDefinition {
        name: "t".into(),
        steps: vec![step_def("a", 0.0, 0)],
    };
    let ordered = plan(&def).unwrap();
    let now = chrono::Utc::now();
    let run_id = store.create_run(wf_id, None, &ordered, now).await.unwrap();
    let steps = store.get_steps_for_run(run_id).await.unwrap();
    let step = &steps[0];

    let executor = StepExecutor::new(
        store.clone(),
        Arc::new(ActionRegistry::new()),
        Arc::new(SystemClock),
        Arc::new(ConstantRandom(false)),
    );

    let outcome = executor.execute_once(run_id, None, step).await.unwrap();
    assert_eq!(outcome, StepOutcome::Success);

    let updated = store.get_step(step.id).await.unwrap();
    assert!(matches!(updated.status, StepStatus::Completed));
    let key = updated.idempotency_key.unwrap();
    assert!(store.find_step_result(key).await.unwrap().is_some());
}

#[tokio::test]
async fn exhausting_retries_marks_step_failed() {
    let store = test_store().await;
    let wf_id = Uuid::new_v4();
    let def = WorkflowDefinition {
        name: "t".into(),
        steps: vec![step_def("a", 1.0, 2)],
    };
    let ordered = plan(&def).unwrap();
    let now = chrono::Utc::now();
    let run_id = store.create_run(wf_id, None, &ordered, now).await.unwrap();

    let executor = StepExecutor::new(
        store.clone(),
        Arc::new(ActionRegistry::new()),
        Arc::new(SystemClock),
        Arc::new(ConstantRandom(true)),
    );

    let mut attempts = 0;
    loop {
        let steps = store.get_steps_for_run(run_id).await.unwrap();
        let step = &steps[0];
        attempts += 1;
        match executor.execute_once(run_id, None, step).await.unwrap() {
            StepOutcome::Retry => continue,
            StepOutcome::PermanentFailure => break,
            StepOutcome::Success => panic!("expected failure"),
        }
    }

    assert_eq!(attempts, 3); // initial attempt + 2 retries
    let steps = store.get_steps_for_run(run_id).await.unwrap();
    let step = &steps[0];
    assert!(matches!(step.status, StepStatus::Failed));
    assert_eq!(step.retry_count, 2);
    assert!(step.error_message.is_some());
}

#[tokio::test]
async fn retry_then_success_clears_error_eventually() {
    let store = test_store().await;
    let wf_id = Uuid::new_v4();
    let def = WorkflowDefinition {
        name: "t".into(),
        steps: vec![step_def("a", 0.5, 3)],
    };
    let ordered = plan(&def).unwrap();
    let now = chrono::Utc::now();
    let run_id = store.create_run(wf_id, None, &ordered, now).await.unwrap();

    let executor = StepExecutor::new(
        store.clone(),
        Arc::new(ActionRegistry::new()),
        Arc::new(SystemClock),
        Arc::new(SequenceRandom::new(vec![true, false])), // fail once, then succeed
    );

    let steps = store.get_steps_for_run(run_id).await.unwrap();
    let outcome1 = executor.execute_once(run_id, None, &steps[0]).await.unwrap();
    assert_eq!(outcome1, StepOutcome::Retry);

    let steps = store.get_steps_for_run(run_id).await.unwrap();
    assert!(steps[0].idempotency_key.is_none());
    let outcome2 = executor.execute_once(run_id, None, &steps[0]).await.unwrap();
    assert_eq!(outcome2, StepOutcome::Success);
}
