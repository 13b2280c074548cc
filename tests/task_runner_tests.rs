use tiny_agent_graph::clock::testing::ConstantRandom;
use tiny_agent_graph::task_runner::{run_task, TaskOutcome, TaskSpec};

#[tokio::test]
async fn zero_fail_probability_always_succeeds() {
    let spec = TaskSpec {
        duration_seconds: 0.0,
        fail_probability: 0.0,
    };
    let rng = ConstantRandom(true); // even a "fail" RNG must not matter at p=0
    assert_eq!(run_task(&spec, &rng).await, TaskOutcome::Success);
}

#[tokio::test]
async fn one_fail_probability_always_fails() {
    let spec = TaskSpec {
        duration_seconds: 0.0,
        fail_probability: 1.0,
    };
    let rng = ConstantRandom(false); // even a "succeed" RNG must not matter at p=1
    assert_eq!(run_task(&spec, &rng).await, TaskOutcome::Fail);
}
