use tiny_agent_graph::models::{StepConfig, StepDef, WorkflowDefinition};
use tiny_agent_graph::planner::plan;

fn step(id: &str, depends_on: &[&str]) -> StepDef {
    StepDef {
        id: id.to_string(),
        kind: "noop".to_string(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        config: StepConfig::default(),
    }
}

#[test]
fn linear_chain_completes_in_order() {
    let def = WorkflowDefinition {
        name: "linear".into(),
        steps: vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])],
    };
    let ordered = plan(&def).unwrap();
    let ids: Vec<_> = ordered.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn fan_out_breaks_ties_by_input_position() {
    // a, b(depends_on=a), c(depends_on=a) presented out of order as [c, b, a].
    // Once "a" is dequeued, both "c" and "b" become ready at once; the
    // tie-break picks the smaller original input position, which is "c".
    let def = WorkflowDefinition {
        name: "fan-out".into(),
        steps: vec![step("c", &["a"]), step("b", &["a"]), step("a", &[])],
    };
    let ordered = plan(&def).unwrap();
    let ids: Vec<_> = ordered.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["a", "c", "b"]);
}

#[test]
fn diamond_dependency_orders_both_parents_before_child() {
    let def = WorkflowDefinition {
        name: "diamond".into(),
        steps: vec![
            step("start", &[]),
            step("left", &["start"]),
            step("right", &["start"]),
            step("end", &["left", "right"]),
        ],
    };
    let ordered = plan(&def).unwrap();
    let pos = |id: &str| ordered.iter().position(|s| s.id == id).unwrap();
    assert!(pos("start") < pos("left"));
    assert!(pos("start") < pos("right"));
    assert!(pos("left") < pos("end"));
    assert!(pos("right") < pos("end"));
}

#[test]
fn cycle_is_rejected() {
    let def = WorkflowDefinition {
        name: "cycle".into(),
        steps: vec![step("a", &["b"]), step("b", &["a"])],
    };
    assert!(plan(&def).is_err());
}

#[test]
fn forward_reference_is_allowed() {
    // "forward references allowed": a step may list a dependency that is
    // declared later in the input list.
    let def = WorkflowDefinition {
        name: "forward".into(),
        steps: vec![step("a", &["b"]), step("b", &[])],
    };
    let ordered = plan(&def).unwrap();
    let ids: Vec<_> = ordered.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn unknown_dependency_is_rejected() {
    let def = WorkflowDefinition {
        name: "bad-ref".into(),
        steps: vec![step("a", &["ghost"])],
    };
    assert!(plan(&def).is_err());
}

#[test]
fn duplicate_id_is_rejected() {
    let def = WorkflowDefinition {
        name: "dup".into(),
        steps: vec![step("a", &[]), step("a", &[])],
    };
    assert!(plan(&def).is_err());
}

#[test]
fn out_of_range_fail_probability_is_rejected() {
    let mut def = WorkflowDefinition {
        name: "bad-prob".into(),
        steps: vec![step("a", &[])],
    };
    def.steps[0].config.fail_probability = 1.5;
    assert!(plan(&def).is_err());
}

#[test]
fn negative_duration_is_rejected() {
    let mut def = WorkflowDefinition {
        name: "bad-duration".into(),
        steps: vec![step("a", &[])],
    };
    def.steps[0].config.duration_seconds = -1.0;
    assert!(plan(&def).is_err());
}
