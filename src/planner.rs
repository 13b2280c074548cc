//! TopoPlanner — validates a workflow definition and produces a
//! deterministic execution order.
//!
//! `petgraph::algo::toposort`'s internal iteration order doesn't promise the
//! "smallest input position among ready nodes" tie-break this planner
//! requires, so this is a hand-rolled Kahn's algorithm instead; `petgraph`
//! is dropped entirely (see DESIGN.md) since this algorithm detects cycles
//! on its own.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::PlannerError;
use crate::models::{StepDef, WorkflowDefinition};

/// Re-orders `def.steps` into a valid topological linearization.
///
/// Ties among currently-ready steps are broken by original input position,
/// so an already-sorted input is returned unchanged.
pub fn plan(def: &WorkflowDefinition) -> Result<Vec<StepDef>, PlannerError> {
    validate(def)?;

    let n = def.steps.len();
    let index_of: HashMap<&str, usize> = def
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    // adjacency: dependency -> dependents; in_degree: number of unmet deps
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    for (i, step) in def.steps.iter().enumerate() {
        for dep in &step.depends_on {
            let dep_idx = *index_of.get(dep.as_str()).expect("validated above");
            adjacency[dep_idx].push(i);
            in_degree[i] += 1;
        }
    }

    // Ready set ordered by original input index; a VecDeque doubles as a
    // min-position queue because we always push new-ready nodes in
    // increasing-index discovery order and only ever need the smallest
    // *remaining* index, which we restore by a full re-sort after each pop
    // to keep the ordering rule explicit and obviously correct.
    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    ready.sort_unstable();

    let mut ordered = Vec::with_capacity(n);
    let mut seen: HashSet<usize> = HashSet::new();

    while !ready.is_empty() {
        ready.sort_unstable();
        let idx = ready.remove(0);
        seen.insert(idx);
        ordered.push(def.steps[idx].clone());

        for &next in &adjacency[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(next);
            }
        }
    }

    if ordered.len() != n {
        let stuck = (0..n)
            .find(|i| !seen.contains(i))
            .map(|i| def.steps[i].id.clone())
            .unwrap_or_default();
        return Err(PlannerError::CycleDetected(format!(
            "workflow '{}' has a cycle involving step '{}'",
            def.name, stuck
        )));
    }

    Ok(ordered)
}

fn validate(def: &WorkflowDefinition) -> Result<(), PlannerError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &def.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(PlannerError::InvalidWorkflow(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }

    for step in &def.steps {
        for dep in &step.depends_on {
            if !seen_ids.contains(dep.as_str()) {
                return Err(PlannerError::InvalidWorkflow(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
        }

        let p = step.config.fail_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(PlannerError::InvalidWorkflow(format!(
                "step '{}' has fail_probability {} outside [0.0, 1.0]",
                step.id, p
            )));
        }

        if step.config.duration_seconds < 0.0 {
            return Err(PlannerError::InvalidWorkflow(format!(
                "step '{}' has negative duration_seconds {}",
                step.id, step.config.duration_seconds
            )));
        }
    }

    Ok(())
}
