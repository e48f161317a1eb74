use super::*;
use crate::executor::types::Signature;
use crate::parser::control_flow::resolve_control_flow;
use crate::parser::semantic_validator::check_program;
use crate::parser::{parse_function_models, parse_program};

fn build(source: &str, models: Option<&str>) -> Program {
    let program = parse_program(source).expect("Parse should succeed");
    let models = models.map(|m| parse_function_models(m).expect("Model parse should succeed"));
    let checked = check_program(program, models.as_ref()).expect("Check should succeed");
    resolve_control_flow(checked).expect("Resolution should succeed")
}

fn explore(source: &str, options: ExplorerOptions) -> StateSpace {
    Explorer::new(&build(source, None), options)
        .explore()
        .expect("Exploration should succeed")
}

fn all_transitions() -> ExplorerOptions {
    ExplorerOptions {
        collapse_deterministic: false,
        ..ExplorerOptions::default()
    }
}

fn outgoing_total(space: &StateSpace, id: usize) -> Rational {
    space.transitions_from(id).map(|t| &t.probability).sum()
}

// ============================================================================
// Basic Structure
// ============================================================================

#[test]
fn test_every_state_distribution_sums_to_one() {
    let source = r#"
initial x := {0 -> 1/3, 1 -> 1/3, 2 -> 1/3};
function main() {
    new y := {x -> 1/2, x + 1 -> 1/2};
    output y
}
main()
"#;
    let space = explore(source, all_transitions());

    for state in &space.states {
        assert!(
            outgoing_total(&space, state.id).is_one(),
            "state {} is not normalised",
            state.id
        );
    }
}

#[test]
fn test_terminating_states_self_loop_with_label() {
    let space = explore("function main() { output 1 } main()", all_transitions());

    let terminal: Vec<&State> = space.terminating_states().collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].labels, vec![TERMINATE_LABEL.to_string()]);

    let loops: Vec<&Transition> = space.transitions_from(terminal[0].id).collect();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].to, terminal[0].id);
    assert!(loops[0].probability.is_one());
}

#[test]
fn test_converging_branches_share_a_state() {
    let source = r#"
function main() {
    new x := {1 -> 1/2, 2 -> 1/2};
    x := 0;
    output x
}
main()
"#;
    let space = explore(source, all_transitions());

    assert_eq!(space.terminating_states().count(), 1);
    let merged_target = space
        .states
        .iter()
        .filter(|s| {
            space
                .transitions
                .iter()
                .filter(|t| t.to == s.id && t.from != s.id)
                .count()
                == 2
        })
        .count();
    assert_eq!(merged_target, 1);
}

#[test]
fn test_same_step_merges_sum_probabilities() {
    let source = "function main() { new x := {1 -> 1/4, 2 -> 3/4}; x := 0 } main()";
    let space = explore(source, ExplorerOptions::default());

    let branching = space
        .transitions_from(space.initial_state)
        .next()
        .map(|t| t.to)
        .unwrap();

    // Both branches collapse onto the same terminating state
    let merged: Vec<&Transition> = space.transitions_from(branching).collect();
    assert_eq!(merged.len(), 1);
    assert!(merged[0].probability.is_one());
    assert!(space.state(merged[0].to).unwrap().is_terminating());
}

#[test]
fn test_initial_valuation_per_state() {
    let source = r#"
initial x := {1 -> 1/2, 2 -> 1/2};
function main() { skip }
main()
"#;
    let space = explore(source, all_transitions());

    let start = space.state(space.initial_state).unwrap();
    assert_eq!(
        start.initial,
        vec![("x".to_string(), InitialValue::Undefined)]
    );

    let defined: Vec<_> = space
        .terminating_states()
        .map(|s| s.initial[0].1.clone())
        .collect();
    assert_eq!(defined.len(), 2);
    assert!(defined.contains(&InitialValue::Defined(Rational::from(2))));
}

// ============================================================================
// Collapsing
// ============================================================================

#[test]
fn test_collapse_skips_deterministic_steps() {
    let source = r#"
function main() {
    new a := 1;
    new b := 2;
    output a + b
}
main()
"#;
    let full = explore(source, all_transitions());
    let collapsed = explore(source, ExplorerOptions::default());

    assert!(collapsed.states.len() < full.states.len());
    assert_eq!(collapsed.states.len(), 2);
    assert_eq!(collapsed.terminating_states().count(), 1);
}

#[test]
fn test_collapse_stops_on_repeated_context() {
    let source = "function main() { while true { skip } } main()";
    let space = explore(source, ExplorerOptions::default());

    assert_eq!(space.terminating_states().count(), 0);
    for state in &space.states {
        assert!(outgoing_total(&space, state.id).is_one());
    }
}

#[test]
fn test_infinite_loop_without_collapse_is_finite() {
    let source = "function main() { while true { skip } } main()";
    let space = explore(source, all_transitions());

    // entry, while header, skip in body
    assert_eq!(space.states.len(), 3);
}

// ============================================================================
// Rewards
// ============================================================================

#[test]
fn test_transitions_carry_consumed_resources() {
    let source = r#"
function f(a) { skip }
function main() { f(1); f(2) }
main()
"#;
    let models = "model f/1 := { (1) -> (2, 3), (_) -> {(1, 1) -> 1/2, (5, 0) -> 1/2} }";
    let program = build(source, Some(models));
    let space = Explorer::new(&program, all_transitions()).explore().unwrap();

    let rewarded: Vec<(u64, u64)> = space
        .transitions
        .iter()
        .filter(|t| t.time > 0 || t.power > 0)
        .map(|t| (t.time, t.power))
        .collect();
    assert_eq!(rewarded.len(), 3);
    assert!(rewarded.contains(&(2, 3)));
    assert!(rewarded.contains(&(1, 1)));
    assert!(rewarded.contains(&(5, 0)));

    let mut finals: Vec<(u64, u64)> = space
        .terminating_states()
        .map(|s| (s.elapsed_time, s.total_power))
        .collect();
    finals.sort();
    assert_eq!(finals, vec![(3, 4), (7, 3)]);
}

// ============================================================================
// Failures and Output
// ============================================================================

#[test]
fn test_state_limit() {
    let source = r#"
function main() {
    new i := 0;
    while i < 100 { i := i + 1 }
}
main()
"#;
    let result = Explorer::new(
        &build(source, None),
        ExplorerOptions {
            max_states: 10,
            collapse_deterministic: false,
        },
    )
    .explore();

    assert!(matches!(result, Err(ExploreError::StateLimit(10))));
}

#[test]
fn test_state_limit_bounds_collapsed_runs() {
    let source = "function main() { new i := 0; while true { i := i + 1 } } main()";
    let result = Explorer::new(
        &build(source, None),
        ExplorerOptions {
            max_states: 10,
            collapse_deterministic: true,
        },
    )
    .explore();

    assert!(matches!(result, Err(ExploreError::StateLimit(10))));
}

#[test]
fn test_execution_error_reported_with_state() {
    let source = r#"
function f(n) { if n > 0 { f(n - 1) } }
f(1)
"#;
    let program = build(source, Some("model f/1 := { (_) -> (1, 1) }"));
    let err = Explorer::new(&program, all_transitions())
        .explore()
        .unwrap_err();

    match err {
        ExploreError::Execution { source, .. } => assert!(matches!(
            source,
            ExecutionError::NonAtomicReentry { ref function, .. } if *function == Signature::new("f", 1)
        )),
        other => panic!("expected execution error, got {}", other),
    }
}

#[test]
fn test_state_space_serializes() {
    let space = explore(
        "initial x := {1 -> 1/2, 2 -> 1/2}; function main() { output x } main()",
        ExplorerOptions::default(),
    );

    let json: serde_json::Value = serde_json::from_str(&space.to_json().unwrap()).unwrap();
    assert_eq!(json["initial_state"], 0);
    assert_eq!(
        json["states"].as_array().unwrap().len(),
        space.states.len()
    );
    assert_eq!(json["transitions"][0]["probability"], "1/2");
}
