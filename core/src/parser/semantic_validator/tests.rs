//! Tests for the semantic checker

use super::*;
use crate::executor::resource_model::{Pattern, ResourceUsage};
use crate::executor::types::{BinaryOp, FunctionDef};
use crate::parser::{parse_function_models, parse_program};
use crate::pmf::Pmf;

// ============================================================================
// Helper Functions
// ============================================================================

fn check(source: &str) -> CheckResult<CheckedProgram> {
    let program = parse_program(source).expect("Parse should succeed");
    check_program(program, None)
}

fn check_with_models(source: &str, models: &str) -> CheckResult<CheckedProgram> {
    let program = parse_program(source).expect("Parse should succeed");
    let models = parse_function_models(models).expect("Model parse should succeed");
    check_program(program, Some(&models))
}

fn error_kind(source: &str) -> SemanticErrorKind {
    check(source).expect_err("Check should fail").kind
}

fn entry_call(name: &str) -> Stmt {
    Stmt::new(StmtKind::Invoke {
        function: name.to_string(),
        args: vec![],
    })
}

fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        body: Block::new(body),
        span: Span::default(),
    }
}

// ============================================================================
// Well-formed Programs
// ============================================================================

#[test]
fn test_accepts_simple_program() {
    let source = r#"
initial x := {0 -> 1/2, 1 -> 1/2};
function main() {
    new y := x + 1;
    output y
}
main()
"#;

    let checked = check(source).unwrap();
    assert_eq!(checked.functions.len(), 1);
    // initial, new, output, entry
    assert_eq!(checked.command_count, 4);
}

#[test]
fn test_command_ids_are_distinct_and_dense() {
    let source = r#"
function main() {
    new i := 0;
    while i < 3 {
        i := i + 1;
        if i == 2 { output i } else { skip }
    }
}
main()
"#;

    let checked = check(source).unwrap();
    let mut ids = Vec::new();
    fn collect(stmts: &[Stmt], ids: &mut Vec<usize>) {
        for stmt in stmts {
            ids.push(stmt.id.expect("every statement gets an id").0);
            match &stmt.kind {
                StmtKind::If { then_s, else_s, .. } => {
                    collect(&then_s.body, ids);
                    if let Some(else_s) = else_s {
                        collect(&else_s.body, ids);
                    }
                }
                StmtKind::While { body, .. } => collect(&body.body, ids),
                _ => {}
            }
        }
    }
    collect(&checked.program.functions[0].body.body, &mut ids);
    ids.push(checked.program.entry.id.unwrap().0);

    ids.sort();
    assert_eq!(ids, (0..checked.command_count).collect::<Vec<_>>());
}

#[test]
fn test_functions_may_call_later_functions() {
    let source = r#"
function main() { helper(1) }
function helper(n) { output n }
main()
"#;

    assert!(check(source).is_ok());
}

#[test]
fn test_overloading_by_arity() {
    let source = r#"
function f(a) { output a }
function f(a, b) { output a, b }
function main() { f(1); f(1, 2) }
main()
"#;

    let checked = check(source).unwrap();
    assert_eq!(checked.functions.len(), 3);
    assert_eq!(
        checked.functions.lookup(&Signature::new("f", 2)),
        Some(FunctionId(1))
    );
}

#[test]
fn test_globals_visible_in_functions() {
    let source = r#"
initial g := 5;
function main() { g := g - 1 }
main()
"#;

    assert!(check(source).is_ok());
}

#[test]
fn test_shadowing_in_nested_block() {
    let source = r#"
function main() {
    new x := 1;
    if x > 0 { new x := 2; output x }
}
main()
"#;

    assert!(check(source).is_ok());
}

#[test]
fn test_later_initial_may_use_earlier_one() {
    let source = r#"
initial a := {1 -> 1/3, 2 -> 2/3};
initial b := a * 2;
function main() { output a, b }
main()
"#;

    assert!(check(source).is_ok());
}

// ============================================================================
// Scope Errors
// ============================================================================

#[test]
fn test_undefined_variable_in_expression() {
    let source = "function main() { output y } main()";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("y".to_string())
    );
}

#[test]
fn test_assignment_to_undeclared_variable() {
    let source = "function main() { y := 1 } main()";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("y".to_string())
    );
}

#[test]
fn test_declaration_cannot_reference_itself() {
    let source = "function main() { new x := x + 1 } main()";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("x".to_string())
    );
}

#[test]
fn test_block_variable_unreachable_after_block() {
    let source = r#"
function main() {
    if true { new t := 1 }
    output t
}
main()
"#;

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("t".to_string())
    );
}

#[test]
fn test_caller_locals_invisible_to_callee() {
    let source = r#"
function callee() { output secret }
function main() { new secret := 1; callee() }
main()
"#;

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("secret".to_string())
    );
}

#[test]
fn test_duplicate_declaration_in_same_frame() {
    let source = "function main() { new x := 1; new x := 2 } main()";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::DuplicateVariable("x".to_string())
    );
}

#[test]
fn test_local_shadowing_parameter_rejected() {
    let source = "function f(a) { new a := 1 } f(0)";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::DuplicateVariable("a".to_string())
    );
}

#[test]
fn test_duplicate_initial() {
    let source = r#"
initial x := 1;
initial x := 2;
function main() { skip }
main()
"#;

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::DuplicateVariable("x".to_string())
    );
}

#[test]
fn test_duplicate_parameter() {
    let source = "function f(a, a) { skip } f(1, 2)";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::DuplicateParameter {
            function: "f".to_string(),
            name: "a".to_string(),
        }
    );
}

// ============================================================================
// Function Errors
// ============================================================================

#[test]
fn test_duplicate_function() {
    let source = r#"
function f(a) { skip }
function f(b) { skip }
f(1)
"#;

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::DuplicateFunction(Signature::new("f", 1))
    );
}

#[test]
fn test_undefined_function_wrong_arity() {
    let source = r#"
function f(a) { skip }
function main() { f(1, 2) }
main()
"#;

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedFunction(Signature::new("f", 2))
    );
}

#[test]
fn test_undefined_entry_function() {
    assert_eq!(
        error_kind("function f() { skip } g()"),
        SemanticErrorKind::UndefinedFunction(Signature::new("g", 0))
    );
}

#[test]
fn test_entry_must_be_invocation() {
    let program = ProgramDef {
        initials: vec![],
        functions: vec![function("main", &[], vec![Stmt::new(StmtKind::Skip)])],
        entry: Stmt::new(StmtKind::Skip),
        span: Span::default(),
    };

    let err = check_program(program, None).unwrap_err();
    assert_eq!(err.kind, SemanticErrorKind::InvalidEntry);
}

// ============================================================================
// Block and Statement Shape
// ============================================================================

#[test]
fn test_empty_block_rejected() {
    let source = "function main() { if true { } } main()";

    assert_eq!(error_kind(source), SemanticErrorKind::EmptyBlock);
}

#[test]
fn test_empty_function_body_rejected() {
    assert_eq!(
        error_kind("function main() { } main()"),
        SemanticErrorKind::EmptyBlock
    );
}

#[test]
fn test_initial_inside_function_rejected() {
    let initial = Stmt::new(StmtKind::Initial {
        var: "x".to_string(),
        value: Distribution::certain(Expr::num(1)),
    });
    let program = ProgramDef {
        initials: vec![],
        functions: vec![function("main", &[], vec![initial])],
        entry: entry_call("main"),
        span: Span::default(),
    };

    let err = check_program(program, None).unwrap_err();
    assert_eq!(err.kind, SemanticErrorKind::MisplacedInitial("x".to_string()));
}

#[test]
fn test_empty_output_rejected() {
    let program = ProgramDef {
        initials: vec![],
        functions: vec![function(
            "main",
            &[],
            vec![Stmt::new(StmtKind::Output { values: vec![] })],
        )],
        entry: entry_call("main"),
        span: Span::default(),
    };

    let err = check_program(program, None).unwrap_err();
    assert_eq!(err.kind, SemanticErrorKind::EmptyOutput);
}

// ============================================================================
// Sorts
// ============================================================================

#[test]
fn test_boolean_operand_in_arithmetic() {
    let bad = Expr::binary(BinaryOp::Add, Expr::bool(true), Expr::num(1));
    let program = ProgramDef {
        initials: vec![],
        functions: vec![function(
            "main",
            &[],
            vec![Stmt::new(StmtKind::Output { values: vec![bad] })],
        )],
        entry: entry_call("main"),
        span: Span::default(),
    };

    let err = check_program(program, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemanticErrorKind::SortMismatch {
            expected: Sort::Arithmetic,
            expr: "true".to_string(),
        }
    );
}

#[test]
fn test_arithmetic_condition_rejected() {
    let program = ProgramDef {
        initials: vec![],
        functions: vec![function(
            "main",
            &[],
            vec![Stmt::new(StmtKind::While {
                test: Expr::num(1),
                body: Block::new(vec![Stmt::new(StmtKind::Skip)]),
            })],
        )],
        entry: entry_call("main"),
        span: Span::default(),
    };

    let err = check_program(program, None).unwrap_err();
    assert!(matches!(
        err.kind,
        SemanticErrorKind::SortMismatch {
            expected: Sort::Boolean,
            ..
        }
    ));
}

// ============================================================================
// Distributions
// ============================================================================

#[test]
fn test_distribution_must_sum_to_one() {
    let source = "function main() { new x := {1 -> 1/2, 2 -> 1/4} } main()";

    assert!(matches!(
        error_kind(source),
        SemanticErrorKind::InvalidDistribution(PmfError::NotNormalised(_))
    ));
}

#[test]
fn test_distribution_rejects_duplicate_outcomes() {
    let source = "function main() { new x := {1 -> 1/2, 1 -> 1/2} } main()";

    assert!(matches!(
        error_kind(source),
        SemanticErrorKind::InvalidDistribution(PmfError::DuplicateOutcome(_))
    ));
}

#[test]
fn test_distribution_rejects_zero_probability() {
    let source = "function main() { new x := {1 -> 0, 2 -> 1} } main()";

    assert!(matches!(
        error_kind(source),
        SemanticErrorKind::InvalidDistribution(PmfError::NonPositive(_))
    ));
}

#[test]
fn test_distribution_outcomes_checked_for_scope() {
    let source = "function main() { new x := {z -> 1/2, 1 -> 1/2} } main()";

    assert_eq!(
        error_kind(source),
        SemanticErrorKind::UndefinedVariable("z".to_string())
    );
}

// ============================================================================
// Resource Models
// ============================================================================

#[test]
fn test_model_marks_function_non_atomic() {
    let source = r#"
function send(n) { output n }
function main() { send(3) }
main()
"#;
    let models = "model send/1 := { (_) -> (2, 5) }";

    let checked = check_with_models(source, models).unwrap();
    let send = checked
        .functions
        .lookup(&Signature::new("send", 1))
        .and_then(|id| checked.functions.get(id))
        .unwrap();
    let main = checked
        .functions
        .lookup(&Signature::new("main", 0))
        .and_then(|id| checked.functions.get(id))
        .unwrap();

    assert!(matches!(send.kind, FunctionKind::NonAtomic { .. }));
    assert_eq!(main.kind, FunctionKind::Atomic);
}

#[test]
fn test_model_without_function_is_ignored() {
    let source = "function main() { skip } main()";
    let models = "model other/2 := { (_, _) -> (1, 1) }";

    assert!(check_with_models(source, models).is_ok());
}

#[test]
fn test_model_pattern_arity_mismatch() {
    let source = "function send(n) { skip } send(1)";
    let models = "model send/1 := { (_, 0) -> (1, 1) }";

    let err = check_with_models(source, models).unwrap_err();
    assert!(matches!(err.kind, SemanticErrorKind::InvalidModel { .. }));
    assert!(err.to_string().contains("expected 1"));
}

#[test]
fn test_model_usage_must_sum_to_one() {
    let source = "function send(n) { skip } send(1)";
    let models = "model send/1 := { (_) -> {(1, 1) -> 1/2, (2, 2) -> 1/3} }";

    let err = check_with_models(source, models).unwrap_err();
    assert!(err.to_string().contains("sum to 5/6"));
}

#[test]
fn test_model_repeated_pattern() {
    let mut models = FunctionModels::new();
    let model = FunctionModel::new(Signature::new("send", 1))
        .with_entry(
            vec![Pattern::Exact(Rational::from(1))],
            Pmf::certain(ResourceUsage::new(1, 1)),
        )
        .with_entry(
            vec![Pattern::Exact(Rational::from(1))],
            Pmf::certain(ResourceUsage::new(2, 2)),
        );
    models.insert(model).unwrap();

    let program = parse_program("function send(n) { skip } send(1)").unwrap();
    let err = check_program(program, Some(&models)).unwrap_err();
    assert!(err.to_string().contains("repeats"));
}

// ============================================================================
// Error Display
// ============================================================================

#[test]
fn test_error_display_includes_position() {
    let source = "function main() {\n    output nope\n}\nmain()";

    let err = check(source).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("error at line 2"), "got: {}", message);
    assert!(message.contains("'nope'"));
}

#[test]
fn test_error_display_without_span() {
    let err = SemanticError::without_span(SemanticErrorKind::EmptyBlock);
    assert_eq!(
        err.to_string(),
        "error: a block must contain at least one command"
    );
}
