//! Scope lifetime tests against running programs

use super::helpers::*;
use crate::executor::expressions::{eval_arith, EvalError};
use crate::executor::types::Expr;
use crate::executor::{initial_context, FrameKind};
use crate::rational::Rational;

#[test]
fn test_block_variable_unreachable_after_block() {
    let source = r#"
function main() {
    new x := 1;
    if x > 0 { new t := 5; output t }
    output x
}
main()
"#;
    let program = build_program(source);

    let inside = run_until(&program, &initial_context(&program), command_id(&program, "output t"));
    assert_eq!(var(&inside, "t"), Some(Rational::from(5)));

    let after = run_until(&program, &inside, command_id(&program, "output x"));
    assert_eq!(
        eval_arith(&Expr::var("t"), &after),
        Err(EvalError::UndefinedVariable("t".to_string()))
    );
}

#[test]
fn test_inner_declaration_shadows_outer() {
    let source = r#"
function main() {
    new x := 1;
    if true { new x := 2; output x }
    output x
}
main()
"#;
    let program = build_program(source);
    let done = run_to_end(&program, &initial_context(&program));

    let values: Vec<Rational> = done
        .observations()
        .into_iter()
        .flat_map(|entry| entry.values)
        .collect();
    assert_eq!(values, vec![Rational::from(2), Rational::from(1)]);
}

#[test]
fn test_assignment_updates_innermost_binding() {
    let source = r#"
initial g := 0;
function main() {
    if true { g := 4 }
    output g
}
main()
"#;
    let program = build_program(source);
    let ctx = run_until(&program, &initial_context(&program), command_id(&program, "output g"));

    assert_eq!(var(&ctx, "g"), Some(Rational::from(4)));
    assert_eq!(ctx.bindings().frames()[0].get("g"), Some(&Rational::from(4)));
}

#[test]
fn test_loop_body_frame_fresh_each_iteration() {
    // `new` inside the body would collide if frames leaked between iterations
    let source = r#"
function main() {
    new i := 0;
    while i < 3 {
        new step := i * 2;
        i := i + 1
    }
}
main()
"#;
    let program = build_program(source);
    let done = run_to_end(&program, &initial_context(&program));

    assert!(done.is_terminating());
    assert_eq!(done.bindings().depth(), 1);
}

#[test]
fn test_current_scope_skips_caller_frames() {
    let source = r#"
function f() { output 0 }
function main() {
    new local := 1;
    if true { f() }
}
main()
"#;
    let program = build_program(source);
    let ctx = run_until(&program, &initial_context(&program), command_id(&program, "output 0"));

    let kinds: Vec<FrameKind> = ctx
        .bindings()
        .current_scope()
        .iter()
        .map(|handle| ctx.bindings().frame(*handle).unwrap().kind())
        .collect();
    assert_eq!(kinds, vec![FrameKind::Function, FrameKind::Global]);
    assert_eq!(var(&ctx, "local"), None);

    // main's function frame and its block are still on the stack
    assert_eq!(ctx.bindings().depth(), 4);
}
