//! Test helpers for executor tests
//!
//! Common utilities for building programs and stepping through them

use crate::executor::types::{CommandId, Program};
use crate::executor::{execute, ExecutionContext};
use crate::parser::control_flow::resolve_control_flow;
use crate::parser::semantic_validator::check_program;
use crate::parser::{parse_function_models, parse_program};
use crate::pmf::Pmf;
use crate::rational::Rational;

/// Parse, check and resolve a program without resource models
pub fn build_program(source: &str) -> Program {
    let program = parse_program(source).expect("Parse program failed");
    let checked = check_program(program, None).expect("Program check failed");
    resolve_control_flow(checked).expect("Control-flow resolution failed")
}

/// Parse, check and resolve a program against a function-model file
pub fn build_program_with_models(source: &str, models: &str) -> Program {
    let program = parse_program(source).expect("Parse program failed");
    let models = parse_function_models(models).expect("Parse models failed");
    let checked = check_program(program, Some(&models)).expect("Program check failed");
    resolve_control_flow(checked).expect("Control-flow resolution failed")
}

/// Execute one step that must have exactly one outcome
pub fn step(program: &Program, ctx: &ExecutionContext) -> ExecutionContext {
    let successors = execute(program, ctx).expect("Execution failed");
    assert_eq!(
        successors.len(),
        1,
        "expected a single successor at {:?}",
        ctx.current_command()
    );
    let (next, probability) = successors.into_iter().next().expect("one successor");
    assert!(probability.is_one());
    next
}

/// Step a deterministic program until it terminates
pub fn run_to_end(program: &Program, ctx: &ExecutionContext) -> ExecutionContext {
    let mut ctx = ctx.clone();
    for _ in 0..10_000 {
        if ctx.is_terminating() {
            return ctx;
        }
        ctx = step(program, &ctx);
    }
    panic!("program did not terminate");
}

/// Step until the current command is `target`
pub fn run_until(program: &Program, ctx: &ExecutionContext, target: CommandId) -> ExecutionContext {
    let mut ctx = ctx.clone();
    for _ in 0..10_000 {
        if ctx.current_command() == Some(target) {
            return ctx;
        }
        assert!(!ctx.is_terminating(), "terminated before reaching {}", target);
        ctx = step(program, &ctx);
    }
    panic!("command {} never reached", target);
}

/// Id of the first command whose listing starts with `prefix`
pub fn command_id(program: &Program, prefix: &str) -> CommandId {
    program
        .commands()
        .iter()
        .find(|command| command.op.to_string().starts_with(prefix))
        .map(|command| command.id)
        .unwrap_or_else(|| panic!("no command starting with '{}'", prefix))
}

pub fn total(pmf: &Pmf<ExecutionContext>) -> Rational {
    pmf.total()
}

pub fn rat(numer: i64, denom: i64) -> Rational {
    Rational::new(numer, denom).expect("non-zero denominator")
}

pub fn var(ctx: &ExecutionContext, name: &str) -> Option<Rational> {
    ctx.bindings().get(name).cloned()
}
