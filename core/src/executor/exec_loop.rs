//! Core execution step
//!
//! `execute` is the transition relation of a program: given a context it
//! returns the exact distribution over successor contexts.

use tracing::trace;

use super::context::ExecutionContext;
use super::errors::{ExecResult, ExecutionError};
use super::statements::{
    execute_binding, execute_if, execute_invoke, execute_output, execute_skip, execute_while,
    Binding,
};
use super::types::{Op, Program};
use crate::pmf::Pmf;

/* ===================== Public API ===================== */

/// The context a program starts in
pub fn initial_context(program: &Program) -> ExecutionContext {
    ExecutionContext::new(program)
}

/// Has the program finished in this context?
pub fn is_terminating(ctx: &ExecutionContext) -> bool {
    ctx.is_terminating()
}

/// Execute one step
///
/// A terminated context loops to itself with probability one. Otherwise the
/// current command runs and every probabilistic choice it makes becomes an
/// outcome. The returned distribution always sums to exactly one.
pub fn execute(program: &Program, ctx: &ExecutionContext) -> ExecResult<Pmf<ExecutionContext>> {
    let Some(id) = ctx.current else {
        return Ok(Pmf::certain(ctx.clone()));
    };
    let command = program
        .command(id)
        .ok_or(ExecutionError::UnknownCommand(id))?;

    trace!(command = %command, "execute");

    match &command.op {
        Op::Skip => execute_skip(program, ctx, command),
        Op::Assign { var, values } => {
            execute_binding(program, ctx, command, var, values, Binding::Assign)
        }
        Op::New { var, values } => {
            execute_binding(program, ctx, command, var, values, Binding::Declare)
        }
        Op::Initial { var, values } => {
            execute_binding(program, ctx, command, var, values, Binding::Initial)
        }
        Op::Output { values } => execute_output(program, ctx, command, values),
        Op::If {
            test,
            then_entry,
            else_entry,
        } => execute_if(program, ctx, command, test, *then_entry, *else_entry),
        Op::While { test, body_entry } => execute_while(program, ctx, command, test, *body_entry),
        Op::Invoke { function, args } => execute_invoke(program, ctx, command, *function, args),
    }
}

/// Follow single-outcome steps until the program branches, terminates, or
/// `max_steps` runs out. Returns the last context reached.
///
/// Mostly useful for deterministic programs and tests.
pub fn run_deterministic(
    program: &Program,
    ctx: &ExecutionContext,
    max_steps: usize,
) -> ExecResult<ExecutionContext> {
    let mut current = ctx.clone();
    for _ in 0..max_steps {
        if current.is_terminating() {
            break;
        }
        let successors = execute(program, &current)?;
        if successors.len() != 1 {
            break;
        }
        match successors.into_iter().next() {
            Some((next, _)) => current = next,
            None => break,
        }
    }
    Ok(current)
}
