//! Command execution handlers
//!
//! One handler per command kind. Each takes the context being executed and
//! returns every successor with its probability. The input context is never
//! modified; every successor is a fresh clone.

use tracing::trace;

use super::context::ExecutionContext;
use super::errors::{ExecResult, ExecutionError};
use super::expressions::{eval_arith, eval_bool};
use super::types::{Command, CommandId, Expr, FunctionId, FunctionKind, Program};
use crate::pmf::Pmf;

/// How an assignment-like command binds its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Update the innermost existing binding
    Assign,
    /// Declare in the innermost frame
    Declare,
    /// Declare in the innermost frame and record in the initial snapshot
    Initial,
}

/* ===================== Command Handlers ===================== */

/// Execute Skip command
pub fn execute_skip(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
) -> ExecResult<Pmf<ExecutionContext>> {
    let mut next = ctx.clone();
    next.leave(program, command)?;
    Ok(Pmf::certain(next))
}

/// Execute Assign, New and Initial commands
///
/// Each outcome of the literal distribution is evaluated against its own
/// clone, so `x := x + 1` reads the pre-assignment value once per branch.
pub fn execute_binding(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
    var: &str,
    values: &Pmf<Expr>,
    binding: Binding,
) -> ExecResult<Pmf<ExecutionContext>> {
    let mut successors = Pmf::new();

    for (expr, probability) in values.iter() {
        let mut next = ctx.clone();
        let value = eval_arith(expr, &next).map_err(ExecutionError::eval(command.id))?;

        let bound = match binding {
            Binding::Assign => next.bindings.assign(var, value),
            Binding::Declare => next.bindings.define(var, value),
            Binding::Initial => {
                next.initial.insert(var.to_string(), value.clone());
                next.bindings.define(var, value)
            }
        };
        bound.map_err(ExecutionError::scope(command.id))?;

        next.leave(program, command)?;
        successors.add(next, probability.clone());
    }

    finalise(command.id, successors)
}

/// Execute Output command
pub fn execute_output(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
    values: &[Expr],
) -> ExecResult<Pmf<ExecutionContext>> {
    let mut next = ctx.clone();
    let emitted = values
        .iter()
        .map(|expr| eval_arith(expr, &next))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ExecutionError::eval(command.id))?;

    next.record_outputs(emitted);
    next.leave(program, command)?;
    Ok(Pmf::certain(next))
}

/// Execute If command
pub fn execute_if(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
    test: &Expr,
    then_entry: CommandId,
    else_entry: Option<CommandId>,
) -> ExecResult<Pmf<ExecutionContext>> {
    let outcome = eval_bool(test, ctx).map_err(ExecutionError::eval(command.id))?;
    let mut next = ctx.clone();

    match (outcome, else_entry) {
        (true, _) => enter_block(&mut next, then_entry),
        (false, Some(else_entry)) => enter_block(&mut next, else_entry),
        (false, None) => next.leave(program, command)?,
    }
    Ok(Pmf::certain(next))
}

/// Execute While command
///
/// The body's last command leads back here, so each iteration's block frame
/// is gone before the test is evaluated again.
pub fn execute_while(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
    test: &Expr,
    body_entry: CommandId,
) -> ExecResult<Pmf<ExecutionContext>> {
    let outcome = eval_bool(test, ctx).map_err(ExecutionError::eval(command.id))?;
    let mut next = ctx.clone();

    if outcome {
        enter_block(&mut next, body_entry);
    } else {
        next.leave(program, command)?;
    }
    Ok(Pmf::certain(next))
}

/// Execute Invoke command
pub fn execute_invoke(
    program: &Program,
    ctx: &ExecutionContext,
    command: &Command,
    function: FunctionId,
    args: &[Expr],
) -> ExecResult<Pmf<ExecutionContext>> {
    let callee = program
        .function(function)
        .ok_or(ExecutionError::UnknownFunction(function))?;

    if callee.is_non_atomic() && ctx.non_atomic_active {
        return Err(ExecutionError::NonAtomicReentry {
            command: command.id,
            function: callee.signature.clone(),
        });
    }

    // Arguments see the caller's scope, not the new frame
    let values = args
        .iter()
        .map(|arg| eval_arith(arg, ctx))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ExecutionError::eval(command.id))?;

    let mut call = ctx.clone();
    call.invocations.push(command.id);
    call.bindings.create_function_frame();
    for (param, value) in callee.params.iter().zip(&values) {
        call.bindings
            .define(param, value.clone())
            .map_err(ExecutionError::scope(command.id))?;
    }
    call.current = Some(callee.entry);

    trace!(command = %command.id, function = %callee.signature, "invoke");

    let FunctionKind::NonAtomic { model } = &callee.kind else {
        return Ok(Pmf::certain(call));
    };

    call.non_atomic_active = true;
    let mut successors = Pmf::new();
    for (usage, probability) in model.lookup(&values) {
        let mut next = call.clone();
        next.consume(usage)
            .ok_or(ExecutionError::CounterOverflow(command.id))?;
        successors.add(next, probability);
    }
    finalise(command.id, successors)
}

/* ===================== Helpers ===================== */

fn enter_block(ctx: &mut ExecutionContext, entry: CommandId) {
    ctx.bindings.create_block_frame();
    ctx.current = Some(entry);
}

fn finalise(
    command: CommandId,
    successors: Pmf<ExecutionContext>,
) -> ExecResult<Pmf<ExecutionContext>> {
    successors
        .finalise()
        .map_err(|source| ExecutionError::Distribution { command, source })
}
