//! Runtime error types

use super::expressions::EvalError;
use super::types::{CommandId, FunctionId, Signature};
use crate::pmf::PmfError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("variable '{0}' is already defined in this scope")]
    AlreadyDefined(String),

    #[error("variable '{0}' is not defined in the current scope")]
    Undefined(String),

    #[error("no open block frame to destroy")]
    NoBlockFrame,

    #[error("no function frame to destroy")]
    NoFunctionFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("command {command}: {source}")]
    Eval {
        command: CommandId,
        source: EvalError,
    },

    #[error("command {command}: {source}")]
    Scope {
        command: CommandId,
        source: ScopeError,
    },

    #[error("command {command}: non-atomic function '{function}' invoked while another non-atomic function is executing")]
    NonAtomicReentry {
        command: CommandId,
        function: Signature,
    },

    #[error("command {command}: {source}")]
    Distribution {
        command: CommandId,
        source: PmfError,
    },

    #[error("command {0}: elapsed time or power counter overflowed")]
    CounterOverflow(CommandId),

    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    #[error("unknown function {0}")]
    UnknownFunction(FunctionId),

    #[error("command {0} on the invocation stack is not an invocation")]
    NotAnInvocation(CommandId),
}

impl ExecutionError {
    pub(crate) fn eval(command: CommandId) -> impl FnOnce(EvalError) -> ExecutionError {
        move |source| ExecutionError::Eval { command, source }
    }

    pub(crate) fn scope(command: CommandId) -> impl FnOnce(ScopeError) -> ExecutionError {
        move |source| ExecutionError::Scope { command, source }
    }
}

pub type ExecResult<T> = Result<T, ExecutionError>;
