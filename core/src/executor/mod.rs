//! # Executor - probabilistic small-step semantics
//!
//! Executes resolved programs one command at a time. Every step returns a
//! distribution over successor contexts with exact rational probabilities.
//!
//! ## Core Principles
//!
//! 1. **Pure steps**: `execute` never mutates its input; successors are clones
//! 2. **Precomputed control flow**: every command knows its successor and how
//!    many block frames to drop before reaching it
//! 3. **Scoped bindings**: global, function and block frames in an arena
//! 4. **Resource accounting**: non-atomic calls consume modeled time and power

pub mod bindings;
pub mod canonical;
pub mod context;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod resource_model;
pub mod statements;
pub mod types;
pub mod valuations;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use bindings::{FrameHandle, FrameKind, ScopeFrame, VariableBindings};
pub use canonical::{canonical_form, canonical_hash};
pub use context::{ExecutionContext, InitialValue, Observation, ObservationEntry};
pub use errors::{ExecResult, ExecutionError, ScopeError};
pub use exec_loop::{execute, initial_context, is_terminating, run_deterministic};
pub use expressions::{eval_arith, eval_bool, EvalError, VariableLookup};
pub use resource_model::{FunctionModel, FunctionModels, ModelEntry, Pattern, ResourceUsage};
pub use valuations::{InitialValuations, Valuation};
