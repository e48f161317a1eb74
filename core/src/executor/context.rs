//! Program execution context
//!
//! One point in the symbolic state space. Contexts have value semantics:
//! `clone()` copies every frame and stack, so successors never alias their
//! predecessor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bindings::VariableBindings;
use super::errors::{ExecResult, ExecutionError};
use super::expressions::VariableLookup;
use super::resource_model::ResourceUsage;
use super::types::{Command, CommandId, Op, Program};
use crate::rational::Rational;

/// Value of an initial variable as seen from a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialValue {
    /// Not declared yet at this point of execution
    Undefined,
    Defined(Rational),
}

impl InitialValue {
    pub fn as_defined(&self) -> Option<&Rational> {
        match self {
            InitialValue::Defined(value) => Some(value),
            InitialValue::Undefined => None,
        }
    }
}

/// What happened at one time point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Power credited at this time point
    pub power: u64,
    /// Output values in emission order
    pub values: Vec<Rational>,
}

/// Flattened observation log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEntry {
    pub time: u64,
    pub power: u64,
    pub values: Vec<Rational>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// `None` once the program has terminated
    pub(crate) current: Option<CommandId>,
    /// Invoke commands awaiting their callee's return, innermost last
    pub(crate) invocations: Vec<CommandId>,
    pub(crate) non_atomic_active: bool,
    pub(crate) bindings: VariableBindings,
    pub(crate) initial: BTreeMap<String, Rational>,
    pub(crate) elapsed_time: u64,
    pub(crate) total_power: u64,
    pub(crate) observations: BTreeMap<u64, Observation>,
}

impl ExecutionContext {
    /// The context a program starts in
    pub fn new(program: &Program) -> Self {
        ExecutionContext {
            current: Some(program.first_command()),
            invocations: Vec::new(),
            non_atomic_active: false,
            bindings: VariableBindings::new(),
            initial: BTreeMap::new(),
            elapsed_time: 0,
            total_power: 0,
            observations: BTreeMap::new(),
        }
    }

    pub fn current_command(&self) -> Option<CommandId> {
        self.current
    }

    pub fn is_terminating(&self) -> bool {
        self.current.is_none()
    }

    pub fn invocation_stack(&self) -> &[CommandId] {
        &self.invocations
    }

    pub fn is_executing_non_atomic(&self) -> bool {
        self.non_atomic_active
    }

    pub fn bindings(&self) -> &VariableBindings {
        &self.bindings
    }

    /// Snapshot value of an initial variable
    pub fn initial_value(&self, name: &str) -> InitialValue {
        match self.initial.get(name) {
            Some(value) => InitialValue::Defined(value.clone()),
            None => InitialValue::Undefined,
        }
    }

    pub fn initial_values(&self) -> &BTreeMap<String, Rational> {
        &self.initial
    }

    pub fn elapsed_time(&self) -> u64 {
        self.elapsed_time
    }

    pub fn total_power(&self) -> u64 {
        self.total_power
    }

    /// Observation log ordered by time
    pub fn observations(&self) -> Vec<ObservationEntry> {
        self.observations
            .iter()
            .map(|(time, observation)| ObservationEntry {
                time: *time,
                power: observation.power,
                values: observation.values.clone(),
            })
            .collect()
    }

    /* ===================== Transitions ===================== */

    /// Tears down the command's block frames and moves to its successor.
    pub(crate) fn leave(&mut self, program: &Program, command: &Command) -> ExecResult<()> {
        self.bindings
            .destroy_block_frames(command.destroy_blocks)
            .map_err(ExecutionError::scope(command.id))?;
        self.transfer(program, command.next)
    }

    /// Moves to `next`, returning from finished invocations while `next`
    /// is `None`. An empty invocation stack terminates the program.
    pub(crate) fn transfer(&mut self, program: &Program, next: Option<CommandId>) -> ExecResult<()> {
        let mut next = next;
        while next.is_none() {
            let Some(invoke_id) = self.invocations.pop() else {
                self.current = None;
                return Ok(());
            };
            let invoke = program
                .command(invoke_id)
                .ok_or(ExecutionError::UnknownCommand(invoke_id))?;
            let Op::Invoke { function, .. } = &invoke.op else {
                return Err(ExecutionError::NotAnInvocation(invoke_id));
            };
            let callee = program
                .function(*function)
                .ok_or(ExecutionError::UnknownFunction(*function))?;

            self.bindings
                .destroy_function_frame()
                .map_err(ExecutionError::scope(invoke_id))?;
            self.bindings
                .destroy_block_frames(invoke.destroy_blocks)
                .map_err(ExecutionError::scope(invoke_id))?;
            if callee.is_non_atomic() {
                self.non_atomic_active = false;
            }
            next = invoke.next;
        }
        self.current = next;
        Ok(())
    }

    pub(crate) fn record_outputs(&mut self, values: Vec<Rational>) {
        self.observations
            .entry(self.elapsed_time)
            .or_default()
            .values
            .extend(values);
    }

    /// Adds one invocation's consumption, crediting the power at the new
    /// elapsed time. `None` on counter overflow.
    pub(crate) fn consume(&mut self, usage: ResourceUsage) -> Option<()> {
        self.elapsed_time = self.elapsed_time.checked_add(usage.time)?;
        self.total_power = self.total_power.checked_add(usage.power)?;
        if usage.power == 0 {
            return Some(());
        }
        let observation = self.observations.entry(self.elapsed_time).or_default();
        observation.power = observation.power.checked_add(usage.power)?;
        Some(())
    }
}

impl VariableLookup for ExecutionContext {
    fn lookup(&self, name: &str) -> Option<&Rational> {
        self.bindings.get(name)
    }
}
