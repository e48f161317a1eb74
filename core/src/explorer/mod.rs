//! State-space exploration
//!
//! Builds the finite probabilistic transition system of a program by
//! breadth-first search from its initial context. Contexts that render to the
//! same canonical form are one state. Hashes index the state table, and every
//! hash hit is confirmed against the full canonical form before two contexts
//! are merged.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use crate::executor::canonical::{canonical_form, hash_form};
use crate::executor::types::{Op, Program};
use crate::executor::{
    execute, initial_context, ExecutionContext, ExecutionError, InitialValue, ObservationEntry,
};
use crate::rational::Rational;

#[cfg(test)]
mod tests;

/// Label attached to terminating states
pub const TERMINATE_LABEL: &str = "terminate";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExploreError {
    #[error("state space exceeds the limit of {0} states")]
    StateLimit(usize),

    #[error("state {state}: {source}")]
    Execution {
        state: usize,
        source: ExecutionError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplorerOptions {
    pub max_states: usize,
    /// Follow single-outcome steps without creating intermediate states
    pub collapse_deterministic: bool,
}

impl Default for ExplorerOptions {
    fn default() -> Self {
        ExplorerOptions {
            max_states: 100_000,
            collapse_deterministic: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub id: usize,
    pub hash: String,
    pub labels: Vec<String>,
    pub elapsed_time: u64,
    pub total_power: u64,
    /// Every initial variable of the program, declared or not
    pub initial: Vec<(String, InitialValue)>,
    pub observations: Vec<ObservationEntry>,
    #[serde(skip)]
    pub context: ExecutionContext,
}

impl State {
    pub fn is_terminating(&self) -> bool {
        self.context.is_terminating()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub probability: Rational,
    /// Time consumed by this transition
    pub time: u64,
    /// Power consumed by this transition
    pub power: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSpace {
    pub initial_state: usize,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
}

impl StateSpace {
    pub fn state(&self, id: usize) -> Option<&State> {
        self.states.get(id)
    }

    pub fn transitions_from(&self, id: usize) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.from == id)
    }

    pub fn terminating_states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().filter(|state| state.is_terminating())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Explorer<'p> {
    program: &'p Program,
    options: ExplorerOptions,
    initial_vars: Vec<String>,
    states: Vec<State>,
    forms: Vec<String>,
    by_hash: HashMap<String, Vec<usize>>,
    transitions: Vec<Transition>,
    queue: VecDeque<usize>,
}

impl<'p> Explorer<'p> {
    pub fn new(program: &'p Program, options: ExplorerOptions) -> Self {
        let initial_vars = program
            .initial_commands()
            .filter_map(|command| match &command.op {
                Op::Initial { var, .. } => Some(var.clone()),
                _ => None,
            })
            .collect();

        Explorer {
            program,
            options,
            initial_vars,
            states: Vec::new(),
            forms: Vec::new(),
            by_hash: HashMap::new(),
            transitions: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Explore every state reachable from the initial context
    pub fn explore(mut self) -> Result<StateSpace, ExploreError> {
        let (initial_state, _) = self.intern(initial_context(self.program))?;

        while let Some(id) = self.queue.pop_front() {
            let current = self.states[id].context.clone();

            if current.is_terminating() {
                self.transitions.push(Transition {
                    from: id,
                    to: id,
                    probability: Rational::one(),
                    time: 0,
                    power: 0,
                });
                continue;
            }

            let successors = execute(self.program, &current)
                .map_err(|source| ExploreError::Execution { state: id, source })?;

            // Successors landing on the same state within one step are summed
            let mut merged: Vec<Transition> = Vec::new();
            for (next, probability) in successors {
                let next = if self.options.collapse_deterministic {
                    self.advance(id, next)?
                } else {
                    next
                };
                let time = next.elapsed_time().saturating_sub(current.elapsed_time());
                let power = next.total_power().saturating_sub(current.total_power());
                let (to, _) = self.intern(next)?;

                match merged.iter_mut().find(|t| t.to == to) {
                    Some(existing) => existing.probability = &existing.probability + &probability,
                    None => merged.push(Transition {
                        from: id,
                        to,
                        probability,
                        time,
                        power,
                    }),
                }
            }
            self.transitions.extend(merged);
        }

        info!(
            states = self.states.len(),
            transitions = self.transitions.len(),
            "explored state space"
        );

        Ok(StateSpace {
            initial_state,
            states: self.states,
            transitions: self.transitions,
        })
    }

    /// Follow single-outcome steps until the program branches, terminates, or
    /// repeats a context. Walking through more than `max_states` contexts is
    /// a state-limit failure.
    fn advance(&self, state: usize, ctx: ExecutionContext) -> Result<ExecutionContext, ExploreError> {
        let mut ctx = ctx;
        let mut seen = HashSet::new();
        seen.insert(canonical_form(&ctx));

        while !ctx.is_terminating() {
            let successors = execute(self.program, &ctx)
                .map_err(|source| ExploreError::Execution { state, source })?;
            if successors.len() != 1 {
                break;
            }
            let Some((next, _)) = successors.into_iter().next() else {
                break;
            };
            if !seen.insert(canonical_form(&next)) {
                break;
            }
            if seen.len() > self.options.max_states {
                return Err(ExploreError::StateLimit(self.options.max_states));
            }
            ctx = next;
        }
        Ok(ctx)
    }

    /// State id of a context, registering it when new. The flag is true for
    /// new states.
    fn intern(&mut self, ctx: ExecutionContext) -> Result<(usize, bool), ExploreError> {
        let form = canonical_form(&ctx);
        let hash = hash_form(&form);

        if let Some(candidates) = self.by_hash.get(&hash) {
            if let Some(&id) = candidates.iter().find(|&&id| self.forms[id] == form) {
                return Ok((id, false));
            }
        }

        if self.states.len() >= self.options.max_states {
            return Err(ExploreError::StateLimit(self.options.max_states));
        }

        let id = self.states.len();
        let labels = if ctx.is_terminating() {
            vec![TERMINATE_LABEL.to_string()]
        } else {
            Vec::new()
        };
        let initial = self
            .initial_vars
            .iter()
            .map(|name| (name.clone(), ctx.initial_value(name)))
            .collect();

        debug!(state = id, hash = %hash, "new state");

        self.states.push(State {
            id,
            hash: hash.clone(),
            labels,
            elapsed_time: ctx.elapsed_time(),
            total_power: ctx.total_power(),
            initial,
            observations: ctx.observations(),
            context: ctx,
        });
        self.forms.push(form);
        self.by_hash.entry(hash).or_default().push(id);
        self.queue.push_back(id);

        Ok((id, true))
    }
}
