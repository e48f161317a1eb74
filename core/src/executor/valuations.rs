//! Enumeration of initial-variable valuations
//!
//! Each initial declaration picks one outcome of its distribution; the
//! valuation space is the cartesian product of those choices. Valuations are
//! produced lazily by index (mixed radix, the last declaration varying
//! fastest) and evaluated against a flat frame of the earlier initials.

use super::bindings::{FrameKind, ScopeFrame};
use super::errors::{ExecResult, ExecutionError};
use super::expressions::eval_arith;
use super::types::{CommandId, Expr, Op, Program};
use crate::rational::Rational;

/// One assignment of values to every initial variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    pub values: ScopeFrame,
    pub probability: Rational,
}

struct Declaration<'a> {
    command: CommandId,
    var: &'a str,
    outcomes: Vec<(&'a Expr, &'a Rational)>,
}

pub struct InitialValuations<'a> {
    declarations: Vec<Declaration<'a>>,
    len: usize,
}

impl<'a> InitialValuations<'a> {
    pub fn new(program: &'a Program) -> Self {
        let declarations: Vec<Declaration<'a>> = program
            .initial_commands()
            .filter_map(|command| match &command.op {
                Op::Initial { var, values } => Some(Declaration {
                    command: command.id,
                    var: var.as_str(),
                    outcomes: values.iter().collect(),
                }),
                _ => None,
            })
            .collect();
        let len = declarations
            .iter()
            .fold(1usize, |acc, decl| acc.saturating_mul(decl.outcomes.len()));

        InitialValuations { declarations, len }
    }

    /// Number of valuations (saturating)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Names of the initial variables in declaration order
    pub fn variables(&self) -> Vec<&'a str> {
        self.declarations.iter().map(|decl| decl.var).collect()
    }

    pub fn get(&self, index: usize) -> Option<ExecResult<Valuation>> {
        if index >= self.len {
            return None;
        }

        let mut choices = vec![0; self.declarations.len()];
        let mut rest = index;
        for (slot, decl) in choices.iter_mut().zip(&self.declarations).rev() {
            *slot = rest % decl.outcomes.len();
            rest /= decl.outcomes.len();
        }

        Some(self.evaluate(&choices))
    }

    pub fn iter(&self) -> impl Iterator<Item = ExecResult<Valuation>> + '_ {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    fn evaluate(&self, choices: &[usize]) -> ExecResult<Valuation> {
        let mut values = ScopeFrame::new(FrameKind::Global);
        let mut probability = Rational::one();

        for (decl, &choice) in self.declarations.iter().zip(choices) {
            let (expr, p) = decl.outcomes[choice];
            let value = eval_arith(expr, &values).map_err(ExecutionError::eval(decl.command))?;
            values
                .define(decl.var, value)
                .map_err(ExecutionError::scope(decl.command))?;
            probability = &probability * p;
        }

        Ok(Valuation {
            values,
            probability,
        })
    }
}
