//! Expression evaluation
//!
//! Evaluation is a pure function of a [`VariableLookup`]: a full execution
//! context, a scope stack, or a single flat frame.

use super::types::{BinaryOp, Expr, Sort, UnaryOp};
use crate::rational::Rational;

/// Anything expressions can read variables from
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<&Rational>;
}

impl VariableLookup for std::collections::BTreeMap<String, Rational> {
    fn lookup(&self, name: &str) -> Option<&Rational> {
        self.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("variable '{0}' is undefined")]
    UndefinedVariable(String),

    #[error("division by zero in '{0}'")]
    DivisionByZero(String),

    #[error("invalid exponent in '{0}'")]
    InvalidExponent(String),

    #[error("expected a {expected} expression, found '{expr}'")]
    SortMismatch { expected: Sort, expr: String },
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluates an arithmetic expression to an exact rational.
pub fn eval_arith<L: VariableLookup + ?Sized>(expr: &Expr, env: &L) -> EvalResult<Rational> {
    match expr {
        Expr::Num { v, .. } => Ok(v.clone()),
        Expr::Var { name, .. } => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
        Expr::Unary { op, operand, .. } => match op {
            UnaryOp::Neg => Ok(-eval_arith(operand, env)?),
            UnaryOp::Floor => Ok(eval_arith(operand, env)?.floor()),
            UnaryOp::Not => Err(sort_mismatch(Sort::Arithmetic, expr)),
        },
        Expr::Binary {
            op, left, right, ..
        } => {
            if op.result_sort() != Sort::Arithmetic {
                return Err(sort_mismatch(Sort::Arithmetic, expr));
            }
            let l = eval_arith(left, env)?;
            let r = eval_arith(right, env)?;
            match op {
                BinaryOp::Add => Ok(&l + &r),
                BinaryOp::Sub => Ok(&l - &r),
                BinaryOp::Mul => Ok(&l * &r),
                BinaryOp::Div => l
                    .checked_div(&r)
                    .ok_or_else(|| EvalError::DivisionByZero(expr.to_string())),
                BinaryOp::Mod => l
                    .checked_rem(&r)
                    .ok_or_else(|| EvalError::DivisionByZero(expr.to_string())),
                BinaryOp::Pow => l
                    .checked_pow(&r)
                    .ok_or_else(|| EvalError::InvalidExponent(expr.to_string())),
                BinaryOp::Xor => Ok(l.xor(&r)),
                _ => Err(sort_mismatch(Sort::Arithmetic, expr)),
            }
        }
        Expr::Bool { .. } => Err(sort_mismatch(Sort::Arithmetic, expr)),
    }
}

/// Evaluates a boolean expression.
///
/// `&&` and `||` evaluate both operands, so an error on either side is
/// reported even when the other side decides the result.
pub fn eval_bool<L: VariableLookup + ?Sized>(expr: &Expr, env: &L) -> EvalResult<bool> {
    match expr {
        Expr::Bool { v, .. } => Ok(*v),
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => Ok(!eval_bool(operand, env)?),
        Expr::Binary {
            op, left, right, ..
        } => match op {
            BinaryOp::And => {
                let l = eval_bool(left, env)?;
                let r = eval_bool(right, env)?;
                Ok(l && r)
            }
            BinaryOp::Or => {
                let l = eval_bool(left, env)?;
                let r = eval_bool(right, env)?;
                Ok(l || r)
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let l = eval_arith(left, env)?;
                let r = eval_arith(right, env)?;
                Ok(match op {
                    BinaryOp::Eq => l == r,
                    BinaryOp::Ne => l != r,
                    BinaryOp::Lt => l < r,
                    BinaryOp::Le => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                })
            }
            _ => Err(sort_mismatch(Sort::Boolean, expr)),
        },
        _ => Err(sort_mismatch(Sort::Boolean, expr)),
    }
}

fn sort_mismatch(expected: Sort, expr: &Expr) -> EvalError {
    EvalError::SortMismatch {
        expected,
        expr: expr.to_string(),
    }
}
