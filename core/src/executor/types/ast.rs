//! Abstract Syntax Tree node types
//!
//! The parser produces these nodes unchecked. The semantic checker stamps a
//! [`CommandId`] on every statement; the control-flow resolver then lowers
//! the tree into an executable [`Program`](super::program::Program).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::program::CommandId;
use crate::pmf::{Pmf, PmfError};
use crate::rational::Rational;

/// Source location span for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let (start_line, start_col) = if self.start <= other.start {
            (self.start_line, self.start_col)
        } else {
            (other.start_line, other.start_col)
        };
        let (end_line, end_col) = if self.end >= other.end {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

/* ===================== Expressions ===================== */

/// Whether an expression yields a number or a truth value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    Arithmetic,
    Boolean,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Arithmetic => write!(f, "arithmetic"),
            Sort::Boolean => write!(f, "boolean"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Floor,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Xor,
    // Logical
    And,
    Or,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "^",
            BinaryOp::Xor => "xor",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Sort of the operands this operator expects.
    pub fn operand_sort(&self) -> Sort {
        match self {
            BinaryOp::And | BinaryOp::Or => Sort::Boolean,
            _ => Sort::Arithmetic,
        }
    }

    /// Sort of the value this operator produces.
    pub fn result_sort(&self) -> Sort {
        match self {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow
            | BinaryOp::Xor => Sort::Arithmetic,
            _ => Sort::Boolean,
        }
    }
}

impl UnaryOp {
    pub fn operand_sort(&self) -> Sort {
        match self {
            UnaryOp::Not => Sort::Boolean,
            UnaryOp::Neg | UnaryOp::Floor => Sort::Arithmetic,
        }
    }
}

/// Expression AST node
///
/// Spans do not take part in equality: two expressions are equal when they
/// have the same shape, operators, names and constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Num {
        v: Rational,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Bool {
        v: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Var {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    pub fn num(v: impl Into<Rational>) -> Expr {
        Expr::Num {
            v: v.into(),
            span: Span::default(),
        }
    }

    pub fn bool(v: bool) -> Expr {
        Expr::Bool {
            v,
            span: Span::default(),
        }
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var {
            name: name.into(),
            span: Span::default(),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            span: Span::default(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::Num { span, .. } => *span,
            Expr::Bool { span, .. } => *span,
            Expr::Var { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
        }
    }

    /// Sort produced by the outermost node.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Num { .. } | Expr::Var { .. } => Sort::Arithmetic,
            Expr::Bool { .. } => Sort::Boolean,
            Expr::Unary { op, .. } => op.operand_sort(),
            Expr::Binary { op, .. } => op.result_sort(),
        }
    }

    /// Names of every variable referenced, left to right.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Num { .. } | Expr::Bool { .. } => {}
            Expr::Var { name, .. } => names.push(name),
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Num { v: a, .. }, Expr::Num { v: b, .. }) => a == b,
            (Expr::Bool { v: a, .. }, Expr::Bool { v: b, .. }) => a == b,
            (Expr::Var { name: a, .. }, Expr::Var { name: b, .. }) => a == b,
            (
                Expr::Unary {
                    op: op_a,
                    operand: a,
                    ..
                },
                Expr::Unary {
                    op: op_b,
                    operand: b,
                    ..
                },
            ) => op_a == op_b && a == b,
            (
                Expr::Binary {
                    op: op_a,
                    left: left_a,
                    right: right_a,
                    ..
                },
                Expr::Binary {
                    op: op_b,
                    left: left_b,
                    right: right_b,
                    ..
                },
            ) => op_a == op_b && left_a == left_b && right_a == right_b,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num { v, .. } => {
                if v.is_integer() && !v.is_negative() {
                    write!(f, "{}", v)
                } else {
                    write!(f, "({})", v)
                }
            }
            Expr::Bool { v, .. } => write!(f, "{}", v),
            Expr::Var { name, .. } => write!(f, "{}", name),
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Neg => write!(f, "-{}", operand),
                UnaryOp::Floor => write!(f, "floor({})", operand),
                UnaryOp::Not => write!(f, "!{}", operand),
            },
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}

/* ===================== Distributions ===================== */

/// One `value -> probability` arm of a literal distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub value: Expr,
    pub probability: Rational,
}

/// Right-hand side of an assignment: either a plain expression (a single
/// outcome with probability one) or a literal distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub outcomes: Vec<Outcome>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

impl Distribution {
    pub fn certain(value: Expr) -> Self {
        let span = value.span();
        Distribution {
            outcomes: vec![Outcome {
                value,
                probability: Rational::one(),
            }],
            span,
        }
    }

    pub fn from_outcomes(outcomes: Vec<(Expr, Rational)>) -> Self {
        Distribution {
            outcomes: outcomes
                .into_iter()
                .map(|(value, probability)| Outcome { value, probability })
                .collect(),
            span: Span::default(),
        }
    }

    /// Builds the PMF, rejecting duplicate outcomes, non-positive
    /// probabilities and totals other than one.
    pub fn to_pmf(&self) -> Result<Pmf<Expr>, PmfError> {
        let mut pmf = Pmf::new();
        for outcome in &self.outcomes {
            pmf.insert(outcome.value.clone(), outcome.probability.clone())?;
        }
        pmf.finalise()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.outcomes.as_slice() {
            if single.probability.is_one() {
                return write!(f, "{}", single.value);
            }
        }
        write!(f, "{{")?;
        for (i, outcome) in self.outcomes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {}", outcome.value, outcome.probability)?;
        }
        write!(f, "}}")
    }
}

/* ===================== Statements ===================== */

/// Statement AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Assigned by the semantic checker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum StmtKind {
    Skip,
    Assign {
        var: String,
        value: Distribution,
    },
    /// `new x := ...`, a local declaration in the innermost frame
    New {
        var: String,
        value: Distribution,
    },
    /// `initial x := ...`, an input variable recorded in the snapshot
    Initial {
        var: String,
        value: Distribution,
    },
    Invoke {
        function: String,
        args: Vec<Expr>,
    },
    Output {
        values: Vec<Expr>,
    },
    If {
        test: Expr,
        then_s: Block,
        else_s: Option<Block>,
    },
    While {
        test: Expr,
        body: Block,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            id: None,
            kind,
            span: Span::default(),
        }
    }

    pub fn with_span(kind: StmtKind, span: Span) -> Self {
        Stmt {
            id: None,
            kind,
            span,
        }
    }

    /// Get the span of this statement
    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Skip => write!(f, "skip"),
            StmtKind::Assign { var, value } => write!(f, "{} := {}", var, value),
            StmtKind::New { var, value } => write!(f, "new {} := {}", var, value),
            StmtKind::Initial { var, value } => write!(f, "initial {} := {}", var, value),
            StmtKind::Invoke { function, args } => {
                write!(f, "{}(", function)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            StmtKind::Output { values } => {
                write!(f, "output ")?;
                write_list(f, values)
            }
            StmtKind::If { test, else_s, .. } => {
                write!(f, "if {} {{ ... }}", test)?;
                if else_s.is_some() {
                    write!(f, " else {{ ... }}")?;
                }
                Ok(())
            }
            StmtKind::While { test, .. } => write!(f, "while {} {{ ... }}", test),
        }
    }
}

pub(crate) fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

/// A braced command list; opens its own block frame at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

impl Block {
    pub fn new(body: Vec<Stmt>) -> Self {
        Block {
            body,
            span: Span::default(),
        }
    }
}

/* ===================== Definitions ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Runs directly in the function frame, without a block frame of its own
    pub body: Block,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// A complete, unchecked program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDef {
    pub initials: Vec<Stmt>,
    pub functions: Vec<FunctionDef>,
    /// The invocation that starts execution
    pub entry: Stmt,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}
