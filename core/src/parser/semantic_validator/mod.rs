//! Semantic checking for SCHIMP programs
//!
//! Runs after parsing and before control-flow resolution. The checker walks
//! the program once, left to right and depth first, threading the same scope
//! discipline the runtime uses: initial declarations fill the global frame,
//! each function body gets a fresh function frame holding its parameters,
//! and every `if`/`while` body opens a block frame.
//!
//! # Usage
//!
//! ```ignore
//! use schimp_core::parser::{parse_program, semantic_validator::check_program};
//!
//! let program = parse_program(source)?;
//! let checked = check_program(program, Some(&models))?;
//! ```
//!
//! Every statement gets a [`CommandId`] stamped on it here. The first error
//! aborts checking.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::executor::bindings::VariableBindings;
use crate::executor::errors::ScopeError;
use crate::executor::resource_model::{FunctionModel, FunctionModels};
use crate::executor::types::{
    Block, CommandId, Distribution, Expr, FunctionId, FunctionKind, ProgramDef, Signature, Sort,
    Span, Stmt, StmtKind,
};
use crate::pmf::PmfError;
use crate::rational::Rational;

#[cfg(test)]
mod tests;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticErrorKind {
    #[error("variable '{0}' is undefined here")]
    UndefinedVariable(String),

    #[error("function '{0}' is undefined")]
    UndefinedFunction(Signature),

    #[error("variable '{0}' is already defined in this scope")]
    DuplicateVariable(String),

    #[error("parameter '{name}' appears more than once in function '{function}'")]
    DuplicateParameter { function: String, name: String },

    #[error("function '{0}' is already defined")]
    DuplicateFunction(Signature),

    #[error("invalid distribution: {0}")]
    InvalidDistribution(PmfError),

    #[error("expected a {expected} expression, found '{expr}'")]
    SortMismatch { expected: Sort, expr: String },

    #[error("a block must contain at least one command")]
    EmptyBlock,

    #[error("output needs at least one expression")]
    EmptyOutput,

    #[error("initial declaration of '{0}' is only allowed at program top level")]
    MisplacedInitial(String),

    #[error("a program must start with a function invocation")]
    InvalidEntry,

    #[error("resource model for '{signature}': {reason}")]
    InvalidModel { signature: Signature, reason: String },

    #[error("program is not checked: {0}")]
    Unchecked(String),
}

/// A semantic error with an optional source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub span: Option<Span>,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, span: Span) -> Self {
        SemanticError {
            kind,
            span: Some(span),
        }
    }

    pub fn without_span(kind: SemanticErrorKind) -> Self {
        SemanticError { kind, span: None }
    }
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some(span) if span != Span::default() => write!(
                f,
                "error at line {}, col {}: {}",
                span.start_line + 1,
                span.start_col + 1,
                self.kind
            ),
            _ => write!(f, "error: {}", self.kind),
        }
    }
}

impl std::error::Error for SemanticError {}

pub type CheckResult<T> = Result<T, SemanticError>;

// ============================================================================
// Checked Program
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub signature: Signature,
    pub params: Vec<String>,
    pub kind: FunctionKind,
}

/// Functions by signature. A [`FunctionId`] is the position of the function
/// in [`ProgramDef::functions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionTable {
    entries: Vec<FunctionInfo>,
    index: BTreeMap<Signature, FunctionId>,
}

impl FunctionTable {
    fn register(&mut self, info: FunctionInfo) -> Option<FunctionId> {
        if self.index.contains_key(&info.signature) {
            return None;
        }
        let id = FunctionId(self.entries.len());
        self.index.insert(info.signature.clone(), id);
        self.entries.push(info);
        Some(id)
    }

    pub fn lookup(&self, signature: &Signature) -> Option<FunctionId> {
        self.index.get(signature).copied()
    }

    pub fn get(&self, id: FunctionId) -> Option<&FunctionInfo> {
        self.entries.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn index(&self) -> &BTreeMap<Signature, FunctionId> {
        &self.index
    }
}

/// Assigns command identities in visiting order
///
/// Ids left over from an earlier check are overwritten.
#[derive(Debug, Default)]
pub struct CommandTable {
    spans: Vec<Span>,
}

impl CommandTable {
    pub fn intern(&mut self, stmt: &mut Stmt) -> CommandId {
        let id = CommandId(self.spans.len());
        self.spans.push(stmt.span);
        stmt.id = Some(id);
        id
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Output of the checker, input of the control-flow resolver
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    /// The program with an id on every statement
    pub program: ProgramDef,
    pub functions: FunctionTable,
    pub command_count: usize,
}

// ============================================================================
// Checker
// ============================================================================

/// Check a parsed program against an optional resource-model table
pub fn check_program(
    program: ProgramDef,
    models: Option<&FunctionModels>,
) -> CheckResult<CheckedProgram> {
    Checker::new(models).check(program)
}

struct Checker<'m> {
    bindings: VariableBindings,
    functions: FunctionTable,
    commands: CommandTable,
    models: Option<&'m FunctionModels>,
    top_level: bool,
}

impl<'m> Checker<'m> {
    fn new(models: Option<&'m FunctionModels>) -> Self {
        Checker {
            bindings: VariableBindings::new(),
            functions: FunctionTable::default(),
            commands: CommandTable::default(),
            models,
            top_level: true,
        }
    }

    fn check(mut self, mut program: ProgramDef) -> CheckResult<CheckedProgram> {
        // Signatures first, so bodies may call functions defined later
        for function in &program.functions {
            let signature = Signature::new(function.name.clone(), function.params.len());
            let kind = match self.models.and_then(|models| models.get(&signature)) {
                Some(model) => {
                    validate_model(model)?;
                    FunctionKind::NonAtomic {
                        model: model.clone(),
                    }
                }
                None => FunctionKind::Atomic,
            };
            debug!(
                function = %signature,
                non_atomic = matches!(kind, FunctionKind::NonAtomic { .. }),
                "registered function"
            );

            let info = FunctionInfo {
                signature: signature.clone(),
                params: function.params.clone(),
                kind,
            };
            if self.functions.register(info).is_none() {
                return Err(SemanticError::new(
                    SemanticErrorKind::DuplicateFunction(signature),
                    function.span,
                ));
            }
        }

        if let Some(models) = self.models {
            for model in models.iter() {
                if self.functions.lookup(&model.signature).is_none() {
                    warn!(function = %model.signature, "resource model matches no function");
                }
            }
        }

        for stmt in &mut program.initials {
            self.check_stmt(stmt)?;
        }

        self.top_level = false;
        for function in &mut program.functions {
            self.bindings.create_function_frame();
            for param in &function.params {
                if self.bindings.is_defined_innermost(param) {
                    return Err(SemanticError::new(
                        SemanticErrorKind::DuplicateParameter {
                            function: function.name.clone(),
                            name: param.clone(),
                        },
                        function.span,
                    ));
                }
                self.define(param, function.span)?;
            }

            self.check_commands(&mut function.body)?;
            self.bindings
                .destroy_function_frame()
                .map_err(|err| scope_error(err, function.span))?;
        }
        self.top_level = true;

        if !matches!(program.entry.kind, StmtKind::Invoke { .. }) {
            return Err(SemanticError::new(
                SemanticErrorKind::InvalidEntry,
                program.entry.span,
            ));
        }
        self.check_stmt(&mut program.entry)?;

        Ok(CheckedProgram {
            program,
            functions: self.functions,
            command_count: self.commands.len(),
        })
    }

    /// Check a command list in the current frame
    fn check_commands(&mut self, block: &mut Block) -> CheckResult<()> {
        if block.body.is_empty() {
            return Err(SemanticError::new(SemanticErrorKind::EmptyBlock, block.span));
        }
        for stmt in &mut block.body {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    /// Check a command list inside its own block frame
    fn check_block(&mut self, block: &mut Block) -> CheckResult<()> {
        self.bindings.create_block_frame();
        self.check_commands(block)?;
        self.bindings
            .destroy_block_frame()
            .map_err(|err| scope_error(err, block.span))
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> CheckResult<()> {
        self.commands.intern(stmt);
        let span = stmt.span;

        match &mut stmt.kind {
            StmtKind::Skip => Ok(()),
            StmtKind::Assign { var, value } => {
                self.check_distribution(value)?;
                if self.bindings.get(var).is_none() {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndefinedVariable(var.clone()),
                        span,
                    ));
                }
                Ok(())
            }
            StmtKind::New { var, value } => {
                self.check_distribution(value)?;
                self.declare(var, span)
            }
            StmtKind::Initial { var, value } => {
                if !self.top_level {
                    return Err(SemanticError::new(
                        SemanticErrorKind::MisplacedInitial(var.clone()),
                        span,
                    ));
                }
                self.check_distribution(value)?;
                self.declare(var, span)
            }
            StmtKind::Invoke { function, args } => {
                let signature = Signature::new(function.clone(), args.len());
                if self.functions.lookup(&signature).is_none() {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndefinedFunction(signature),
                        span,
                    ));
                }
                for arg in args.iter() {
                    self.check_expr(arg, Sort::Arithmetic)?;
                }
                Ok(())
            }
            StmtKind::Output { values } => {
                if values.is_empty() {
                    return Err(SemanticError::new(SemanticErrorKind::EmptyOutput, span));
                }
                for value in values.iter() {
                    self.check_expr(value, Sort::Arithmetic)?;
                }
                Ok(())
            }
            StmtKind::If {
                test,
                then_s,
                else_s,
            } => {
                self.check_expr(test, Sort::Boolean)?;
                self.check_block(then_s)?;
                if let Some(else_s) = else_s {
                    self.check_block(else_s)?;
                }
                Ok(())
            }
            StmtKind::While { test, body } => {
                self.check_expr(test, Sort::Boolean)?;
                self.check_block(body)
            }
        }
    }

    fn check_expr(&self, expr: &Expr, expected: Sort) -> CheckResult<()> {
        if expr.sort() != expected {
            return Err(SemanticError::new(
                SemanticErrorKind::SortMismatch {
                    expected,
                    expr: expr.to_string(),
                },
                expr.span(),
            ));
        }

        match expr {
            Expr::Num { .. } | Expr::Bool { .. } => Ok(()),
            Expr::Var { name, span } => {
                if self.bindings.get(name).is_none() {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndefinedVariable(name.clone()),
                        *span,
                    ));
                }
                Ok(())
            }
            Expr::Unary { op, operand, .. } => self.check_expr(operand, op.operand_sort()),
            Expr::Binary {
                op, left, right, ..
            } => {
                self.check_expr(left, op.operand_sort())?;
                self.check_expr(right, op.operand_sort())
            }
        }
    }

    /// Outcomes must be well-formed arithmetic expressions, pairwise
    /// distinct, with positive probabilities summing to exactly one.
    fn check_distribution(&self, dist: &Distribution) -> CheckResult<()> {
        for outcome in &dist.outcomes {
            self.check_expr(&outcome.value, Sort::Arithmetic)?;
        }
        dist.to_pmf().map(|_| ()).map_err(|err| {
            SemanticError::new(SemanticErrorKind::InvalidDistribution(err), dist.span)
        })
    }

    fn declare(&mut self, var: &str, span: Span) -> CheckResult<()> {
        if self.bindings.is_defined_innermost(var) {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateVariable(var.to_string()),
                span,
            ));
        }
        self.define(var, span)
    }

    fn define(&mut self, var: &str, span: Span) -> CheckResult<()> {
        self.bindings
            .define(var, Rational::zero())
            .map_err(|err| scope_error(err, span))
    }
}

fn scope_error(err: ScopeError, span: Span) -> SemanticError {
    let kind = match err {
        ScopeError::AlreadyDefined(name) => SemanticErrorKind::DuplicateVariable(name),
        ScopeError::Undefined(name) => SemanticErrorKind::UndefinedVariable(name),
        other => SemanticErrorKind::Unchecked(other.to_string()),
    };
    SemanticError::new(kind, span)
}

/// Patterns must match the arity, be pairwise distinct, and map to
/// distributions with positive probabilities summing to one.
fn validate_model(model: &FunctionModel) -> CheckResult<()> {
    let invalid = |reason: String| {
        SemanticError::new(
            SemanticErrorKind::InvalidModel {
                signature: model.signature.clone(),
                reason,
            },
            model.span,
        )
    };

    for (i, entry) in model.entries.iter().enumerate() {
        if entry.patterns.len() != model.signature.arity {
            return Err(invalid(format!(
                "pattern {} has {} elements, expected {}",
                i + 1,
                entry.patterns.len(),
                model.signature.arity
            )));
        }
        if model.entries[..i]
            .iter()
            .any(|earlier| earlier.patterns == entry.patterns)
        {
            return Err(invalid(format!("pattern {} repeats an earlier pattern", i + 1)));
        }
        if let Some((usage, p)) = entry.usage.iter().find(|(_, p)| !p.is_positive()) {
            return Err(invalid(format!(
                "usage {} has non-positive probability {}",
                usage, p
            )));
        }
        let total = entry.usage.total();
        if !total.is_one() {
            return Err(invalid(format!(
                "pattern {} probabilities sum to {}, expected 1",
                i + 1,
                total
            )));
        }
    }
    Ok(())
}
