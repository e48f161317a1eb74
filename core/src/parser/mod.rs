//! PEST-based parser for SCHIMP programs and function-model files
//!
//! Produces the unchecked AST in [`crate::executor::types`], with span
//! information for error reporting. Checking and control-flow resolution
//! live in [`semantic_validator`] and [`control_flow`].

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::executor::types::{
    BinaryOp, Block, Distribution, Expr, FunctionDef, Outcome, ProgramDef, Span, Stmt, StmtKind,
    UnaryOp,
};
use crate::rational::Rational;

pub mod control_flow;
mod model;
pub mod semantic_validator;

pub use model::parse_function_models;


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/schimp.pest"]
struct SchimpParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    PestError(String, Option<Span>),
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::PestError(msg, _) => write!(f, "{}", msg),
            ParseError::BuildError(msg, Some(span)) => write!(
                f,
                "line {}, col {}: {}",
                span.start_line + 1,
                span.start_col + 1,
                msg
            ),
            ParseError::BuildError(msg, None) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Next child of a pair whose grammar guarantees it exists
fn expect_pair<'i>(inner: &mut Pairs<'i, Rule>, what: &str, span: Span) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("expected {}", what), Some(span)))
}

fn unexpected(pair: &Pair<Rule>, source: &str) -> ParseError {
    ParseError::BuildError(
        format!("unexpected {:?}", pair.as_rule()),
        Some(pair_to_span(pair, source)),
    )
}

/* ===================== Public API ===================== */

/// Parse a SCHIMP source string into an unchecked program
pub fn parse_program(source: &str) -> ParseResult<ProgramDef> {
    let mut pairs = SchimpParser::parse(Rule::program, source)?;
    let program = expect_pair(&mut pairs, "program", Span::default())?;
    let span = pair_to_span(&program, source);

    let mut initials = Vec::new();
    let mut functions = Vec::new();
    let mut entry = None;

    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::initial_decl => initials.push(build_initial(pair, source)?),
            Rule::function_def => functions.push(build_function(pair, source)?),
            Rule::invoke_cmd => entry = Some(build_invoke(pair, source)?),
            Rule::EOI => {}
            _ => return Err(unexpected(&pair, source)),
        }
    }

    let entry = entry.ok_or_else(|| {
        ParseError::BuildError("program has no initial invocation".to_string(), Some(span))
    })?;

    Ok(ProgramDef {
        initials,
        functions,
        entry,
        span,
    })
}

/* ===================== AST Builder ===================== */

fn build_initial(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let var = expect_pair(&mut inner, "variable name", span)?.as_str().to_string();
    let value = build_value(expect_pair(&mut inner, "value", span)?, source)?;
    Ok(Stmt::with_span(StmtKind::Initial { var, value }, span))
}

fn build_function(pair: Pair<Rule>, source: &str) -> ParseResult<FunctionDef> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let name = expect_pair(&mut inner, "function name", span)?
        .as_str()
        .to_string();

    let mut params = Vec::new();
    let mut body = None;
    for pair in inner {
        match pair.as_rule() {
            Rule::param_list => {
                params = pair.into_inner().map(|p| p.as_str().to_string()).collect();
            }
            Rule::block => body = Some(build_block(pair, source)?),
            _ => return Err(unexpected(&pair, source)),
        }
    }

    let body = body.ok_or_else(|| {
        ParseError::BuildError(format!("function '{}' has no body", name), Some(span))
    })?;

    Ok(FunctionDef {
        name,
        params,
        body,
        span,
    })
}

fn build_block(pair: Pair<Rule>, source: &str) -> ParseResult<Block> {
    let span = pair_to_span(&pair, source);
    let mut body = Vec::new();

    if let Some(list) = pair.into_inner().next() {
        for stmt_pair in list.into_inner() {
            body.push(build_statement(stmt_pair, source)?);
        }
    }

    Ok(Block { body, span })
}

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::assign_cmd => {
            let mut inner = pair.into_inner();
            let var = expect_pair(&mut inner, "variable name", span)?
                .as_str()
                .to_string();
            let value = build_value(expect_pair(&mut inner, "value", span)?, source)?;
            Ok(Stmt::with_span(StmtKind::Assign { var, value }, span))
        }
        Rule::new_cmd => {
            let mut inner = pair.into_inner();
            let var = expect_pair(&mut inner, "variable name", span)?
                .as_str()
                .to_string();
            let value = build_value(expect_pair(&mut inner, "value", span)?, source)?;
            Ok(Stmt::with_span(StmtKind::New { var, value }, span))
        }
        Rule::invoke_cmd => build_invoke(pair, source),
        Rule::skip_cmd => Ok(Stmt::with_span(StmtKind::Skip, span)),
        Rule::output_cmd => {
            let values = pair
                .into_inner()
                .map(|p| build_aexp(p, source))
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Stmt::with_span(StmtKind::Output { values }, span))
        }
        Rule::if_cmd => {
            let mut inner = pair.into_inner();
            let test = build_bexp(expect_pair(&mut inner, "condition", span)?, source)?;
            let then_s = build_block(expect_pair(&mut inner, "block", span)?, source)?;
            let else_s = match inner.next() {
                Some(else_pair) => Some(build_block(else_pair, source)?),
                None => None,
            };
            Ok(Stmt::with_span(
                StmtKind::If {
                    test,
                    then_s,
                    else_s,
                },
                span,
            ))
        }
        Rule::while_cmd => {
            let mut inner = pair.into_inner();
            let test = build_bexp(expect_pair(&mut inner, "condition", span)?, source)?;
            let body = build_block(expect_pair(&mut inner, "block", span)?, source)?;
            Ok(Stmt::with_span(StmtKind::While { test, body }, span))
        }
        _ => Err(unexpected(&pair, source)),
    }
}

fn build_invoke(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let function = expect_pair(&mut inner, "function name", span)?
        .as_str()
        .to_string();

    let args = match inner.next() {
        Some(list) => list
            .into_inner()
            .map(|p| build_aexp(p, source))
            .collect::<ParseResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Stmt::with_span(StmtKind::Invoke { function, args }, span))
}

/// A plain expression or a `{ e -> p, ... }` literal distribution
fn build_value(pair: Pair<Rule>, source: &str) -> ParseResult<Distribution> {
    let span = pair_to_span(&pair, source);

    if pair.as_rule() != Rule::distribution {
        return Ok(Distribution::certain(build_aexp(pair, source)?));
    }

    let mut outcomes = Vec::new();
    for outcome in pair.into_inner() {
        let outcome_span = pair_to_span(&outcome, source);
        let mut inner = outcome.into_inner();
        let value = build_aexp(expect_pair(&mut inner, "outcome", outcome_span)?, source)?;
        let probability =
            build_rational(expect_pair(&mut inner, "probability", outcome_span)?, source)?;
        outcomes.push(Outcome { value, probability });
    }

    Ok(Distribution { outcomes, span })
}

/* ===================== Expressions ===================== */

fn build_aexp(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::aexp | Rule::additive | Rule::term => build_binary_expr(pair, source, build_aexp),
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = expect_pair(&mut inner, "operand", span)?;
            if first.as_rule() == Rule::op_neg {
                let operand = build_aexp(expect_pair(&mut inner, "operand", span)?, source)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    span,
                })
            } else {
                build_aexp(first, source)
            }
        }
        Rule::power => build_binary_expr(pair, source, build_aexp),
        Rule::floor_call => {
            let mut inner = pair.into_inner();
            let operand = build_aexp(expect_pair(&mut inner, "operand", span)?, source)?;
            Ok(Expr::Unary {
                op: UnaryOp::Floor,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::number => {
            let v = Rational::parse_exact(pair.as_str()).ok_or_else(|| {
                ParseError::BuildError(format!("invalid number '{}'", pair.as_str()), Some(span))
            })?;
            Ok(Expr::Num { v, span })
        }
        Rule::identifier => Ok(Expr::Var {
            name: pair.as_str().to_string(),
            span,
        }),
        _ => Err(unexpected(&pair, source)),
    }
}

fn build_bexp(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::bexp | Rule::conjunction => build_binary_expr(pair, source, build_bexp),
        Rule::negation => {
            let mut inner = pair.into_inner();
            let first = expect_pair(&mut inner, "operand", span)?;
            if first.as_rule() == Rule::op_not {
                let operand = build_bexp(expect_pair(&mut inner, "operand", span)?, source)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    span,
                })
            } else {
                build_bexp(first, source)
            }
        }
        Rule::bool_lit => Ok(Expr::Bool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::comparison => build_binary_expr(pair, source, build_aexp),
        _ => Err(unexpected(&pair, source)),
    }
}

/// Fold `operand (op operand)*` left to right
fn build_binary_expr(
    pair: Pair<Rule>,
    source: &str,
    build_operand: fn(Pair<Rule>, &str) -> ParseResult<Expr>,
) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let mut left = build_operand(expect_pair(&mut inner, "operand", span)?, source)?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_rule() {
            Rule::op_add => BinaryOp::Add,
            Rule::op_sub => BinaryOp::Sub,
            Rule::op_mul => BinaryOp::Mul,
            Rule::op_div => BinaryOp::Div,
            Rule::op_mod => BinaryOp::Mod,
            Rule::op_pow => BinaryOp::Pow,
            Rule::op_xor => BinaryOp::Xor,
            Rule::op_and => BinaryOp::And,
            Rule::op_or => BinaryOp::Or,
            Rule::op_eq => BinaryOp::Eq,
            Rule::op_ne => BinaryOp::Ne,
            Rule::op_lt => BinaryOp::Lt,
            Rule::op_le => BinaryOp::Le,
            Rule::op_gt => BinaryOp::Gt,
            Rule::op_ge => BinaryOp::Ge,
            _ => return Err(unexpected(&op_pair, source)),
        };

        let right_pair = expect_pair(&mut inner, "right operand after operator", span)?;
        let right = build_operand(right_pair, source)?;
        let new_span = left.span().merge(&right.span());

        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

/* ===================== Constants ===================== */

/// Evaluate a constant rational expression exactly
fn build_rational(pair: Pair<Rule>, source: &str) -> ParseResult<Rational> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::rational | Rule::rat_term => {
            let mut inner = pair.into_inner();
            let mut acc = build_rational(expect_pair(&mut inner, "operand", span)?, source)?;
            while let Some(op_pair) = inner.next() {
                let rhs = build_rational(expect_pair(&mut inner, "operand", span)?, source)?;
                acc = match op_pair.as_rule() {
                    Rule::op_add => &acc + &rhs,
                    Rule::op_sub => &acc - &rhs,
                    Rule::op_mul => &acc * &rhs,
                    Rule::op_div => acc.checked_div(&rhs).ok_or_else(|| {
                        ParseError::BuildError("division by zero".to_string(), Some(span))
                    })?,
                    _ => return Err(unexpected(&op_pair, source)),
                };
            }
            Ok(acc)
        }
        Rule::rat_factor => {
            let mut inner = pair.into_inner();
            let first = expect_pair(&mut inner, "constant", span)?;
            if first.as_rule() == Rule::op_neg {
                let operand = build_rational(expect_pair(&mut inner, "constant", span)?, source)?;
                Ok(-operand)
            } else {
                build_rational(first, source)
            }
        }
        Rule::number => Rational::parse_exact(pair.as_str()).ok_or_else(|| {
            ParseError::BuildError(format!("invalid number '{}'", pair.as_str()), Some(span))
        }),
        _ => Err(unexpected(&pair, source)),
    }
}
