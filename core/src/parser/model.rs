//! Function-model files
//!
//! ```text
//! model send/2 := {
//!     (_, 0) -> (1, 1),
//!     (_, _) -> {(2, 3) -> 1/2, (4, 5) -> 1/2}
//! }
//! ```

use pest::iterators::Pair;
use pest::Parser;

use super::{
    build_rational, expect_pair, pair_to_span, unexpected, ParseError, ParseResult, Rule,
    SchimpParser,
};
use crate::executor::resource_model::{
    FunctionModel, FunctionModels, ModelEntry, Pattern, ResourceUsage,
};
use crate::executor::types::Signature;
use crate::pmf::Pmf;

/// Parse a function-model file into a model table
///
/// Totals and arities are validated later, against the program's functions,
/// by the semantic checker.
pub fn parse_function_models(source: &str) -> ParseResult<FunctionModels> {
    let mut pairs = SchimpParser::parse(Rule::model_file, source)?;
    let file = expect_pair(&mut pairs, "model file", Default::default())?;

    let mut models = FunctionModels::new();
    for pair in file.into_inner() {
        match pair.as_rule() {
            Rule::function_model => {
                let span = pair_to_span(&pair, source);
                let model = build_model(pair, source)?;
                if let Err(model) = models.insert(model) {
                    return Err(ParseError::BuildError(
                        format!("model for '{}' is defined twice", model.signature),
                        Some(span),
                    ));
                }
            }
            Rule::EOI => {}
            _ => return Err(unexpected(&pair, source)),
        }
    }

    Ok(models)
}

fn build_model(pair: Pair<Rule>, source: &str) -> ParseResult<FunctionModel> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let name = expect_pair(&mut inner, "function name", span)?
        .as_str()
        .to_string();
    let arity = parse_count(expect_pair(&mut inner, "arity", span)?, source)?;
    let arity = usize::try_from(arity).map_err(|_| {
        ParseError::BuildError(format!("arity {} is too large", arity), Some(span))
    })?;

    let mut model = FunctionModel::new(Signature::new(name, arity));
    model.span = span;
    for entry in inner {
        model.entries.push(build_entry(entry, source)?);
    }
    Ok(model)
}

fn build_entry(pair: Pair<Rule>, source: &str) -> ParseResult<ModelEntry> {
    let mut patterns = Vec::new();
    let mut usage = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::pattern_list => {
                for pattern in child.into_inner() {
                    patterns.push(build_pattern(pattern, source)?);
                }
            }
            Rule::usage => usage = Some(Pmf::certain(build_usage(child, source)?)),
            Rule::usage_distribution => {
                let mut pmf = Pmf::new();
                for outcome in child.into_inner() {
                    let span = pair_to_span(&outcome, source);
                    let mut inner = outcome.into_inner();
                    let usage = build_usage(expect_pair(&mut inner, "usage", span)?, source)?;
                    let probability =
                        build_rational(expect_pair(&mut inner, "probability", span)?, source)?;
                    pmf.insert(usage, probability)
                        .map_err(|err| ParseError::BuildError(err.to_string(), Some(span)))?;
                }
                usage = Some(pmf);
            }
            _ => return Err(unexpected(&child, source)),
        }
    }

    let usage = usage.ok_or_else(|| {
        ParseError::BuildError("model entry has no usage".to_string(), None)
    })?;
    Ok(ModelEntry { patterns, usage })
}

fn build_pattern(pair: Pair<Rule>, source: &str) -> ParseResult<Pattern> {
    let span = pair_to_span(&pair, source);
    let inner = expect_pair(&mut pair.into_inner(), "pattern", span)?;
    match inner.as_rule() {
        Rule::wildcard => Ok(Pattern::Any),
        Rule::rational => Ok(Pattern::Exact(build_rational(inner, source)?)),
        _ => Err(unexpected(&inner, source)),
    }
}

fn build_usage(pair: Pair<Rule>, source: &str) -> ParseResult<ResourceUsage> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let time = parse_count(expect_pair(&mut inner, "time", span)?, source)?;
    let power = parse_count(expect_pair(&mut inner, "power", span)?, source)?;
    Ok(ResourceUsage::new(time, power))
}

fn parse_count(pair: Pair<Rule>, source: &str) -> ParseResult<u64> {
    pair.as_str().parse::<u64>().map_err(|_| {
        ParseError::BuildError(
            format!("'{}' is out of range", pair.as_str()),
            Some(pair_to_span(&pair, source)),
        )
    })
}
