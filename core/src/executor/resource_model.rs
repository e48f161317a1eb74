//! Resource models for non-atomic functions
//!
//! A model maps argument patterns to a distribution over the time and power
//! one invocation consumes. Lookup takes the first matching pattern.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{Signature, Span};
use crate::pmf::Pmf;
use crate::rational::Rational;

/// Time and power consumed by one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub time: u64,
    pub power: u64,
}

impl ResourceUsage {
    pub fn new(time: u64, power: u64) -> Self {
        ResourceUsage { time, power }
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.power)
    }
}

/// One position of an argument pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Any,
    Exact(Rational),
}

impl Pattern {
    pub fn matches(&self, value: &Rational) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(expected) => expected == value,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => write!(f, "_"),
            Pattern::Exact(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub patterns: Vec<Pattern>,
    pub usage: Pmf<ResourceUsage>,
}

impl ModelEntry {
    pub fn matches(&self, args: &[Rational]) -> bool {
        self.patterns.len() == args.len()
            && self
                .patterns
                .iter()
                .zip(args)
                .all(|(pattern, arg)| pattern.matches(arg))
    }
}

/// Resource model of one function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionModel {
    pub signature: Signature,
    pub entries: Vec<ModelEntry>,
    #[serde(default)]
    pub span: Span,
}

impl FunctionModel {
    pub fn new(signature: Signature) -> Self {
        FunctionModel {
            signature,
            entries: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_entry(mut self, patterns: Vec<Pattern>, usage: Pmf<ResourceUsage>) -> Self {
        self.entries.push(ModelEntry { patterns, usage });
        self
    }

    /// Usage distribution for concrete arguments; `(0, 0)` with probability
    /// one when no pattern matches.
    pub fn lookup(&self, args: &[Rational]) -> Pmf<ResourceUsage> {
        self.entries
            .iter()
            .find(|entry| entry.matches(args))
            .map(|entry| entry.usage.clone())
            .unwrap_or_else(|| Pmf::certain(ResourceUsage::default()))
    }
}

impl fmt::Display for FunctionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model {} := {{", self.signature)?;
        for entry in &self.entries {
            let patterns: Vec<String> = entry.patterns.iter().map(|p| p.to_string()).collect();
            write!(f, "    ({}) -> {{", patterns.join(", "))?;
            for (i, (usage, p)) in entry.usage.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} -> {}", usage, p)?;
            }
            writeln!(f, "}}")?;
        }
        write!(f, "}}")
    }
}

/// Resource models keyed by function signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionModels {
    models: BTreeMap<Signature, FunctionModel>,
}

impl FunctionModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model, handing it back if its signature is already taken.
    pub fn insert(&mut self, model: FunctionModel) -> Result<(), FunctionModel> {
        if self.models.contains_key(&model.signature) {
            return Err(model);
        }
        self.models.insert(model.signature.clone(), model);
        Ok(())
    }

    pub fn get(&self, signature: &Signature) -> Option<&FunctionModel> {
        self.models.get(signature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(time: u64, power: u64) -> Pmf<ResourceUsage> {
        Pmf::certain(ResourceUsage::new(time, power))
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let model = FunctionModel::new(Signature::new("f", 2))
            .with_entry(
                vec![Pattern::Exact(Rational::from(1)), Pattern::Any],
                usage(1, 1),
            )
            .with_entry(vec![Pattern::Any, Pattern::Any], usage(5, 5));

        let args = [Rational::from(1), Rational::from(7)];
        assert_eq!(model.lookup(&args), usage(1, 1));

        let args = [Rational::from(2), Rational::from(7)];
        assert_eq!(model.lookup(&args), usage(5, 5));
    }

    #[test]
    fn test_no_match_defaults_to_zero_usage() {
        let model = FunctionModel::new(Signature::new("f", 1))
            .with_entry(vec![Pattern::Exact(Rational::from(3))], usage(2, 3));

        let pmf = model.lookup(&[Rational::from(4)]);
        assert_eq!(pmf, usage(0, 0));
    }

    #[test]
    fn test_match_uses_exact_rational_equality() {
        let half = Rational::new(1, 2).unwrap();
        let model = FunctionModel::new(Signature::new("f", 1))
            .with_entry(vec![Pattern::Exact(half)], usage(4, 4));

        assert_eq!(model.lookup(&[Rational::new(2, 4).unwrap()]), usage(4, 4));
        assert_eq!(model.lookup(&[Rational::new(1, 3).unwrap()]), usage(0, 0));
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let mut models = FunctionModels::new();
        models.insert(FunctionModel::new(Signature::new("f", 1))).unwrap();
        assert!(models
            .insert(FunctionModel::new(Signature::new("f", 1)))
            .is_err());
        models.insert(FunctionModel::new(Signature::new("f", 2))).unwrap();
        assert_eq!(models.len(), 2);
    }
}
