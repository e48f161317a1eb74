//! Probability mass functions over exact rationals

use serde::{Deserialize, Serialize};

use crate::rational::Rational;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PmfError {
    #[error("outcome '{0}' appears more than once")]
    DuplicateOutcome(String),

    #[error("probabilities sum to {0}, expected exactly 1")]
    NotNormalised(Rational),

    #[error("probability {0} is not strictly positive")]
    NonPositive(Rational),
}

/// Finite distribution keeping insertion order.
///
/// Order only matters for deterministic output. A finalised PMF sums to
/// exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pmf<T> {
    entries: Vec<(T, Rational)>,
}

impl<T> Default for Pmf<T> {
    fn default() -> Self {
        Pmf {
            entries: Vec::new(),
        }
    }
}

impl<T> Pmf<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single outcome with probability one.
    pub fn certain(outcome: T) -> Self {
        Pmf {
            entries: vec![(outcome, Rational::one())],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, &Rational)> {
        self.entries.iter().map(|(outcome, p)| (outcome, p))
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(outcome, _)| outcome)
    }

    pub fn total(&self) -> Rational {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    /// Checks that the probabilities sum to exactly one.
    pub fn finalise(self) -> Result<Self, PmfError> {
        let total = self.total();
        if total.is_one() {
            Ok(self)
        } else {
            Err(PmfError::NotNormalised(total))
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Pmf<U> {
        Pmf {
            entries: self
                .entries
                .into_iter()
                .map(|(outcome, p)| (f(outcome), p))
                .collect(),
        }
    }
}

impl<T: PartialEq> Pmf<T> {
    /// Adds an outcome that must not already be present.
    pub fn insert(&mut self, outcome: T, probability: Rational) -> Result<(), PmfError>
    where
        T: std::fmt::Display,
    {
        if !probability.is_positive() {
            return Err(PmfError::NonPositive(probability));
        }
        if self.contains(&outcome) {
            return Err(PmfError::DuplicateOutcome(outcome.to_string()));
        }
        self.entries.push((outcome, probability));
        Ok(())
    }

    /// Adds an outcome, merging its probability into an equal one if present.
    pub fn add(&mut self, outcome: T, probability: Rational) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == outcome) {
            Some((_, p)) => *p = &*p + &probability,
            None => self.entries.push((outcome, probability)),
        }
    }

    pub fn contains(&self, outcome: &T) -> bool {
        self.entries.iter().any(|(existing, _)| existing == outcome)
    }

    /// Probability of `outcome`, zero when absent.
    pub fn probability_of(&self, outcome: &T) -> Rational {
        self.entries
            .iter()
            .find(|(existing, _)| existing == outcome)
            .map(|(_, p)| p.clone())
            .unwrap_or_else(Rational::zero)
    }
}

impl<T> IntoIterator for Pmf<T> {
    type Item = (T, Rational);
    type IntoIter = std::vec::IntoIter<(T, Rational)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Pmf<T> {
    type Item = &'a (T, Rational);
    type IntoIter = std::slice::Iter<'a, (T, Rational)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
