//! Variable scope stack
//!
//! Frames live in an arena (`frames`, outermost first, index 0 is the single
//! global frame). The current scope is a list of handles into that arena,
//! innermost first: the trailing run of block frames, the nearest function
//! frame, then the global frame. Frames of callers below the current
//! function stay in the arena but are not reachable.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::ScopeError;
use super::expressions::VariableLookup;
use crate::rational::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Global,
    Function,
    Block,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Global => write!(f, "global"),
            FrameKind::Function => write!(f, "function"),
            FrameKind::Block => write!(f, "block"),
        }
    }
}

/// A single named-variable table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFrame {
    kind: FrameKind,
    vars: BTreeMap<String, Rational>,
}

impl ScopeFrame {
    pub fn new(kind: FrameKind) -> Self {
        ScopeFrame {
            kind,
            vars: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn define(&mut self, name: &str, value: Rational) -> Result<(), ScopeError> {
        if self.vars.contains_key(name) {
            return Err(ScopeError::AlreadyDefined(name.to_string()));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    pub fn assign(&mut self, name: &str, value: Rational) -> Result<(), ScopeError> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ScopeError::Undefined(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rational> {
        self.vars.get(name)
    }

    /// Bindings in name order
    pub fn vars(&self) -> &BTreeMap<String, Rational> {
        &self.vars
    }
}

impl VariableLookup for ScopeFrame {
    fn lookup(&self, name: &str) -> Option<&Rational> {
        self.get(name)
    }
}

/// Index of a frame in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(pub usize);

/// The whole scope stack of one execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBindings {
    frames: Vec<ScopeFrame>,
    current: Vec<FrameHandle>,
}

impl Default for VariableBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableBindings {
    /// A stack holding only the global frame
    pub fn new() -> Self {
        VariableBindings {
            frames: vec![ScopeFrame::new(FrameKind::Global)],
            current: vec![FrameHandle(0)],
        }
    }

    pub fn frames(&self) -> &[ScopeFrame] {
        &self.frames
    }

    pub fn frame(&self, handle: FrameHandle) -> Option<&ScopeFrame> {
        self.frames.get(handle.0)
    }

    /// Reachable frames, innermost first
    pub fn current_scope(&self) -> &[FrameHandle] {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn create_function_frame(&mut self) {
        self.frames.push(ScopeFrame::new(FrameKind::Function));
        self.refresh_current();
    }

    /// Pops the innermost function frame along with every block frame
    /// opened since it.
    pub fn destroy_function_frame(&mut self) -> Result<(), ScopeError> {
        let position = self
            .frames
            .iter()
            .rposition(|frame| frame.kind == FrameKind::Function)
            .ok_or(ScopeError::NoFunctionFrame)?;
        self.frames.truncate(position);
        self.refresh_current();
        Ok(())
    }

    pub fn create_block_frame(&mut self) {
        self.frames.push(ScopeFrame::new(FrameKind::Block));
        self.refresh_current();
    }

    pub fn destroy_block_frame(&mut self) -> Result<(), ScopeError> {
        match self.frames.last() {
            Some(frame) if frame.kind == FrameKind::Block => {
                self.frames.pop();
                self.refresh_current();
                Ok(())
            }
            _ => Err(ScopeError::NoBlockFrame),
        }
    }

    pub fn destroy_block_frames(&mut self, count: usize) -> Result<(), ScopeError> {
        for _ in 0..count {
            self.destroy_block_frame()?;
        }
        Ok(())
    }

    /// Defines `name` in the innermost reachable frame.
    pub fn define(&mut self, name: &str, value: Rational) -> Result<(), ScopeError> {
        let innermost = self.current[0];
        self.frames[innermost.0].define(name, value)
    }

    /// Is `name` defined in the innermost reachable frame?
    pub fn is_defined_innermost(&self, name: &str) -> bool {
        self.frames[self.current[0].0].is_defined(name)
    }

    /// Updates the innermost reachable binding of `name`.
    pub fn assign(&mut self, name: &str, value: Rational) -> Result<(), ScopeError> {
        let handle = self
            .resolve(name)
            .ok_or_else(|| ScopeError::Undefined(name.to_string()))?;
        self.frames[handle.0].assign(name, value)
    }

    pub fn get(&self, name: &str) -> Option<&Rational> {
        self.resolve(name)
            .and_then(|handle| self.frames[handle.0].get(name))
    }

    fn resolve(&self, name: &str) -> Option<FrameHandle> {
        self.current
            .iter()
            .copied()
            .find(|handle| self.frames[handle.0].is_defined(name))
    }

    fn refresh_current(&mut self) {
        let mut current = Vec::new();
        for (index, frame) in self.frames.iter().enumerate().skip(1).rev() {
            match frame.kind {
                FrameKind::Block => current.push(FrameHandle(index)),
                FrameKind::Function => {
                    current.push(FrameHandle(index));
                    break;
                }
                FrameKind::Global => break,
            }
        }
        current.push(FrameHandle(0));
        self.current = current;
    }
}

impl VariableLookup for VariableBindings {
    fn lookup(&self, name: &str) -> Option<&Rational> {
        self.get(name)
    }
}
