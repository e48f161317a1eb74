//! Executable program form
//!
//! Produced by the control-flow resolver. Commands live in an arena indexed
//! by [`CommandId`]; each carries its successor and the number of block
//! frames to tear down before moving to it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::{write_list, Expr, Span};
use crate::executor::resource_model::FunctionModel;
use crate::pmf::Pmf;

/// Stable identity of a command, assigned once during checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId(pub usize);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub usize);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Function name plus arity; functions may be overloaded by arity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub arity: usize,
}

impl Signature {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Signature {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FunctionKind {
    /// Consumes no time or power
    Atomic,
    /// Consumes modeled time and power; never reentered while active
    NonAtomic { model: FunctionModel },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub signature: Signature,
    pub params: Vec<String>,
    pub kind: FunctionKind,
    /// First command of the body
    pub entry: CommandId,
    #[serde(default)]
    pub span: Span,
}

impl Function {
    pub fn is_non_atomic(&self) -> bool {
        matches!(self.kind, FunctionKind::NonAtomic { .. })
    }
}

/// What a command does when executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Op {
    Skip,
    Assign {
        var: String,
        values: Pmf<Expr>,
    },
    New {
        var: String,
        values: Pmf<Expr>,
    },
    Initial {
        var: String,
        values: Pmf<Expr>,
    },
    Invoke {
        function: FunctionId,
        args: Vec<Expr>,
    },
    Output {
        values: Vec<Expr>,
    },
    If {
        test: Expr,
        then_entry: CommandId,
        else_entry: Option<CommandId>,
    },
    While {
        test: Expr,
        body_entry: CommandId,
    },
}

/// A resolved command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub op: Op,
    /// `None` returns to the caller
    pub next: Option<CommandId>,
    /// Block frames to destroy before moving to `next`
    pub destroy_blocks: usize,
    #[serde(default)]
    pub span: Span,
}

/// A checked and resolved program, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) commands: Vec<Command>,
    pub(crate) functions: Vec<Function>,
    pub(crate) signatures: BTreeMap<Signature, FunctionId>,
    pub(crate) first: CommandId,
    pub(crate) entry: CommandId,
}

impl Program {
    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn lookup(&self, signature: &Signature) -> Option<FunctionId> {
        self.signatures.get(signature).copied()
    }

    /// Where execution begins: the first initial declaration, or the
    /// entry invocation when there are none.
    pub fn first_command(&self) -> CommandId {
        self.first
    }

    /// The invocation that starts the program
    pub fn entry_command(&self) -> CommandId {
        self.entry
    }

    /// Initial declarations in program order
    pub fn initial_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command.op, Op::Initial { .. }))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Skip => write!(f, "skip"),
            Op::Assign { var, values } => write!(f, "{} := {}", var, PmfText(values)),
            Op::New { var, values } => write!(f, "new {} := {}", var, PmfText(values)),
            Op::Initial { var, values } => write!(f, "initial {} := {}", var, PmfText(values)),
            Op::Invoke { function, args } => {
                write!(f, "invoke {}(", function)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Op::Output { values } => {
                write!(f, "output ")?;
                write_list(f, values)
            }
            Op::If {
                test,
                then_entry,
                else_entry,
            } => {
                write!(f, "if {} then {}", test, then_entry)?;
                if let Some(else_entry) = else_entry {
                    write!(f, " else {}", else_entry)?;
                }
                Ok(())
            }
            Op::While { test, body_entry } => write!(f, "while {} do {}", test, body_entry),
        }
    }
}

struct PmfText<'a>(&'a Pmf<Expr>);

impl fmt::Display for PmfText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            if let Some((value, p)) = self.0.iter().next() {
                if p.is_one() {
                    return write!(f, "{}", value);
                }
            }
        }
        write!(f, "{{")?;
        for (i, (value, p)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {}", value, p)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}->", self.id)?;
        if self.destroy_blocks > 0 {
            write!(f, "drop {},", self.destroy_blocks)?;
        }
        match self.next {
            Some(next) => write!(f, "{}", next)?,
            None => write!(f, "return")?,
        }
        write!(f, "] {}", self.op)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, function) in self.functions.iter().enumerate() {
            let kind = if function.is_non_atomic() {
                "non-atomic"
            } else {
                "atomic"
            };
            writeln!(
                f,
                "function {} {}({}) {} entry {}",
                FunctionId(id),
                function.signature.name,
                function.params.join(", "),
                kind,
                function.entry
            )?;
        }
        for command in &self.commands {
            writeln!(f, "{}", command)?;
        }
        Ok(())
    }
}
