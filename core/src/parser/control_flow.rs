//! Control-flow resolution
//!
//! Turns a checked program into the executable [`Program`] arena. Every
//! command learns its successor and how many block frames to tear down on
//! the way there. A successor of `None` means "return to the caller".
//!
//! Resolution threads a continuation through the tree:
//!
//! - a command followed by a sibling continues to that sibling
//! - the last command of a block continues wherever the block's owner
//!   continues, destroying one more frame
//! - the last command of a `while` body loops back to the `while`
//! - the last command of a function body returns

use tracing::debug;

use super::semantic_validator::{
    CheckedProgram, FunctionTable, SemanticError, SemanticErrorKind,
};
use crate::executor::types::{
    Block, Command, CommandId, Distribution, Expr, Function, FunctionId, Op, Program, Signature,
    Span, Stmt, StmtKind,
};
use crate::pmf::Pmf;

/// Where control goes after a command list runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Continuation {
    next: Option<CommandId>,
    destroy_blocks: usize,
}

impl Continuation {
    const RETURN: Continuation = Continuation {
        next: None,
        destroy_blocks: 0,
    };

    fn to(next: CommandId) -> Self {
        Continuation {
            next: Some(next),
            destroy_blocks: 0,
        }
    }

    /// The same target, reached from one block level deeper
    fn leaving_block(self) -> Self {
        Continuation {
            next: self.next,
            destroy_blocks: self.destroy_blocks + 1,
        }
    }
}

/// Resolve successors for every command of a checked program
pub fn resolve_control_flow(checked: CheckedProgram) -> Result<Program, SemanticError> {
    let CheckedProgram {
        program,
        functions: table,
        command_count,
    } = checked;

    let mut resolver = Resolver {
        commands: vec![None; command_count],
        table: &table,
    };

    // Initials run in order, then the entry invocation; returning from the
    // entry terminates the program.
    let top_level: Vec<&Stmt> = program
        .initials
        .iter()
        .chain(std::iter::once(&program.entry))
        .collect();
    resolver.resolve_list(&top_level, Continuation::RETURN, false)?;

    let mut functions = Vec::with_capacity(program.functions.len());
    for (i, def) in program.functions.iter().enumerate() {
        let info = table
            .get(FunctionId(i))
            .ok_or_else(|| unchecked(format!("function '{}' is not registered", def.name)))?;

        let body: Vec<&Stmt> = def.body.body.iter().collect();
        resolver.resolve_list(&body, Continuation::RETURN, false)?;

        functions.push(Function {
            signature: info.signature.clone(),
            params: info.params.clone(),
            kind: info.kind.clone(),
            entry: first_id(&def.body)?,
            span: def.span,
        });
    }

    let commands = resolver
        .commands
        .into_iter()
        .enumerate()
        .map(|(i, command)| {
            command.ok_or_else(|| unchecked(format!("command {} was never resolved", i)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entry = stmt_id(&program.entry)?;
    let first = match program.initials.first() {
        Some(stmt) => stmt_id(stmt)?,
        None => entry,
    };

    debug!(
        commands = commands.len(),
        functions = functions.len(),
        "resolved control flow"
    );

    Ok(Program {
        commands,
        functions,
        signatures: table.index().clone(),
        first,
        entry,
    })
}

struct Resolver<'a> {
    commands: Vec<Option<Command>>,
    table: &'a FunctionTable,
}

impl<'a> Resolver<'a> {
    /// Resolve a command list whose fall-through target is `exit`.
    ///
    /// Inside a block, falling off the end also tears down the block's frame.
    fn resolve_list(
        &mut self,
        stmts: &[&Stmt],
        exit: Continuation,
        in_block: bool,
    ) -> Result<(), SemanticError> {
        let last_exit = if in_block { exit.leaving_block() } else { exit };

        for (i, stmt) in stmts.iter().enumerate() {
            let cont = match stmts.get(i + 1) {
                Some(sibling) => Continuation::to(stmt_id(sibling)?),
                None => last_exit,
            };
            self.resolve_stmt(stmt, cont)?;
        }
        Ok(())
    }

    fn resolve_block(&mut self, block: &Block, exit: Continuation) -> Result<(), SemanticError> {
        let body: Vec<&Stmt> = block.body.iter().collect();
        self.resolve_list(&body, exit, true)
    }

    fn resolve_stmt(&mut self, stmt: &Stmt, cont: Continuation) -> Result<(), SemanticError> {
        let id = stmt_id(stmt)?;

        let op = match &stmt.kind {
            StmtKind::Skip => Op::Skip,
            StmtKind::Assign { var, value } => Op::Assign {
                var: var.clone(),
                values: to_pmf(value)?,
            },
            StmtKind::New { var, value } => Op::New {
                var: var.clone(),
                values: to_pmf(value)?,
            },
            StmtKind::Initial { var, value } => Op::Initial {
                var: var.clone(),
                values: to_pmf(value)?,
            },
            StmtKind::Invoke { function, args } => {
                let signature = Signature::new(function.clone(), args.len());
                let function = self.table.lookup(&signature).ok_or_else(|| {
                    SemanticError::new(SemanticErrorKind::UndefinedFunction(signature), stmt.span)
                })?;
                Op::Invoke {
                    function,
                    args: args.clone(),
                }
            }
            StmtKind::Output { values } => Op::Output {
                values: values.clone(),
            },
            StmtKind::If {
                test,
                then_s,
                else_s,
            } => {
                // Both branches rejoin wherever the `if` itself continues
                self.resolve_block(then_s, cont)?;
                let else_entry = match else_s {
                    Some(else_s) => {
                        self.resolve_block(else_s, cont)?;
                        Some(first_id(else_s)?)
                    }
                    None => None,
                };
                Op::If {
                    test: test.clone(),
                    then_entry: first_id(then_s)?,
                    else_entry,
                }
            }
            StmtKind::While { test, body } => {
                self.resolve_block(body, Continuation::to(id))?;
                Op::While {
                    test: test.clone(),
                    body_entry: first_id(body)?,
                }
            }
        };

        let slot = self
            .commands
            .get_mut(id.0)
            .ok_or_else(|| unchecked(format!("command {} is out of range", id)))?;
        *slot = Some(Command {
            id,
            op,
            next: cont.next,
            destroy_blocks: cont.destroy_blocks,
            span: stmt.span,
        });
        Ok(())
    }
}

fn stmt_id(stmt: &Stmt) -> Result<CommandId, SemanticError> {
    stmt.id.ok_or_else(|| {
        SemanticError::new(
            SemanticErrorKind::Unchecked(format!("'{}' has no command id", stmt)),
            stmt.span,
        )
    })
}

fn first_id(block: &Block) -> Result<CommandId, SemanticError> {
    match block.body.first() {
        Some(stmt) => stmt_id(stmt),
        None => Err(SemanticError::new(SemanticErrorKind::EmptyBlock, block.span)),
    }
}

fn to_pmf(dist: &Distribution) -> Result<Pmf<Expr>, SemanticError> {
    dist.to_pmf()
        .map_err(|err| SemanticError::new(SemanticErrorKind::InvalidDistribution(err), dist.span))
}

fn unchecked(message: String) -> SemanticError {
    SemanticError::new(SemanticErrorKind::Unchecked(message), Span::default())
}
