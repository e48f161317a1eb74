pub mod cli;
pub mod config;
pub mod executor;
pub mod explorer;
pub mod parser;
pub mod pmf;
pub mod rational;

pub use executor::types::Program;
pub use executor::{
    canonical_hash, execute, initial_context, is_terminating, ExecutionContext, ExecutionError,
    FunctionModels, InitialValuations, InitialValue,
};
pub use explorer::{Explorer, ExplorerOptions, StateSpace};
pub use parser::control_flow::resolve_control_flow;
pub use parser::semantic_validator::{check_program, SemanticError};
pub use parser::{parse_function_models, parse_program, ParseError};
pub use pmf::Pmf;
pub use rational::Rational;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

/// Parse, check and resolve a program in one go
pub fn load_program(source: &str, models: Option<&FunctionModels>) -> Result<Program, LoadError> {
    let program = parse_program(source)?;
    let checked = check_program(program, models)?;
    Ok(resolve_control_flow(checked)?)
}
