//! Types shared by the checker, resolver and engine

pub mod ast;
pub mod program;

pub use ast::*;
pub use program::*;
