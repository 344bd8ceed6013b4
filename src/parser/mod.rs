// Filter expression parser module

pub mod ast;
pub mod filter;
pub mod lexer;

// Public API re-exports
pub use ast::{CmpOp, Expr, Operand};
pub use filter::parse_filter;
