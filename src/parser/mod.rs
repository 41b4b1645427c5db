//! Parser for the placeholder template language

pub mod ast;
mod grammar;
pub mod lexer;
pub mod scanner;

pub use ast::*;
pub use grammar::parse;
