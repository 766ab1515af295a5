//! A tree‑walking interpreter for a Lox dialect with ternaries, the comma
//! operator, compound assignment, `break` and static class members.
//!
//! The pipeline is [`scanner`] → [`parser`] → [`resolver`] →
//! [`interpreter`]; [`session::Session`] wires the stages together.

pub mod ast;
pub mod ast_printer;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod token;
pub mod value;
