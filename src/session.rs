//! Pipeline driver: scan → parse → resolve → interpret.
//!
//! A [`Session`] keeps one interpreter alive across calls to [`Session::run`],
//! which is what gives the REPL its memory.  Expression ids keep counting
//! upward between runs so a closure created by an earlier line still finds
//! its entries in the shared resolution table.

use std::io::Write;

use log::{debug, info};

use crate::config::Config;
use crate::error::{Diagnostic, Diagnostics, Reporter};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    StaticError,
    RuntimeError,
}

impl Outcome {
    /// Conventional process exit status (sysexits `EX_DATAERR` /
    /// `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::StaticError => 65,
            Outcome::RuntimeError => 70,
        }
    }
}

pub struct Session<W: Write> {
    config: Config,
    interpreter: Interpreter<W>,
    next_id: usize,
}

impl<W: Write> Session<W> {
    pub fn new(config: Config, output: W) -> Self {
        info!("Session created with {:?}", config);

        Session {
            interpreter: Interpreter::new(config.clone(), output),
            config,
            next_id: 0,
        }
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }

    /// Run one chunk of source.  Nothing executes if any stage reported an
    /// error; warnings are forwarded but never change the outcome.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> Outcome {
        let mut diagnostics = Diagnostics::new();

        let tokens = Scanner::new(source, &self.config).scan_tokens(&mut diagnostics);

        let mut parser = Parser::new(tokens).with_first_id(self.next_id);
        let statements = parser.parse(&mut diagnostics);
        self.next_id = parser.next_id();

        if diagnostics.has_errors() {
            info!("Static errors before resolution, skipping execution");
            diagnostics.drain_into(reporter);
            return Outcome::StaticError;
        }

        let locals = Resolver::new(&self.config, &mut diagnostics).resolve(&statements);

        let failed: bool = diagnostics.has_errors();
        diagnostics.drain_into(reporter);

        if failed {
            info!("Resolution failed, skipping execution");
            return Outcome::StaticError;
        }

        self.interpreter.install(locals);

        match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Success,
            Err(e) => {
                debug!("Runtime error: {}", e);
                reporter.report(Diagnostic::from(e));
                Outcome::RuntimeError
            }
        }
    }
}
