use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::AstPrinter;
use rox::config::Config;
use rox::error::{Diagnostic, Reporter};
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::session::{Outcome, Session};
use rox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,

    /// Load dialect options from a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat 0 and "" as false
    #[arg(long, global = true)]
    loose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a Lox program; starts the REPL when no file is given
    Run { filename: Option<PathBuf> },

    /// Starts an interactive prompt
    Repl,

    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },
}

/// Prints every diagnostic to stderr and remembers whether any was an error.
#[derive(Default)]
struct ConsoleReporter {
    had_error: bool,
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        debug!("Reporting diagnostic: {:?}", diagnostic);

        if diagnostic.is_error() {
            self.had_error = true;
        }

        eprintln!("{}", diagnostic);
    }
}

/// Memory-maps a script and checks that it is UTF-8.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Zero-length mappings are rejected on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read once and copied out before the file is closed.
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map file {:?}", filename))?;

    let text = std::str::from_utf8(&map).with_context(|| format!("{:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", text.len(), filename);

    Ok(text.to_owned())
}

fn load_config(args: &Cli) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;

            Config::from_json(&text).with_context(|| format!("Invalid config {:?}", path))?
        }
        None => Config::default(),
    };

    if args.loose {
        config.truthiness = Config::loose().truthiness;
    }

    info!("Using {:?}", config);
    Ok(config)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);

            writeln!(
                buf,
                "{} [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

fn run_file(filename: &Path, config: Config) -> Result<Outcome> {
    let source = read_source(filename)?;

    let mut session = Session::new(config, io::stdout());
    let mut reporter = ConsoleReporter::default();

    let outcome = session.run(&source, &mut reporter);

    info!("Run finished with {:?}", outcome);
    Ok(outcome)
}

/// Reads lines until EOF.  Errors are printed and the prompt continues.
fn run_prompt(config: Config) -> Result<()> {
    info!("Starting REPL");

    let mut session = Session::new(config, io::stdout());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };

        let line = line.context("Failed to read from stdin")?;

        let mut reporter = ConsoleReporter::default();
        let outcome = session.run(&line, &mut reporter);

        debug!("REPL line finished with {:?}", outcome);
    }

    info!("REPL finished");
    Ok(())
}

fn tokenize(filename: &Path, config: &Config, json: bool) -> Result<bool> {
    let source = read_source(filename)?;

    let mut reporter = ConsoleReporter::default();
    let tokens: Vec<Token> = Scanner::new(&source, config).scan_tokens(&mut reporter);

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(!reporter.had_error)
}

fn parse(filename: &Path, config: &Config) -> Result<bool> {
    let source = read_source(filename)?;

    let mut reporter = ConsoleReporter::default();
    let tokens = Scanner::new(&source, config).scan_tokens(&mut reporter);

    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression(&mut reporter);

    if let Some(expr) = expr {
        let ast_str = AstPrinter::print(&expr);

        debug!("AST: {}", ast_str);
        if !reporter.had_error {
            println!("{}", ast_str);
        }
    }

    Ok(!reporter.had_error)
}

/// Native stack for the interpreter thread, sized so the default call-depth
/// limit is reached well before the stack runs out, even in debug builds.
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    }

    info!("CLI arguments: {:?}", args);

    let config = load_config(&args)?;

    let worker = std::thread::Builder::new()
        .name("rox".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || dispatch(&args, config))
        .context("Failed to start interpreter thread")?;

    match worker.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Interpreter thread panicked"),
    }
}

fn dispatch(args: &Cli, config: Config) -> Result<()> {
    match &args.commands {
        Commands::Run {
            filename: Some(filename),
        } => {
            let outcome = run_file(filename, config)?;

            if outcome != Outcome::Success {
                std::process::exit(outcome.exit_code());
            }
        }

        Commands::Run { filename: None } | Commands::Repl => run_prompt(config)?,

        Commands::Tokenize { filename, json } => {
            if !tokenize(filename, &config, *json)? {
                debug!("Tokenization failed, exiting with code 65");
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            if !parse(filename, &config)? {
                debug!("Parse failed, exiting with code 65");
                std::process::exit(65);
            }
        }
    }

    Ok(())
}
