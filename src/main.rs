//! tacc command-line driver
//!
//! Runs the pipeline stage by stage and writes each intermediate artifact
//! to the output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tacc::frontend::ast::{self, Program};
use tacc::frontend::semantic::{SemanticError, SymbolTable};
use tacc::frontend::token::Token;
use tacc::middle::ir::TacProgram;
use tacc::middle::ir_printer::print_tac;
use tacc::middle::optimize::Optimized;
use tacc::utils::Error;
use tacc::{CompileOptions, StageObserver};

/// tacc - three-address code compiler
#[derive(Parser, Debug)]
#[command(name = "tacc")]
#[command(version)]
#[command(about = "Lowers a small imperative language to optimized three-address code")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Directory for the generated artifacts
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Skip the optimizer
    #[arg(long)]
    no_optimize: bool,

    /// Write the parser's derivation trace to derivation_log.txt
    #[arg(long)]
    derivation: bool,

    /// Print the AST dump and TAC listings to stdout
    #[arg(long)]
    print: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a source file for errors without generating code
    Check {
        /// Input source file
        input: PathBuf,
    },
}

/// Outcome of a run that did not hit an I/O failure
enum Status {
    Ok,
    /// Lexical, syntax or semantic failure, already reported
    Failed,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Check { input }) => check_file(input),
        None => match &cli.input {
            Some(input) => compile_file(input, &cli),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: tacc <FILE> or tacc check <FILE>");
                process::exit(2);
            }
        },
    };

    match result {
        Ok(Status::Ok) => {}
        Ok(Status::Failed) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Writes each stage's output into the artifact directory as it arrives
struct ArtifactWriter<'a> {
    dir: &'a Path,
    print: bool,
    /// First I/O failure; later artifacts are skipped
    failure: Option<anyhow::Error>,
}

impl<'a> ArtifactWriter<'a> {
    fn new(dir: &'a Path, print: bool) -> Self {
        Self { dir, print, failure: None }
    }

    fn write(&mut self, name: &str, contents: impl FnOnce() -> Result<String>) {
        if self.failure.is_some() {
            return;
        }
        let path = self.dir.join(name);
        let written = contents().and_then(|text| {
            fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
        });
        match written {
            Ok(()) => log::info!("wrote {}", path.display()),
            Err(e) => self.failure = Some(e),
        }
    }
}

impl StageObserver for ArtifactWriter<'_> {
    fn tokens(&mut self, tokens: &[Token]) {
        self.write("tokens.txt", || Ok(tokens.iter().map(|t| format!("{}\n", t)).collect()));
        println!("  [✓] Lexed {} tokens", tokens.len());
    }

    fn derivation(&mut self, steps: &[String]) {
        self.write("derivation_log.txt", || Ok(steps.join("\n") + "\n"));
    }

    fn ast(&mut self, ast: &Program) {
        self.write("AST.json", || serde_json::to_string_pretty(ast).context("serializing AST"));
        println!("  [✓] Parsed {} statements", ast.body.len());
        if self.print {
            print!("{}", ast::dump(ast));
        }
    }

    fn symbols(&mut self, symbols: &SymbolTable, errors: &[SemanticError]) {
        self.write("symbol_table.json", || {
            serde_json::to_string_pretty(symbols).context("serializing symbol table")
        });
        if errors.is_empty() {
            println!("  [✓] Semantic analysis passed ({} symbols)", symbols.len());
            return;
        }
        self.write("semantic_errors.txt", || {
            Ok(errors.iter().map(|e| format!("- {}\n", e)).collect())
        });
        eprintln!("Semantic errors found:");
        for err in errors {
            eprintln!("  - {}", err);
        }
    }

    fn tac(&mut self, tac: &TacProgram) {
        let listing = print_tac(&tac.code, &tac.strings);
        self.write("tac_code.txt", || Ok(listing.clone()));
        println!("  [✓] Generated {} instructions", tac.code.len());
        if self.print {
            print!("{}", listing);
        }
    }

    fn optimized(&mut self, tac: &TacProgram, optimized: &Optimized) {
        for diag in &optimized.diagnostics {
            eprintln!("  [!] {}", diag);
        }
        let listing = print_tac(&optimized.code, &tac.strings);
        self.write("optimized_tac.txt", || Ok(listing.clone()));
        println!(
            "  [✓] Optimized: {} -> {} instructions",
            tac.code.len(),
            optimized.code.len()
        );
        if self.print {
            print!("{}", listing);
        }
    }
}

/// Compile a source file, writing every artifact along the way
fn compile_file(input: &Path, cli: &Cli) -> Result<Status> {
    println!("Compiling: {}", input.display());

    let source = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let out = cli.output.as_path();
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let options = CompileOptions {
        optimize: !cli.no_optimize,
        derivation_log: cli.derivation,
    };
    let mut writer = ArtifactWriter::new(out, cli.print);
    let result = tacc::compile_with(&source, &options, &mut writer);
    if let Some(failure) = writer.failure {
        return Err(failure);
    }

    match result {
        Ok(compilation) => {
            for warning in &compilation.warnings {
                eprintln!("  [!] {}", warning);
            }
            Ok(Status::Ok)
        }
        Err(e @ Error::SemanticErrors(_)) => {
            eprintln!("{}", e);
            Ok(Status::Failed)
        }
        Err(e) => {
            let kind = if e.is_lexical() { "Lexical error" } else { "Syntax error" };
            report(&source, kind, &e);
            Ok(Status::Failed)
        }
    }
}

/// Check a source file for errors without generating code
fn check_file(input: &Path) -> Result<Status> {
    println!("Checking: {}", input.display());

    let source = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let (_, _, _, errors) = match tacc::analyze(&source) {
        Ok(analysis) => analysis,
        Err(e) => {
            let kind = if e.is_lexical() { "Lexical error" } else { "Syntax error" };
            report(&source, kind, &e);
            return Ok(Status::Failed);
        }
    };

    if errors.is_empty() {
        println!("No errors found");
        Ok(Status::Ok)
    } else {
        for err in &errors {
            eprintln!("  - {}", err);
        }
        Ok(Status::Failed)
    }
}

/// Print an error with the offending source line and a caret marker
fn report(source: &str, kind: &str, err: &Error) {
    eprintln!("{}: {}", kind, err);

    let Some(span) = err.span() else {
        return;
    };
    let Some(line) = source.lines().nth(span.line.saturating_sub(1)) else {
        return;
    };

    let gutter = span.line.to_string();
    eprintln!("{}| {}", gutter, line);
    eprintln!(
        "{}| {}{}",
        " ".repeat(gutter.len()),
        " ".repeat(span.column.saturating_sub(1)),
        "^".repeat(span.len().max(1))
    );
}
