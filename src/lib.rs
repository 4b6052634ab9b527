//! tacc
//!
//! Lowers a small imperative language (declarations, assignments, `for`
//! loops, arithmetic and relational expressions) to three-address code and
//! runs a fixed sequence of local optimizations over it.
//!
//! ```text
//! source -> Lexer -> Parser -> SemanticAnalyzer -> TacGenerator -> Optimizer
//! ```

pub mod frontend;
pub mod middle;
pub mod types;
pub mod utils;

use frontend::ast::Program;
use frontend::lexer::lex;
use frontend::parser::Parser;
use frontend::semantic::{SemanticAnalyzer, SemanticError, SymbolTable};
use frontend::token::Token;
use middle::ir::{Quad, TacProgram};
use middle::ir_gen::TacGenerator;
use middle::optimize::{Optimized, Optimizer};

pub use utils::{Error, Result};

/// Pipeline switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the optimizer over the generated code
    pub optimize: bool,
    /// Record the parser's derivation trace
    pub derivation_log: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            derivation_log: false,
        }
    }
}

/// Everything the pipeline produced for one source text
#[derive(Debug, Clone)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub ast: Program,
    pub symbols: SymbolTable,
    pub derivation: Option<Vec<String>>,
    /// Non-fatal parser findings
    pub warnings: Vec<String>,
    pub tac: TacProgram,
    /// `None` when optimization is disabled
    pub optimized: Option<Optimized>,
}

impl Compilation {
    /// The final instruction sequence: optimized if available
    pub fn code(&self) -> &[Quad] {
        self.optimized.as_ref().map_or(&self.tac.code, |o| &o.code)
    }
}

/// Receives each stage's output as soon as it exists, so a caller can
/// keep what was produced before a later stage fails.
pub trait StageObserver {
    fn tokens(&mut self, _tokens: &[Token]) {}

    /// Called after parsing, whether or not it succeeded
    fn derivation(&mut self, _steps: &[String]) {}

    fn ast(&mut self, _ast: &Program) {}

    /// Called with the table even when diagnostics were found
    fn symbols(&mut self, _symbols: &SymbolTable, _errors: &[SemanticError]) {}

    fn tac(&mut self, _tac: &TacProgram) {}

    fn optimized(&mut self, _tac: &TacProgram, _optimized: &Optimized) {}
}

impl StageObserver for () {}

/// Lex, parse and check `source`, returning the tree and the analysis results
pub fn analyze(source: &str) -> Result<(Vec<Token>, Program, SymbolTable, Vec<SemanticError>)> {
    let tokens = lex(source).tokenize()?;
    let program = Parser::from_tokens(tokens.clone()).parse_program()?;
    let (symbols, errors) = SemanticAnalyzer::new().analyze(&program);
    Ok((tokens, program, symbols, errors))
}

/// Run the whole pipeline. Semantic diagnostics abort before lowering.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation> {
    compile_with(source, options, &mut ())
}

/// [`compile`], reporting every stage to `observer` as it completes
pub fn compile_with(
    source: &str,
    options: &CompileOptions,
    observer: &mut dyn StageObserver,
) -> Result<Compilation> {
    let tokens = lex(source).tokenize()?;
    log::debug!("lexed {} token(s)", tokens.len());
    observer.tokens(&tokens);

    let mut parser = Parser::from_tokens(tokens.clone());
    if options.derivation_log {
        parser = parser.with_derivation_log();
    }
    let parsed = parser.parse_program();
    if let Some(steps) = parser.derivation() {
        observer.derivation(steps);
    }
    let ast = parsed?;
    log::debug!("parsed {} top-level statement(s)", ast.body.len());
    observer.ast(&ast);

    let (symbols, errors) = SemanticAnalyzer::new().analyze(&ast);
    observer.symbols(&symbols, &errors);
    if !errors.is_empty() {
        for err in &errors {
            log::debug!("{}", err);
        }
        return Err(Error::SemanticErrors(errors.len()));
    }

    let tac = TacGenerator::new().generate(&ast);
    observer.tac(&tac);

    let optimized = if options.optimize {
        let optimized = Optimizer::new(&tac.temps).optimize(&tac.code);
        observer.optimized(&tac, &optimized);
        Some(optimized)
    } else {
        None
    };

    Ok(Compilation {
        tokens,
        derivation: parser.derivation().map(<[String]>::to_vec),
        warnings: parser.warnings().to_vec(),
        ast,
        symbols,
        tac,
        optimized,
    })
}
