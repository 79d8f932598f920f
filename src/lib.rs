//! # cadexpr
//!
//! cadexpr is a unit-aware expression engine for CAD documents, written in
//! Rust. It parses, analyzes and evaluates expressions bound to object
//! properties: numbers with physical units, strings, lists and dicts, and a
//! complete imperative statement language with user functions. Dependency
//! extraction tells the host which properties an expression reads, so a
//! change recomputes everything depending on it.

#![warn(
    clippy::redundant_clone,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::large_enum_variant,
    clippy::string_lit_as_bytes,
    clippy::match_same_arms,
    clippy::cargo,
    clippy::nursery,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    clippy::correctness,
    clippy::complexity,
    clippy::pedantic,
    //missing_docs,
)]
#![allow(clippy::missing_errors_doc)]

use std::rc::Rc;

use crate::{
    ast::Expression,
    config::EngineConfig,
    document::{Document, DocumentObject, Workspace},
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::core::Value,
    },
};

/// Defines the structure of parsed code.
///
/// This module declares the `Expr` node and related types that represent
/// expressions and statements as a tree. The tree is built by the parser,
/// rendered back to source by the display module and walked by the
/// evaluator and the analysis passes.
///
/// # Responsibilities
/// - Defines node kinds for all language constructs.
/// - Attaches source lines and comments to nodes.
/// - Provides traversal and the bound [`ast::Expression`] wrapper.
pub mod ast;
/// Engine configuration loaded from TOML.
pub mod config;
/// The in-memory document model expressions are evaluated against.
pub mod document;
/// Provides unified error types for parsing and evaluation.
///
/// This module defines all errors that can be raised during lexing, parsing,
/// or evaluating code. Every error carries the line it was detected on; the
/// outermost evaluation adds the text of the failing expression.
///
/// # Responsibilities
/// - Defines error enums for all failure modes.
/// - Maps runtime errors to their kind and to catchable exceptions.
pub mod error;
/// References to properties of document objects.
pub mod identifier;
/// Orchestrates the entire process of code execution.
///
/// This module ties together lexing, parsing, evaluation, value
/// representations, simplification and dependency analysis.
///
/// # Responsibilities
/// - Coordinates the lexer, parser, evaluator and value types.
/// - Provides the passes hosts run over stored expressions.
pub mod interpreter;
/// Physical quantities and units.
pub mod quantity;
/// General utilities for safe numeric conversion and helpers.
///
/// This module provides reusable helpers and conversion routines that are used
/// throughout the interpreter, parser, and evaluator. These include safe
/// conversions between integer and floating-point types and number
/// formatting.
///
/// # Responsibilities
/// - Safely convert between `i64`, `u64`, `usize`, and `f64` without silent
///   data loss.
/// - Provide general utility functions used in multiple modules.
pub mod util;

pub use crate::interpreter::parser::parse;

/// Parses and evaluates `source` in `ctx` without an owning object.
///
/// Every call runs in a fresh frame, so local variables of one call are
/// never visible to the next.
///
/// # Errors
/// Returns the parse error, wrapped as [`error::RuntimeError::Parse`], or
/// the runtime error of the evaluation.
///
/// # Examples
/// ```
/// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
///
/// let mut ctx = Context::new();
/// assert_eq!(evaluate_source(&mut ctx, "10mm + 5mm").unwrap().to_string(), "15 mm");
///
/// // Locals do not leak between evaluations.
/// assert!(evaluate_source(&mut ctx, "x = 1; x").is_ok());
/// assert!(evaluate_source(&mut ctx, "x").is_err());
/// ```
pub fn evaluate_source(ctx: &mut Context, source: &str) -> EvalResult<Value> {
    let root = parse(source)?;
    ctx.evaluate_tree(&root, None)
}

/// A workspace with one scratch document and a context to evaluate in.
///
/// Expressions evaluated through the engine are owned by the scratch object
/// `Scratch` of the document `Unnamed`, so unqualified names resolve to its
/// properties and to the other objects of that document.
///
/// # Example
/// ```
/// use cadexpr::{Engine, interpreter::value::core::Value};
///
/// let mut engine = Engine::new();
/// let plate = engine.document().add_object("Plate");
/// plate.set_property("Width", Value::Integer(40));
///
/// assert_eq!(engine.evaluate("Plate.Width * 2").unwrap().to_string(), "80");
/// ```
pub struct Engine {
    workspace: Rc<Workspace>,
    document:  Rc<Document>,
    scratch:   Rc<DocumentObject>,
    context:   Context,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Name of the scratch document.
    pub const DOCUMENT: &'static str = "Unnamed";
    /// Name of the object owning evaluated expressions.
    pub const SCRATCH: &'static str = "Scratch";

    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let workspace = Workspace::new();
        let document = workspace.add_document(Self::DOCUMENT);
        let scratch = document.add_object(Self::SCRATCH);
        Self { workspace,
               document,
               scratch,
               context: Context::with_config(config) }
    }

    /// The workspace holding the scratch document.
    #[must_use]
    pub const fn workspace(&self) -> &Rc<Workspace> {
        &self.workspace
    }

    /// The scratch document.
    #[must_use]
    pub const fn document(&self) -> &Rc<Document> {
        &self.document
    }

    /// The object owning evaluated expressions.
    #[must_use]
    pub const fn scratch(&self) -> &Rc<DocumentObject> {
        &self.scratch
    }

    /// The evaluation context.
    pub const fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Parses `source` into an expression owned by the scratch object.
    pub fn parse(&self, source: &str) -> EvalResult<Expression> {
        Ok(Expression::parse(Some(&self.scratch), source)?)
    }

    /// Parses and evaluates `source`.
    pub fn evaluate(&mut self, source: &str) -> EvalResult<Value> {
        let expression = self.parse(source)?;
        self.context.evaluate_expression(&expression)
    }

    /// Recomputes every expression bound in the scratch document.
    ///
    /// # Returns
    /// The number of bindings evaluated.
    pub fn recompute(&mut self) -> EvalResult<usize> {
        self.document.recompute(&mut self.context)
    }
}
