/// The evaluator module executes AST nodes and computes results.
///
/// The evaluator walks the tree, evaluates expressions and statements,
/// resolves names through the frame stack and the host document, applies
/// unit-aware arithmetic and guards every host call with the sandbox.
///
/// # Responsibilities
/// - Evaluates AST nodes, reporting jumps as control flow values.
/// - Handles frames, bindings, user functions and host callables.
/// - Reports runtime errors such as unit mismatches or denied modules.
pub mod evaluator;
/// The lexer module tokenizes source code for further parsing.
///
/// The lexer reads the raw source text and produces a stream of tokens, each
/// tagged with its line: numbers, strings, identifiers, document and label
/// references, cell addresses, operators and keywords. A layout pass turns
/// leading whitespace into indentation tokens.
///
/// # Responsibilities
/// - Converts the input character stream into tokens with source lines.
/// - Decodes string literals and keeps their quoting.
/// - Reports lexical errors for invalid or malformed input.
pub mod lexer;
/// The parser module builds the expression tree from tokens.
///
/// The parser processes the token stream produced by the lexer and
/// constructs the tree of [`crate::ast::Expr`] nodes for expressions and
/// statements alike.
///
/// # Responsibilities
/// - Converts tokens into nodes, attaching comments to statements.
/// - Validates grammar, parameter lists and `try` clauses.
/// - Reports syntax errors with their line.
pub mod parser;
/// Constant folding and dead-branch elimination.
pub mod simplify;
/// Read-only and rewriting passes over parsed trees.
///
/// Collects the identifiers an expression depends on and rewrites
/// references when objects are renamed, labels change or spreadsheet cells
/// move.
pub mod analysis;
/// The value module defines the runtime data types for evaluation.
///
/// This module declares the host values expressions produce: numbers,
/// quantities, strings, shared lists and dicts, geometry, functions,
/// exceptions and opaque host objects, together with the bridge between
/// quantities and values.
///
/// # Responsibilities
/// - Defines the `Value` enum and all supported value variants.
/// - Implements truthiness, iteration, hashing keys and rendering.
/// - Provides the type-coercing equality used by comparisons.
pub mod value;
