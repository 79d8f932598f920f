/// Parsing errors.
///
/// Defines all error types that can occur during lexing and parsing of
/// expression text. Parse errors include syntax mistakes, unexpected tokens,
/// malformed string literals, unknown units and invalid parameter lists.
pub mod parse_error;
/// Runtime errors.
///
/// Contains all error types that can be raised during evaluation. Runtime
/// errors cover unknown names, unit mismatches, sandbox rejections,
/// user-level `raise`, cancellation and every other failure of the evaluator.
pub mod runtime_error;

pub use parse_error::ParseError;
pub use runtime_error::{ErrorKind, RuntimeError};
