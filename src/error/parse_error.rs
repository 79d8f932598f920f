use thiserror::Error;

/// Represents all errors that can occur during lexing or parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Found an unexpected token while parsing.
    #[error("Error on line {line}: Unexpected token: {token}.")]
    UnexpectedToken {
        /// The token encountered.
        token: String,
        /// The source line where the error occurred.
        line:  usize,
    },
    /// Reached the end of input unexpectedly.
    #[error("Error on line {line}: Unexpected end of input.")]
    UnexpectedEndOfInput {
        /// The source line where the error occurred.
        line: usize,
    },
    /// A closing bracket was expected but not found.
    #[error("Error on line {line}: Expected closing '{expected}' but none found.")]
    ExpectedClosing {
        /// The bracket that was expected.
        expected: char,
        /// The source line where the error occurred.
        line:     usize,
    },
    /// The indentation of a statement block is inconsistent.
    #[error("Error on line {line}: Inconsistent indentation.")]
    Indentation {
        /// The source line where the error occurred.
        line: usize,
    },
    /// A string literal is malformed or uses an unsupported prefix.
    #[error("Error on line {line}: {details}")]
    InvalidString {
        /// What is wrong with the literal.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// A unit name could not be resolved.
    #[error("Error on line {line}: Unknown unit '{unit}'.")]
    UnknownUnit {
        /// The unit text.
        unit: String,
        /// The source line where the error occurred.
        line: usize,
    },
    /// A parameter or argument list is malformed.
    #[error("Error on line {line}: {details}")]
    InvalidArguments {
        /// What is wrong with the list.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// Found extra tokens after parsing should have completed.
    #[error("Error on line {line}: Extra tokens after expression. Check your input: {token}")]
    UnexpectedTrailingTokens {
        /// The extra/unexpected token.
        token: String,
        /// The source line where the error occurred.
        line:  usize,
    },
    /// Some other kind of parse error, with a custom message.
    #[error("Error on line {line}: {message}")]
    Other {
        /// Details about the parse error.
        message: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// A literal value was too large to be represented safely.
    #[error("Error on line {line}: Literal is too large.")]
    LiteralTooLarge {
        /// The source line where the error occurred.
        line: usize,
    },
    /// Brackets, prefix operators, conditionals or suites nest deeper than
    /// the parser allows.
    #[error("Error on line {line}: Expression is nested too deeply.")]
    TooDeeplyNested {
        /// The source line where the limit was reached.
        line: usize,
    },
}

impl ParseError {
    /// Returns the source line the error was detected on.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::UnexpectedToken { line, .. }
            | Self::UnexpectedEndOfInput { line }
            | Self::ExpectedClosing { line, .. }
            | Self::Indentation { line }
            | Self::InvalidString { line, .. }
            | Self::UnknownUnit { line, .. }
            | Self::InvalidArguments { line, .. }
            | Self::UnexpectedTrailingTokens { line, .. }
            | Self::Other { line, .. }
            | Self::LiteralTooLarge { line }
            | Self::TooDeeplyNested { line } => *line,
        }
    }
}
