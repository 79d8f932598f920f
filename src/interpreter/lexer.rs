use logos::Logos;

use crate::{
    ast::{QuoteStyle, StringLiteral},
    error::ParseError,
    interpreter::parser::core::ParseResult,
};

/// Columns a tab advances to.
const TAB_WIDTH: usize = 8;

/// Represents a lexical token in the source input.
/// A token is a minimal but meaningful unit of text produced by the lexer.
/// This enum defines all recognized tokens of the expression language,
/// including the layout tokens [`Token::Indent`] and [`Token::Dedent`] that
/// only [`tokenize`] produces.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(extras = LexerExtras)]
pub enum Token {
    /// Numeric literal tokens, such as `3.14`, `.5`, `2.0` or `2.1e-10`.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Real(f64),
    /// Integer literal tokens, such as `42`.
    #[regex(r"[0-9]+", parse_integer)]
    Integer(i64),
    /// String literals in any quote style, with an optional `r` or `u`
    /// prefix.
    #[regex(r#"[rRuU]?'([^'\\\n]|\\.)*'"#, parse_string)]
    #[regex(r#"[rRuU]?"([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"[rRuU]?'''", parse_long_string)]
    #[regex(r#"[rRuU]?""""#, parse_long_string)]
    Str(StringLiteral),
    /// An object label, `<<Label>>`.
    #[regex(r"<<[^>\n]*>>", |lex| {
        let s = lex.slice();
        s[2..s.len() - 2].to_string()
    })]
    Label(String),
    /// A document name followed by `#`, as in `Doc#Box`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*#", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    DocumentName(String),
    /// A cell address with a `$` marker, such as `$A$1`.
    #[regex(r"\$[A-Z]{1,2}\$?[0-9]+|[A-Z]{1,2}\$[0-9]+", |lex| lex.slice().to_string())]
    CellRef(String),
    /// A cell range, such as `A1:B3`.
    #[regex(r"\$?[A-Z]{1,2}\$?[0-9]+:\$?[A-Z]{1,2}\$?[0-9]+", parse_range)]
    Range((String, String)),
    /// `True`
    #[token("True")]
    TrueLiteral,
    /// `False`
    #[token("False")]
    FalseLiteral,
    /// `None`
    #[token("None")]
    NoneLiteral,
    /// `and`
    #[token("and")]
    And,
    /// `or`
    #[token("or")]
    Or,
    /// `not`
    #[token("not")]
    Not,
    /// `is`
    #[token("is")]
    Is,
    /// `in`
    #[token("in")]
    In,
    /// `if`
    #[token("if")]
    If,
    /// `elif`
    #[token("elif")]
    Elif,
    /// `else`
    #[token("else")]
    Else,
    /// `for`
    #[token("for")]
    For,
    /// `while`
    #[token("while")]
    While,
    /// `break`
    #[token("break")]
    Break,
    /// `continue`
    #[token("continue")]
    Continue,
    /// `return`
    #[token("return")]
    Return,
    /// `raise`
    #[token("raise")]
    Raise,
    /// `pass`
    #[token("pass")]
    Pass,
    /// `def`
    #[token("def")]
    Def,
    /// `lambda`
    #[token("lambda")]
    Lambda,
    /// `try`
    #[token("try")]
    Try,
    /// `except`
    #[token("except")]
    Except,
    /// `finally`
    #[token("finally")]
    Finally,
    /// `del`
    #[token("del")]
    Del,
    /// `global`
    #[token("global")]
    Global,
    /// `nonlocal`
    #[token("nonlocal")]
    Nonlocal,
    /// `import`
    #[token("import")]
    Import,
    /// `from`
    #[token("from")]
    From,
    /// `as`
    #[token("as")]
    As,
    /// Identifier tokens; variable, property, object or unit names.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    #[token("°", |lex| lex.slice().to_string())]
    Identifier(String),
    /// `# comments`, kept so they can be attached to statements.
    #[regex(r"#[^\n\r]*", |lex| lex.slice()[1..].to_string(), allow_greedy = true)]
    Comment(String),
    /// `+=`
    #[token("+=")]
    PlusAssign,
    /// `-=`
    #[token("-=")]
    MinusAssign,
    /// `*=`
    #[token("*=")]
    MulAssign,
    /// `/=`
    #[token("/=")]
    DivAssign,
    /// `//=`
    #[token("//=")]
    FloorDivAssign,
    /// `%=`
    #[token("%=")]
    ModAssign,
    /// `**=`
    #[token("**=")]
    PowAssign,
    /// `^=`
    #[token("^=")]
    CaretAssign,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `**`
    #[token("**")]
    DoubleStar,
    /// `*`
    #[token("*")]
    Star,
    /// `//`
    #[token("//")]
    DoubleSlash,
    /// `/`
    #[token("/")]
    Slash,
    /// `^`
    #[token("^")]
    Caret,
    /// `%`
    #[token("%")]
    Percent,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `,`
    #[token(",")]
    Comma,
    /// `:`
    #[token(":")]
    Colon,
    /// `;`
    #[token(";")]
    Semicolon,
    /// `.`
    #[token(".")]
    Dot,
    /// `?`
    #[token("?")]
    Question,
    /// `=`
    #[token("=")]
    Equals,
    /// `==`
    #[token("==")]
    EqualEqual,
    /// `!=`
    #[token("!=")]
    BangEqual,
    /// `<=`
    #[token("<=")]
    LessEqual,
    /// `>=`
    #[token(">=")]
    GreaterEqual,
    /// `<`
    #[token("<")]
    Less,
    /// `>`
    #[token(">")]
    Greater,
    /// End of a logical line.
    #[regex(r"\r?\n", |lex| {
        lex.extras.line += 1;
    })]
    NewLine,
    /// A backslash continuing the logical line.
    #[regex(r"\\\r?\n", |lex| {
        lex.extras.line += 1;
        logos::Skip
    })]
    Continuation,
    /// Spaces, tabs and feeds.
    #[regex(r"[ \t\f]+", logos::skip)]
    Ignored,
    /// Start of a more deeply indented suite.
    Indent,
    /// End of an indented suite.
    Dedent,
}

/// Additional information carried by the lexer during tokenization.
///
/// Tracks the current line number for error reporting and diagnostics.
#[derive(Default)]
pub struct LexerExtras {
    /// The current line number in the source being tokenized.
    pub line: usize,
}

/// Parses a floating-point literal from the current token slice.
fn parse_float(lex: &logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

/// Parses an integer literal from the current token slice.
///
/// # Returns
/// - `Some(i64)`: The parsed integer value if successful.
/// - `None`: If the literal does not fit an `i64`.
fn parse_integer(lex: &logos::Lexer<Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_range(lex: &logos::Lexer<Token>) -> Option<(String, String)> {
    let (begin, end) = lex.slice().split_once(':')?;
    Some((begin.to_string(), end.to_string()))
}

/// Splits an optional `r`/`u` prefix off a string token.
fn split_prefix(slice: &str) -> (Option<char>, &str) {
    match slice.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => (Some(c.to_ascii_lowercase()), &slice[1..]),
        _ => (None, slice),
    }
}

/// Builds a literal from the text between its quotes.
fn literal(raw: &str, quote: QuoteStyle, prefix: Option<char>) -> Option<StringLiteral> {
    let text = if prefix == Some('r') {
        raw.to_string()
    } else {
        unescape(raw)?
    };
    Some(StringLiteral { text,
                         raw: raw.to_string(),
                         quote,
                         prefix })
}

/// Parses a single-line string literal.
fn parse_string(lex: &logos::Lexer<Token>) -> Option<StringLiteral> {
    let (prefix, quoted) = split_prefix(lex.slice());
    let quote = if quoted.starts_with('"') {
        QuoteStyle::Double
    } else {
        QuoteStyle::Single
    };
    literal(&quoted[1..quoted.len() - 1], quote, prefix)
}

/// Parses a triple-quoted literal by scanning for its closing delimiter.
fn parse_long_string(lex: &mut logos::Lexer<Token>) -> Option<StringLiteral> {
    let (prefix, opening) = split_prefix(lex.slice());
    let (quote, delimiter) = if opening.starts_with('"') {
        (QuoteStyle::TripleDouble, "\"\"\"")
    } else {
        (QuoteStyle::TripleSingle, "'''")
    };
    let remainder = lex.remainder();
    let mut end = None;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if remainder[i..].starts_with(delimiter) {
            end = Some(i);
            break;
        }
    }
    let end = end?;
    let raw = &remainder[..end];
    lex.extras.line += raw.matches('\n').count();
    lex.bump(end + delimiter.len());
    literal(raw, quote, prefix)
}

/// Decodes backslash escapes. Unknown escapes are kept as written.
///
/// # Example
/// ```
/// use cadexpr::interpreter::lexer::unescape;
///
/// assert_eq!(unescape(r"a\tb\x41\u00e9\q").as_deref(), Some("a\tbAé\\q"));
/// assert_eq!(unescape(r"\x4"), None);
/// ```
#[must_use]
pub fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {},
            Some('x') => out.push(hex_char(&mut chars, 2)?),
            Some('u') => out.push(hex_char(&mut chars, 4)?),
            Some('U') => out.push(hex_char(&mut chars, 8)?),
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }
    Some(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let code = (0..digits).map(|_| chars.next()?.to_digit(16))
                          .try_fold(0u32, |acc, d| Some(acc * 16 + d?))?;
    char::from_u32(code)
}

/// Width of the leading whitespace `prefix`, with tabs advancing to the next
/// multiple of eight.
fn indent_width(prefix: &str) -> usize {
    prefix.chars().fold(0, |width, c| match c {
                      '\t' => (width / TAB_WIDTH + 1) * TAB_WIDTH,
                      _ => width + 1,
                  })
}

/// Turns a failed token into a parse error.
fn lex_error(slice: &str, line: usize) -> ParseError {
    let (_, unprefixed) = split_prefix(slice);
    if unprefixed.starts_with(['\'', '"']) {
        ParseError::InvalidString { details: format!("Invalid string literal {slice}"),
                                    line }
    } else if !slice.is_empty() && slice.bytes().all(|b| b.is_ascii_digit()) {
        ParseError::LiteralTooLarge { line }
    } else {
        ParseError::UnexpectedToken { token: slice.to_string(),
                                      line }
    }
}

/// Converts source text into `(token, line)` pairs ready for parsing.
///
/// Newlines inside brackets and after a trailing backslash are dropped.
/// Every other logical line ends with [`Token::NewLine`], and changes of
/// leading whitespace become [`Token::Indent`] and [`Token::Dedent`].
/// Lines holding only a comment keep the comment but never change the
/// indentation; their comments are moved after the layout tokens of the
/// next line so they precede the statement they describe.
///
/// # Errors
/// - `InvalidString` for malformed string literals.
/// - `LiteralTooLarge` for integers beyond `i64`.
/// - `Indentation` when a line dedents to a column no enclosing suite
///   started at.
///
/// # Example
/// ```
/// use cadexpr::interpreter::lexer::{Token, tokenize};
///
/// let tokens: Vec<Token> = tokenize("if x:\n    y\n").unwrap()
///                                                   .into_iter()
///                                                   .map(|(t, _)| t)
///                                                   .collect();
/// assert_eq!(tokens,
///            [Token::If,
///             Token::Identifier("x".into()),
///             Token::Colon,
///             Token::NewLine,
///             Token::Indent,
///             Token::Identifier("y".into()),
///             Token::NewLine,
///             Token::Dedent]);
/// ```
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token, usize)>> {
    let mut lexer = Token::lexer_with_extras(source, LexerExtras { line: 1 });
    let mut layout = Layout::default();
    let mut line_start = 0;

    while let Some(token) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let line = lexer.extras.line - slice.matches('\n').count();
        let Ok(token) = token else {
            return Err(lex_error(slice, line));
        };
        let column = if layout.at_line_start {
            indent_width(source.get(line_start..span.start).unwrap_or_default())
        } else {
            0
        };
        if token == Token::NewLine {
            line_start = span.end;
        }
        layout.push(token, line, column)?;
    }
    Ok(layout.finish(lexer.extras.line))
}

/// State of the layout pass.
struct Layout {
    out:           Vec<(Token, usize)>,
    indents:       Vec<usize>,
    depth:         usize,
    pending:       Vec<(Token, usize)>,
    at_line_start: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self { out:           Vec::new(),
               indents:       Vec::new(),
               depth:         0,
               pending:       Vec::new(),
               at_line_start: true, }
    }
}

impl Layout {
    fn push(&mut self, token: Token, line: usize, column: usize) -> ParseResult<()> {
        match token {
            Token::NewLine => {
                if self.depth == 0 && !self.at_line_start {
                    self.out.push((Token::NewLine, line));
                    self.at_line_start = true;
                }
            },
            Token::Comment(_) if self.depth > 0 => {},
            Token::Comment(_) if self.at_line_start => self.pending.push((token, line)),
            _ => {
                if self.at_line_start {
                    self.indent(column, line)?;
                    for (comment, comment_line) in self.pending.drain(..) {
                        self.out.push((comment, comment_line));
                        self.out.push((Token::NewLine, comment_line));
                    }
                    self.at_line_start = false;
                }
                match token {
                    Token::LParen | Token::LBracket | Token::LBrace => self.depth += 1,
                    Token::RParen | Token::RBracket | Token::RBrace => {
                        self.depth = self.depth.saturating_sub(1);
                    },
                    _ => {},
                }
                self.out.push((token, line));
            },
        }
        Ok(())
    }

    fn indent(&mut self, column: usize, line: usize) -> ParseResult<()> {
        let Some(&top) = self.indents.last() else {
            self.indents.push(column);
            return Ok(());
        };
        if column > top {
            self.indents.push(column);
            self.out.push((Token::Indent, line));
            return Ok(());
        }
        while let Some(&top) = self.indents.last()
              && column < top
              && self.indents.len() > 1
        {
            self.indents.pop();
            self.out.push((Token::Dedent, line));
        }
        if self.indents.last() == Some(&column) {
            Ok(())
        } else {
            Err(ParseError::Indentation { line })
        }
    }

    fn finish(mut self, line: usize) -> Vec<(Token, usize)> {
        if !self.at_line_start {
            self.out.push((Token::NewLine, line));
        }
        for (comment, comment_line) in self.pending.drain(..) {
            self.out.push((comment, comment_line));
            self.out.push((Token::NewLine, comment_line));
        }
        for _ in 1..self.indents.len() {
            self.out.push((Token::Dedent, line));
        }
        self.out
    }
}
