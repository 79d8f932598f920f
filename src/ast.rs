/// Source rendering of the tree.
///
/// Produces either the persistent spelling used when an expression is saved
/// or the display spelling shown to users, with operator-aware
/// parenthesization.
pub mod display;
/// Operator enums with their priorities and spellings.
pub mod operator;
/// Depth-first traversal and the touched check.
pub mod visit;

use std::rc::{Rc, Weak};

use indexmap::IndexMap;

pub use crate::ast::operator::{BinaryOperator, UnaryOperator};
use crate::{
    document::DocumentObject,
    identifier::ObjectIdentifier,
    interpreter::{
        analysis,
        evaluator::{
            core::{Context, EvalResult},
            function::core::FunctionKind,
        },
        parser::{self, core::ParseResult},
        simplify,
        value::core::Value,
    },
    quantity::Quantity,
};

/// Priority of every node that is not an operator.
pub const ATOM_PRIORITY: u8 = 20;

/// A node of the expression tree.
///
/// Every node owns its children exclusively, so cloning is a deep copy and
/// the tree can never form a cycle. Besides its kind a node carries the
/// trailing accessors applied to its value (`.x`, `[0]`, `[1:3]`), an
/// optional comment, and the source line it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What the node is.
    pub kind:       ExprKind,
    /// Trailing accessors, applied left to right after the node's value.
    pub components: Vec<Component>,
    /// A `#` comment attached to the node, without the `#`.
    pub comment:    Option<String>,
    /// 1-based source line.
    pub line:       usize,
}

/// A trailing accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// `.name`
    Attribute(String),
    /// `[expr]`
    Index(Box<Expr>),
    /// `[start:stop:step]`
    Slice {
        /// Optional start.
        start: Option<Box<Expr>>,
        /// Optional stop.
        stop:  Option<Box<Expr>>,
        /// Optional step.
        step:  Option<Box<Expr>>,
    },
}

/// `True`, `False` and `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,
}

impl Constant {
    /// The keyword spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::None => "None",
        }
    }
}

/// How a string literal was quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `'...'`
    Single,
    /// `"..."`
    Double,
    /// `'''...'''`
    TripleSingle,
    /// `"""..."""`
    TripleDouble,
    /// `<<...>>`
    Label,
}

impl QuoteStyle {
    /// Opening delimiter.
    #[must_use]
    pub const fn open(self) -> &'static str {
        match self {
            Self::Single => "'",
            Self::Double => "\"",
            Self::TripleSingle => "'''",
            Self::TripleDouble => "\"\"\"",
            Self::Label => "<<",
        }
    }

    /// Closing delimiter.
    #[must_use]
    pub const fn close(self) -> &'static str {
        match self {
            Self::Label => ">>",
            other => other.open(),
        }
    }
}

/// A string literal as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// The decoded text.
    pub text:   String,
    /// The text between the quotes, exactly as written.
    pub raw:    String,
    /// Quote style used.
    pub quote:  QuoteStyle,
    /// `r` or `u` prefix, if any.
    pub prefix: Option<char>,
}

impl StringLiteral {
    /// A plain single-quoted literal for `text`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let quoted = crate::interpreter::value::core::quote_string(&text);
        let quote = if quoted.starts_with('"') {
            QuoteStyle::Double
        } else {
            QuoteStyle::Single
        };
        Self { text,
               raw: quoted[1..quoted.len() - 1].to_string(),
               quote,
               prefix: None }
    }
}

/// A list, tuple or set element, optionally splatted (`*seq`).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// The element expression.
    pub expr:  Expr,
    /// `true` for `*expr`.
    pub splat: bool,
}

/// A dict literal entry; a missing key means `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    /// The key, or `None` for a `**` splat.
    pub key:   Option<Expr>,
    /// The value or splatted mapping.
    pub value: Expr,
}

/// An entry of the `{name=value}` dict form; a missing name means
/// `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct IDictEntry {
    /// The key name.
    pub name:  Option<String>,
    /// The value.
    pub value: Expr,
}

/// How a call argument is passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentKind {
    /// `f(x)`
    Positional,
    /// `f(name=x)`
    Keyword(String),
    /// `f(*xs)`
    Splat,
    /// `f(**kw)`
    KwSplat,
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Passing mode.
    pub kind:  ArgumentKind,
    /// The argument expression.
    pub value: Expr,
}

impl Argument {
    /// A positional argument.
    #[must_use]
    pub const fn positional(value: Expr) -> Self {
        Self { kind: ArgumentKind::Positional,
               value }
    }
}

/// Kinds of declared parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Plain, optionally defaulted.
    Plain,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

/// A declared parameter of a `def` or `lambda`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name.
    pub name:    String,
    /// Parameter kind.
    pub kind:    ParameterKind,
    /// Default expression, evaluated when the function is created.
    pub default: Option<Expr>,
}

/// Control-flow jump statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `raise`
    Raise,
}

impl JumpKind {
    /// The statement keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Return => "return",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Raise => "raise",
        }
    }
}

/// One `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// Type or tuple of types to match; `None` catches everything.
    pub types: Option<Expr>,
    /// Name the exception is bound to.
    pub name:  Option<String>,
    /// Handler body.
    pub body:  Expr,
}

/// A `for` clause or `if` filter of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub enum ComprehensionClause {
    /// `for targets in iter`
    For {
        /// Loop targets.
        targets:   Vec<Expr>,
        /// Index of the `*` target.
        catch_all: Option<usize>,
        /// Iterated expression.
        iter:      Expr,
    },
    /// `if condition`
    If(Expr),
}

/// The brackets of a comprehension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    /// `[x for ...]`
    List,
    /// `{x for ...}`
    Set,
    /// `{k: v for ...}`
    Dict,
}

/// A module import, `module as alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItem {
    /// Module or member name; `*` in `from m import *`.
    pub name:  String,
    /// Optional alias.
    pub alias: Option<String>,
}

/// The node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A numeric literal, possibly carrying a unit after simplification.
    Number(Quantity),
    /// An integer literal, kept exact.
    Integer(i64),
    /// A unit spelled in source (`mm`, `m/s^2`).
    Unit {
        /// The unit's value in base units.
        quantity: Quantity,
        /// The unit text as written.
        text:     String,
    },
    /// `True`, `False` or `None`.
    Constant(Constant),
    /// A string literal.
    String(StringLiteral),
    /// An already evaluated value embedded in the tree.
    Value(Value),
    /// A property path or variable.
    Variable(ObjectIdentifier),
    /// A cell range `A1:B3`.
    Range {
        /// First cell or alias.
        begin: String,
        /// Last cell or alias.
        end:   String,
    },
    /// A prefix operation.
    UnaryOp {
        /// The operator.
        op:      UnaryOperator,
        /// Its operand.
        operand: Box<Expr>,
    },
    /// An infix operation.
    BinaryOp {
        /// The operator.
        op:    BinaryOperator,
        /// Left operand.
        left:  Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `c ? a : b` or `a if c else b`.
    Conditional {
        /// The condition.
        condition:   Box<Expr>,
        /// Value when true.
        then_branch: Box<Expr>,
        /// Value when false.
        else_branch: Box<Expr>,
        /// `true` for the `a if c else b` spelling.
        python_form: bool,
    },
    /// A call of a built-in function of the catalog.
    Function {
        /// Which function.
        kind: FunctionKind,
        /// Its arguments.
        args: Vec<Argument>,
    },
    /// A call of any callable value.
    Call {
        /// The expression producing the callable.
        callee: Box<Expr>,
        /// Its arguments.
        args:   Vec<Argument>,
    },
    /// Plain, compound or unpacking assignment.
    Assignment {
        /// Assignment targets.
        targets:   Vec<Expr>,
        /// Index of the `*` target.
        catch_all: Option<usize>,
        /// Operator of a compound assignment.
        op:        Option<BinaryOperator>,
        /// Right-hand side; several values form a tuple.
        values:    Vec<Expr>,
    },
    /// A list, set or dict comprehension.
    Comprehension {
        /// Bracket kind.
        kind:    ComprehensionKind,
        /// The produced element, or dict key.
        element: Box<Expr>,
        /// The dict value.
        value:   Option<Box<Expr>>,
        /// `for` and `if` clauses, outermost first.
        clauses: Vec<ComprehensionClause>,
    },
    /// `[a, *b]`
    List(Vec<Item>),
    /// `(a, b)`
    Tuple(Vec<Item>),
    /// `{a, b}`
    Set(Vec<Item>),
    /// `{k: v, **m}`
    Dict(Vec<DictEntry>),
    /// `{k=v}`
    IDict(Vec<IDictEntry>),
    /// `lambda params : body`
    Lambda {
        /// Parameters.
        params: Vec<Parameter>,
        /// Body expression.
        body:   Box<Expr>,
    },
    /// `def name(params): body`
    FunctionDef {
        /// Function name.
        name:   String,
        /// Parameters.
        params: Vec<Parameter>,
        /// Body statement.
        body:   Box<Expr>,
    },
    /// `pass`
    Pass,
    /// `return`, `break`, `continue` or `raise`.
    Jump {
        /// Which jump.
        kind:  JumpKind,
        /// Returned or raised value.
        value: Option<Box<Expr>>,
    },
    /// `if`/`elif`/`else`.
    If {
        /// `(condition, body)` pairs.
        branches:  Vec<(Expr, Expr)>,
        /// The `else` body.
        else_body: Option<Box<Expr>>,
    },
    /// `while`/`else`.
    While {
        /// Loop condition.
        condition: Box<Expr>,
        /// Loop body.
        body:      Box<Expr>,
        /// Runs when the loop ends without `break`.
        else_body: Option<Box<Expr>>,
    },
    /// `for`/`else`.
    For {
        /// Loop targets.
        targets:   Vec<Expr>,
        /// Index of the `*` target.
        catch_all: Option<usize>,
        /// Iterated expression.
        iter:      Box<Expr>,
        /// Loop body.
        body:      Box<Expr>,
        /// Runs when the loop ends without `break`.
        else_body: Option<Box<Expr>>,
    },
    /// Statements on one line, `a; b`.
    Simple(Vec<Expr>),
    /// Statements on consecutive lines.
    Block(Vec<Expr>),
    /// `try`/`except`/`else`/`finally`.
    Try {
        /// Guarded body.
        body:         Box<Expr>,
        /// Handlers, tested in order.
        handlers:     Vec<ExceptHandler>,
        /// Runs when the body raised nothing.
        else_body:    Option<Box<Expr>>,
        /// Always runs.
        finally_body: Option<Box<Expr>>,
    },
    /// `del a, b[0]`
    Del(Vec<Expr>),
    /// `global` or `nonlocal` declarations.
    Scope {
        /// `true` for `global`.
        global: bool,
        /// Declared names.
        names:  Vec<String>,
    },
    /// `import a as b`
    Import(Vec<ImportItem>),
    /// `from module import a as b`
    From {
        /// Source module.
        module: String,
        /// Imported members.
        names:  Vec<ImportItem>,
    },
}

impl Expr {
    /// Creates a node without components or comment.
    #[must_use]
    pub const fn new(kind: ExprKind, line: usize) -> Self {
        Self { kind,
               components: Vec::new(),
               comment: None,
               line }
    }

    /// A numeric literal node.
    #[must_use]
    pub const fn number(quantity: Quantity, line: usize) -> Self {
        Self::new(ExprKind::Number(quantity), line)
    }

    /// A variable node.
    #[must_use]
    pub const fn variable(identifier: ObjectIdentifier, line: usize) -> Self {
        Self::new(ExprKind::Variable(identifier), line)
    }

    /// Precedence used when printing.
    ///
    /// Negative numbers print like a unary minus and numbers with units like
    /// a unit juxtaposition, so they get parenthesized where those would.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match &self.kind {
            ExprKind::BinaryOp { op, .. } => op.priority(),
            ExprKind::UnaryOp { op, .. } => op.priority(),
            ExprKind::Conditional { .. } => 2,
            ExprKind::Assignment { .. } | ExprKind::Lambda { .. } => 0,
            ExprKind::Number(q) => quantity_priority(q),
            ExprKind::Integer(i) if *i < 0 => 7,
            ExprKind::Value(Value::Quantity(q)) => quantity_priority(q),
            ExprKind::Value(Value::Integer(i)) if *i < 0 => 7,
            ExprKind::Value(Value::Real(r)) if *r < 0.0 => 7,
            _ => ATOM_PRIORITY,
        }
    }

    /// Whether trailing components can follow the node without
    /// parentheses.
    #[must_use]
    pub const fn is_indexable(&self) -> bool {
        matches!(self.kind,
                 ExprKind::Variable(_)
                 | ExprKind::Call { .. }
                 | ExprKind::Function { .. }
                 | ExprKind::List(_)
                 | ExprKind::Tuple(_)
                 | ExprKind::Dict(_)
                 | ExprKind::IDict(_)
                 | ExprKind::Set(_)
                 | ExprKind::Comprehension { .. }
                 | ExprKind::String(_)
                 | ExprKind::Constant(_))
    }

    /// Whether the node is a numeric literal without components.
    #[must_use]
    pub fn is_number(&self) -> bool {
        self.components.is_empty() && matches!(self.kind, ExprKind::Number(_) | ExprKind::Integer(_))
    }
}

fn quantity_priority(q: &Quantity) -> u8 {
    if q.value() < 0.0 {
        7
    } else if !q.is_dimensionless() {
        9
    } else {
        ATOM_PRIORITY
    }
}

/// A parsed expression bound to the object that owns it.
///
/// The owner is only used to resolve unqualified names; it is held weakly so
/// that storing an expression on its own object does not leak.
///
/// # Example
/// ```
/// use cadexpr::{ast::Expression, interpreter::evaluator::core::Context};
///
/// let expr = Expression::parse(None, "(1 + 2) * 3").unwrap();
/// assert_eq!(expr.to_source(true), "(1 + 2) * 3");
///
/// let mut ctx = Context::new();
/// assert_eq!(expr.evaluate(&mut ctx).unwrap().to_string(), "9");
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    root:  Expr,
    owner: Option<Weak<DocumentObject>>,
}

impl Expression {
    /// Wraps an existing tree.
    #[must_use]
    pub fn new(owner: Option<&Rc<DocumentObject>>, root: Expr) -> Self {
        Self { root,
               owner: owner.map(Rc::downgrade) }
    }

    /// Parses `text` into an expression owned by `owner`.
    pub fn parse(owner: Option<&Rc<DocumentObject>>, text: &str) -> ParseResult<Self> {
        Ok(Self::new(owner, parser::parse(text)?))
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> &Expr {
        &self.root
    }

    /// Mutable access to the root node.
    pub const fn root_mut(&mut self) -> &mut Expr {
        &mut self.root
    }

    /// The owning object, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<Rc<DocumentObject>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    /// Renders the expression; `persistent` selects the saved spelling.
    #[must_use]
    pub fn to_source(&self, persistent: bool) -> String {
        self.root.render(persistent, false, 0)
    }

    /// Evaluates the expression in `ctx`.
    pub fn evaluate(&self, ctx: &mut Context) -> EvalResult<Value> {
        ctx.evaluate_expression(self)
    }

    /// Every referenced identifier, `true` marking hidden references.
    #[must_use]
    pub fn dependencies(&self) -> IndexMap<ObjectIdentifier, bool> {
        analysis::dependencies(&self.root)
    }

    /// A constant-folded copy.
    #[must_use]
    pub fn simplify(&self) -> Self {
        Self { root:  simplify::simplify(&self.root),
               owner: self.owner.clone(), }
    }

    /// Whether any referenced property is touched.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.root.is_touched(self.owner().as_ref())
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_source(false))
    }
}
