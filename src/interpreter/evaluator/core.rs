use std::{
    cell::Cell,
    collections::HashSet,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    ast::{BinaryOperator, Constant, Expr, ExprKind, Expression},
    config::EngineConfig,
    document::DocumentObject,
    error::RuntimeError,
    interpreter::{
        evaluator::{
            builtins::{core::builtin_table, math::math_module},
            frame::FrameStack,
            security::{CallDisabler, SecurityPolicy},
        },
        value::{bridge::value_from_quantity, core::Value, host::HostModule},
    },
};

/// Result type used by the evaluator.
///
/// All evaluation functions return either a value of type `T` or a
/// `RuntimeError` describing the failure.
pub type EvalResult<T> = Result<T, RuntimeError>;

/// Host callback polled by loops; returning `true` aborts evaluation.
pub type CancelCheck = Box<dyn Fn() -> bool>;

/// How a statement left its block.
///
/// Statements report jumps as a value instead of unwinding, so loops and
/// function calls can absorb them cheaply. Errors, including `raise`, travel
/// as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    /// Fell through normally.
    #[default]
    None,
    /// `return` fired.
    Return,
    /// `break` fired.
    Break,
    /// `continue` fired.
    Continue,
}

/// Stores the runtime evaluation context.
///
/// This struct holds all interpreter state that outlives a single
/// expression: the frame stack, the sandbox and its cache, the import
/// registry, built-in names and the warning ledger.
///
/// ## Usage
///
/// `Context` is created once and reused for evaluating expressions. It is
/// single threaded; evaluating from several threads means one context per
/// thread, or external serialization.
pub struct Context {
    pub(crate) frames:   FrameStack,
    pub(crate) security: SecurityPolicy,
    pub(crate) disabler: Rc<Cell<usize>>,
    pub(crate) modules:  IndexMap<String, Rc<HostModule>>,
    pub(crate) builtins: IndexMap<String, Value>,
    pub(crate) warned:   HashSet<(String, u8)>,
    pub(crate) cancel:   Option<CancelCheck>,
    pub(crate) config:   EngineConfig,
    pub(crate) owner:    Option<Rc<DocumentObject>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a context with `config`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{config::EngineConfig, interpreter::evaluator::core::Context};
    ///
    /// let config = EngineConfig { max_depth: 8,
    ///                             ..EngineConfig::default() };
    /// let ctx = Context::with_config(config);
    /// assert_eq!(ctx.config().max_depth, 8);
    /// ```
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let math = Rc::new(math_module());
        let mut modules = IndexMap::new();
        modules.insert(math.name().to_string(), math);
        Self { frames: FrameStack::default(),
               security: SecurityPolicy::new(config.modules.clone()),
               disabler: Rc::new(Cell::new(0)),
               modules,
               builtins: builtin_table(),
               warned: HashSet::new(),
               cancel: None,
               config,
               owner: None }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the configuration.
    ///
    /// The module entries replace the sandbox's, which drops every cached
    /// verdict.
    pub fn apply_config(&mut self, config: EngineConfig) {
        self.security.set_entries(config.modules.clone());
        self.config = config;
    }

    /// Allows or denies a module prefix, effective on the next call.
    pub fn set_module_access(&mut self, module: &str, allowed: bool) {
        self.config.modules.insert(module.to_string(), allowed);
        self.security.set_entries(self.config.modules.clone());
    }

    /// Installs the cooperative cancellation check polled by loops.
    pub fn set_cancel_check(&mut self, check: impl Fn() -> bool + 'static) {
        self.cancel = Some(Box::new(check));
    }

    /// Adds a module to the import registry, replacing one of the same name.
    pub fn register_module(&mut self, module: HostModule) -> Rc<HostModule> {
        let module = Rc::new(module);
        debug!(module = module.name(), "module registered");
        self.modules
            .insert(module.name().to_string(), Rc::clone(&module));
        module
    }

    /// Looks up a registered module.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<Rc<HostModule>> {
        self.modules.get(name).cloned()
    }

    /// Forbids calls and attribute writes until the guard is dropped.
    ///
    /// Guards nest; calls are allowed again once every guard is gone.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{error::ErrorKind, evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// {
    ///     let _guard = ctx.disable_calls();
    ///     let err = evaluate_source(&mut ctx, "len([1, 2])").unwrap_err();
    ///     assert_eq!(err.kind(), ErrorKind::FunctionCallDisabled);
    /// }
    /// assert_eq!(evaluate_source(&mut ctx, "len([1, 2])").unwrap().to_string(), "2");
    /// ```
    #[must_use]
    pub fn disable_calls(&self) -> CallDisabler {
        CallDisabler::new(&self.disabler)
    }

    /// Whether a [`CallDisabler`] is alive.
    #[must_use]
    pub fn calls_disabled(&self) -> bool {
        self.disabler.get() > 0
    }

    /// The module allow list and its verdict cache.
    #[must_use]
    pub const fn security(&self) -> &SecurityPolicy {
        &self.security
    }

    /// The `(function, warning code)` pairs warned about so far, each
    /// reported once per context.
    pub fn emitted_warnings(&self) -> impl Iterator<Item = (&str, u8)> {
        self.warned.iter().map(|(function, code)| (function.as_str(), *code))
    }

    /// The object unqualified names currently resolve against.
    #[must_use]
    pub const fn owner(&self) -> Option<&Rc<DocumentObject>> {
        self.owner.as_ref()
    }

    /// Evaluates a bound expression.
    ///
    /// The expression runs in a fresh frame with its owner as the name
    /// resolution scope. A failure at the outermost level carries the
    /// expression's text.
    pub fn evaluate_expression(&mut self, expression: &Expression) -> EvalResult<Value> {
        trace!(expression = %expression, "evaluating");
        let nested = self.frames.depth() > 0;
        self.run(expression.root(), expression.owner())
            .map_err(|e| if nested { e } else { e.located(expression.to_source(false)) })
    }

    /// Evaluates a bare tree with an optional owner.
    pub fn evaluate_tree(&mut self,
                         root: &Expr,
                         owner: Option<Rc<DocumentObject>>)
                         -> EvalResult<Value> {
        let nested = self.frames.depth() > 0;
        self.run(root, owner)
            .map_err(|e| if nested { e } else { e.located(root.render(false, false, 0)) })
    }

    fn run(&mut self, root: &Expr, owner: Option<Rc<DocumentObject>>) -> EvalResult<Value> {
        let previous = std::mem::replace(&mut self.owner, owner);
        let result = self.with_frame(None, None, root.line, |ctx| {
                             let (value, flow) = ctx.execute(root)?;
                             Self::finish_block(value, flow, None, root.line)
                         });
        self.owner = previous;
        result
    }

    /// Converts the outcome of a top-level block into its value.
    pub(crate) fn finish_block(value: Value,
                               flow: ControlFlow,
                               function: Option<&str>,
                               line: usize)
                               -> EvalResult<Value> {
        let keyword = match flow {
            ControlFlow::None | ControlFlow::Return => return Ok(value),
            ControlFlow::Break => "break",
            ControlFlow::Continue => "continue",
        };
        let details = match function {
            Some(name) => format!("Unmatched '{keyword}' statement in function {name}"),
            None => format!("Unmatched '{keyword}' statement."),
        };
        Err(RuntimeError::runtime(details, line))
    }

    /// Runs `f` inside a new frame, popping it on every exit path.
    ///
    /// # Parameters
    /// - `name`: The function name for call frames, `None` otherwise.
    /// - `owner`: The object owning the called function.
    /// - `line`: Line number for error reporting.
    /// - `f`: The work to do inside the frame.
    ///
    /// # Returns
    /// Whatever `f` returns, or a recursion error when the frame limit is
    /// reached.
    pub(crate) fn with_frame<T>(&mut self,
                                name: Option<String>,
                                owner: Option<Weak<DocumentObject>>,
                                line: usize,
                                f: impl FnOnce(&mut Self) -> EvalResult<T>)
                                -> EvalResult<T> {
        if self.frames.depth() >= self.config.max_depth {
            return Err(RuntimeError::RecursionLimit { line });
        }
        let loop_check = self.config.loop_check;
        self.frames.push(name, owner, loop_check);
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Executes a statement, reporting how control left it.
    ///
    /// Non-statement nodes are evaluated and always fall through.
    pub fn execute(&mut self, expr: &Expr) -> EvalResult<(Value, ControlFlow)> {
        if is_statement(&expr.kind) {
            self.exec_statement(expr)
        } else {
            Ok((self.eval(expr)?, ControlFlow::None))
        }
    }

    /// Evaluates an expression and returns the resulting value.
    ///
    /// This is the main entry point for expression evaluation. The node's
    /// kind is evaluated first, then its trailing components are applied
    /// left to right.
    ///
    /// # Parameters
    /// - `expr`: Expression to evaluate.
    ///
    /// # Returns
    /// The value of the expression. A statement evaluated here must fall
    /// through; a pending jump is an error.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        let value = self.eval_kind(expr)?;
        if expr.components.is_empty() {
            return Ok(value);
        }
        self.apply_components(value, &expr.components, expr.line)
    }

    pub(crate) fn eval_kind(&mut self, expr: &Expr) -> EvalResult<Value> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Number(q) => Ok(value_from_quantity(*q)),
            ExprKind::Integer(i) => Ok(Value::Integer(*i)),
            ExprKind::Unit { quantity, .. } => Ok(Value::Quantity(*quantity)),
            ExprKind::Constant(c) => Ok(match c {
                                         Constant::True => Value::Bool(true),
                                         Constant::False => Value::Bool(false),
                                         Constant::None => Value::None,
                                     }),
            ExprKind::String(s) => Ok(Value::string(&s.text)),
            ExprKind::Value(v) => Ok(v.clone()),
            ExprKind::Variable(id) => self.eval_variable(id, line),
            ExprKind::Range { begin, end } => self.eval_range(begin, end, line),
            ExprKind::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                Self::eval_unary(*op, &value, line)
            },
            ExprKind::BinaryOp { op: BinaryOperator::And,
                                 left,
                                 right, } => {
                Ok(Value::Bool(self.eval(left)?.truthy() && self.eval(right)?.truthy()))
            },
            ExprKind::BinaryOp { op: BinaryOperator::Or,
                                 left,
                                 right, } => {
                Ok(Value::Bool(self.eval(left)?.truthy() || self.eval(right)?.truthy()))
            },
            ExprKind::BinaryOp { op, left, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                Self::eval_binary(*op, &lhs, &rhs, line)
            },
            ExprKind::Conditional { condition,
                                    then_branch,
                                    else_branch,
                                    .. } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            },
            ExprKind::Function { kind, args } => self.eval_function(*kind, args, line),
            ExprKind::Call { callee, args } => self.eval_call(callee, args, line),
            ExprKind::Assignment { targets,
                                   catch_all,
                                   op,
                                   values, } => {
                self.eval_assignment(targets, *catch_all, *op, values, line)
            },
            ExprKind::Comprehension { kind,
                                      element,
                                      value,
                                      clauses, } => {
                self.eval_comprehension(*kind, element, value.as_deref(), clauses, line)
            },
            ExprKind::List(items) => Ok(Value::list(self.eval_items(items, line)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_items(items, line)?)),
            ExprKind::Set(items) => self.eval_set(items, line),
            ExprKind::Dict(entries) => self.eval_dict(entries, line),
            ExprKind::IDict(entries) => self.eval_idict(entries, line),
            ExprKind::Lambda { params, body } => {
                let function = self.make_function("<lambda>", params, body, true, line)?;
                Ok(Value::Function(Rc::new(function)))
            },
            _ => {
                let (value, flow) = self.exec_statement(expr)?;
                Self::finish_block(value, flow, None, line)
            },
        }
    }
}

/// Whether `kind` is a statement that reports control flow.
#[must_use]
pub const fn is_statement(kind: &ExprKind) -> bool {
    matches!(kind,
             ExprKind::Simple(_)
             | ExprKind::Block(_)
             | ExprKind::If { .. }
             | ExprKind::While { .. }
             | ExprKind::For { .. }
             | ExprKind::Try { .. }
             | ExprKind::Jump { .. }
             | ExprKind::FunctionDef { .. }
             | ExprKind::Pass
             | ExprKind::Del(_)
             | ExprKind::Scope { .. }
             | ExprKind::Import(_)
             | ExprKind::From { .. })
}
