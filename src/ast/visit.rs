use std::rc::Rc;

use crate::{
    ast::{Component, ComprehensionClause, Expr, ExprKind},
    document::{DocumentObject, cell::expand_range},
    interpreter::evaluator::function::core::FunctionKind,
};

/// A read-only pass over an expression tree.
///
/// [`Expr::accept`] calls [`Visitor::visit`] post-order: children first,
/// then the node's trailing components, then the node itself. The enter and
/// leave hooks bracket the regions analyses treat specially.
pub trait Visitor {
    /// Called once for every node.
    fn visit(&mut self, expr: &Expr);

    /// Entering the body of a `def` or `lambda`.
    fn enter_function(&mut self) {}

    /// Leaving the body of a `def` or `lambda`.
    fn leave_function(&mut self) {}

    /// Entering the argument of `href`, `hiddenref` or `dbind`.
    fn enter_hidden(&mut self) {}

    /// Leaving the argument of `href`, `hiddenref` or `dbind`.
    fn leave_hidden(&mut self) {}
}

/// A rewriting pass; nodes are visited post-order and may be replaced.
pub trait VisitorMut {
    /// Called once for every node.
    fn visit_mut(&mut self, expr: &mut Expr);
}

impl Expr {
    /// Runs `visitor` over the subtree.
    pub fn accept(&self, visitor: &mut dyn Visitor) {
        match &self.kind {
            ExprKind::FunctionDef { params, body, .. } | ExprKind::Lambda { params, body } => {
                for param in params {
                    if let Some(default) = &param.default {
                        default.accept(visitor);
                    }
                }
                visitor.enter_function();
                body.accept(visitor);
                visitor.leave_function();
            },
            ExprKind::Function { kind, args } if kind.is_hidden_reference() => {
                visitor.enter_hidden();
                for arg in args {
                    arg.value.accept(visitor);
                }
                visitor.leave_hidden();
            },
            _ => self.for_each_child(&mut |child| child.accept(visitor)),
        }
        for component in &self.components {
            component.for_each_expr(&mut |e| e.accept(visitor));
        }
        visitor.visit(self);
    }

    /// Runs `visitor` over the subtree, allowing it to rewrite nodes.
    pub fn accept_mut(&mut self, visitor: &mut dyn VisitorMut) {
        self.for_each_child_mut(&mut |child| child.accept_mut(visitor));
        for component in &mut self.components {
            component.for_each_expr_mut(&mut |e| e.accept_mut(visitor));
        }
        visitor.visit_mut(self);
    }

    /// Calls `f` on every direct child, in source order.
    ///
    /// Trailing components are not children; see [`Expr::accept`].
    pub fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        match &self.kind {
            ExprKind::Number(_)
            | ExprKind::Integer(_)
            | ExprKind::Unit { .. }
            | ExprKind::Constant(_)
            | ExprKind::String(_)
            | ExprKind::Value(_)
            | ExprKind::Variable(_)
            | ExprKind::Range { .. }
            | ExprKind::Pass
            | ExprKind::Scope { .. }
            | ExprKind::Import(_)
            | ExprKind::From { .. } => {},
            ExprKind::UnaryOp { operand, .. } => f(operand),
            ExprKind::BinaryOp { left, right, .. } => {
                f(left);
                f(right);
            },
            ExprKind::Conditional { condition,
                                    then_branch,
                                    else_branch,
                                    .. } => {
                f(condition);
                f(then_branch);
                f(else_branch);
            },
            ExprKind::Function { args, .. } => args.iter().for_each(|a| f(&a.value)),
            ExprKind::Call { callee, args } => {
                f(callee);
                args.iter().for_each(|a| f(&a.value));
            },
            ExprKind::Assignment { targets, values, .. } => {
                targets.iter().for_each(&mut *f);
                values.iter().for_each(f);
            },
            ExprKind::Comprehension { element,
                                      value,
                                      clauses,
                                      .. } => {
                for clause in clauses {
                    match clause {
                        ComprehensionClause::For { targets, iter, .. } => {
                            f(iter);
                            targets.iter().for_each(&mut *f);
                        },
                        ComprehensionClause::If(cond) => f(cond),
                    }
                }
                f(element);
                if let Some(value) = value {
                    f(value);
                }
            },
            ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
                items.iter().for_each(|i| f(&i.expr));
            },
            ExprKind::Dict(entries) => {
                for entry in entries {
                    if let Some(key) = &entry.key {
                        f(key);
                    }
                    f(&entry.value);
                }
            },
            ExprKind::IDict(entries) => entries.iter().for_each(|e| f(&e.value)),
            ExprKind::Lambda { params, body } | ExprKind::FunctionDef { params, body, .. } => {
                params.iter()
                      .filter_map(|p| p.default.as_ref())
                      .for_each(&mut *f);
                f(body);
            },
            ExprKind::Jump { value, .. } => {
                if let Some(value) = value {
                    f(value);
                }
            },
            ExprKind::If { branches, else_body } => {
                for (condition, body) in branches {
                    f(condition);
                    f(body);
                }
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::While { condition,
                              body,
                              else_body, } => {
                f(condition);
                f(body);
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::For { targets,
                            iter,
                            body,
                            else_body,
                            .. } => {
                targets.iter().for_each(&mut *f);
                f(iter);
                f(body);
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::Simple(statements) | ExprKind::Block(statements) | ExprKind::Del(statements) => {
                statements.iter().for_each(f);
            },
            ExprKind::Try { body,
                            handlers,
                            else_body,
                            finally_body, } => {
                f(body);
                for handler in handlers {
                    if let Some(types) = &handler.types {
                        f(types);
                    }
                    f(&handler.body);
                }
                if let Some(body) = else_body {
                    f(body);
                }
                if let Some(body) = finally_body {
                    f(body);
                }
            },
        }
    }

    /// Mutable counterpart of [`Expr::for_each_child`].
    pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Number(_)
            | ExprKind::Integer(_)
            | ExprKind::Unit { .. }
            | ExprKind::Constant(_)
            | ExprKind::String(_)
            | ExprKind::Value(_)
            | ExprKind::Variable(_)
            | ExprKind::Range { .. }
            | ExprKind::Pass
            | ExprKind::Scope { .. }
            | ExprKind::Import(_)
            | ExprKind::From { .. } => {},
            ExprKind::UnaryOp { operand, .. } => f(operand),
            ExprKind::BinaryOp { left, right, .. } => {
                f(left);
                f(right);
            },
            ExprKind::Conditional { condition,
                                    then_branch,
                                    else_branch,
                                    .. } => {
                f(condition);
                f(then_branch);
                f(else_branch);
            },
            ExprKind::Function { args, .. } => args.iter_mut().for_each(|a| f(&mut a.value)),
            ExprKind::Call { callee, args } => {
                f(callee);
                args.iter_mut().for_each(|a| f(&mut a.value));
            },
            ExprKind::Assignment { targets, values, .. } => {
                targets.iter_mut().for_each(&mut *f);
                values.iter_mut().for_each(f);
            },
            ExprKind::Comprehension { element,
                                      value,
                                      clauses,
                                      .. } => {
                for clause in clauses {
                    match clause {
                        ComprehensionClause::For { targets, iter, .. } => {
                            f(iter);
                            targets.iter_mut().for_each(&mut *f);
                        },
                        ComprehensionClause::If(cond) => f(cond),
                    }
                }
                f(element);
                if let Some(value) = value {
                    f(value);
                }
            },
            ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
                items.iter_mut().for_each(|i| f(&mut i.expr));
            },
            ExprKind::Dict(entries) => {
                for entry in entries {
                    if let Some(key) = &mut entry.key {
                        f(key);
                    }
                    f(&mut entry.value);
                }
            },
            ExprKind::IDict(entries) => entries.iter_mut().for_each(|e| f(&mut e.value)),
            ExprKind::Lambda { params, body } | ExprKind::FunctionDef { params, body, .. } => {
                params.iter_mut()
                      .filter_map(|p| p.default.as_mut())
                      .for_each(&mut *f);
                f(body);
            },
            ExprKind::Jump { value, .. } => {
                if let Some(value) = value {
                    f(value);
                }
            },
            ExprKind::If { branches, else_body } => {
                for (condition, body) in branches {
                    f(condition);
                    f(body);
                }
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::While { condition,
                              body,
                              else_body, } => {
                f(condition);
                f(body);
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::For { targets,
                            iter,
                            body,
                            else_body,
                            .. } => {
                targets.iter_mut().for_each(&mut *f);
                f(iter);
                f(body);
                if let Some(body) = else_body {
                    f(body);
                }
            },
            ExprKind::Simple(statements) | ExprKind::Block(statements) | ExprKind::Del(statements) => {
                statements.iter_mut().for_each(f);
            },
            ExprKind::Try { body,
                            handlers,
                            else_body,
                            finally_body, } => {
                f(body);
                for handler in handlers {
                    if let Some(types) = &mut handler.types {
                        f(types);
                    }
                    f(&mut handler.body);
                }
                if let Some(body) = else_body {
                    f(body);
                }
                if let Some(body) = finally_body {
                    f(body);
                }
            },
        }
    }

    /// Whether anything the expression reads is touched.
    ///
    /// Unresolvable references count as untouched; the check never fails.
    #[must_use]
    pub fn is_touched(&self, owner: Option<&Rc<DocumentObject>>) -> bool {
        let mut check = TouchedCheck { owner,
                                       touched: false };
        self.accept(&mut check);
        check.touched
    }
}

impl Component {
    /// Calls `f` on the component's expressions.
    pub fn for_each_expr(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            Self::Attribute(_) => {},
            Self::Index(e) => f(e),
            Self::Slice { start, stop, step } => {
                [start, stop, step].into_iter().flatten().for_each(|e| f(e));
            },
        }
    }

    /// Mutable counterpart of [`Component::for_each_expr`].
    pub fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match self {
            Self::Attribute(_) => {},
            Self::Index(e) => f(e),
            Self::Slice { start, stop, step } => {
                [start, stop, step].into_iter().flatten().for_each(|e| f(e));
            },
        }
    }
}

impl FunctionKind {
    /// `href`, `hiddenref` and `dbind` mark their argument as a hidden
    /// reference.
    #[must_use]
    pub const fn is_hidden_reference(self) -> bool {
        matches!(self, Self::Href | Self::HiddenRef | Self::DBind)
    }
}

struct TouchedCheck<'a> {
    owner:   Option<&'a Rc<DocumentObject>>,
    touched: bool,
}

impl Visitor for TouchedCheck<'_> {
    fn visit(&mut self, expr: &Expr) {
        if self.touched {
            return;
        }
        match &expr.kind {
            ExprKind::Variable(id) => {
                if let Some(resolved) = id.resolve(self.owner)
                   && let Some(property) = &resolved.property
                {
                    self.touched = resolved.object.is_touched(property);
                }
            },
            ExprKind::Range { begin, end } => {
                let Some(owner) = self.owner else { return };
                if let Some(cells) = expand_range(begin, end, |a| owner.alias_target(a)) {
                    self.touched = cells.iter().any(|c| owner.is_touched(&c.to_string()));
                }
            },
            _ => {},
        }
    }
}
