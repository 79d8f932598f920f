use tracing::trace;

use crate::{
    ast::{ArgumentKind, Constant, Expr, ExprKind},
    interpreter::{
        evaluator::core::Context,
        value::{bridge::try_quantity, core::Value},
    },
};

/// Returns a constant-folded copy of `expr`.
///
/// Operators, catalog math functions and conditionals simplify their
/// children first. A node whose children all reduced to literals is then
/// evaluated and replaced by the resulting literal. A conditional whose
/// condition folds keeps only the selected branch. Every other node is
/// copied unchanged.
///
/// Folding never fails: a node whose evaluation errors, such as `1 / 0`, is
/// kept with its simplified children so the error surfaces at evaluation.
///
/// # Example
/// ```
/// use cadexpr::{interpreter::simplify::simplify, parse};
///
/// let tree = parse("2 * 3 + x").unwrap();
/// assert_eq!(simplify(&tree).to_string(), "6 + x");
///
/// let tree = parse("1 > 2 ? a : b").unwrap();
/// assert_eq!(simplify(&tree).to_string(), "b");
/// ```
#[must_use]
pub fn simplify(expr: &Expr) -> Expr {
    let mut folder = Folder { ctx: None };
    folder.fold(expr.clone())
}

/// Carries the scratch context used to evaluate foldable nodes, created on
/// the first fold.
struct Folder {
    ctx: Option<Context>,
}

impl Folder {
    fn fold(&mut self, mut expr: Expr) -> Expr {
        let foldable = match &mut expr.kind {
            ExprKind::UnaryOp { operand, .. } => {
                self.fold_in_place(operand);
                is_literal(operand)
            },
            ExprKind::BinaryOp { left, right, .. } => {
                self.fold_in_place(left);
                self.fold_in_place(right);
                is_literal(left) && is_literal(right)
            },
            ExprKind::Function { kind, args } => {
                for arg in args.iter_mut() {
                    self.fold_in_place(&mut arg.value);
                }
                kind.is_pure_math()
                && args.iter()
                       .all(|a| a.kind == ArgumentKind::Positional && is_literal(&a.value))
            },
            ExprKind::Conditional { .. } => return self.fold_conditional(expr),
            _ => return expr,
        };
        if !foldable || !expr.components.is_empty() {
            return expr;
        }
        self.evaluate(&expr).unwrap_or(expr)
    }

    fn fold_in_place(&mut self, expr: &mut Expr) {
        let placeholder = Expr::new(ExprKind::Pass, expr.line);
        let taken = std::mem::replace(expr, placeholder);
        *expr = self.fold(taken);
    }

    fn fold_conditional(&mut self, mut expr: Expr) -> Expr {
        let ExprKind::Conditional { condition,
                                    then_branch,
                                    else_branch,
                                    .. } = &mut expr.kind
        else {
            return expr;
        };
        self.fold_in_place(condition);
        if let Some(truth) = literal_truth(condition)
           && expr.components.is_empty()
        {
            let selected = if truth { then_branch } else { else_branch };
            let placeholder = Expr::new(ExprKind::Pass, selected.line);
            let mut selected = self.fold(std::mem::replace(&mut **selected, placeholder));
            if selected.comment.is_none() {
                selected.comment = expr.comment.take();
            }
            return selected;
        }
        self.fold_in_place(then_branch);
        self.fold_in_place(else_branch);
        expr
    }

    /// Evaluates a node whose operands are literals into a literal node.
    fn evaluate(&mut self, expr: &Expr) -> Option<Expr> {
        let ctx = self.ctx.get_or_insert_with(Context::new);
        let value = match ctx.evaluate_tree(expr, None) {
            Ok(value) => value,
            Err(e) => {
                trace!(expression = %expr, error = %e, "left unfolded");
                return None;
            },
        };
        let kind = match value {
            Value::Bool(true) => ExprKind::Constant(Constant::True),
            Value::Bool(false) => ExprKind::Constant(Constant::False),
            Value::Integer(i) => ExprKind::Integer(i),
            other => ExprKind::Number(try_quantity(&other)?),
        };
        let mut folded = Expr::new(kind, expr.line);
        folded.comment.clone_from(&expr.comment);
        Some(folded)
    }
}

/// `true` for numbers, units and the boolean constants, without trailing
/// components.
fn is_literal(expr: &Expr) -> bool {
    expr.components.is_empty()
    && matches!(expr.kind,
                ExprKind::Number(_)
                | ExprKind::Integer(_)
                | ExprKind::Unit { .. }
                | ExprKind::Constant(Constant::True | Constant::False))
}

fn literal_truth(expr: &Expr) -> Option<bool> {
    if !is_literal(expr) {
        return None;
    }
    match &expr.kind {
        ExprKind::Number(q) | ExprKind::Unit { quantity: q, .. } => Some(q.value() != 0.0),
        ExprKind::Integer(i) => Some(*i != 0),
        ExprKind::Constant(c) => Some(*c == Constant::True),
        _ => None,
    }
}
