use std::cmp::Ordering;

use crate::{
    ast::BinaryOperator,
    interpreter::{
        evaluator::{
            core::{Context, EvalResult},
            utils::{compare_values, contains},
        },
        value::{bridge::values_equal, core::Value},
    },
};

impl Context {
    /// Evaluates relational, identity and membership operators.
    ///
    /// Equality never fails: values of unrelated types, or quantities with
    /// different units, are simply unequal. Ordering fails on unorderable
    /// types and on mismatched units; a NaN operand makes every ordering
    /// false.
    ///
    /// # Parameters
    /// - `op`: Comparison operator.
    /// - `left`: Left operand.
    /// - `right`: Right operand.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// A `Value::Bool` with the result of the comparison.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{
    ///     ast::BinaryOperator,
    ///     interpreter::{evaluator::core::Context, value::core::Value},
    /// };
    ///
    /// let list = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
    /// let r = Context::eval_comparison(BinaryOperator::In, &Value::Real(2.0), &list, 1);
    /// assert_eq!(r.unwrap(), Value::Bool(true));
    ///
    /// let r = Context::eval_comparison(BinaryOperator::Lte, &Value::Integer(3), &Value::Real(2.5), 1);
    /// assert_eq!(r.unwrap(), Value::Bool(false));
    /// ```
    pub fn eval_comparison(op: BinaryOperator,
                           left: &Value,
                           right: &Value,
                           line: usize)
                           -> EvalResult<Value> {
        use BinaryOperator::{Eq, Gt, Gte, In, Is, IsNot, Lt, Lte, Neq, NotIn};

        let result = match op {
            Eq => values_equal(left, right),
            Neq => !values_equal(left, right),
            Is => left.is_same(right),
            IsNot => !left.is_same(right),
            In => contains(right, left, line)?,
            NotIn => !contains(right, left, line)?,
            Lt | Gt | Lte | Gte => {
                let Some(ordering) = compare_values(left, right, line)? else {
                    return Ok(Value::Bool(false));
                };
                match op {
                    Lt => ordering == Ordering::Less,
                    Gt => ordering == Ordering::Greater,
                    Lte => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            },
            other => return Err(Self::unsupported(other, left, right, line)),
        };
        Ok(Value::Bool(result))
    }
}
