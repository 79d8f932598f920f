use crate::{
    ast::UnaryOperator,
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::core::Value,
    },
};

impl Context {
    /// Evaluates a unary operation on a value.
    ///
    /// Supported operators:
    /// - `Neg`: negation of numbers, quantities and vectors. Integer negation
    ///   is checked.
    /// - `Pos`: identity on the same kinds.
    /// - `Not`: boolean negation of the value's truthiness.
    ///
    /// # Parameters
    /// - `op`: Unary operator.
    /// - `value`: Input value.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The computed `Value` wrapped in `EvalResult`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{
    ///     ast::UnaryOperator,
    ///     interpreter::{evaluator::core::Context, value::core::Value},
    /// };
    ///
    /// let v = Context::eval_unary(UnaryOperator::Neg, &Value::Integer(5), 1).unwrap();
    /// assert_eq!(v, Value::Integer(-5));
    ///
    /// let v = Context::eval_unary(UnaryOperator::Not, &Value::list(vec![]), 1).unwrap();
    /// assert_eq!(v, Value::Bool(true));
    ///
    /// assert!(Context::eval_unary(UnaryOperator::Neg, &Value::Integer(i64::MIN), 1).is_err());
    /// ```
    pub fn eval_unary(op: UnaryOperator, value: &Value, line: usize) -> EvalResult<Value> {
        match op {
            UnaryOperator::Not => Ok(Value::Bool(!value.truthy())),
            UnaryOperator::Neg => match value {
                Value::Bool(b) => Ok(Value::Integer(-i64::from(*b))),
                Value::Integer(n) => {
                    n.checked_neg()
                     .map(Value::Integer)
                     .ok_or(RuntimeError::Overflow { line })
                },
                Value::Real(r) => Ok(Value::Real(-r)),
                Value::Quantity(q) => Ok(Value::Quantity(-*q)),
                Value::Vector(v) => Ok(Value::Vector(-*v)),
                other => Err(bad_operand(op, other, line)),
            },
            UnaryOperator::Pos => match value {
                Value::Bool(b) => Ok(Value::Integer(i64::from(*b))),
                Value::Integer(_)
                | Value::Real(_)
                | Value::Quantity(_)
                | Value::Vector(_) => Ok(value.clone()),
                other => Err(bad_operand(op, other, line)),
            },
        }
    }
}

fn bad_operand(op: UnaryOperator, value: &Value, line: usize) -> RuntimeError {
    RuntimeError::type_error(format!("bad operand type for unary {}: '{}'",
                                     op.spelling().trim(),
                                     value.type_name()),
                             line)
}
