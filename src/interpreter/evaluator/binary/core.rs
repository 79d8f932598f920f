use crate::{
    ast::BinaryOperator,
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::core::Value,
    },
};

impl Context {
    /// Evaluates a binary operation between two values.
    ///
    /// Arithmetic operators go to `eval_arithmetic`, where numbers meet
    /// quantities as dimensionless quantities. A string left operand of `%`
    /// formats printf-style. Relational operators, identity and membership
    /// use `eval_comparison`. `and`/`or` only arrive here from compound
    /// evaluation paths; the tree walker short-circuits them before both
    /// operands exist.
    ///
    /// # Parameters
    /// - `op`: The operator.
    /// - `left`: Left operand.
    /// - `right`: Right operand.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// An `EvalResult<Value>` containing the evaluated result.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{
    ///     ast::BinaryOperator,
    ///     interpreter::{evaluator::core::Context, value::core::Value},
    /// };
    ///
    /// let left = Value::Integer(3);
    /// let right = Value::Integer(4);
    ///
    /// let result = Context::eval_binary(BinaryOperator::Add, &left, &right, 1);
    /// assert_eq!(result.unwrap(), Value::Integer(7));
    ///
    /// let text = Value::from("%d mm");
    /// let result = Context::eval_binary(BinaryOperator::Mod, &text, &right, 1);
    /// assert_eq!(result.unwrap().to_string(), "4 mm");
    /// ```
    pub fn eval_binary(op: BinaryOperator,
                       left: &Value,
                       right: &Value,
                       line: usize)
                       -> EvalResult<Value> {
        use BinaryOperator::{
            Add, And, Div, Eq, FloorDiv, Gt, Gte, In, Is, IsNot, Lt, Lte, Mod, Mul, Neq, NotIn,
            Or, Pow, PowCaret, Sub, Unit, UnitAdd,
        };

        match op {
            And => Ok(Value::Bool(left.truthy() && right.truthy())),
            Or => Ok(Value::Bool(left.truthy() || right.truthy())),
            Mod if matches!(left, Value::String(_)) => Self::eval_format(left, right, line),
            Add | Sub | Mul | Div | FloorDiv | Mod | Pow | PowCaret | Unit | UnitAdd => {
                Self::eval_arithmetic(op, left, right, line)
            },
            Eq | Neq | Lt | Gt | Lte | Gte | Is | IsNot | In | NotIn => {
                Self::eval_comparison(op, left, right, line)
            },
        }
    }

    /// The error for an operator that has no meaning on the operand types.
    pub(crate) fn unsupported(op: BinaryOperator,
                              left: &Value,
                              right: &Value,
                              line: usize)
                              -> RuntimeError {
        RuntimeError::runtime(format!("Unsupported operator '{}' between '{}' and '{}'",
                                      op.spelling().trim(),
                                      left.type_name(),
                                      right.type_name()),
                              line)
    }
}
