use crate::{
    ast::Expr,
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, ControlFlow, EvalResult},
        value::core::Value,
    },
};

impl Context {
    /// Executes a `for` statement.
    ///
    /// The iterable is evaluated once and its items are bound to the targets
    /// in turn, unpacking when there are several targets. `break` ends the
    /// loop and skips the `else` body, `continue` moves to the next item and
    /// `return` leaves the loop unchanged. The cancellation check is polled
    /// every `loop_check` iterations.
    ///
    /// # Parameters
    /// - `targets`: Loop targets.
    /// - `catch_all`: Index of the `*` target.
    /// - `iter`: The iterated expression.
    /// - `body`: Loop body.
    /// - `else_body`: Runs when the loop was not left by `break`.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// `None` with no pending jump, or the returned value with
    /// [`ControlFlow::Return`].
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let src = "total = 0\nfor i, x in enumerate([5, 6, 7]):\n    if i == 1:\n        continue\n    total += x\ntotal";
    /// assert_eq!(evaluate_source(&mut ctx, src).unwrap().to_string(), "12");
    /// ```
    pub fn exec_for(&mut self,
                    targets: &[Expr],
                    catch_all: Option<usize>,
                    iter: &Expr,
                    body: &Expr,
                    else_body: Option<&Expr>,
                    line: usize)
                    -> EvalResult<(Value, ControlFlow)> {
        let items = self.eval(iter)?.iterate(line)?;

        for (iteration, item) in items.into_iter().enumerate() {
            self.poll_cancel(iteration + 1, line)?;
            self.bind_targets(targets, catch_all, item, line)?;
            match self.execute(body)? {
                (_, ControlFlow::Break) => return Ok((Value::None, ControlFlow::None)),
                (value, ControlFlow::Return) => return Ok((value, ControlFlow::Return)),
                _ => {},
            }
        }

        match else_body {
            Some(else_body) => self.execute(else_body),
            None => Ok((Value::None, ControlFlow::None)),
        }
    }

    /// Binds one item to loop or comprehension targets.
    pub(crate) fn bind_targets(&mut self,
                               targets: &[Expr],
                               catch_all: Option<usize>,
                               item: Value,
                               line: usize)
                               -> EvalResult<()> {
        match (targets, catch_all) {
            ([target], None) => self.assign(target, item, line),
            _ => self.unpack(targets, catch_all, item, line),
        }
    }

    /// Polls the host's cancellation check on every `loop_check`-th
    /// iteration.
    pub(crate) fn poll_cancel(&self, iteration: usize, line: usize) -> EvalResult<()> {
        let Some(check) = &self.cancel else {
            return Ok(());
        };
        let every = self.frames
                        .settings_frame()
                        .map_or(self.config.loop_check, |f| f.loop_check);
        if every > 0 && iteration % every == 0 && check() {
            return Err(RuntimeError::Cancelled { line });
        }
        Ok(())
    }
}
