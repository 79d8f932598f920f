use std::cmp::Ordering;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, EvalResult},
            function::core::FunctionKind,
            utils::flatten_numeric,
        },
        value::{
            bridge::{quantity_from_value, value_from_quantity},
            core::Value,
        },
    },
    quantity::{Quantity, QuantityError},
    util::num::usize_to_f64_checked,
};

/// Running state of the sample standard deviation (Welford's method).
struct Welford {
    n:    usize,
    mean: Quantity,
    m2:   Quantity,
}

impl Welford {
    fn new(first: &Quantity) -> Self {
        Self { n:    0,
               mean: Quantity::new(0.0, first.unit()),
               m2:   Quantity::new(0.0,
                                   first.unit()
                                        .checked_mul(first.unit())
                                        .unwrap_or(first.unit())), }
    }

    fn push(&mut self, value: &Quantity, line: usize) -> EvalResult<()> {
        self.n += 1;
        let n = Quantity::dimensionless(usize_to_f64_checked(self.n, line)?);
        let delta = value.checked_sub(&self.mean).map_err(|e| e.at(line))?;
        self.mean = self.mean
                        .checked_add(&delta.checked_div(&n).map_err(|e| e.at(line))?)
                        .map_err(|e| e.at(line))?;
        let spread = value.checked_sub(&self.mean)
                          .and_then(|d| delta.checked_mul(&d))
                          .and_then(|d| self.m2.checked_add(&d))
                          .map_err(|e| e.at(line))?;
        self.m2 = spread;
        Ok(())
    }

    fn finish(&self, line: usize) -> EvalResult<Quantity> {
        if self.n < 2 {
            return Err(RuntimeError::runtime("Invalid number of entries: at least two required.",
                                             line));
        }
        let divisor = usize_to_f64_checked(self.n - 1, line)?;
        Ok(Quantity::new((self.m2.value() / divisor).sqrt(), self.mean.unit()))
    }
}

impl Context {
    /// Reduces the arguments of `sum`, `count`, `average`, `stddev`, `min`
    /// or `max`.
    ///
    /// Lists, tuples and ranges are flattened; entries that are not numbers
    /// (empty cells included) are skipped. Every entry taking part in the
    /// reduction must carry the same unit.
    ///
    /// # Parameters
    /// - `kind`: The aggregate.
    /// - `values`: The evaluated arguments.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The reduced value; an empty `sum`, `min` or `max` yields `0`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// assert_eq!(evaluate_source(&mut ctx, "sum([1 mm, 2 mm], 3 mm)").unwrap().to_string(), "6 mm");
    /// assert_eq!(evaluate_source(&mut ctx, "count(1, None, 'a', [2, 3])").unwrap().to_string(), "3");
    /// let spread = evaluate_source(&mut ctx, "round(stddev(2, 4, 4, 4, 5, 5, 7, 9) * 1000)").unwrap();
    /// assert_eq!(spread.to_string(), "2138");
    ///
    /// let err = evaluate_source(&mut ctx, "stddev(1)").unwrap_err();
    /// assert!(err.to_string().contains("at least two required"));
    /// ```
    pub(crate) fn aggregate(kind: FunctionKind, values: &[Value], line: usize) -> EvalResult<Value> {
        let entries = flatten_numeric(values).iter()
                                             .map(|v| quantity_from_value(v, line))
                                             .collect::<EvalResult<Vec<_>>>()?;
        let at = |e: QuantityError| e.at(line);

        let result = match kind {
            FunctionKind::Count => Quantity::dimensionless(usize_to_f64_checked(entries.len(), line)?),
            FunctionKind::Sum => sum(&entries).map_err(at)?,
            FunctionKind::Average => {
                let count = Quantity::dimensionless(usize_to_f64_checked(entries.len(), line)?);
                sum(&entries).and_then(|total| total.checked_div(&count))
                             .map_err(at)?
            },
            FunctionKind::Stddev => {
                let Some(first) = entries.first() else {
                    return Welford::new(&Quantity::default()).finish(line).map(value_from_quantity);
                };
                let mut state = Welford::new(first);
                for entry in &entries {
                    state.push(entry, line)?;
                }
                state.finish(line)?
            },
            FunctionKind::Min => extreme(&entries, Ordering::Less).map_err(at)?,
            FunctionKind::Max => extreme(&entries, Ordering::Greater).map_err(at)?,
            other => {
                return Err(RuntimeError::runtime(format!("'{}' is not an aggregate", other.name()),
                                                 line));
            },
        };
        Ok(value_from_quantity(result))
    }
}

fn sum(entries: &[Quantity]) -> Result<Quantity, QuantityError> {
    let Some((first, rest)) = entries.split_first() else {
        return Ok(Quantity::default());
    };
    rest.iter().try_fold(*first, |acc, q| acc.checked_add(q))
}

/// The entry that orders `wanted` against every other one.
fn extreme(entries: &[Quantity], wanted: Ordering) -> Result<Quantity, QuantityError> {
    let Some((first, rest)) = entries.split_first() else {
        return Ok(Quantity::default());
    };
    rest.iter().try_fold(*first, |best, q| {
                   Ok(if q.compare(&best)? == Some(wanted) { *q } else { best })
               })
}
