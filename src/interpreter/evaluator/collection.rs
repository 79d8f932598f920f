use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{ComprehensionClause, ComprehensionKind, DictEntry, Expr, IDictEntry, Item},
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::{bridge::mapping_items, core::Value, key::HashKey},
    },
};

/// Accumulates the output of a comprehension.
enum Collector {
    List(Vec<Value>),
    Set(IndexSet<HashKey>),
    Dict(IndexMap<HashKey, Value>),
}

impl Context {
    /// Evaluates list, tuple or set elements, expanding `*` items.
    pub fn eval_items(&mut self, items: &[Item], line: usize) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let value = self.eval(&item.expr)?;
            if item.splat {
                values.extend(value.iterate(line)?);
            } else {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Evaluates a set literal.
    pub fn eval_set(&mut self, items: &[Item], line: usize) -> EvalResult<Value> {
        let set = self.eval_items(items, line)?
                      .into_iter()
                      .map(|v| HashKey::new(v, line))
                      .collect::<EvalResult<IndexSet<_>>>()?;
        Ok(Value::Set(Rc::new(set)))
    }

    /// Evaluates a `{key: value}` literal; `**mapping` entries merge in the
    /// mapping's items. Later keys overwrite earlier ones in place.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let v = evaluate_source(&mut ctx, "d = {'a': 1}\n{'b': 2, **d, 'a': 3}").unwrap();
    /// assert_eq!(v.to_string(), "{'b': 2, 'a': 3}");
    /// ```
    pub fn eval_dict(&mut self, entries: &[DictEntry], line: usize) -> EvalResult<Value> {
        let mut dict = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let value = self.eval(&entry.value)?;
            match &entry.key {
                Some(key) => {
                    let key = self.eval(key)?;
                    dict.insert(HashKey::new(key, line)?, value);
                },
                None => {
                    for (k, v) in mapping_items(&value, line)? {
                        dict.insert(HashKey::new(k, line)?, v);
                    }
                },
            }
        }
        Ok(Value::dict(dict))
    }

    /// Evaluates a `{name=value}` literal.
    pub fn eval_idict(&mut self, entries: &[IDictEntry], line: usize) -> EvalResult<Value> {
        let mut dict = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let value = self.eval(&entry.value)?;
            match &entry.name {
                Some(name) => {
                    dict.insert(HashKey::from(name.as_str()), value);
                },
                None => {
                    for (k, v) in mapping_items(&value, line)? {
                        dict.insert(HashKey::new(k, line)?, v);
                    }
                },
            }
        }
        Ok(Value::dict(dict))
    }

    /// Evaluates a list, set or dict comprehension.
    ///
    /// The clauses run nested, outermost first, in a frame of their own so
    /// loop targets do not leak into the enclosing scope.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let v = evaluate_source(&mut ctx, "[x * y for x in range(1, 3) for y in (10, 20) if y > 10]");
    /// assert_eq!(v.unwrap().to_string(), "[20, 40]");
    /// assert!(evaluate_source(&mut ctx, "x").is_err());
    /// ```
    pub fn eval_comprehension(&mut self,
                              kind: ComprehensionKind,
                              element: &Expr,
                              value: Option<&Expr>,
                              clauses: &[ComprehensionClause],
                              line: usize)
                              -> EvalResult<Value> {
        let mut out = match kind {
            ComprehensionKind::List => Collector::List(Vec::new()),
            ComprehensionKind::Set => Collector::Set(IndexSet::new()),
            ComprehensionKind::Dict => Collector::Dict(IndexMap::new()),
        };
        self.with_frame(None, None, line, |ctx| {
                ctx.run_clauses(clauses, element, value, &mut out, line)
            })?;
        Ok(match out {
            Collector::List(items) => Value::list(items),
            Collector::Set(set) => Value::Set(Rc::new(set)),
            Collector::Dict(dict) => Value::dict(dict),
        })
    }

    fn run_clauses(&mut self,
                   clauses: &[ComprehensionClause],
                   element: &Expr,
                   value: Option<&Expr>,
                   out: &mut Collector,
                   line: usize)
                   -> EvalResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            let item = self.eval(element)?;
            match out {
                Collector::List(items) => items.push(item),
                Collector::Set(set) => {
                    set.insert(HashKey::new(item, line)?);
                },
                Collector::Dict(dict) => {
                    let v = match value {
                        Some(value) => self.eval(value)?,
                        None => Value::None,
                    };
                    dict.insert(HashKey::new(item, line)?, v);
                },
            }
            return Ok(());
        };

        match clause {
            ComprehensionClause::If(condition) => {
                if self.eval(condition)?.truthy() {
                    self.run_clauses(rest, element, value, out, line)?;
                }
            },
            ComprehensionClause::For { targets,
                                       catch_all,
                                       iter, } => {
                let items = self.eval(iter)?.iterate(line)?;
                for (iteration, item) in items.into_iter().enumerate() {
                    self.poll_cancel(iteration + 1, line)?;
                    self.bind_targets(targets, *catch_all, item, line)?;
                    self.run_clauses(rest, element, value, out, line)?;
                }
            },
        }
        Ok(())
    }
}
