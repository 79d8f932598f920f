use std::{cell::Cell, collections::VecDeque, rc::Rc};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::core::EvalResult,
        value::{core::Value, host::HostObject},
    },
};

/// Number of verdicts remembered by the callable cache.
pub const CACHE_CAPACITY: usize = 256;

/// Built-ins that are never callable from expressions.
pub const BLOCKED_BUILTINS: &[&str] =
    &["eval", "exec", "execfile", "open", "file", "input", "__import__", "setattr"];

/// Keeps calls disabled while alive.
///
/// Created by [`Context::disable_calls`](crate::interpreter::evaluator::core::Context::disable_calls).
/// The count is shared, so nested guards compose.
#[derive(Debug)]
pub struct CallDisabler {
    counter: Rc<Cell<usize>>,
}

impl CallDisabler {
    pub(crate) fn new(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self { counter: Rc::clone(counter) }
    }
}

impl Drop for CallDisabler {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    id:        usize,
    type_name: String,
}

type Verdict = Result<(), String>;

/// The module allow list and its verdict cache.
///
/// Entries map module names to allow (`true`) or deny (`false`). A module
/// matches the longest entry equal to it or a dotted prefix of it, so
/// `Part = true` with `Part.Internal = false` denies the sub-module only.
/// Verdicts are cached per callable in most-recently-used order; changing
/// the entries empties the cache.
#[derive(Debug)]
pub struct SecurityPolicy {
    entries: IndexMap<String, bool>,
    cache:   VecDeque<(CacheKey, Verdict)>,
}

impl SecurityPolicy {
    /// Creates a policy from allow/deny entries.
    #[must_use]
    pub fn new(entries: IndexMap<String, bool>) -> Self {
        Self { entries,
               cache: VecDeque::with_capacity(CACHE_CAPACITY) }
    }

    /// Replaces every entry and drops the cache.
    pub fn set_entries(&mut self, entries: IndexMap<String, bool>) {
        self.entries = entries;
        self.cache.clear();
        debug!("security cache cleared");
    }

    /// The current entries.
    #[must_use]
    pub const fn entries(&self) -> &IndexMap<String, bool> {
        &self.entries
    }

    /// Number of cached verdicts.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// The decision of the longest matching entry, `None` when no entry
    /// matches.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::evaluator::security::SecurityPolicy;
    /// use indexmap::IndexMap;
    ///
    /// let entries = IndexMap::from([("Part".to_string(), true),
    ///                               ("Part.Internal".to_string(), false)]);
    /// let policy = SecurityPolicy::new(entries);
    /// assert_eq!(policy.module_allowed("Part.Shape"), Some(true));
    /// assert_eq!(policy.module_allowed("Part.Internal.x"), Some(false));
    /// assert_eq!(policy.module_allowed("Partial"), None);
    /// ```
    #[must_use]
    pub fn module_allowed(&self, module: &str) -> Option<bool> {
        self.entries
            .iter()
            .filter(|(entry, _)| {
                module == entry.as_str()
                || module.strip_prefix(entry.as_str())
                         .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|(entry, _)| entry.len())
            .map(|(_, allowed)| *allowed)
    }

    /// Checks whether `callable` may be invoked.
    ///
    /// # Parameters
    /// - `callable`: The host object about to be called.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// `Ok(())` when allowed; a security error naming the module otherwise.
    pub fn check_callable(&mut self, callable: &dyn HostObject, line: usize) -> EvalResult<()> {
        let key = cache_key(callable);
        let hit = self.cache
                      .iter()
                      .position(|(k, _)| *k == key)
                      .and_then(|pos| self.cache.remove(pos));
        let verdict = match hit {
            Some(entry) => {
                let verdict = entry.1.clone();
                self.cache.push_front(entry);
                verdict
            },
            None => {
                let verdict = self.judge(callable);
                debug!(object = key.id,
                       type_name = %key.type_name,
                       allowed = verdict.is_ok(),
                       "security verdict cached");
                self.cache.push_front((key, verdict.clone()));
                self.cache.truncate(CACHE_CAPACITY);
                verdict
            },
        };
        verdict.map_err(|details| RuntimeError::Security { details, line })
    }

    fn judge(&self, callable: &dyn HostObject) -> Verdict {
        let module = resolve_module(callable);
        if module.as_deref() == Some("builtins")
           && let Ok(Some(name)) = callable.get_attr("__name__", 0)
           && name.as_str().is_some_and(|n| BLOCKED_BUILTINS.contains(&n))
        {
            return Err("Built-in blocked".to_string());
        }
        match module {
            None => Err("Access denied of callable in unknown module".to_string()),
            Some(module) if self.module_allowed(&module) == Some(true) => Ok(()),
            Some(module) => Err(format!("Access denied of callable in module {module}")),
        }
    }

    /// Checks an import of `module`; `known` tells whether it is registered.
    pub fn check_module(&self, module: &str, known: bool, line: usize) -> EvalResult<()> {
        if self.module_allowed(module) != Some(true) {
            return Err(RuntimeError::Security { details: format!("Module '{module}' access denied."),
                                                line });
        }
        if !known {
            return Err(RuntimeError::runtime(format!("Module '{module}' not found."), line));
        }
        Ok(())
    }
}

/// The cache slot of `callable`.
///
/// A bound method without a module of its own is judged through its
/// receiver, and a fresh method object is built on every access. Such
/// methods are keyed on the receiver and the method name instead: object
/// receivers by identity, plain values by type, whose methods all resolve
/// to `builtins`. Handles start at 1, so id 0 never names an object.
fn cache_key(callable: &dyn HostObject) -> CacheKey {
    let method = || {
        callable.get_attr("__name__", 0)
                .ok()
                .flatten()
                .and_then(|name| name.as_str().map(str::to_string))
                .unwrap_or_default()
    };
    match (callable.module(), callable.receiver()) {
        (None, Some(Value::Object(object))) => {
            CacheKey { id:        object.object_id(),
                       type_name: format!("{}.{}", object.type_name(), method()), }
        },
        (None, Some(value)) => CacheKey { id:        0,
                                          type_name: format!("{}.{}", value.type_name(), method()), },
        _ => CacheKey { id:        callable.object_id(),
                        type_name: callable.type_name().to_string(), },
    }
}

/// Finds the module a callable belongs to.
///
/// Tries the declared module, then the bound receiver (values that are not
/// host objects belong to `builtins`), then the dotted prefix of the type
/// name.
#[must_use]
pub fn resolve_module(callable: &dyn HostObject) -> Option<String> {
    if let Some(module) = callable.module() {
        return Some(module.to_string());
    }
    if let Some(receiver) = callable.receiver() {
        return match receiver {
            Value::Object(object) => resolve_module(object.as_ref()),
            _ => Some("builtins".to_string()),
        };
    }
    callable.type_name()
            .rsplit_once('.')
            .map(|(module, _)| module.to_string())
}
