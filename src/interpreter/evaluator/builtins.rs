/// Built-in names and their argument helpers.
///
/// Builds the table of free functions (`len`, `range`, `sorted`, ...),
/// exception types and blocked built-ins that names fall back to after
/// frames, properties and units.
pub mod core;
/// The built-in `math` module.
pub mod math;
/// Methods of built-in values (`list.append`, `dict.get`, `str.split`, ...).
///
/// Each access creates a host function bound to the receiver, so the
/// sandbox sees it as belonging to `builtins`.
pub mod methods;
