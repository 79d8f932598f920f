/// The function catalog and the dispatch of catalog calls.
///
/// Declares [`core::FunctionKind`], the enumerable
/// [`core::FUNCTION_CATALOG`] with arities and descriptions, and the
/// evaluation entry point shared by every catalog function.
pub mod core;

/// Unit-aware math functions (`sin`, `sqrt`, `pow`, `hypot`, ...).
pub mod math;

/// `sum`, `count`, `average`, `stddev`, `min` and `max` over ranges,
/// sequences and scalars.
pub mod aggregate;

/// Geometry builders: `create`, `mscale` and `minvert`.
pub mod builder;

/// User functions and the calls of any callable value.
///
/// Holds the function value created by `def`, `lambda` and `func()`, the
/// argument evaluation with `*`/`**` expansion and parameter binding.
pub mod callable;

/// Engine control: `eval`, `func`, `func_d`, `import_py` and `pragma`.
pub mod engine;
