/// Conversions between values and quantities, and coercing equality.
///
/// This is the bridge between the evaluator's dynamically typed values and
/// the unit-aware numeric core: quantities degrade to plain numbers when they
/// carry no unit, numbers promote to dimensionless quantities when they meet
/// a quantity.
pub mod bridge;
/// The `Value` enum and its printing rules.
pub mod core;
/// Exception types and instances.
pub mod exception;
/// Vector, matrix, rotation and placement values.
pub mod geometry;
/// Host-native objects, host functions and modules.
///
/// Everything the engine can reach that is not one of its own value kinds
/// sits behind the [`host::HostObject`] trait.
pub mod host;
/// Hashable wrapper used for dict keys and set members.
pub mod key;
