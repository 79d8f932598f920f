/// Dispatch of binary operators to their implementations.
pub mod core;

/// Arithmetic over numbers, quantities, strings, sequences and geometry
/// values.
pub mod arithmetic;

/// Equality, ordering, identity and membership.
pub mod comparison;

/// printf-style `%` formatting of strings.
pub mod format;
