/// Physical unit signatures and the symbol table.
///
/// A [`unit::Unit`] is a vector of small integer exponents over the seven SI
/// base dimensions plus an angle pseudo-dimension. The module also holds the
/// table of unit symbols recognized after numeric literals (`mm`, `kN`,
/// `deg`, ...), each mapped to a scale factor relative to the internal base
/// units.
pub mod unit;

/// Unit-tagged scalar values.
///
/// Defines [`core::Quantity`], its checked arithmetic, tolerance-based
/// comparison and textual rendering.
pub mod core;

pub use core::{Quantity, QuantityError, REL_TOLERANCE, approx_eq};

pub use unit::{Unit, UnitSymbol, lookup_unit};
