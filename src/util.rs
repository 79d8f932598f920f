/// Numeric conversion and formatting helpers.
///
/// This module provides safe functions for converting between integer and
/// floating-point types without risking silent data loss, plus the
/// significant-digit formatter used when numbers are printed back to source
/// text.
pub mod num;
