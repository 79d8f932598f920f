use std::{cmp::Ordering, fmt};

use thiserror::Error;

use crate::{
    error::RuntimeError,
    quantity::unit::{Unit, lookup_unit},
    util::num::{as_exact_integer, format_significant},
};

/// Relative tolerance used for quantity and float comparison.
pub const REL_TOLERANCE: f64 = 1e-10;

/// Significant digits used when printing numbers back to source text.
pub const PRINT_DIGITS: usize = 16;

/// Compares two floats with the relative tolerance
/// `|a - b| <= REL_TOLERANCE * max(|a|, |b|)`.
///
/// # Example
/// ```
/// use cadexpr::quantity::approx_eq;
///
/// assert!(approx_eq(0.1 + 0.2, 0.3));
/// assert!(!approx_eq(1.0, 1.001));
/// ```
#[must_use]
pub fn approx_eq(a: f64, b: f64) -> bool {
    #[allow(clippy::float_cmp)]
    if a == b {
        return true;
    }
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Failures of quantity arithmetic.
///
/// These carry no source line; the evaluator attaches one with
/// [`QuantityError::at`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Two operands had different units where equal units are required.
    #[error("Unit mismatch in {operation} [{left}] vs [{right}]")]
    UnitMismatch {
        /// The failed operation.
        operation: &'static str,
        /// Unit of the left operand.
        left:      Unit,
        /// Unit of the right operand.
        right:     Unit,
    },
    /// `sqrt` of a unit with an odd exponent.
    #[error("All dimensions must be even to compute the square root.")]
    OddRoot,
    /// Non-integral power of a quantity with a unit.
    #[error("Exponent must be an integer when used with a unit.")]
    FractionalExponent,
    /// The exponent itself carried a unit.
    #[error("Exponent is not allowed to have a unit.")]
    ExponentHasUnit,
    /// A unit exponent left the representable range.
    #[error("Unit exponent overflow.")]
    UnitOverflow,
    /// Division or remainder by zero.
    #[error("Division by zero.")]
    DivisionByZero,
}

impl QuantityError {
    /// Converts the error into a [`RuntimeError`] on `line`.
    #[must_use]
    pub fn at(self, line: usize) -> RuntimeError {
        match self {
            Self::UnitMismatch { operation,
                                 left,
                                 right, } => {
                RuntimeError::UnitMismatch { details: format!("Unit mismatch in {operation}"),
                                             left: left.to_string(),
                                             right: right.to_string(),
                                             line }
            },
            Self::DivisionByZero => RuntimeError::DivisionByZero { line },
            other => RuntimeError::unit_error(other.to_string(), line),
        }
    }
}

/// A scalar tagged with a physical unit.
///
/// The value is always stored in internal base units (millimetre, kilogram,
/// second, ampere, kelvin, mole, candela, degree).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quantity {
    value: f64,
    unit:  Unit,
}

impl Quantity {
    /// Creates a quantity.
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Creates a dimensionless quantity.
    #[must_use]
    pub const fn dimensionless(value: f64) -> Self {
        Self { value,
               unit: Unit::EMPTY }
    }

    /// Creates the quantity of one `symbol`, e.g. `1 m == 1000 mm`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::quantity::{Quantity, Unit};
    ///
    /// let q = Quantity::from_symbol("cm").unwrap();
    /// assert_eq!(q, Quantity::new(10.0, Unit::LENGTH));
    /// ```
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        lookup_unit(symbol).map(|u| Self::new(u.scale, u.unit))
    }

    /// The value in internal base units.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// The unit signature.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Returns `true` when the unit is empty.
    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_empty()
    }

    fn require_same_unit(&self, other: &Self, operation: &'static str) -> Result<(), QuantityError> {
        if self.unit == other.unit {
            Ok(())
        } else {
            Err(QuantityError::UnitMismatch { operation,
                                              left: self.unit,
                                              right: other.unit })
        }
    }

    /// Adds two quantities of the same unit.
    ///
    /// # Example
    /// ```
    /// use cadexpr::quantity::{Quantity, Unit};
    ///
    /// let a = Quantity::new(10.0, Unit::LENGTH);
    /// let b = Quantity::new(5.0, Unit::LENGTH);
    /// assert_eq!(a.checked_add(&b).unwrap().value(), 15.0);
    /// assert!(a.checked_add(&Quantity::dimensionless(5.0)).is_err());
    /// ```
    pub fn checked_add(&self, other: &Self) -> Result<Self, QuantityError> {
        self.require_same_unit(other, "addition")?;
        Ok(Self::new(self.value + other.value, self.unit))
    }

    /// Subtracts two quantities of the same unit.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, QuantityError> {
        self.require_same_unit(other, "subtraction")?;
        Ok(Self::new(self.value - other.value, self.unit))
    }

    /// Multiplies values and adds unit exponents.
    pub fn checked_mul(&self, other: &Self) -> Result<Self, QuantityError> {
        let unit = self.unit
                       .checked_mul(other.unit)
                       .ok_or(QuantityError::UnitOverflow)?;
        Ok(Self::new(self.value * other.value, unit))
    }

    /// Divides values and subtracts unit exponents.
    pub fn checked_div(&self, other: &Self) -> Result<Self, QuantityError> {
        #[allow(clippy::float_cmp)]
        if other.value == 0.0 {
            return Err(QuantityError::DivisionByZero);
        }
        let unit = self.unit
                       .checked_div(other.unit)
                       .ok_or(QuantityError::UnitOverflow)?;
        Ok(Self::new(self.value / other.value, unit))
    }

    /// Floating remainder; the unit becomes `u1/u2`.
    pub fn checked_rem(&self, other: &Self) -> Result<Self, QuantityError> {
        #[allow(clippy::float_cmp)]
        if other.value == 0.0 {
            return Err(QuantityError::DivisionByZero);
        }
        let unit = self.unit
                       .checked_div(other.unit)
                       .ok_or(QuantityError::UnitOverflow)?;
        Ok(Self::new(self.value % other.value, unit))
    }

    /// Raises the quantity to `exponent`.
    ///
    /// The exponent must be dimensionless, and integral whenever `self` has a
    /// unit.
    ///
    /// # Example
    /// ```
    /// use cadexpr::quantity::{Quantity, Unit};
    ///
    /// let side = Quantity::new(3.0, Unit::LENGTH);
    /// let area = side.checked_pow(&Quantity::dimensionless(2.0)).unwrap();
    /// assert_eq!(area, Quantity::new(9.0, Unit::AREA));
    /// assert!(side.checked_pow(&Quantity::dimensionless(0.5)).is_err());
    /// ```
    pub fn checked_pow(&self, exponent: &Self) -> Result<Self, QuantityError> {
        if !exponent.is_dimensionless() {
            return Err(QuantityError::ExponentHasUnit);
        }
        if self.is_dimensionless() {
            return Ok(Self::dimensionless(self.value.powf(exponent.value)));
        }
        let rounded = exponent.value.round();
        if !approx_eq(rounded, exponent.value) {
            return Err(QuantityError::FractionalExponent);
        }
        let power = as_exact_integer(rounded).ok_or(QuantityError::UnitOverflow)?;
        let unit = self.unit
                       .checked_pow(power)
                       .ok_or(QuantityError::UnitOverflow)?;
        Ok(Self::new(self.value.powf(rounded), unit))
    }

    /// Square root; every unit exponent must be even.
    pub fn checked_sqrt(&self) -> Result<Self, QuantityError> {
        let unit = self.unit.sqrt().ok_or(QuantityError::OddRoot)?;
        Ok(Self::new(self.value.sqrt(), unit))
    }

    /// Applies `f` to the value, keeping the unit.
    #[must_use]
    pub fn map_value(&self, f: impl FnOnce(f64) -> f64) -> Self {
        Self::new(f(self.value), self.unit)
    }

    /// Tolerance equality; different units are an error.
    pub fn approx_eq(&self, other: &Self) -> Result<bool, QuantityError> {
        self.require_same_unit(other, "comparison")?;
        Ok(approx_eq(self.value, other.value))
    }

    /// Tolerance ordering; values within tolerance compare equal.
    ///
    /// Returns `Ok(None)` when either value is NaN.
    pub fn compare(&self, other: &Self) -> Result<Option<Ordering>, QuantityError> {
        if self.approx_eq(other)? {
            return Ok(Some(Ordering::Equal));
        }
        Ok(self.value.partial_cmp(&other.value))
    }

    /// Renders the quantity the way it is written in source, e.g. `15 mm` or
    /// `2.5`.
    #[must_use]
    pub fn to_source(&self) -> String {
        let number = format_significant(self.value, PRINT_DIGITS);
        if self.unit.is_empty() {
            number
        } else {
            format!("{number} {}", self.unit)
        }
    }
}

impl std::ops::Neg for Quantity {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.value, self.unit)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_source())
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self::dimensionless(value)
    }
}
