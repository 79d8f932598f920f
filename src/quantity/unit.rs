use std::{f64::consts::PI, fmt};

/// Number of tracked dimensions.
pub const DIMENSIONS: usize = 8;

/// Symbols of the internal base units, in exponent order.
///
/// Every quantity stores its value scaled to these units, so a unit signature
/// printed with these symbols re-parses to the same value.
pub const BASE_SYMBOLS: [&str; DIMENSIONS] = ["mm", "kg", "s", "A", "K", "mol", "cd", "deg"];

/// A physical dimension signature.
///
/// Exponents are ordered length, mass, time, electric current, temperature,
/// amount of substance, luminous intensity and angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit {
    exponents: [i8; DIMENSIONS],
}

impl Unit {
    /// The empty (dimensionless) unit.
    pub const EMPTY: Self = Self::new([0, 0, 0, 0, 0, 0, 0, 0]);
    /// Length.
    pub const LENGTH: Self = Self::new([1, 0, 0, 0, 0, 0, 0, 0]);
    /// Mass.
    pub const MASS: Self = Self::new([0, 1, 0, 0, 0, 0, 0, 0]);
    /// Time.
    pub const TIME: Self = Self::new([0, 0, 1, 0, 0, 0, 0, 0]);
    /// Electric current.
    pub const CURRENT: Self = Self::new([0, 0, 0, 1, 0, 0, 0, 0]);
    /// Thermodynamic temperature.
    pub const TEMPERATURE: Self = Self::new([0, 0, 0, 0, 1, 0, 0, 0]);
    /// Amount of substance.
    pub const AMOUNT: Self = Self::new([0, 0, 0, 0, 0, 1, 0, 0]);
    /// Luminous intensity.
    pub const LUMINOUS: Self = Self::new([0, 0, 0, 0, 0, 0, 1, 0]);
    /// Plane angle.
    pub const ANGLE: Self = Self::new([0, 0, 0, 0, 0, 0, 0, 1]);
    /// Area.
    pub const AREA: Self = Self::new([2, 0, 0, 0, 0, 0, 0, 0]);
    /// Volume.
    pub const VOLUME: Self = Self::new([3, 0, 0, 0, 0, 0, 0, 0]);
    /// Force.
    pub const FORCE: Self = Self::new([1, 1, -2, 0, 0, 0, 0, 0]);
    /// Pressure and stress.
    pub const PRESSURE: Self = Self::new([-1, 1, -2, 0, 0, 0, 0, 0]);
    /// Work and energy.
    pub const ENERGY: Self = Self::new([2, 1, -2, 0, 0, 0, 0, 0]);
    /// Power.
    pub const POWER: Self = Self::new([2, 1, -3, 0, 0, 0, 0, 0]);
    /// Frequency.
    pub const FREQUENCY: Self = Self::new([0, 0, -1, 0, 0, 0, 0, 0]);
    /// Velocity.
    pub const VELOCITY: Self = Self::new([1, 0, -1, 0, 0, 0, 0, 0]);

    /// Creates a unit from raw exponents.
    #[must_use]
    pub const fn new(exponents: [i8; DIMENSIONS]) -> Self {
        Self { exponents }
    }

    /// Returns the raw exponents.
    #[must_use]
    pub const fn exponents(&self) -> [i8; DIMENSIONS] {
        self.exponents
    }

    /// Returns `true` for the dimensionless unit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exponents.iter().all(|&e| e == 0)
    }

    /// Multiplies two units by adding their exponents.
    ///
    /// Returns `None` when an exponent leaves the `i8` range.
    ///
    /// # Example
    /// ```
    /// use cadexpr::quantity::Unit;
    ///
    /// assert_eq!(Unit::LENGTH.checked_mul(Unit::LENGTH), Some(Unit::AREA));
    /// ```
    #[must_use]
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.combine(other, i8::checked_add)
    }

    /// Divides two units by subtracting their exponents.
    #[must_use]
    pub fn checked_div(self, other: Self) -> Option<Self> {
        self.combine(other, i8::checked_sub)
    }

    /// Raises the unit to an integer power.
    #[must_use]
    pub fn checked_pow(self, power: i64) -> Option<Self> {
        let power = i8::try_from(power).ok()?;
        let mut exponents = self.exponents;
        for e in &mut exponents {
            *e = e.checked_mul(power)?;
        }
        Some(Self { exponents })
    }

    /// Halves every exponent.
    ///
    /// Returns `None` if any exponent is odd.
    ///
    /// # Example
    /// ```
    /// use cadexpr::quantity::Unit;
    ///
    /// assert_eq!(Unit::AREA.sqrt(), Some(Unit::LENGTH));
    /// assert_eq!(Unit::VOLUME.sqrt(), None);
    /// ```
    #[must_use]
    pub fn sqrt(self) -> Option<Self> {
        let mut exponents = self.exponents;
        for e in &mut exponents {
            if *e % 2 != 0 {
                return None;
            }
            *e /= 2;
        }
        Some(Self { exponents })
    }

    fn combine(self, other: Self, op: fn(i8, i8) -> Option<i8>) -> Option<Self> {
        let mut exponents = self.exponents;
        for (e, o) in exponents.iter_mut().zip(other.exponents) {
            *e = op(*e, o)?;
        }
        Some(Self { exponents })
    }
}

/// Writes `symbol` or `symbol^n` for one factor.
fn write_factor(f: &mut fmt::Formatter<'_>, symbol: &str, exponent: i8) -> fmt::Result {
    if exponent == 1 {
        write!(f, "{symbol}")
    } else {
        write!(f, "{symbol}^{exponent}")
    }
}

impl fmt::Display for Unit {
    /// Renders the unit with base symbols, e.g. `mm^2`, `mm*kg/s^2` or
    /// `mm/(s*A)`. A unit with only negative exponents keeps them signed
    /// (`s^-1`) so the text stays a valid unit expression.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numerator = BASE_SYMBOLS.iter()
                                    .zip(self.exponents)
                                    .filter(|(_, e)| *e > 0)
                                    .collect::<Vec<_>>();
        let denominator = BASE_SYMBOLS.iter()
                                      .zip(self.exponents)
                                      .filter(|(_, e)| *e < 0)
                                      .collect::<Vec<_>>();

        if numerator.is_empty() {
            for (i, (symbol, e)) in denominator.iter().enumerate() {
                if i > 0 {
                    f.write_str("*")?;
                }
                write!(f, "{symbol}^{e}")?;
            }
            return Ok(());
        }

        for (i, (symbol, e)) in numerator.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write_factor(f, symbol, *e)?;
        }
        if denominator.is_empty() {
            return Ok(());
        }
        f.write_str("/")?;
        if denominator.len() > 1 {
            f.write_str("(")?;
        }
        for (i, (symbol, e)) in denominator.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write_factor(f, symbol, -*e)?;
        }
        if denominator.len() > 1 {
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// One entry of the unit symbol table.
#[derive(Debug, Clone, Copy)]
pub struct UnitSymbol {
    /// The spelling accepted after numeric literals.
    pub symbol: &'static str,
    /// Factor converting one of this unit into internal base units.
    pub scale:  f64,
    /// The dimension signature.
    pub unit:   Unit,
}

macro_rules! unit_table {
    ($($symbol:literal => ($scale:expr, $unit:expr)),* $(,)?) => {
        /// All recognized unit symbols.
        pub static UNIT_SYMBOLS: &[UnitSymbol] = &[
            $(UnitSymbol { symbol: $symbol, scale: $scale, unit: $unit },)*
        ];
    };
}

const VOLTAGE: Unit = Unit::new([2, 1, -3, -1, 0, 0, 0, 0]);
const CHARGE: Unit = Unit::new([0, 0, 1, 1, 0, 0, 0, 0]);
const CAPACITANCE: Unit = Unit::new([-2, -1, 4, 2, 0, 0, 0, 0]);
const RESISTANCE: Unit = Unit::new([2, 1, -3, -2, 0, 0, 0, 0]);
const CONDUCTANCE: Unit = Unit::new([-2, -1, 3, 2, 0, 0, 0, 0]);
const INDUCTANCE: Unit = Unit::new([2, 1, -2, -2, 0, 0, 0, 0]);
const MAGNETIC_FLUX: Unit = Unit::new([2, 1, -2, -1, 0, 0, 0, 0]);
const FLUX_DENSITY: Unit = Unit::new([0, 1, -2, -1, 0, 0, 0, 0]);

unit_table! {
    "nm"   => (1e-6, Unit::LENGTH),
    "um"   => (1e-3, Unit::LENGTH),
    "mm"   => (1.0, Unit::LENGTH),
    "cm"   => (10.0, Unit::LENGTH),
    "dm"   => (100.0, Unit::LENGTH),
    "m"    => (1e3, Unit::LENGTH),
    "km"   => (1e6, Unit::LENGTH),
    "inch" => (25.4, Unit::LENGTH),
    "in"   => (25.4, Unit::LENGTH),
    "ft"   => (304.8, Unit::LENGTH),
    "thou" => (0.0254, Unit::LENGTH),
    "mil"  => (0.0254, Unit::LENGTH),
    "yd"   => (914.4, Unit::LENGTH),
    "mi"   => (1_609_344.0, Unit::LENGTH),
    "ug"   => (1e-9, Unit::MASS),
    "mg"   => (1e-6, Unit::MASS),
    "g"    => (1e-3, Unit::MASS),
    "kg"   => (1.0, Unit::MASS),
    "t"    => (1e3, Unit::MASS),
    "lb"   => (0.453_592_37, Unit::MASS),
    "oz"   => (0.028_349_523_125, Unit::MASS),
    "s"    => (1.0, Unit::TIME),
    "ms"   => (1e-3, Unit::TIME),
    "min"  => (60.0, Unit::TIME),
    "h"    => (3600.0, Unit::TIME),
    "A"    => (1.0, Unit::CURRENT),
    "mA"   => (1e-3, Unit::CURRENT),
    "kA"   => (1e3, Unit::CURRENT),
    "K"    => (1.0, Unit::TEMPERATURE),
    "mK"   => (1e-3, Unit::TEMPERATURE),
    "mol"  => (1.0, Unit::AMOUNT),
    "cd"   => (1.0, Unit::LUMINOUS),
    "deg"  => (1.0, Unit::ANGLE),
    "°"    => (1.0, Unit::ANGLE),
    "rad"  => (180.0 / PI, Unit::ANGLE),
    "gon"  => (0.9, Unit::ANGLE),
    "L"    => (1e6, Unit::VOLUME),
    "ml"   => (1e3, Unit::VOLUME),
    "N"    => (1e3, Unit::FORCE),
    "kN"   => (1e6, Unit::FORCE),
    "Pa"   => (1e-3, Unit::PRESSURE),
    "kPa"  => (1.0, Unit::PRESSURE),
    "MPa"  => (1e3, Unit::PRESSURE),
    "GPa"  => (1e6, Unit::PRESSURE),
    "psi"  => (6.894_757, Unit::PRESSURE),
    "J"    => (1e6, Unit::ENERGY),
    "kJ"   => (1e9, Unit::ENERGY),
    "W"    => (1e6, Unit::POWER),
    "kW"   => (1e9, Unit::POWER),
    "V"    => (1e6, VOLTAGE),
    "C"    => (1.0, CHARGE),
    "F"    => (1e-6, CAPACITANCE),
    "Ohm"  => (1e6, RESISTANCE),
    "S"    => (1e-6, CONDUCTANCE),
    "H"    => (1e6, INDUCTANCE),
    "Wb"   => (1e6, MAGNETIC_FLUX),
    "T"    => (1.0, FLUX_DENSITY),
    "Hz"   => (1.0, Unit::FREQUENCY),
}

/// Looks up a unit symbol.
///
/// # Example
/// ```
/// use cadexpr::quantity::{Unit, lookup_unit};
///
/// let m = lookup_unit("m").unwrap();
/// assert_eq!(m.scale, 1000.0);
/// assert_eq!(m.unit, Unit::LENGTH);
/// assert!(lookup_unit("parsec").is_none());
/// ```
#[must_use]
pub fn lookup_unit(symbol: &str) -> Option<&'static UnitSymbol> {
    UNIT_SYMBOLS.iter().find(|u| u.symbol == symbol)
}
