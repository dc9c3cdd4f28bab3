use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Energy,
    Temperature,
    Pressure,
    Length,
    Time,
    Volume,
}

/// A physical unit expressed as a scale factor relative to the base unit of its
/// [`Dimension`] (kJ/mol, K, bar, nm, ps, nm³).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub symbol: &'static str,
    pub dimension: Dimension,
    pub scale: f64,
}

impl Unit {
    pub const KJ_PER_MOL: Unit = Unit::new("kJ/mol", Dimension::Energy, 1.0);
    pub const KCAL_PER_MOL: Unit = Unit::new("kcal/mol", Dimension::Energy, 4.184);
    pub const KELVIN: Unit = Unit::new("K", Dimension::Temperature, 1.0);
    pub const BAR: Unit = Unit::new("bar", Dimension::Pressure, 1.0);
    pub const ATMOSPHERE: Unit = Unit::new("atm", Dimension::Pressure, 1.01325);
    pub const NANOMETER: Unit = Unit::new("nm", Dimension::Length, 1.0);
    pub const ANGSTROM: Unit = Unit::new("Å", Dimension::Length, 0.1);
    pub const FEMTOSECOND: Unit = Unit::new("fs", Dimension::Time, 1.0e-3);
    pub const PICOSECOND: Unit = Unit::new("ps", Dimension::Time, 1.0);
    pub const NANOSECOND: Unit = Unit::new("ns", Dimension::Time, 1.0e3);
    pub const CUBIC_NANOMETER: Unit = Unit::new("nm³", Dimension::Volume, 1.0);
    pub const CUBIC_ANGSTROM: Unit = Unit::new("Å³", Dimension::Volume, 1.0e-3);

    pub const fn new(symbol: &'static str, dimension: Dimension, scale: f64) -> Self {
        Self {
            symbol,
            dimension,
            scale,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("Cannot convert {from:?} quantity to a {to:?} unit")]
    DimensionMismatch { from: Dimension, to: Dimension },
}

/// A scalar reading tagged with the unit it was reported in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// The value multiplied by the unit's scale factor, i.e. expressed in the
    /// base unit of the dimension.
    pub fn base_value(&self) -> f64 {
        self.value * self.unit.scale
    }

    /// Re-expresses the quantity in another unit of the same dimension.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::DimensionMismatch`] if the target unit measures a
    /// different dimension.
    pub fn to(&self, target: Unit) -> Result<Quantity, UnitError> {
        if self.unit.dimension != target.dimension {
            return Err(UnitError::DimensionMismatch {
                from: self.unit.dimension,
                to: target.dimension,
            });
        }
        Ok(Quantity::new(self.base_value() / target.scale, target))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
