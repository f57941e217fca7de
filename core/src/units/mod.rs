//! Physical units and dimensional analysis.
//!
//! A [`Unit`] is a [`Dimension`] (rational exponents over the seven SI base
//! quantities) plus an affine conversion to the coherent SI unit of that
//! dimension. The [`UnitSystem`] trait is the capability the rest of the
//! crate depends on; [`UnitRegistry`] is the built-in implementation.

mod registry;

#[cfg(test)]
mod tests;

pub use registry::UnitRegistry;

use num_rational::Rational32;
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Symbols of the SI base quantities, in exponent order.
pub const BASE_SYMBOLS: [&str; 7] = ["m", "kg", "s", "A", "K", "mol", "cd"];

pub const LENGTH: usize = 0;
pub const MASS: usize = 1;
pub const TIME: usize = 2;
pub const CURRENT: usize = 3;
pub const TEMPERATURE: usize = 4;
pub const AMOUNT: usize = 5;
pub const LUMINOSITY: usize = 6;

/// Errors raised by the unit collaborator.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum UnitError {
    #[error("Unknown unit: '{0}'")]
    UnknownUnit(String),

    #[error("Malformed unit expression '{text}': {message}")]
    Malformed { text: String, message: String },

    #[error("Cannot convert from {from} to {to}: incompatible dimensions")]
    Incompatible { from: String, to: String },

    #[error("Offset unit '{0}' cannot take part in unit arithmetic")]
    OffsetCalculus(String),

    #[error("Exponent of '{0}' is out of range")]
    ExponentOverflow(String),
}

type ExponentOp = fn(&Rational32, &Rational32) -> Option<Rational32>;

/// Exponents of the SI base quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension([Rational32; 7]);

impl Dimension {
    pub fn dimensionless() -> Self {
        Self([Rational32::zero(); 7])
    }

    /// A single base quantity raised to an integer power.
    pub fn base(index: usize, exponent: i32) -> Self {
        let mut exps = [Rational32::zero(); 7];
        exps[index] = Rational32::from_integer(exponent);
        Self(exps)
    }

    pub fn from_exponents(exponents: [i32; 7]) -> Self {
        Self(exponents.map(Rational32::from_integer))
    }

    pub fn exponent(&self, index: usize) -> Rational32 {
        self.0[index]
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|e| e.is_zero())
    }

    /// `None` when an exponent leaves the `i32` range.
    pub fn mul(&self, other: &Self) -> Option<Self> {
        self.combine(other, |a, b| a.checked_add(b))
    }

    pub fn div(&self, other: &Self) -> Option<Self> {
        self.combine(other, |a, b| a.checked_sub(b))
    }

    pub fn pow(&self, exponent: Rational32) -> Option<Self> {
        let mut out = self.0;
        for e in out.iter_mut() {
            *e = e.checked_mul(&exponent)?;
        }
        Some(Self(out))
    }

    fn combine(&self, other: &Self, op: ExponentOp) -> Option<Self> {
        let mut out = self.0;
        for (o, e) in out.iter_mut().zip(other.0.iter()) {
            *o = op(o, e)?;
        }
        Some(Self(out))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factors: Vec<(String, Rational32)> = BASE_SYMBOLS
            .iter()
            .zip(self.0.iter())
            .filter(|(_, e)| !e.is_zero())
            .map(|(s, e)| (s.to_string(), *e))
            .collect();
        write!(f, "[{}]", format_factors(&factors))
    }
}

/// A concrete unit: dimension plus affine map to coherent SI.
///
/// `base = value * scale + offset`. The symbol is kept as a list of named
/// factors so `m*m` prints as `m^2` and `m/m` cancels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    factors: Vec<(String, Rational32)>,
    dimension: Dimension,
    scale: f64,
    offset: f64,
}

impl Unit {
    pub fn dimensionless() -> Self {
        Self {
            factors: Vec::new(),
            dimension: Dimension::dimensionless(),
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// A named unit with a single factor.
    pub fn named(symbol: &str, dimension: Dimension, scale: f64, offset: f64) -> Self {
        Self {
            factors: vec![(symbol.to_string(), Rational32::one())],
            dimension,
            scale,
            offset,
        }
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn symbol(&self) -> String {
        format_factors(&self.factors)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }

    /// Dimensionless and equal to the pure number 1 (no `deg`, no `percent`).
    pub fn is_unity(&self) -> bool {
        self.is_dimensionless() && self.scale == 1.0 && self.offset == 0.0
    }

    pub fn has_offset(&self) -> bool {
        self.offset != 0.0
    }

    /// Convert a value to coherent SI units
    pub fn to_base(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }

    /// Convert from coherent SI units to this unit
    pub fn from_base(&self, base_value: f64) -> f64 {
        (base_value - self.offset) / self.scale
    }

    /// Check if two units are compatible (same dimension)
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.dimension == other.dimension
    }

    fn ensure_multiplicative(&self) -> Result<(), UnitError> {
        if self.has_offset() {
            Err(UnitError::OffsetCalculus(self.symbol()))
        } else {
            Ok(())
        }
    }

    pub fn try_mul(&self, other: &Self) -> Result<Self, UnitError> {
        self.ensure_multiplicative()?;
        other.ensure_multiplicative()?;
        let overflow = || UnitError::ExponentOverflow(format!("{}*{}", self, other));
        let mut factors = self.factors.clone();
        for (name, exp) in &other.factors {
            merge_factor(&mut factors, name, *exp, |a, b| a.checked_add(b)).ok_or_else(overflow)?;
        }
        Ok(Self {
            factors,
            dimension: self.dimension.mul(&other.dimension).ok_or_else(overflow)?,
            scale: self.scale * other.scale,
            offset: 0.0,
        })
    }

    pub fn try_div(&self, other: &Self) -> Result<Self, UnitError> {
        self.ensure_multiplicative()?;
        other.ensure_multiplicative()?;
        let overflow = || UnitError::ExponentOverflow(format!("{}/{}", self, other));
        let mut factors = self.factors.clone();
        for (name, exp) in &other.factors {
            merge_factor(&mut factors, name, *exp, |a, b| a.checked_sub(b)).ok_or_else(overflow)?;
        }
        Ok(Self {
            factors,
            dimension: self.dimension.div(&other.dimension).ok_or_else(overflow)?,
            scale: self.scale / other.scale,
            offset: 0.0,
        })
    }

    pub fn try_pow(&self, exponent: Rational32) -> Result<Self, UnitError> {
        if exponent.is_one() {
            return Ok(self.clone());
        }
        self.ensure_multiplicative()?;
        let overflow = || UnitError::ExponentOverflow(format!("({})^{}", self, exponent));
        let factors = if exponent.is_zero() {
            Vec::new()
        } else {
            self.factors
                .iter()
                .map(|(name, e)| Some((name.clone(), e.checked_mul(&exponent)?)))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(overflow)?
        };
        Ok(Self {
            factors,
            dimension: self.dimension.pow(exponent).ok_or_else(overflow)?,
            scale: self.scale.powf(ratio_to_f64(exponent)),
            offset: 0.0,
        })
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            write!(f, "dimensionless")
        } else {
            write!(f, "{}", self.symbol())
        }
    }
}

/// Affine map between two compatible units: `to = from * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub scale: f64,
    pub offset: f64,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion { scale: 1.0, offset: 0.0 };

    pub fn between(from: &Unit, to: &Unit) -> Result<Self, UnitError> {
        if !from.is_compatible(to) {
            return Err(UnitError::Incompatible {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self {
            scale: from.scale / to.scale,
            offset: (from.offset - to.offset) / to.scale,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// The unit capability the resolver and pipeline are written against.
///
/// Implementations only need [`UnitSystem::parse`]; the algebra defaults to
/// the operations on [`Unit`].
pub trait UnitSystem {
    /// Parse a unit name or unit expression (`"m"`, `"kg*m/s^2"`).
    fn parse(&self, text: &str) -> Result<Unit, UnitError>;

    fn compatible(&self, a: &Unit, b: &Unit) -> bool {
        a.is_compatible(b)
    }

    fn multiply(&self, a: &Unit, b: &Unit) -> Result<Unit, UnitError> {
        a.try_mul(b)
    }

    fn divide(&self, a: &Unit, b: &Unit) -> Result<Unit, UnitError> {
        a.try_div(b)
    }

    fn power(&self, a: &Unit, exponent: Rational32) -> Result<Unit, UnitError> {
        a.try_pow(exponent)
    }

    fn conversion(&self, from: &Unit, to: &Unit) -> Result<Conversion, UnitError> {
        Conversion::between(from, to)
    }

    fn convert(&self, value: f64, from: &Unit, to: &Unit) -> Result<f64, UnitError> {
        Ok(self.conversion(from, to)?.apply(value))
    }
}

/// Closest small rational to `value`, if it represents it to 1e-9.
pub fn rational_from_f64(value: f64) -> Option<Rational32> {
    if !value.is_finite() {
        return None;
    }
    let ratio = Rational32::approximate_float(value)?;
    if *ratio.denom() > 1000 || (ratio_to_f64(ratio) - value).abs() > 1e-9 {
        return None;
    }
    Some(ratio)
}

pub fn ratio_to_f64(ratio: Rational32) -> f64 {
    *ratio.numer() as f64 / *ratio.denom() as f64
}

/// Fold `exponent` into the factor called `name` with `op`.
fn merge_factor(
    factors: &mut Vec<(String, Rational32)>,
    name: &str,
    exponent: Rational32,
    op: ExponentOp,
) -> Option<()> {
    match factors.iter().position(|(n, _)| n == name) {
        Some(pos) => {
            factors[pos].1 = op(&factors[pos].1, &exponent)?;
            if factors[pos].1.is_zero() {
                factors.remove(pos);
            }
        }
        None => {
            let merged = op(&Rational32::zero(), &exponent)?;
            if !merged.is_zero() {
                factors.push((name.to_string(), merged));
            }
        }
    }
    Some(())
}

/// `name^|exponent|`; widened so `i32::MIN` has a magnitude.
fn format_exponent(name: &str, exponent: Rational32) -> String {
    let numer = i64::from(*exponent.numer()).abs();
    let denom = i64::from(*exponent.denom());
    if numer == 1 && denom == 1 {
        name.to_string()
    } else if denom == 1 {
        format!("{}^{}", name, numer)
    } else {
        format!("{}^({}/{})", name, numer, denom)
    }
}

fn format_factors(factors: &[(String, Rational32)]) -> String {
    let numer: Vec<String> = factors
        .iter()
        .filter(|(_, e)| *e > Rational32::zero())
        .map(|(n, e)| format_exponent(n, *e))
        .collect();
    let denom: Vec<String> = factors
        .iter()
        .filter(|(_, e)| *e < Rational32::zero())
        .map(|(n, e)| format_exponent(n, *e))
        .collect();

    let top = if numer.is_empty() {
        "1".to_string()
    } else {
        numer.join("*")
    };
    match denom.len() {
        0 => top,
        1 => format!("{}/{}", top, denom[0]),
        _ => format!("{}/({})", top, denom.join("*")),
    }
}
