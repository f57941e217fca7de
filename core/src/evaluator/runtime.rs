//! Vectorized evaluation of a [`NumericFunction`] over sample grids.

use super::compiler::{BinaryKernel, Kernel, NumericFunction, UnaryKernel};
use crate::error::{ContourError, ContourResult, DomainViolation, GridCoordinate};
use crate::units::Conversion;
use nalgebra::DMatrix;
use tracing::debug;

/// One variable's coordinate grid as sampled, plus the map from the sampling
/// unit to the unit the compiled function expects.
#[derive(Debug, Clone, Copy)]
pub struct VariableGrid<'a> {
    pub symbol: &'a str,
    pub samples: &'a DMatrix<f64>,
    pub conversion: Conversion,
}

/// Intermediate result: constants stay scalar until combined with a grid.
enum Value {
    Scalar(f64),
    Array(DMatrix<f64>),
}

impl Value {
    fn at(&self, row: usize, col: usize) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::Array(m) => m[(row, col)],
        }
    }

    fn all_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Array(m) => m.iter().all(|v| v.is_finite()),
        }
    }
}

pub struct Evaluator<'a> {
    grids: [VariableGrid<'a>; 2],
    /// Grid magnitudes in declaration units, indexed by slot.
    inputs: [DMatrix<f64>; 2],
    shape: (usize, usize),
    /// Applied to the function's result, e.g. to land in a requested unit.
    output: Conversion,
}

impl<'a> Evaluator<'a> {
    /// `grids[0]` binds to the first declared variable, `grids[1]` to the second.
    pub fn new(grids: [VariableGrid<'a>; 2]) -> ContourResult<Self> {
        let shape = grids[0].samples.shape();
        if grids[1].samples.shape() != shape {
            return Err(ContourError::InvalidRange {
                axis: grids[1].symbol.to_string(),
                message: format!(
                    "grid shape {:?} does not match {:?}",
                    grids[1].samples.shape(),
                    shape
                ),
            });
        }
        let inputs = grids.map(|grid| convert(grid.samples, grid.conversion));
        Ok(Self {
            grids,
            inputs,
            shape,
            output: Conversion::IDENTITY,
        })
    }

    pub fn with_output(mut self, output: Conversion) -> Self {
        self.output = output;
        self
    }

    /// Apply `function` to the grids. The result has the grids' shape.
    pub fn evaluate(&self, function: &NumericFunction) -> ContourResult<DMatrix<f64>> {
        let (rows, cols) = self.shape;
        debug!(rows, cols, kernels = function.kernel_count(), "evaluating");
        let result = match self.eval(function.root())? {
            Value::Scalar(v) => Value::Scalar(self.output.apply(v)),
            Value::Array(mut m) => {
                if !self.output.is_identity() {
                    let output = self.output;
                    m.apply(|v| *v = output.apply(*v));
                }
                Value::Array(m)
            }
        };
        self.check(&result, |_, _| DomainViolation::NonFinite)?;
        Ok(match result {
            Value::Scalar(v) => DMatrix::from_element(rows, cols, v),
            Value::Array(m) => m,
        })
    }

    fn eval(&self, kernel: &Kernel) -> ContourResult<Value> {
        match kernel {
            Kernel::Variable(slot) => Ok(Value::Array(self.inputs[slot.index()].clone())),
            Kernel::Constant(v) => {
                let value = Value::Scalar(*v);
                self.check(&value, |_, _| DomainViolation::NonFinite)?;
                Ok(value)
            }
            Kernel::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                let result = match &operand {
                    Value::Scalar(v) => Value::Scalar(apply_unary(*op, *v)),
                    Value::Array(m) => Value::Array(m.map(|v| apply_unary(*op, v))),
                };
                self.check(&result, |row, col| unary_violation(*op, operand.at(row, col)))?;
                Ok(result)
            }
            Kernel::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let f = |a: f64, b: f64| apply_binary(*op, a, b);
                let result = match (&left, &right) {
                    (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(*a, *b)),
                    (Value::Array(a), Value::Scalar(b)) => Value::Array(a.map(|v| f(v, *b))),
                    (Value::Scalar(a), Value::Array(b)) => Value::Array(b.map(|v| f(*a, v))),
                    (Value::Array(a), Value::Array(b)) => Value::Array(a.zip_map(b, f)),
                };
                self.check(&result, |row, col| {
                    binary_violation(*op, left.at(row, col), right.at(row, col))
                })?;
                Ok(result)
            }
        }
    }

    /// Every domain violation surfaces as a non-finite cell; the slow
    /// row-major scan only runs when the bulk sweep finds one.
    fn check(
        &self,
        result: &Value,
        classify: impl Fn(usize, usize) -> DomainViolation,
    ) -> ContourResult<()> {
        if result.all_finite() {
            return Ok(());
        }
        let (rows, cols) = self.shape;
        for row in 0..rows {
            for col in 0..cols {
                if !result.at(row, col).is_finite() {
                    return Err(self.fault(classify(row, col), row, col));
                }
            }
        }
        Ok(())
    }

    fn fault(&self, reason: DomainViolation, row: usize, col: usize) -> ContourError {
        let bindings = self
            .grids
            .iter()
            .filter(|grid| row < grid.samples.nrows() && col < grid.samples.ncols())
            .map(|grid| (grid.symbol.to_string(), grid.samples[(row, col)]))
            .collect();
        debug!(%reason, row, col, "domain violation");
        ContourError::NumericEvaluation {
            reason,
            at: GridCoordinate { row, col, bindings },
        }
    }
}

/// Evaluate `function` over the two variable grids.
pub fn evaluate(
    function: &NumericFunction,
    grids: [VariableGrid<'_>; 2],
) -> ContourResult<DMatrix<f64>> {
    Evaluator::new(grids)?.evaluate(function)
}

fn convert(samples: &DMatrix<f64>, conversion: Conversion) -> DMatrix<f64> {
    if conversion.is_identity() {
        samples.clone()
    } else {
        samples.map(|v| conversion.apply(v))
    }
}

pub(super) fn apply_unary(op: UnaryKernel, v: f64) -> f64 {
    match op {
        UnaryKernel::Neg => -v,
        UnaryKernel::Sin => v.sin(),
        UnaryKernel::Cos => v.cos(),
        UnaryKernel::Tan => v.tan(),
        UnaryKernel::Asin => v.asin(),
        UnaryKernel::Acos => v.acos(),
        UnaryKernel::Atan => v.atan(),
        UnaryKernel::Sinh => v.sinh(),
        UnaryKernel::Cosh => v.cosh(),
        UnaryKernel::Tanh => v.tanh(),
        UnaryKernel::Exp => v.exp(),
        UnaryKernel::Ln => v.ln(),
        UnaryKernel::Log10 => v.log10(),
        UnaryKernel::Log2 => v.log2(),
        UnaryKernel::Sqrt => v.sqrt(),
        UnaryKernel::Cbrt => v.cbrt(),
        UnaryKernel::Abs => v.abs(),
        UnaryKernel::Floor => v.floor(),
        UnaryKernel::Ceil => v.ceil(),
        UnaryKernel::Round => v.round(),
        UnaryKernel::Sign => {
            if v == 0.0 {
                0.0
            } else {
                v.signum()
            }
        }
        UnaryKernel::Erf => libm::erf(v),
        UnaryKernel::Gamma => {
            // Poles; libm returns ±inf or NaN depending on the sign of zero.
            if v <= 0.0 && v.fract() == 0.0 {
                f64::NAN
            } else {
                libm::tgamma(v)
            }
        }
    }
}

pub(super) fn apply_binary(op: BinaryKernel, a: f64, b: f64) -> f64 {
    match op {
        BinaryKernel::Add => a + b,
        BinaryKernel::Sub => a - b,
        BinaryKernel::Mul => a * b,
        BinaryKernel::Div => a / b,
        BinaryKernel::Pow => a.powf(b),
        BinaryKernel::Atan2 => a.atan2(b),
        BinaryKernel::Hypot => a.hypot(b),
        BinaryKernel::Min => a.min(b),
        BinaryKernel::Max => a.max(b),
    }
}

pub(super) fn unary_violation(op: UnaryKernel, v: f64) -> DomainViolation {
    match op {
        UnaryKernel::Ln | UnaryKernel::Log10 | UnaryKernel::Log2 if v <= 0.0 => {
            DomainViolation::LogarithmOfNonPositive
        }
        UnaryKernel::Sqrt if v < 0.0 => DomainViolation::SquareRootOfNegative,
        UnaryKernel::Asin | UnaryKernel::Acos if v.abs() > 1.0 => {
            DomainViolation::InverseTrigOutOfRange
        }
        UnaryKernel::Gamma if v <= 0.0 && v.fract() == 0.0 => DomainViolation::GammaPole,
        _ => DomainViolation::NonFinite,
    }
}

pub(super) fn binary_violation(op: BinaryKernel, a: f64, b: f64) -> DomainViolation {
    match op {
        BinaryKernel::Div if b == 0.0 => DomainViolation::DivisionByZero,
        BinaryKernel::Pow if a == 0.0 && b < 0.0 => DomainViolation::DivisionByZero,
        BinaryKernel::Pow if a < 0.0 && b.fract() != 0.0 => DomainViolation::InvalidPower,
        _ => DomainViolation::NonFinite,
    }
}
