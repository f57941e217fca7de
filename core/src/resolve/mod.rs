//! Dimensional analysis over the expression tree.
//!
//! [`UnitResolver`] walks an [`Expr`] bottom-up and builds a parallel
//! [`ResolvedExpr`] tree in which every node carries the unit its value has.
//! The source tree is never modified, so the same tree can be resolved under
//! different variable units.
//!
//! Besides the unit, each operation records the factors that bring its
//! operands onto a common scale (for `+`, the right operand is expressed in
//! the left operand's unit; for transcendental functions, the argument is
//! reduced to a pure number). The numeric compiler only ever sees those
//! factors, never the units themselves.

#[cfg(test)]
mod tests;

use crate::error::{ContourError, ContourResult};
use crate::expression::{BinaryOperator, Expr, ExprKind, Function, Slot, Span, UnaryOperator};
use crate::units::{rational_from_f64, Unit, UnitError, UnitSystem};
use num_rational::Rational32;
use tracing::trace;

/// An expression node annotated with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExpr {
    pub kind: ResolvedKind,
    pub unit: Unit,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedKind {
    /// Magnitude in the literal's own unit
    Literal(f64),
    Variable(Slot),
    Unary {
        op: UnaryOperator,
        operand: Box<ResolvedExpr>,
    },
    /// `scales` multiply the left and right operand values before `op`
    Binary {
        op: BinaryOperator,
        left: Box<ResolvedExpr>,
        right: Box<ResolvedExpr>,
        scales: [f64; 2],
    },
    /// `scales[i]` multiplies argument `i` before the function is applied
    Call {
        function: Function,
        args: Vec<ResolvedExpr>,
        scales: Vec<f64>,
    },
}

pub struct UnitResolver<'a, S: UnitSystem + ?Sized> {
    system: &'a S,
    variables: &'a [Unit; 2],
}

impl<'a, S: UnitSystem + ?Sized> UnitResolver<'a, S> {
    /// `variables[0]` is the unit of [`Slot::First`], `variables[1]` of [`Slot::Second`].
    pub fn new(system: &'a S, variables: &'a [Unit; 2]) -> Self {
        Self { system, variables }
    }

    pub fn resolve(&self, expr: &Expr) -> ContourResult<ResolvedExpr> {
        let span = expr.span;
        let (kind, unit) = match &expr.kind {
            ExprKind::Literal { value, unit } => {
                let unit = match unit {
                    Some(text) => self.system.parse(text)?,
                    None => Unit::dimensionless(),
                };
                (ResolvedKind::Literal(*value), unit)
            }

            ExprKind::Variable { slot, .. } => {
                (ResolvedKind::Variable(*slot), self.variables[slot.index()].clone())
            }

            ExprKind::UnaryOp { op, operand } => {
                let operand = self.resolve(operand)?;
                plain(&operand.unit)?;
                let unit = operand.unit.clone();
                (
                    ResolvedKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    unit,
                )
            }

            ExprKind::BinaryOp { op, left, right } => {
                let left = self.resolve(left)?;
                let right = self.resolve(right)?;
                plain(&left.unit)?;
                plain(&right.unit)?;
                let (unit, scales) = match op {
                    BinaryOperator::Add | BinaryOperator::Sub => {
                        let ratio = self.same_dimension(op.symbol(), &left, &right, span)?;
                        (left.unit.clone(), [1.0, ratio])
                    }
                    BinaryOperator::Mul => (
                        self.system
                            .multiply(&left.unit, &right.unit)
                            .map_err(|err| exponent_error(err, op.symbol(), span))?,
                        [1.0, 1.0],
                    ),
                    BinaryOperator::Div => (
                        self.system
                            .divide(&left.unit, &right.unit)
                            .map_err(|err| exponent_error(err, op.symbol(), span))?,
                        [1.0, 1.0],
                    ),
                    BinaryOperator::Pow => self.power(op.symbol(), &left, &right, span)?,
                };
                (
                    ResolvedKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                        scales,
                    },
                    unit,
                )
            }

            ExprKind::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<ContourResult<Vec<_>>>()?;
                for arg in &args {
                    plain(&arg.unit)?;
                }
                let (unit, scales) = self.call(*function, &args, span)?;
                (
                    ResolvedKind::Call {
                        function: *function,
                        args,
                        scales,
                    },
                    unit,
                )
            }
        };

        trace!(span = %span, unit = %unit, "resolved node");
        Ok(ResolvedExpr { kind, unit, span })
    }

    fn call(
        &self,
        function: Function,
        args: &[ResolvedExpr],
        span: Span,
    ) -> ContourResult<(Unit, Vec<f64>)> {
        let name = function.name();
        match function {
            Function::Sin
            | Function::Cos
            | Function::Tan
            | Function::Asin
            | Function::Acos
            | Function::Atan
            | Function::Sinh
            | Function::Cosh
            | Function::Tanh
            | Function::Exp
            | Function::Ln
            | Function::Log
            | Function::Log10
            | Function::Log2
            | Function::Erf
            | Function::Gamma
            | Function::Factorial => {
                let arg = &args[0];
                if !arg.unit.is_dimensionless() {
                    return Err(mismatch(name, "dimensionless", &arg.unit.to_string(), span));
                }
                Ok((Unit::dimensionless(), vec![arg.unit.scale()]))
            }
            Function::Sqrt => Ok((self.root(name, &args[0], 2, span)?, vec![1.0])),
            Function::Cbrt => Ok((self.root(name, &args[0], 3, span)?, vec![1.0])),
            Function::Abs | Function::Floor | Function::Ceil | Function::Round => {
                Ok((args[0].unit.clone(), vec![1.0]))
            }
            Function::Sign => Ok((Unit::dimensionless(), vec![1.0])),
            Function::Atan2 => {
                let ratio = self.same_dimension(name, &args[0], &args[1], span)?;
                Ok((Unit::dimensionless(), vec![1.0, ratio]))
            }
            Function::Hypot | Function::Min | Function::Max => {
                let ratio = self.same_dimension(name, &args[0], &args[1], span)?;
                Ok((args[0].unit.clone(), vec![1.0, ratio]))
            }
            Function::Pow => {
                let (unit, scales) = self.power(name, &args[0], &args[1], span)?;
                Ok((unit, scales.to_vec()))
            }
        }
    }

    fn root(
        &self,
        name: &str,
        arg: &ResolvedExpr,
        degree: i32,
        span: Span,
    ) -> ContourResult<Unit> {
        self.system
            .power(&arg.unit, Rational32::new(1, degree))
            .map_err(|err| exponent_error(err, name, span))
    }

    /// Factor expressing `right` in `left`'s unit, or a mismatch.
    fn same_dimension(
        &self,
        operator: &str,
        left: &ResolvedExpr,
        right: &ResolvedExpr,
        span: Span,
    ) -> ContourResult<f64> {
        if !self.system.compatible(&left.unit, &right.unit) {
            return Err(mismatch(
                operator,
                &left.unit.to_string(),
                &right.unit.to_string(),
                span,
            ));
        }
        Ok(self.system.conversion(&right.unit, &left.unit)?.scale)
    }

    fn power(
        &self,
        operator: &str,
        base: &ResolvedExpr,
        exponent: &ResolvedExpr,
        span: Span,
    ) -> ContourResult<(Unit, [f64; 2])> {
        if !exponent.unit.is_dimensionless() {
            return Err(mismatch(
                operator,
                "dimensionless exponent",
                &exponent.unit.to_string(),
                exponent.span,
            ));
        }
        let exponent_scale = exponent.unit.scale();

        // A pure-number base accepts any exponent.
        if base.unit.is_dimensionless() {
            return Ok((Unit::dimensionless(), [base.unit.scale(), exponent_scale]));
        }

        let value = constant_value(exponent).ok_or_else(|| {
            mismatch(
                operator,
                "constant exponent",
                "variable exponent",
                exponent.span,
            )
        })? * exponent_scale;
        let rational = rational_from_f64(value).ok_or_else(|| {
            mismatch(
                operator,
                "rational exponent",
                &value.to_string(),
                exponent.span,
            )
        })?;
        let unit = self
            .system
            .power(&base.unit, rational)
            .map_err(|err| exponent_error(err, operator, exponent.span))?;
        trace!(span = %span, exponent = %rational, "static exponent");
        Ok((unit, [1.0, exponent_scale]))
    }
}

/// Resolve `expr` with the given variable units.
pub fn resolve<S: UnitSystem + ?Sized>(
    expr: &Expr,
    variables: &[Unit; 2],
    system: &S,
) -> ContourResult<ResolvedExpr> {
    UnitResolver::new(system, variables).resolve(expr)
}

fn mismatch(operator: &str, expected: &str, actual: &str, span: Span) -> ContourError {
    ContourError::DimensionalMismatch {
        operator: operator.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
        span,
    }
}

/// Exponents that leave the representable range are a unit error of `operator`.
fn exponent_error(err: UnitError, operator: &str, span: Span) -> ContourError {
    match err {
        UnitError::ExponentOverflow(unit) => mismatch(operator, "rational exponent", &unit, span),
        other => other.into(),
    }
}

fn plain(unit: &Unit) -> ContourResult<()> {
    if unit.has_offset() {
        return Err(UnitError::OffsetCalculus(unit.symbol()).into());
    }
    Ok(())
}

/// Value of a subtree built only from literals and arithmetic.
fn constant_value(expr: &ResolvedExpr) -> Option<f64> {
    match &expr.kind {
        ResolvedKind::Literal(value) => Some(*value),
        ResolvedKind::Variable(_) | ResolvedKind::Call { .. } => None,
        ResolvedKind::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => constant_value(operand).map(|v| -v),
        ResolvedKind::Binary {
            op,
            left,
            right,
            scales,
        } => {
            let l = constant_value(left)? * scales[0];
            let r = constant_value(right)? * scales[1];
            let value = match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Sub => l - r,
                BinaryOperator::Mul => l * r,
                BinaryOperator::Div => l / r,
                BinaryOperator::Pow => l.powf(r),
            };
            value.is_finite().then_some(value)
        }
    }
}
