//! Lowering of a resolved tree into whole-array kernels.

use super::runtime::{apply_binary, apply_unary, binary_violation, unary_violation};
use crate::error::{ContourError, ContourResult, DomainViolation};
use crate::expression::{BinaryOperator, Function, Slot, Span, UnaryOperator};
use crate::resolve::{ResolvedExpr, ResolvedKind};

/// Elementwise one-argument kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKernel {
    Neg,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
    Erf,
    Gamma,
}

/// Elementwise two-argument kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKernel {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Hypot,
    Min,
    Max,
}

/// Unit-free numeric tree. Each node is evaluated as one bulk array operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    Variable(Slot),
    Constant(f64),
    Unary {
        op: UnaryKernel,
        operand: Box<Kernel>,
    },
    Binary {
        op: BinaryKernel,
        left: Box<Kernel>,
        right: Box<Kernel>,
    },
}

impl Kernel {
    pub fn node_count(&self) -> usize {
        match self {
            Self::Variable(_) | Self::Constant(_) => 1,
            Self::Unary { operand, .. } => 1 + operand.node_count(),
            Self::Binary { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}

/// A compiled function of the two variable grids.
///
/// Inputs are the bare magnitudes of the variables in their declared units;
/// the output is the bare magnitude in the resolved output unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFunction {
    root: Kernel,
}

impl NumericFunction {
    pub fn root(&self) -> &Kernel {
        &self.root
    }

    pub fn kernel_count(&self) -> usize {
        self.root.node_count()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NumericCompiler;

impl NumericCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, expr: &ResolvedExpr) -> ContourResult<NumericFunction> {
        Ok(NumericFunction {
            root: self.lower(expr)?,
        })
    }

    fn lower(&self, expr: &ResolvedExpr) -> ContourResult<Kernel> {
        let kernel = self.lower_node(expr)?;
        fold(kernel, expr.span)
    }

    fn lower_node(&self, expr: &ResolvedExpr) -> ContourResult<Kernel> {
        match &expr.kind {
            ResolvedKind::Literal(value) => Ok(Kernel::Constant(*value)),
            ResolvedKind::Variable(slot) => Ok(Kernel::Variable(*slot)),
            ResolvedKind::Unary {
                op: UnaryOperator::Neg,
                operand,
            } => Ok(unary(UnaryKernel::Neg, self.lower(operand)?)),
            ResolvedKind::Binary {
                op,
                left,
                right,
                scales,
            } => {
                let kernel = match op {
                    BinaryOperator::Add => BinaryKernel::Add,
                    BinaryOperator::Sub => BinaryKernel::Sub,
                    BinaryOperator::Mul => BinaryKernel::Mul,
                    BinaryOperator::Div => BinaryKernel::Div,
                    BinaryOperator::Pow => BinaryKernel::Pow,
                };
                let left = scale(self.lower(left)?, scales[0]);
                let right = scale(self.lower(right)?, scales[1]);
                Ok(binary(kernel, left, right))
            }
            ResolvedKind::Call {
                function,
                args,
                scales,
            } => {
                let mut lowered = Vec::with_capacity(args.len());
                for (arg, factor) in args.iter().zip(scales.iter()) {
                    lowered.push(scale(self.lower(arg)?, *factor));
                }
                self.call(*function, lowered, expr)
            }
        }
    }

    fn call(
        &self,
        function: Function,
        mut args: Vec<Kernel>,
        expr: &ResolvedExpr,
    ) -> ContourResult<Kernel> {
        let unsupported = || ContourError::UnsupportedOperation {
            operation: function.name().to_string(),
            span: expr.span,
        };

        let op = match function {
            Function::Sin => UnaryKernel::Sin,
            Function::Cos => UnaryKernel::Cos,
            Function::Tan => UnaryKernel::Tan,
            Function::Asin => UnaryKernel::Asin,
            Function::Acos => UnaryKernel::Acos,
            Function::Atan => UnaryKernel::Atan,
            Function::Sinh => UnaryKernel::Sinh,
            Function::Cosh => UnaryKernel::Cosh,
            Function::Tanh => UnaryKernel::Tanh,
            Function::Exp => UnaryKernel::Exp,
            Function::Ln | Function::Log => UnaryKernel::Ln,
            Function::Log10 => UnaryKernel::Log10,
            Function::Log2 => UnaryKernel::Log2,
            Function::Sqrt => UnaryKernel::Sqrt,
            Function::Cbrt => UnaryKernel::Cbrt,
            Function::Abs => UnaryKernel::Abs,
            Function::Floor => UnaryKernel::Floor,
            Function::Ceil => UnaryKernel::Ceil,
            Function::Round => UnaryKernel::Round,
            Function::Sign => UnaryKernel::Sign,
            Function::Erf => UnaryKernel::Erf,
            Function::Gamma => UnaryKernel::Gamma,
            // No real-valued kernel; gamma(n + 1) is the continuous form.
            Function::Factorial => return Err(unsupported()),
            Function::Atan2 | Function::Hypot | Function::Min | Function::Max | Function::Pow => {
                let kernel = match function {
                    Function::Atan2 => BinaryKernel::Atan2,
                    Function::Hypot => BinaryKernel::Hypot,
                    Function::Min => BinaryKernel::Min,
                    Function::Max => BinaryKernel::Max,
                    _ => BinaryKernel::Pow,
                };
                let right = args.pop().ok_or_else(unsupported)?;
                let left = args.pop().ok_or_else(unsupported)?;
                return Ok(binary(kernel, left, right));
            }
        };
        let operand = args.pop().ok_or_else(unsupported)?;
        Ok(unary(op, operand))
    }
}

/// Compile a resolved tree with the default compiler.
pub fn compile(expr: &ResolvedExpr) -> ContourResult<NumericFunction> {
    NumericCompiler::new().compile(expr)
}

fn unary(op: UnaryKernel, operand: Kernel) -> Kernel {
    Kernel::Unary {
        op,
        operand: Box::new(operand),
    }
}

fn binary(op: BinaryKernel, left: Kernel, right: Kernel) -> Kernel {
    Kernel::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Collapse a node whose operands are all constants. A non-finite value
/// fails at `span`, the subexpression that produced it.
fn fold(kernel: Kernel, span: Span) -> ContourResult<Kernel> {
    let folded = match &kernel {
        Kernel::Variable(_) => None,
        Kernel::Constant(v) => Some((*v, DomainViolation::NonFinite)),
        Kernel::Unary { op, operand } => match **operand {
            Kernel::Constant(v) => Some((apply_unary(*op, v), unary_violation(*op, v))),
            _ => None,
        },
        Kernel::Binary { op, left, right } => match (&**left, &**right) {
            (Kernel::Constant(a), Kernel::Constant(b)) => {
                Some((apply_binary(*op, *a, *b), binary_violation(*op, *a, *b)))
            }
            _ => None,
        },
    };
    match folded {
        None => Ok(kernel),
        Some((value, _)) if value.is_finite() => Ok(Kernel::Constant(value)),
        Some((_, reason)) => Err(ContourError::ConstantEvaluation { reason, span }),
    }
}

/// `kernel * factor`, folded into constants and skipped for 1.
fn scale(kernel: Kernel, factor: f64) -> Kernel {
    if factor == 1.0 {
        return kernel;
    }
    match kernel {
        Kernel::Constant(value) => Kernel::Constant(value * factor),
        other => binary(BinaryKernel::Mul, other, Kernel::Constant(factor)),
    }
}
