//! Error taxonomy for the contour pipeline.

use crate::expression::Span;
use crate::units::UnitError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Variable,
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable => write!(f, "variable"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Per-cell failure during grid evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainViolation {
    DivisionByZero,
    LogarithmOfNonPositive,
    SquareRootOfNegative,
    InverseTrigOutOfRange,
    GammaPole,
    InvalidPower,
    NonFinite,
}

impl fmt::Display for DomainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::LogarithmOfNonPositive => write!(f, "logarithm of a non-positive value"),
            Self::SquareRootOfNegative => write!(f, "square root of a negative value"),
            Self::InverseTrigOutOfRange => write!(f, "inverse trigonometric argument outside [-1, 1]"),
            Self::GammaPole => write!(f, "gamma function at a non-positive integer"),
            Self::InvalidPower => write!(f, "power is undefined for this base and exponent"),
            Self::NonFinite => write!(f, "result is not finite"),
        }
    }
}

/// Grid cell plus the sampled variable values there, in sampling units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCoordinate {
    pub row: usize,
    pub col: usize,
    pub bindings: Vec<(String, f64)>,
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}, column {}", self.row, self.col)?;
        if !self.bindings.is_empty() {
            let values: Vec<String> = self
                .bindings
                .iter()
                .map(|(name, value)| format!("{} = {}", name, value))
                .collect();
            write!(f, " ({})", values.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ContourError {
    #[error("Syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    #[error("Unknown {kind} '{name}' at {span}")]
    UnknownSymbol {
        name: String,
        kind: SymbolKind,
        span: Span,
    },

    #[error("Dimensional mismatch at {span}: '{operator}' expected {expected}, found {actual}")]
    DimensionalMismatch {
        operator: String,
        expected: String,
        actual: String,
        span: Span,
    },

    #[error("Invalid range for {axis}: {message}")]
    InvalidRange { axis: String, message: String },

    #[error("Unsupported operation '{operation}' at {span}")]
    UnsupportedOperation { operation: String, span: Span },

    #[error("Numeric evaluation failed at {at}: {reason}")]
    NumericEvaluation {
        reason: DomainViolation,
        at: GridCoordinate,
    },

    /// A subexpression without variables fails regardless of the grid.
    #[error("Numeric evaluation failed at {span}: {reason}")]
    ConstantEvaluation { reason: DomainViolation, span: Span },

    #[error("Invalid variable declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl ContourError {
    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax_error",
            Self::UnknownSymbol { .. } => "unknown_symbol",
            Self::DimensionalMismatch { .. } => "dimensional_mismatch",
            Self::InvalidRange { .. } => "invalid_range",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::NumericEvaluation { .. } | Self::ConstantEvaluation { .. } => {
                "numeric_evaluation"
            }
            Self::InvalidDeclaration(_) => "invalid_declaration",
            Self::LimitExceeded(_) => "limit_exceeded",
            Self::Unit(_) => "unit_error",
        }
    }

    /// Location in the expression text, if the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::UnknownSymbol { span, .. }
            | Self::DimensionalMismatch { span, .. }
            | Self::UnsupportedOperation { span, .. }
            | Self::ConstantEvaluation { span, .. } => Some(*span),
            _ => None,
        }
    }
}

pub type ContourResult<T> = Result<T, ContourError>;
