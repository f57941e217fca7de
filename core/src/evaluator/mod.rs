//! Numeric compilation and grid evaluation.
//!
//! [`NumericCompiler`] drops the unit annotations of a resolved tree and
//! keeps only the scale factors they imply. [`Evaluator`] runs the result
//! over whole coordinate grids.

pub mod compiler;
pub mod runtime;


pub use compiler::{compile, BinaryKernel, Kernel, NumericCompiler, NumericFunction, UnaryKernel};
pub use runtime::{evaluate, Evaluator, VariableGrid};
