//! Expression layer: the tree types and the parser that builds them.
//!
//! Variables are referenced by bare name; the caller declares the two names
//! up front and every other identifier must be a catalogue function or a
//! built-in constant.

pub mod ast;
pub mod parser;

pub use ast::{is_reserved, BinaryOperator, Expr, ExprKind, Function, Slot, Span, UnaryOperator};
pub use parser::{parse_expression, parse_expression_with_depth, DEFAULT_MAX_DEPTH};
