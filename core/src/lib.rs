pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod grid;
pub mod pipeline;
pub mod resolve;
pub mod units;

pub use dataset::ContourDataset;
pub use error::{ContourError, ContourResult, DomainViolation, GridCoordinate, SymbolKind};
pub use grid::{Sampling, SampleRange, Spacing};
pub use pipeline::{ContourRequest, Limits, VariableDeclaration};
pub use units::{Unit, UnitError, UnitRegistry, UnitSystem};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
