//! Request configuration and the end-to-end contour pipeline.
//!
//! A [`ContourRequest`] is plain serde data. [`ContourRequest::evaluate_with`]
//! runs parse, unit resolution, compilation, grid construction and
//! evaluation in that order, failing on the first error.

use crate::dataset::ContourDataset;
use crate::error::{ContourError, ContourResult};
use crate::evaluator::{compile, Evaluator, VariableGrid};
use crate::expression::{is_reserved, parse_expression_with_depth, DEFAULT_MAX_DEPTH};
use crate::grid::{GridBuilder, SampleRange, DEFAULT_MAX_CELLS};
use crate::resolve::resolve;
use crate::units::{Conversion, Unit, UnitRegistry, UnitSystem};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default cap on expression length in bytes.
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 4096;

/// One of the two free variables and the unit its values are expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub symbol: String,
    /// Unit expression, e.g. `"m"` or `"m/s^2"`. Empty means dimensionless.
    #[serde(default)]
    pub unit: String,
}

impl VariableDeclaration {
    pub fn new(symbol: &str, unit: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// Resource caps checked before any numeric work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_expression_len: usize,
    pub max_depth: usize,
    pub max_cells: usize,
}

impl Limits {
    /// Field-wise minimum with `ceiling`, so a request can tighten but
    /// never raise the caps.
    pub fn capped(self, ceiling: Limits) -> Self {
        Self {
            max_expression_len: self.max_expression_len.min(ceiling.max_expression_len),
            max_depth: self.max_depth.min(ceiling.max_depth),
            max_cells: self.max_cells.min(ceiling.max_cells),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

/// Everything needed to produce one [`ContourDataset`].
///
/// `x_range` samples the first declared variable and `y_range` the second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourRequest {
    pub expression: String,
    pub variables: [VariableDeclaration; 2],
    pub x_range: SampleRange,
    pub y_range: SampleRange,
    /// Unit the values should be reported in; must match the result's dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_unit: Option<String>,
    /// Put the second variable on the horizontal axis.
    #[serde(default)]
    pub swap_axes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
}

impl ContourRequest {
    pub fn new(
        expression: &str,
        variables: [VariableDeclaration; 2],
        x_range: SampleRange,
        y_range: SampleRange,
    ) -> Self {
        Self {
            expression: expression.to_string(),
            variables,
            x_range,
            y_range,
            result_unit: None,
            swap_axes: false,
            limits: None,
        }
    }

    pub fn with_result_unit(mut self, unit: &str) -> Self {
        self.result_unit = Some(unit.to_string());
        self
    }

    pub fn with_swapped_axes(mut self) -> Self {
        self.swap_axes = true;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Run the pipeline with the built-in [`UnitRegistry`].
    pub fn evaluate(&self) -> ContourResult<ContourDataset> {
        self.evaluate_with(&UnitRegistry::new())
    }

    /// Run the pipeline against any unit system.
    #[tracing::instrument(skip_all, fields(expression = %self.expression))]
    pub fn evaluate_with<S: UnitSystem + ?Sized>(
        &self,
        system: &S,
    ) -> ContourResult<ContourDataset> {
        let result = self.run(system);
        match &result {
            Ok(dataset) => {
                let (rows, cols) = dataset.shape();
                info!(rows, cols, unit = %dataset.unit_value, "contour dataset ready");
            }
            Err(err) => warn!(code = err.code(), "request rejected: {}", err),
        }
        result
    }

    fn run<S: UnitSystem + ?Sized>(&self, system: &S) -> ContourResult<ContourDataset> {
        let limits = self.limits.unwrap_or_default();
        if self.expression.len() > limits.max_expression_len {
            return Err(ContourError::LimitExceeded(format!(
                "expression is {} bytes, the limit is {}",
                self.expression.len(),
                limits.max_expression_len
            )));
        }
        self.validate_declarations()?;

        let symbols = [
            self.variables[0].symbol.as_str(),
            self.variables[1].symbol.as_str(),
        ];
        let expr = parse_expression_with_depth(&self.expression, symbols, limits.max_depth)?;
        debug!(depth = expr.depth(), "parsed expression");

        let declared = [
            system.parse(&self.variables[0].unit)?,
            system.parse(&self.variables[1].unit)?,
        ];
        let ranges = [&self.x_range, &self.y_range];
        let sampled = [
            sampling_unit(system, ranges[0], &declared[0])?,
            sampling_unit(system, ranges[1], &declared[1])?,
        ];

        let resolved = resolve(&expr, &declared, system)?;
        debug!(unit = %resolved.unit, "resolved units");

        let inputs = [
            input_conversion(system, symbols[0], &sampled[0], &declared[0])?,
            input_conversion(system, symbols[1], &sampled[1], &declared[1])?,
        ];

        let (unit_value, output) = match &self.result_unit {
            Some(text) => {
                let target = system.parse(text)?;
                if !system.compatible(&resolved.unit, &target) {
                    return Err(ContourError::DimensionalMismatch {
                        operator: "=".to_string(),
                        expected: target.to_string(),
                        actual: resolved.unit.to_string(),
                        span: resolved.span,
                    });
                }
                let output = system.conversion(&resolved.unit, &target)?;
                (target, output)
            }
            None => (resolved.unit.clone(), Conversion::IDENTITY),
        };

        let function = compile(&resolved)?;
        debug!(kernels = function.kernel_count(), "compiled expression");

        // Slot indices on the horizontal and vertical axes.
        let (h, v) = if self.swap_axes { (1, 0) } else { (0, 1) };
        let grid = GridBuilder::new(limits.max_cells)
            .build_labeled((symbols[h], ranges[h]), (symbols[v], ranges[v]))?;
        debug!(shape = ?grid.shape(), "built grid");

        let samples = if self.swap_axes {
            [&grid.y, &grid.x]
        } else {
            [&grid.x, &grid.y]
        };
        let values = Evaluator::new([
            VariableGrid {
                symbol: symbols[0],
                samples: samples[0],
                conversion: inputs[0],
            },
            VariableGrid {
                symbol: symbols[1],
                samples: samples[1],
                conversion: inputs[1],
            },
        ])?
        .with_output(output)
        .evaluate(&function)?;

        let [sampled_first, sampled_second] = sampled;
        let (unit_x, unit_y) = if self.swap_axes {
            (sampled_second, sampled_first)
        } else {
            (sampled_first, sampled_second)
        };
        Ok(ContourDataset {
            expression: self.expression.clone(),
            x_symbol: symbols[h].to_string(),
            y_symbol: symbols[v].to_string(),
            grid_x: grid.x,
            grid_y: grid.y,
            values,
            unit_x,
            unit_y,
            unit_value,
        })
    }

    fn validate_declarations(&self) -> ContourResult<()> {
        for decl in &self.variables {
            let symbol = decl.symbol.as_str();
            let mut chars = symbol.chars();
            let well_formed = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !well_formed {
                return Err(ContourError::InvalidDeclaration(format!(
                    "'{}' is not a valid variable name",
                    symbol
                )));
            }
            if is_reserved(symbol) {
                return Err(ContourError::InvalidDeclaration(format!(
                    "'{}' is a reserved name",
                    symbol
                )));
            }
        }
        if self.variables[0].symbol == self.variables[1].symbol {
            return Err(ContourError::InvalidDeclaration(format!(
                "both variables are named '{}'",
                self.variables[0].symbol
            )));
        }
        Ok(())
    }
}

/// A range without a unit is sampled in its variable's declared unit.
fn sampling_unit<S: UnitSystem + ?Sized>(
    system: &S,
    range: &SampleRange,
    declared: &Unit,
) -> ContourResult<Unit> {
    if range.unit.trim().is_empty() {
        Ok(declared.clone())
    } else {
        Ok(system.parse(&range.unit)?)
    }
}

/// Map from a range's sampling unit to its variable's declared unit.
fn input_conversion<S: UnitSystem + ?Sized>(
    system: &S,
    symbol: &str,
    sampled: &Unit,
    declared: &Unit,
) -> ContourResult<Conversion> {
    if !system.compatible(sampled, declared) {
        return Err(ContourError::InvalidRange {
            axis: symbol.to_string(),
            message: format!("sampled in {} but declared in {}", sampled, declared),
        });
    }
    Ok(system.conversion(sampled, declared)?)
}
