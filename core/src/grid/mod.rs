//! Sample ranges and coordinate grids.

#[cfg(test)]
mod tests;

use crate::error::{ContourError, ContourResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Default cap on `countX * countY`.
pub const DEFAULT_MAX_CELLS: usize = 4_000_000;

/// Relative slack when deciding whether `stop` is reached by stepping.
const STEP_TOLERANCE: f64 = 1e-9;

/// How many samples a range produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Exactly `n` samples, both endpoints included.
    Count(usize),
    /// `start, start + step, ...` up to and including `stop`.
    Step(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spacing {
    #[default]
    Linear,
    /// Geometric spacing; count sampling only, `start > 0`.
    Log,
}

/// Sampling of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub start: f64,
    pub stop: f64,
    pub sampling: Sampling,
    #[serde(default)]
    pub spacing: Spacing,
    /// Unit the bounds are written in. Empty means the variable's declared unit.
    #[serde(default)]
    pub unit: String,
}

impl SampleRange {
    /// Linear range with `count` samples.
    pub fn count(start: f64, stop: f64, count: usize, unit: &str) -> Self {
        Self {
            start,
            stop,
            sampling: Sampling::Count(count),
            spacing: Spacing::Linear,
            unit: unit.to_string(),
        }
    }

    /// Linear range stepping by `step`.
    pub fn step(start: f64, stop: f64, step: f64, unit: &str) -> Self {
        Self {
            start,
            stop,
            sampling: Sampling::Step(step),
            spacing: Spacing::Linear,
            unit: unit.to_string(),
        }
    }

    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }
}

/// Coordinate grids of shape `(countY, countX)`.
///
/// `x[(i, j)]` varies along `j` only and `y[(i, j)]` along `i` only.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub x: DMatrix<f64>,
    pub y: DMatrix<f64>,
}

impl Grid {
    /// `(rows, cols)` = `(countY, countX)`.
    pub fn shape(&self) -> (usize, usize) {
        self.x.shape()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridBuilder {
    max_cells: usize,
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CELLS)
    }
}

impl GridBuilder {
    pub fn new(max_cells: usize) -> Self {
        Self { max_cells }
    }

    /// Build the grids for ranges labelled `x` and `y`.
    pub fn build(&self, x: &SampleRange, y: &SampleRange) -> ContourResult<Grid> {
        self.build_labeled(("x", x), ("y", y))
    }

    /// Like [`GridBuilder::build`], naming each axis in errors.
    pub fn build_labeled(
        &self,
        (x_label, x): (&str, &SampleRange),
        (y_label, y): (&str, &SampleRange),
    ) -> ContourResult<Grid> {
        let nx = self.sample_count(x_label, x)?;
        let ny = self.sample_count(y_label, y)?;
        let cells = nx.checked_mul(ny).unwrap_or(usize::MAX);
        if cells > self.max_cells {
            return Err(ContourError::LimitExceeded(format!(
                "grid of {} x {} cells exceeds the limit of {}",
                ny, nx, self.max_cells
            )));
        }

        let xs = axis_values(x, nx);
        let ys = axis_values(y, ny);
        Ok(Grid {
            x: DMatrix::from_fn(ny, nx, |_, j| xs[j]),
            y: DMatrix::from_fn(ny, nx, |i, _| ys[i]),
        })
    }

    /// The samples of one axis.
    pub fn axis(&self, label: &str, range: &SampleRange) -> ContourResult<DVector<f64>> {
        let n = self.sample_count(label, range)?;
        Ok(axis_values(range, n))
    }

    /// Validate `range` and compute how many samples it yields.
    fn sample_count(&self, label: &str, range: &SampleRange) -> ContourResult<usize> {
        let invalid = |message: String| ContourError::InvalidRange {
            axis: label.to_string(),
            message,
        };

        if !range.start.is_finite() || !range.stop.is_finite() {
            return Err(invalid("bounds must be finite".to_string()));
        }
        if range.start > range.stop {
            return Err(invalid(format!(
                "start {} is greater than stop {}",
                range.start, range.stop
            )));
        }
        if range.spacing == Spacing::Log && range.start <= 0.0 {
            return Err(invalid(
                "logarithmic spacing needs a positive start".to_string(),
            ));
        }

        let count = match range.sampling {
            Sampling::Count(count) => count,
            Sampling::Step(_) if range.spacing == Spacing::Log => {
                return Err(invalid(
                    "logarithmic spacing needs count sampling".to_string(),
                ));
            }
            Sampling::Step(step) => {
                if !step.is_finite() || step <= 0.0 {
                    return Err(invalid(format!("step must be positive, got {}", step)));
                }
                let intervals = (range.stop - range.start) / step;
                if intervals >= self.max_cells as f64 {
                    return Err(ContourError::LimitExceeded(format!(
                        "step {} over [{}, {}] exceeds the limit of {} cells",
                        step, range.start, range.stop, self.max_cells
                    )));
                }
                (intervals * (1.0 + STEP_TOLERANCE) + STEP_TOLERANCE).floor() as usize + 1
            }
        };

        if count < 2 {
            return Err(invalid(format!("needs at least 2 samples, got {}", count)));
        }
        if count > self.max_cells {
            return Err(ContourError::LimitExceeded(format!(
                "{} samples on {} exceed the limit of {} cells",
                count, label, self.max_cells
            )));
        }
        Ok(count)
    }
}

/// `n` samples of an already validated range.
fn axis_values(range: &SampleRange, n: usize) -> DVector<f64> {
    let (start, stop) = (range.start, range.stop);
    let last = n - 1;
    let mut values = match (range.sampling, range.spacing) {
        (Sampling::Step(step), _) => {
            DVector::from_fn(n, |i, _| (start + i as f64 * step).min(stop))
        }
        (Sampling::Count(_), Spacing::Linear) => {
            let width = stop - start;
            DVector::from_fn(n, |i, _| start + width * (i as f64 / last as f64))
        }
        (Sampling::Count(_), Spacing::Log) => {
            let (lo, hi) = (start.log10(), stop.log10());
            DVector::from_fn(n, |i, _| 10f64.powf(lo + (hi - lo) * (i as f64 / last as f64)))
        }
    };
    values[0] = start;
    if matches!(range.sampling, Sampling::Count(_)) {
        values[last] = stop;
    }
    values
}
