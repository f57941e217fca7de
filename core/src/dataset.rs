//! The pipeline's output artifact.

use crate::units::Unit;
use nalgebra::DMatrix;
use serde::{Serialize, Serializer};

/// Coordinate grids, value grid and their units, ready for a plotting layer.
///
/// All three grids have shape `(countY, countX)`. `grid_x` and `grid_y` are
/// in the units the ranges were sampled in, `values` in `unit_value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourDataset {
    pub expression: String,
    pub x_symbol: String,
    pub y_symbol: String,
    #[serde(serialize_with = "rows")]
    pub grid_x: DMatrix<f64>,
    #[serde(serialize_with = "rows")]
    pub grid_y: DMatrix<f64>,
    #[serde(serialize_with = "rows")]
    pub values: DMatrix<f64>,
    #[serde(serialize_with = "symbol")]
    pub unit_x: Unit,
    #[serde(serialize_with = "symbol")]
    pub unit_y: Unit,
    #[serde(serialize_with = "symbol")]
    pub unit_value: Unit,
}

impl ContourDataset {
    /// `(countY, countX)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied()
    }

    /// Horizontal axis samples.
    pub fn x_axis(&self) -> Vec<f64> {
        self.grid_x.row(0).iter().copied().collect()
    }

    /// Vertical axis samples.
    pub fn y_axis(&self) -> Vec<f64> {
        self.grid_y.column(0).iter().copied().collect()
    }

    /// Smallest and largest value, for choosing contour levels.
    pub fn value_range(&self) -> (f64, f64) {
        (self.values.min(), self.values.max())
    }
}

/// Row-major nested arrays, `grid[row][col]`.
fn rows<S: Serializer>(grid: &DMatrix<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        grid.row_iter()
            .map(|row| row.iter().copied().collect::<Vec<f64>>()),
    )
}

fn symbol<S: Serializer>(unit: &Unit, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&unit.to_string())
}
