//! Grid subdivision of fingerprints into per-cell averages.
//!
//! "Quadrant" historically meant a 2×2 grid; the subdivision is
//! generalized here to arbitrary N×M grids. The fingerprint is viewed as
//! a rectangle of [`FINGERPRINT_HEIGHT`] rows by `FINGERPRINT_WIDTH * 3`
//! interleaved channel bytes, and each grid cell's value is the mean of
//! its byte block.

use crate::descriptor::{
    ImageDescriptor, FINGERPRINT_CHANNELS, FINGERPRINT_HEIGHT, FINGERPRINT_WIDTH,
};
use std::sync::Arc;
use thiserror::Error;

/// Rows of the fingerprint rectangle.
pub const GRID_ROWS: usize = FINGERPRINT_HEIGHT as usize;
/// Columns of the fingerprint rectangle (interleaved channel bytes).
pub const GRID_COLS: usize = (FINGERPRINT_WIDTH as usize) * FINGERPRINT_CHANNELS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("fingerprint height ({rows}) does not evenly divide into {cells} vertical cell(s)")]
    Vertical { rows: usize, cells: usize },

    #[error("fingerprint row width ({cols}) does not evenly divide into {cells} horizontal cell(s)")]
    Horizontal { cols: usize, cells: usize },
}

/// Per-cell mean values of one image at one grid resolution.
///
/// Holds a shared reference to the descriptor it was computed from.
/// Created once per image per grid resolution, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantAverages {
    imdesc: Arc<ImageDescriptor>,
    averages: Vec<f64>,
}

impl QuadrantAverages {
    pub fn descriptor(&self) -> &Arc<ImageDescriptor> {
        &self.imdesc
    }

    /// Cell means in raster order (top-to-bottom, left-to-right).
    pub fn averages(&self) -> &[f64] {
        &self.averages
    }

    #[cfg(test)]
    pub(crate) fn from_parts(imdesc: Arc<ImageDescriptor>, averages: Vec<f64>) -> Self {
        Self { imdesc, averages }
    }
}

/// Check that an `(n_x, n_y)` grid evenly divides the fingerprint.
pub fn validate_grid(n_x: usize, n_y: usize) -> Result<(), GridError> {
    if n_x == 0 || GRID_ROWS % n_x != 0 {
        return Err(GridError::Vertical {
            rows: GRID_ROWS,
            cells: n_x,
        });
    }
    if n_y == 0 || GRID_COLS % n_y != 0 {
        return Err(GridError::Horizontal {
            cols: GRID_COLS,
            cells: n_y,
        });
    }
    Ok(())
}

/// Compute cell averages for an arbitrary grid resolution.
///
/// `n_x` is the number of subdivisions along the vertical axis, `n_y`
/// along the horizontal axis; both must evenly divide the fingerprint
/// rectangle. Cells are enumerated row-major so that cell index `i` means
/// the same region across all images of the same resolution.
pub fn quadrant_averages(
    imdesc: &Arc<ImageDescriptor>,
    n_x: usize,
    n_y: usize,
) -> Result<QuadrantAverages, GridError> {
    validate_grid(n_x, n_y)?;

    let quad_rows = GRID_ROWS / n_x;
    let quad_cols = GRID_COLS / n_y;
    let fingerprint = imdesc.fingerprint();

    let mut averages = Vec::with_capacity(n_x * n_y);
    for i in (0..GRID_ROWS).step_by(quad_rows) {
        for j in (0..GRID_COLS).step_by(quad_cols) {
            let mut sum = 0u32;
            for row in i..i + quad_rows {
                for col in j..j + quad_cols {
                    sum += u32::from(fingerprint[row * GRID_COLS + col]);
                }
            }
            averages.push(f64::from(sum) / (quad_rows * quad_cols) as f64);
        }
    }

    Ok(QuadrantAverages {
        imdesc: Arc::clone(imdesc),
        averages,
    })
}
