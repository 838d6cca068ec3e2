use std::fmt::Debug;

use approx::{AbsDiffEq, RelativeEq};

use crate::error::{Error, Result};

/// Affine transform between raster cell (col, row) space and source CRS
/// coordinates. Coefficient order follows the GDAL/GeoTIFF convention:
/// [top-left x, pixel width, row rotation, top-left y, column rotation, pixel height].
#[derive(Clone, Copy, PartialEq, Default)]
pub struct GeoTransform([f64; 6]);

impl GeoTransform {
    pub const fn new(coefficients: [f64; 6]) -> Self {
        GeoTransform(coefficients)
    }

    pub fn from_top_left_and_cell_size(top_left_x: f64, top_left_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self::new([top_left_x, cell_width, 0.0, top_left_y, 0.0, cell_height])
    }

    /// Maps a fractional (col, row) cell position to (x, y) in the source CRS.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.0[0] + self.0[1] * col + self.0[2] * row;
        let y = self.0[3] + self.0[4] * col + self.0[5] * row;
        (x, y)
    }

    pub fn top_left(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn cell_size_x(&self) -> f64 {
        self.0[1]
    }

    pub fn cell_size_y(&self) -> f64 {
        self.0[5]
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Inverts the transform so that (x, y) -> fractional (col, row) lookups are possible.
    pub fn invert(&self) -> Result<Self> {
        let gt_in = &self.0;
        let det = gt_in[1] * gt_in[5] - gt_in[2] * gt_in[4];
        let magnitude = f64::max(f64::max(gt_in[1].abs(), gt_in[2].abs()), f64::max(gt_in[4].abs(), gt_in[5].abs()));

        if det.abs() <= 1e-10 * magnitude * magnitude {
            return Err(Error::TransformFailed {
                reason: "geotransform determinant is too small to invert".to_string(),
            });
        }

        let inv_det = 1.0 / det;
        let mut gt_out = [0.0; 6];
        gt_out[1] = gt_in[5] * inv_det;
        gt_out[4] = -gt_in[4] * inv_det;
        gt_out[2] = -gt_in[2] * inv_det;
        gt_out[5] = gt_in[1] * inv_det;
        gt_out[0] = (gt_in[2] * gt_in[3] - gt_in[0] * gt_in[5]) * inv_det;
        gt_out[3] = (-gt_in[1] * gt_in[3] + gt_in[0] * gt_in[4]) * inv_det;

        Ok(GeoTransform(gt_out))
    }

    /// Converts a source-CRS (x, y) into a fractional (col, row) using the inverse transform.
    pub fn world_to_cell(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let inv = self.invert()?;
        Ok(inv.apply(x, y))
    }
}

impl Debug for GeoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GeoTransform(topleft: ({}, {}), pixel_width: {}, pixel_height: {})",
            self.0[0],
            self.0[3],
            self.cell_size_x(),
            self.cell_size_y()
        )
    }
}

impl AbsDiffEq for GeoTransform {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}

impl RelativeEq for GeoTransform {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        self.0.relative_eq(&other.0, epsilon, max_relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn invert_round_trips_a_north_up_transform() {
        let gt = GeoTransform::from_top_left_and_cell_size(100.0, 200.0, 10.0, -10.0);
        let (col, row) = gt.world_to_cell(150.0, 150.0).unwrap();
        let (x, y) = gt.apply(col, row);
        assert_relative_eq!(x, 150.0, epsilon = 1e-9);
        assert_relative_eq!(y, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn invert_rejects_degenerate_transform() {
        let gt = GeoTransform::new([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(gt.invert().is_err());
    }
}
