//! Feature masks and the overlay layers built from them
//!
//! A [`FeatureMask`] is the single boolean contract for feature presence.
//! Overlay layers are full grids carrying sentinel values:
//! - barrier layers: `floor` everywhere, `barrier` on features, for MAX
//!   combination (barriers trump)
//! - reduction layers: `elsewhere` everywhere, `low` on features, for MIN
//!   combination (shortcuts win)
//!
//! The pipeline passes infinities as `floor`/`elsewhere` unless a rule sets
//! them, so the overlay leaves cells off the feature untouched.

use ndarray::Array2;
use skiroute_core::raster::{Raster, RasterElement, ReferenceGrid};
use skiroute_core::{Error, Result};

use crate::kernel::map_cells;

/// Boolean feature-presence grid.
///
/// Built from any raster with one coercion rule: a cell is present iff it
/// is not no-data (NaN or the declared no-data value) and is non-zero.
/// Missing data never counts as a feature.
#[derive(Debug, Clone)]
pub struct FeatureMask {
    present: Array2<bool>,
    grid: ReferenceGrid,
}

impl FeatureMask {
    /// Coerce a 0/1 raster into a mask
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let nodata = raster.nodata();
        let present = raster
            .data()
            .mapv(|v| !v.is_nodata(nodata) && v != T::zero());
        Self {
            present,
            grid: raster.reference_grid(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.present.dim()
    }

    pub fn reference_grid(&self) -> &ReferenceGrid {
        &self.grid
    }

    pub fn present(&self) -> &Array2<bool> {
        &self.present
    }

    /// Whether the feature is present at (row, col); out-of-range is absent
    pub fn is_present(&self, row: usize, col: usize) -> bool {
        self.present.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of cells where the feature is present
    pub fn count(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }
}

/// Cost multiplier applied to reductions above an elevation threshold
#[derive(Debug, Clone, Copy)]
pub struct ElevationPenalty<'a> {
    pub elevation: &'a Raster<f32>,
    /// Cells at or above this elevation are penalised
    pub threshold: f32,
    pub factor: f32,
}

/// Barrier layer: `floor_value` everywhere, `barrier_value` on features
pub fn barrier_layer(mask: &FeatureMask, barrier_value: f32, floor_value: f32) -> Result<Raster<f32>> {
    let data = map_cells(&mask.present, |_, _, p| if p { barrier_value } else { floor_value })?;
    Raster::on_grid(&mask.grid, data)
}

/// Reduction layer: `elsewhere_value` everywhere, `low_value` where the
/// feature is present and the optional validity mask allows it.
///
/// With a penalty, the low value is multiplied by `penalty.factor` at
/// cells whose elevation is at or above `penalty.threshold`. Missing
/// elevation never triggers the penalty.
pub fn reduction_layer(
    mask: &FeatureMask,
    validity: Option<&FeatureMask>,
    low_value: f32,
    elsewhere_value: f32,
    penalty: Option<&ElevationPenalty<'_>>,
) -> Result<Raster<f32>> {
    if let Some(validity) = validity {
        ensure_same_shape(mask.shape(), validity.shape())?;
    }
    if let Some(penalty) = penalty {
        ensure_same_shape(mask.shape(), penalty.elevation.shape())?;
    }

    let data = map_cells(&mask.present, |row, col, p| {
        let valid = validity.map_or(true, |v| v.present[(row, col)]);
        if !(p && valid) {
            return elsewhere_value;
        }
        match penalty {
            Some(pen) if pen.elevation.data()[(row, col)] >= pen.threshold => low_value * pen.factor,
            _ => low_value,
        }
    })?;
    Raster::on_grid(&mask.grid, data)
}

fn ensure_same_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(Error::SizeMismatch {
            er: expected.0,
            ec: expected.1,
            ar: actual.0,
            ac: actual.1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiroute_core::GeoTransform;

    fn mask_from(values: Vec<f32>, rows: usize, cols: usize) -> FeatureMask {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        FeatureMask::from_raster(&r)
    }

    #[test]
    fn test_coercion_missing_is_absent() {
        let mut raw = Raster::from_vec(vec![1.0, 0.0, f32::NAN, -9999.0, 2.0, 1.0], 2, 3).unwrap();
        raw.set_nodata(Some(-9999.0));
        let mask = FeatureMask::from_raster(&raw);

        assert!(mask.is_present(0, 0));
        assert!(!mask.is_present(0, 1));
        assert!(!mask.is_present(0, 2), "NaN must not be a feature");
        assert!(!mask.is_present(1, 0), "declared nodata must not be a feature");
        assert!(mask.is_present(1, 1));
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn test_coercion_integer_mask() {
        let mut raw = Raster::from_vec(vec![1u8, 0, 255, 1], 2, 2).unwrap();
        raw.set_nodata(Some(255));
        let mask = FeatureMask::from_raster(&raw);
        assert_eq!(mask.count(), 2);
        assert!(!mask.is_present(1, 0));
    }

    #[test]
    fn test_barrier_layer() {
        let rivers = mask_from(vec![0.0, 1.0, 0.0, 0.0], 2, 2);
        let layer = barrier_layer(&rivers, 99.0, 1.0).unwrap();
        assert_eq!(layer.get(0, 1).unwrap(), 99.0);
        assert_eq!(layer.get(0, 0).unwrap(), 1.0);
        assert_eq!(layer.get(1, 1).unwrap(), 1.0);
        assert_eq!(layer.shape(), rivers.shape());
        assert_eq!(layer.transform(), &rivers.reference_grid().transform);
    }

    #[test]
    fn test_reduction_layer_with_validity() {
        let trails = mask_from(vec![1.0, 1.0, 0.0, 1.0], 2, 2);
        let forest = mask_from(vec![1.0, 0.0, 1.0, f32::NAN], 2, 2);
        let layer = reduction_layer(&trails, Some(&forest), 2.0, 99.0, None).unwrap();

        assert_eq!(layer.get(0, 0).unwrap(), 2.0);
        assert_eq!(layer.get(0, 1).unwrap(), 99.0, "outside validity");
        assert_eq!(layer.get(1, 0).unwrap(), 99.0, "no feature");
        assert_eq!(layer.get(1, 1).unwrap(), 99.0, "missing validity is absent");
    }

    #[test]
    fn test_reduction_layer_elevation_penalty() {
        let roads = mask_from(vec![1.0, 1.0, 1.0, 0.0], 2, 2);
        let dem = Raster::from_vec(vec![799.0, 800.0, f32::NAN, 1200.0], 2, 2).unwrap();
        let penalty = ElevationPenalty {
            elevation: &dem,
            threshold: 800.0,
            factor: 7.0,
        };
        let layer = reduction_layer(&roads, None, 2.0, 99.0, Some(&penalty)).unwrap();

        assert_eq!(layer.get(0, 0).unwrap(), 2.0);
        assert_eq!(layer.get(0, 1).unwrap(), 14.0);
        assert_eq!(layer.get(1, 0).unwrap(), 2.0);
        assert_eq!(layer.get(1, 1).unwrap(), 99.0);
    }

    #[test]
    fn test_reduction_layer_shape_mismatch() {
        let roads = mask_from(vec![1.0; 4], 2, 2);
        let forest = mask_from(vec![1.0; 6], 2, 3);
        let err = reduction_layer(&roads, Some(&forest), 2.0, 99.0, None).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }
}
