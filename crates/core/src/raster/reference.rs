//! Reference grid shared by every raster of one pipeline run

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::geotransform::GEOTRANSFORM_TOLERANCE;
use crate::raster::GeoTransform;

/// Shape and georeference of a grid, without its cell values.
///
/// Two grids are co-registered when their reference grids match: same
/// dimensions, same affine transform (within [`GEOTRANSFORM_TOLERANCE`])
/// and the same CRS, or no CRS on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGrid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl ReferenceGrid {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Check that `other` (named `layer` in errors) is co-registered with this grid
    pub fn check(&self, other: &ReferenceGrid, layer: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                layer: layer.to_string(),
                expected: self.shape(),
                actual: other.shape(),
            });
        }

        if !self.transform.approx_eq(&other.transform, GEOTRANSFORM_TOLERANCE) {
            return Err(Error::GeoreferenceMismatch {
                layer: layer.to_string(),
                expected: self.transform.to_gdal(),
                actual: other.transform.to_gdal(),
            });
        }

        match (&self.crs, &other.crs) {
            (None, None) => Ok(()),
            (Some(a), Some(b)) if a.is_equivalent(b) => Ok(()),
            (a, b) => Err(Error::CrsMismatch {
                layer: layer.to_string(),
                expected: describe(a.as_ref()),
                actual: describe(b.as_ref()),
            }),
        }
    }
}

fn describe(crs: Option<&CRS>) -> String {
    crs.map(CRS::identifier).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn grid() -> ReferenceGrid {
        ReferenceGrid::new(
            4,
            5,
            GeoTransform::new(132_000.0, 6_964_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(25833)),
        )
    }

    #[test]
    fn test_identical_grids_pass() {
        assert!(grid().check(&grid(), "slope").is_ok());
    }

    #[test]
    fn test_shape_mismatch() {
        let mut other = grid();
        other.cols = 6;
        let err = grid().check(&other, "slope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("'slope'"), "{err}");
        match err {
            Error::ShapeMismatch {
                layer,
                expected,
                actual,
            } => {
                assert_eq!(layer, "slope");
                assert_eq!(expected, (4, 5));
                assert_eq!(actual, (4, 6));
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_shifted_origin_is_mismatch() {
        let mut other = grid();
        other.transform.origin_x += 5.0;
        let err = grid().check(&other, "rivers").unwrap_err();
        match err {
            Error::GeoreferenceMismatch { layer, .. } => assert_eq!(layer, "rivers"),
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_crs_presence_must_agree() {
        let mut other = grid();
        other.crs = None;
        match grid().check(&other, "dem") {
            Err(Error::CrsMismatch { layer, actual, .. }) => {
                assert_eq!(layer, "dem");
                assert_eq!(actual, "none");
            }
            r => panic!("expected CrsMismatch, got {r:?}"),
        }

        other.crs = Some(CRS::from_epsg(4326));
        assert!(matches!(grid().check(&other, "dem"), Err(Error::CrsMismatch { .. })));
    }
}
