//! Co-registration report for a set of grids

use std::fmt;

use skiroute_core::raster::{ReferenceGrid, GEOTRANSFORM_TOLERANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Shape,
    Transform,
    Crs,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::Shape => "shape",
            Check::Transform => "transform",
            Check::Crs => "crs",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check: Check,
    pub passed: bool,
    pub detail: String,
}

/// Compare `candidate` against `reference` on every co-registration check.
///
/// Unlike [`ReferenceGrid::check`], this does not stop at the first failure.
pub fn compare(reference: &ReferenceGrid, candidate: &ReferenceGrid) -> Vec<CheckResult> {
    let shape_ok = reference.shape() == candidate.shape();
    let transform_ok = reference
        .transform
        .approx_eq(&candidate.transform, GEOTRANSFORM_TOLERANCE);
    let crs_ok = match (&reference.crs, &candidate.crs) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_equivalent(b),
        _ => false,
    };

    let describe_crs = |g: &ReferenceGrid| {
        g.crs
            .as_ref()
            .map_or_else(|| "none".to_string(), |c| c.identifier())
    };

    vec![
        CheckResult {
            check: Check::Shape,
            passed: shape_ok,
            detail: format!(
                "{}x{} vs {}x{}",
                reference.rows, reference.cols, candidate.rows, candidate.cols
            ),
        },
        CheckResult {
            check: Check::Transform,
            passed: transform_ok,
            detail: format!(
                "{:?} vs {:?}",
                reference.transform.to_gdal(),
                candidate.transform.to_gdal()
            ),
        },
        CheckResult {
            check: Check::Crs,
            passed: crs_ok,
            detail: format!("{} vs {}", describe_crs(reference), describe_crs(candidate)),
        },
    ]
}
