//! Avalanche hazard layer
//!
//! Prepares the [`RawLayer::AvalancheHazard`](crate::RawLayer::AvalancheHazard)
//! input from potential release areas (PRA) and runout travel angles:
//!
//! - release cells (PRA mask present): the raw PRA likelihood rescaled
//!   linearly into the release cost range
//! - runout cells (not release, travel angle > 0): the travel angle
//!   normalized between robust percentiles, inverted and shaped by a bell
//!   curve into the runout cost range
//! - everywhere else (no avalanche terrain): the `background` cost, which
//!   defaults to the bottom of the runout range
//!
//! Only a missing travel angle outside release areas stays NaN. The
//! output is already in cost units and is meant to be used with a
//! `precomputed` transform.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use skiroute_core::raster::{Raster, RasterElement};
use skiroute_core::Result;

use crate::kernel::map_cells;
use crate::mask::FeatureMask;
use crate::membership::{cost_map, generalized_bell, CostBounds};

/// Parameters for [`avalanche_hazard`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HazardParams {
    /// Cost range for release cells
    pub release_bounds: CostBounds,
    /// Cost range for runout cells
    pub runout_bounds: CostBounds,
    /// Bell half-width applied to the inverted, normalized travel angle
    pub runout_scale: f64,
    /// Bell exponent; larger values push more cells towards the upper bound
    pub runout_shape: f64,
    /// Bell center on the inverted, normalized scale
    pub runout_center: f64,
    /// Lower percentile (0-100) used as the robust runout minimum
    pub low_percentile: f64,
    /// Upper percentile (0-100) used as the robust runout maximum
    pub high_percentile: f64,
    /// Cost outside avalanche terrain; `runout_bounds.min` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<f64>,
}

impl Default for HazardParams {
    fn default() -> Self {
        Self {
            release_bounds: CostBounds::new(7.2, 99.0),
            runout_bounds: CostBounds::new(1.0, 7.2),
            runout_scale: 0.30,
            runout_shape: 1.6,
            runout_center: 0.06,
            low_percentile: 2.0,
            high_percentile: 98.0,
            background: None,
        }
    }
}

impl HazardParams {
    pub fn validate(&self) -> Result<()> {
        use crate::membership::MembershipFunction;

        self.release_bounds.validate("hazard.release_bounds")?;
        self.runout_bounds.validate("hazard.runout_bounds")?;
        MembershipFunction::GeneralizedBell {
            scale: self.runout_scale,
            shape: self.runout_shape,
            center: self.runout_center,
        }
        .validate("hazard.runout")?;

        let pct_ok = |p: f64| (0.0..=100.0).contains(&p);
        if !pct_ok(self.low_percentile) || !pct_ok(self.high_percentile) {
            return Err(skiroute_core::Error::invalid_parameter(
                "hazard.percentiles",
                format!("{}..{}", self.low_percentile, self.high_percentile),
                "must lie in 0..=100",
            ));
        }
        if self.low_percentile > self.high_percentile {
            return Err(skiroute_core::Error::invalid_parameter(
                "hazard.low_percentile",
                self.low_percentile,
                "must not exceed high_percentile",
            ));
        }
        if let Some(background) = self.background {
            if !background.is_finite() {
                return Err(skiroute_core::Error::invalid_parameter(
                    "hazard.background",
                    background,
                    "must be finite",
                ));
            }
        }
        Ok(())
    }

    pub fn background_value(&self) -> f64 {
        self.background.unwrap_or(self.runout_bounds.min)
    }
}

/// Percentile with linear interpolation between order statistics.
///
/// `sorted` must be ascending and free of NaN. Returns NaN when empty.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn valid_values(raster: &Raster<f32>, mask: &Array2<bool>) -> Vec<f64> {
    let nodata = raster.nodata();
    let mut values: Vec<f64> = raster
        .data()
        .iter()
        .zip(mask.iter())
        .filter(|&(v, &m)| m && !v.is_nodata(nodata))
        .map(|(&v, _)| v as f64)
        .collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Build the combined avalanche hazard cost layer.
///
/// All three inputs must be co-registered. The output takes its
/// georeference from `pra_raw`.
pub fn avalanche_hazard(
    travel_angle: &Raster<f32>,
    pra_raw: &Raster<f32>,
    pra_release: &FeatureMask,
    params: &HazardParams,
) -> Result<Raster<f32>> {
    params.validate()?;
    let grid = pra_raw.reference_grid();
    grid.check(&travel_angle.reference_grid(), "travel_angle")?;
    grid.check(pra_release.reference_grid(), "pra_binary")?;

    let release = pra_release.present();
    let ta_nodata = travel_angle.nodata();
    let runout = map_cells(travel_angle.data(), |row, col, v: f32| {
        !release[(row, col)] && !v.is_nodata(ta_nodata) && v > 0.0
    })?;

    // Release: linear rescale of PRA likelihood over the release cells
    let pra_values = valid_values(pra_raw, release);
    let release_range = match (pra_values.first(), pra_values.last()) {
        (Some(&lo), Some(&hi)) => Some((lo, hi)),
        _ => None,
    };

    // Runout: robust min/max of travel angle over the runout cells
    let ta_values = valid_values(travel_angle, &runout);
    let runout_lo = percentile(&ta_values, params.low_percentile);
    let runout_hi = percentile(&ta_values, params.high_percentile);

    let rb = params.release_bounds;
    let ob = params.runout_bounds;
    let pra_nodata = pra_raw.nodata();
    let background = params.background_value() as f32;

    let data = map_cells(pra_raw.data(), |row, col, pra: f32| {
        if release[(row, col)] {
            if pra.is_nodata(pra_nodata) {
                return f32::NAN;
            }
            let value = match release_range {
                Some((lo, hi)) if hi > lo => {
                    let scaled = (pra as f64 - lo) / (hi - lo);
                    rb.min + scaled * (rb.max - rb.min)
                }
                _ => 0.5 * (rb.min + rb.max),
            };
            return value as f32;
        }

        if runout[(row, col)] {
            if !(runout_hi > runout_lo) {
                return (0.5 * (ob.min + ob.max)) as f32;
            }
            let ta = travel_angle.data()[(row, col)] as f64;
            let z = ((ta - runout_lo) / (runout_hi - runout_lo)).clamp(0.0, 1.0);
            let g = generalized_bell(
                1.0 - z,
                params.runout_scale,
                params.runout_shape,
                params.runout_center,
            );
            return cost_map(g, ob.min, ob.max) as f32;
        }

        if travel_angle.data()[(row, col)].is_nodata(ta_nodata) {
            f32::NAN
        } else {
            background
        }
    })?;

    let mut output = Raster::on_grid(&grid, data)?;
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_linear() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 0.0), 1.0);
        assert_relative_eq!(percentile(&v, 50.0), 3.0);
        assert_relative_eq!(percentile(&v, 100.0), 5.0);
        assert_relative_eq!(percentile(&v, 12.5), 1.5);
        assert!(percentile(&[], 50.0).is_nan());
    }

    fn inputs() -> (Raster<f32>, Raster<f32>, FeatureMask) {
        // Row 0: release cells, row 1: runout cells, row 2: neither
        let travel_angle = Raster::from_vec(
            vec![
                30.0, 31.0, 32.0, //
                20.0, 25.0, 30.0, //
                0.0, 0.0, f32::NAN,
            ],
            3,
            3,
        )
        .unwrap();
        let pra_raw = Raster::from_vec(
            vec![
                0.2, 0.6, 1.0, //
                0.1, 0.1, 0.1, //
                0.0, 0.0, 0.0,
            ],
            3,
            3,
        )
        .unwrap();
        let pra_binary = Raster::from_vec(
            vec![
                1.0, 1.0, 1.0, //
                0.0, 0.0, 0.0, //
                0.0, f32::NAN, 0.0,
            ],
            3,
            3,
        )
        .unwrap();
        (travel_angle, pra_raw, FeatureMask::from_raster(&pra_binary))
    }

    #[test]
    fn test_release_cells_rescaled() {
        let (ta, pra, release) = inputs();
        let out = avalanche_hazard(&ta, &pra, &release, &HazardParams::default()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 7.2, epsilon = 1e-4);
        assert_relative_eq!(out.get(0, 1).unwrap(), 7.2 + 0.5 * (99.0 - 7.2), epsilon = 1e-3);
        assert_relative_eq!(out.get(0, 2).unwrap(), 99.0, epsilon = 1e-4);
    }

    #[test]
    fn test_runout_cells_in_runout_range() {
        let (ta, pra, release) = inputs();
        let out = avalanche_hazard(&ta, &pra, &release, &HazardParams::default()).unwrap();
        for col in 0..3 {
            let v = out.get(1, col).unwrap();
            assert!((1.0..=7.2).contains(&v), "runout cell {col}: {v}");
        }
        // Lower travel angle means the cell is further down the runout: cheaper
        assert!(out.get(1, 0).unwrap() <= out.get(1, 2).unwrap());
    }

    #[test]
    fn test_outside_avalanche_terrain_is_background() {
        let (ta, pra, release) = inputs();
        let out = avalanche_hazard(&ta, &pra, &release, &HazardParams::default()).unwrap();
        assert_eq!(out.get(2, 0).unwrap(), 1.0);
        assert_eq!(out.get(2, 1).unwrap(), 1.0);
        assert!(out.get(2, 2).unwrap().is_nan(), "missing travel angle stays missing");

        let params = HazardParams {
            background: Some(0.5),
            ..HazardParams::default()
        };
        let out = avalanche_hazard(&ta, &pra, &release, &params).unwrap();
        assert_eq!(out.get(2, 0).unwrap(), 0.5);
    }

    #[test]
    fn test_degenerate_ranges_use_midpoint() {
        let ta = Raster::from_vec(vec![10.0, 10.0], 1, 2).unwrap();
        let pra = Raster::from_vec(vec![0.5, 0.0], 1, 2).unwrap();
        let release = FeatureMask::from_raster(&Raster::from_vec(vec![1.0f32, 0.0], 1, 2).unwrap());
        let out = avalanche_hazard(&ta, &pra, &release, &HazardParams::default()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.5 * (7.2 + 99.0), epsilon = 1e-4);
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.5 * (1.0 + 7.2), epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_percentiles() {
        let params = HazardParams {
            low_percentile: 90.0,
            high_percentile: 10.0,
            ..HazardParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_background_from_json() {
        let params: HazardParams = serde_json::from_str(r#"{ "background": 2.0 }"#).unwrap();
        assert_eq!(params.background_value(), 2.0);
        assert_eq!(HazardParams::default().background_value(), 1.0);
    }
}
