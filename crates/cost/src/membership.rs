//! Membership transforms
//!
//! Map a physical quantity to a normalized [0, 1] value and from there to a
//! bounded cost range:
//! - Generalized bell: `1 / (1 + |(x - c) / (a + ε)|^(2b))`
//! - Logistic: `1 / (1 + exp(-k (x - x0)))`
//! - Cost map: `min + y (max - min)`
//!
//! The scalar functions are pure and total over finite input. NaN input
//! yields NaN output. Parameters are validated once, when the
//! configuration is loaded, never per cell.

use serde::{Deserialize, Serialize};
use skiroute_core::raster::{Raster, RasterElement};
use skiroute_core::{Error, Result};

use crate::kernel::map_cells;

/// Keeps the bell curve defined for a zero scale
pub const BELL_EPSILON: f64 = 1e-9;

/// Generalized bell (Cauchy) membership.
///
/// `scale` is the half-width, `shape` the exponent controlling how flat the
/// top is, `center` the peak. The deviation is taken in absolute value, so
/// non-integer `2 * shape` exponents stay defined on both sides of `center`.
pub fn generalized_bell(x: f64, scale: f64, shape: f64, center: f64) -> f64 {
    let t = ((x - center) / (scale + BELL_EPSILON)).abs();
    let y = 1.0 / (1.0 + t.powf(2.0 * shape));
    clamp_unit(y)
}

/// Logistic membership; `0.5` at `midpoint`, sharper for larger `|steepness|`
pub fn logistic(x: f64, midpoint: f64, steepness: f64) -> f64 {
    let y = 1.0 / (1.0 + (-steepness * (x - midpoint)).exp());
    clamp_unit(y)
}

/// Linear map from a unit value to `[min_cost, max_cost]`.
///
/// The result is clamped into the cost range whenever `y` is finite, so
/// rounding in the product never leaks outside the bounds.
pub fn cost_map(y: f64, min_cost: f64, max_cost: f64) -> f64 {
    let cost = min_cost + y * (max_cost - min_cost);
    if cost.is_nan() {
        return cost;
    }
    let (lo, hi) = if min_cost <= max_cost {
        (min_cost, max_cost)
    } else {
        (max_cost, min_cost)
    };
    cost.max(lo).min(hi)
}

fn clamp_unit(y: f64) -> f64 {
    if y.is_nan() {
        y
    } else {
        y.clamp(0.0, 1.0)
    }
}

fn ensure_finite(layer: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_parameter(
            format!("{}.{}", layer, field),
            value,
            "must be finite",
        ))
    }
}

/// Inclusive cost range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostBounds {
    pub min: f64,
    pub max: f64,
}

impl CostBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check the range is finite and ordered; `name` labels the error
    pub fn validate(&self, name: &str) -> Result<()> {
        ensure_finite(name, "min", self.min)?;
        ensure_finite(name, "max", self.max)?;
        if self.min > self.max {
            return Err(Error::invalid_parameter(
                format!("{}.min", name),
                self.min,
                format!("must not exceed max ({})", self.max),
            ));
        }
        Ok(())
    }
}

impl Default for CostBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 99.0 }
    }
}

/// Membership function configured for one layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipFunction {
    /// Bell curve: cheap near `center`, expensive far from it
    GeneralizedBell {
        #[serde(alias = "a")]
        scale: f64,
        #[serde(alias = "b")]
        shape: f64,
        #[serde(alias = "c")]
        center: f64,
    },
    /// S-curve rising through `midpoint`
    Logistic {
        #[serde(alias = "x0")]
        midpoint: f64,
        #[serde(alias = "k")]
        steepness: f64,
    },
    /// Input is already expressed in cost units and is passed through
    Precomputed,
}

impl MembershipFunction {
    /// Check parameter domains; `layer` labels the error
    pub fn validate(&self, layer: &str) -> Result<()> {
        match *self {
            MembershipFunction::GeneralizedBell {
                scale,
                shape,
                center,
            } => {
                ensure_finite(layer, "scale", scale)?;
                ensure_finite(layer, "shape", shape)?;
                ensure_finite(layer, "center", center)?;
                if scale < 0.0 {
                    return Err(Error::invalid_parameter(
                        format!("{}.scale", layer),
                        scale,
                        "must be >= 0",
                    ));
                }
                if shape <= 0.0 {
                    return Err(Error::invalid_parameter(
                        format!("{}.shape", layer),
                        shape,
                        "must be > 0",
                    ));
                }
                Ok(())
            }
            MembershipFunction::Logistic {
                midpoint,
                steepness,
            } => {
                ensure_finite(layer, "midpoint", midpoint)?;
                ensure_finite(layer, "steepness", steepness)?;
                if steepness == 0.0 {
                    return Err(Error::invalid_parameter(
                        format!("{}.steepness", layer),
                        steepness,
                        "must be non-zero",
                    ));
                }
                Ok(())
            }
            MembershipFunction::Precomputed => Ok(()),
        }
    }

    /// Unit membership of `x`, or `x` itself for precomputed layers
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            MembershipFunction::GeneralizedBell {
                scale,
                shape,
                center,
            } => generalized_bell(x, scale, shape, center),
            MembershipFunction::Logistic {
                midpoint,
                steepness,
            } => logistic(x, midpoint, steepness),
            MembershipFunction::Precomputed => x,
        }
    }
}

/// Complete per-layer transform: membership function plus input and
/// output adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerTransform {
    #[serde(flatten)]
    pub function: MembershipFunction,
    /// Apply the membership function to `|x|` (curvature: ridges and bowls alike)
    #[serde(default)]
    pub absolute_input: bool,
    /// Per-layer cost range, overriding the global one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_bounds: Option<CostBounds>,
}

impl LayerTransform {
    pub fn new(function: MembershipFunction) -> Self {
        Self {
            function,
            absolute_input: false,
            cost_bounds: None,
        }
    }

    pub fn with_absolute_input(mut self) -> Self {
        self.absolute_input = true;
        self
    }

    pub fn with_cost_bounds(mut self, bounds: CostBounds) -> Self {
        self.cost_bounds = Some(bounds);
        self
    }

    pub fn validate(&self, layer: &str) -> Result<()> {
        self.function.validate(layer)?;
        if let Some(bounds) = &self.cost_bounds {
            bounds.validate(&format!("{}.cost_bounds", layer))?;
        }
        Ok(())
    }

    /// Cost of a single raw value
    pub fn cost(&self, x: f64, global: CostBounds) -> f64 {
        let x = if self.absolute_input { x.abs() } else { x };
        match self.function {
            MembershipFunction::Precomputed => x,
            function => {
                let bounds = self.cost_bounds.unwrap_or(global);
                cost_map(function.evaluate(x), bounds.min, bounds.max)
            }
        }
    }
}

/// Transform a raw grid into a unit-cost grid.
///
/// Cells that are no-data in `raw` (NaN or the declared no-data value)
/// are NaN in the output.
pub fn apply_transform(
    raw: &Raster<f32>,
    transform: &LayerTransform,
    global: CostBounds,
) -> Result<Raster<f32>> {
    let nodata = raw.nodata();

    let data = map_cells(raw.data(), |_, _, v: f32| {
        if v.is_nodata(nodata) {
            return f32::NAN;
        }
        transform.cost(v as f64, global) as f32
    })?;

    let mut output = raw.with_data(data)?;
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}
