//! Cost-surface configuration
//!
//! [`CostSurfaceConfig`] is built once (from JSON or [`Default`]), validated
//! once, and then only read. The default reproduces the tuned setup for
//! ski touring:
//!
//! | layer        | transform                 | weight |
//! |--------------|---------------------------|--------|
//! | slope        | bell(11, 4, 43)           | 0.5    |
//! | curvature    | bell(3, 10, 3) on `\|x\|` | 0.1    |
//! | travel angle | bell(4.5, 1, 43)          | 0.4    |
//!
//! plus a river barrier, bridge and road reductions, and trail reductions
//! limited to forest with an elevation penalty above 800 m.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use skiroute_core::{Error, Result};

use crate::combine::Weights;
use crate::layer::{MaskLayer, RawLayer};
use crate::membership::{CostBounds, LayerTransform, MembershipFunction};
use crate::quantize::DEFAULT_NODATA;

/// Hard obstacle overlaid with MAX
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BarrierRule {
    pub mask: MaskLayer,
    /// Cost on feature cells
    #[serde(default = "default_high")]
    pub value: f64,
    /// Cost elsewhere. Unset means negative infinity, which MAX ignores;
    /// an explicit floor must not exceed the lowest terrain cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<f64>,
}

impl BarrierRule {
    pub fn new(mask: MaskLayer) -> Self {
        Self {
            mask,
            value: default_high(),
            floor: None,
        }
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Value of the barrier layer off the feature
    pub fn floor_value(&self) -> f32 {
        self.floor.map_or(f32::NEG_INFINITY, |v| v as f32)
    }
}

/// Multiplies the reduced cost at or above an elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PenaltyRule {
    /// Metres
    pub threshold: f64,
    pub factor: f64,
}

/// Cost-reducing corridor overlaid with MIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReductionRule {
    pub mask: MaskLayer,
    /// The reduction only applies where this mask is also present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<MaskLayer>,
    #[serde(default = "default_reduced")]
    pub low_value: f64,
    /// Value elsewhere. Unset means positive infinity, which MIN ignores;
    /// an explicit value must not undercut the highest terrain cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elsewhere_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_penalty: Option<PenaltyRule>,
}

impl ReductionRule {
    pub fn new(mask: MaskLayer) -> Self {
        Self {
            mask,
            validity: None,
            low_value: default_reduced(),
            elsewhere_value: None,
            elevation_penalty: None,
        }
    }

    pub fn with_elsewhere(mut self, elsewhere_value: f64) -> Self {
        self.elsewhere_value = Some(elsewhere_value);
        self
    }

    /// Value of the reduction layer off the feature
    pub fn neutral_value(&self) -> f32 {
        self.elsewhere_value.map_or(f32::INFINITY, |v| v as f32)
    }

    pub fn with_validity(mut self, validity: MaskLayer) -> Self {
        self.validity = Some(validity);
        self
    }

    pub fn with_penalty(mut self, threshold: f64, factor: f64) -> Self {
        self.elevation_penalty = Some(PenaltyRule { threshold, factor });
        self
    }
}

fn default_high() -> f64 {
    99.0
}

fn default_reduced() -> f64 {
    2.0
}

fn default_nodata() -> u8 {
    DEFAULT_NODATA
}

/// Complete, immutable parameter set of one cost-surface run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostSurfaceConfig {
    pub weights: Weights,
    pub transforms: BTreeMap<RawLayer, LayerTransform>,
    /// Global range for transformed costs
    #[serde(default)]
    pub cost_bounds: CostBounds,
    /// Range of the quantized output codes
    #[serde(default)]
    pub output_bounds: CostBounds,
    #[serde(default = "default_nodata")]
    pub nodata: u8,
    #[serde(default)]
    pub barriers: Vec<BarrierRule>,
    #[serde(default)]
    pub reductions: Vec<ReductionRule>,
}

impl Default for CostSurfaceConfig {
    fn default() -> Self {
        let bell = |scale, shape, center| MembershipFunction::GeneralizedBell {
            scale,
            shape,
            center,
        };

        let mut transforms = BTreeMap::new();
        transforms.insert(RawLayer::Slope, LayerTransform::new(bell(11.0, 4.0, 43.0)));
        transforms.insert(
            RawLayer::Curvature,
            LayerTransform::new(bell(3.0, 10.0, 3.0)).with_absolute_input(),
        );
        transforms.insert(RawLayer::TravelAngle, LayerTransform::new(bell(4.5, 1.0, 43.0)));

        Self {
            weights: Weights::new()
                .with(RawLayer::Slope, 0.5)
                .with(RawLayer::Curvature, 0.1)
                .with(RawLayer::TravelAngle, 0.4),
            transforms,
            cost_bounds: CostBounds::default(),
            output_bounds: CostBounds::default(),
            nodata: DEFAULT_NODATA,
            barriers: vec![BarrierRule::new(MaskLayer::Rivers)],
            reductions: vec![
                ReductionRule::new(MaskLayer::Bridges),
                ReductionRule::new(MaskLayer::Roads),
                ReductionRule::new(MaskLayer::Trails)
                    .with_validity(MaskLayer::Forest)
                    .with_penalty(800.0, 7.0),
            ],
        }
    }
}

impl CostSurfaceConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check every parameter. Nothing is checked again during a run.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        for layer in self.weights.layers() {
            if !self.transforms.contains_key(&layer) {
                return Err(Error::Config(format!(
                    "layer '{}' has a weight but no transform",
                    layer
                )));
            }
        }
        for (layer, transform) in &self.transforms {
            if self.weights.get(*layer).is_none() {
                return Err(Error::Config(format!(
                    "layer '{}' has a transform but no weight",
                    layer
                )));
            }
            transform.validate(layer.name())?;
        }

        self.cost_bounds.validate("cost_bounds")?;
        self.output_bounds.validate("output_bounds")?;
        if self.output_bounds.min < 1.0 || self.output_bounds.max > 254.0 {
            return Err(Error::invalid_parameter(
                "output_bounds",
                format!("[{}, {}]", self.output_bounds.min, self.output_bounds.max),
                "must lie within [1, 254]",
            ));
        }
        let nodata = self.nodata as f64;
        if nodata >= self.output_bounds.min.round() && nodata <= self.output_bounds.max.round() {
            return Err(Error::invalid_parameter(
                "nodata",
                self.nodata,
                "must lie outside output_bounds",
            ));
        }

        let terrain = self.terrain_range();

        for (i, rule) in self.barriers.iter().enumerate() {
            let name = format!("barriers[{}]", i);
            check_finite(&format!("{}.value", name), rule.value)?;
            if let Some(floor) = rule.floor {
                let field = format!("{}.floor", name);
                check_finite(&field, floor)?;
                if floor > rule.value {
                    return Err(Error::invalid_parameter(
                        field,
                        floor,
                        "must not exceed the barrier value",
                    ));
                }
                match terrain {
                    Some(range) if floor <= range.min => {}
                    Some(range) => {
                        return Err(Error::invalid_parameter(
                            field,
                            floor,
                            format!("must not exceed the lowest terrain cost ({})", range.min),
                        ))
                    }
                    None => {
                        return Err(Error::invalid_parameter(
                            field,
                            floor,
                            "terrain cost is unbounded (precomputed layer); leave the floor unset",
                        ))
                    }
                }
            }
        }

        for (i, rule) in self.reductions.iter().enumerate() {
            let name = format!("reductions[{}]", i);
            check_finite(&format!("{}.low_value", name), rule.low_value)?;
            if let Some(elsewhere) = rule.elsewhere_value {
                let field = format!("{}.elsewhere_value", name);
                check_finite(&field, elsewhere)?;
                if rule.low_value > elsewhere {
                    return Err(Error::invalid_parameter(
                        format!("{}.low_value", name),
                        rule.low_value,
                        "must not exceed elsewhere_value",
                    ));
                }
                match terrain {
                    Some(range) if elsewhere >= range.max => {}
                    Some(range) => {
                        return Err(Error::invalid_parameter(
                            field,
                            elsewhere,
                            format!("must not undercut the highest terrain cost ({})", range.max),
                        ))
                    }
                    None => {
                        return Err(Error::invalid_parameter(
                            field,
                            elsewhere,
                            "terrain cost is unbounded (precomputed layer); leave elsewhere_value unset",
                        ))
                    }
                }
            }
            if let Some(penalty) = &rule.elevation_penalty {
                check_finite(&format!("{}.elevation_penalty.threshold", name), penalty.threshold)?;
                check_finite(&format!("{}.elevation_penalty.factor", name), penalty.factor)?;
                if penalty.factor <= 0.0 {
                    return Err(Error::invalid_parameter(
                        format!("{}.elevation_penalty.factor", name),
                        penalty.factor,
                        "must be > 0",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Range the weighted terrain cost can take.
    ///
    /// The weighted sum is normalised, so it stays between the lowest and
    /// highest bound of the layers carrying weight. `None` when a weighted
    /// layer is precomputed and therefore unbounded.
    pub fn terrain_range(&self) -> Option<CostBounds> {
        let mut range: Option<CostBounds> = None;
        for (layer, weight) in self.weights.iter() {
            if weight == 0.0 {
                continue;
            }
            let transform = self.transforms.get(&layer)?;
            if matches!(transform.function, MembershipFunction::Precomputed) {
                return None;
            }
            let bounds = transform.cost_bounds.unwrap_or(self.cost_bounds);
            range = Some(match range {
                Some(r) => CostBounds::new(r.min.min(bounds.min), r.max.max(bounds.max)),
                None => bounds,
            });
        }
        range
    }

    /// Raw layers a run consumes: every weighted layer, plus elevation
    /// when a reduction carries an elevation penalty
    pub fn required_layers(&self) -> BTreeSet<RawLayer> {
        let mut layers: BTreeSet<RawLayer> = self.weights.layers().collect();
        if self.reductions.iter().any(|r| r.elevation_penalty.is_some()) {
            layers.insert(RawLayer::Elevation);
        }
        layers
    }

    /// Masks referenced by any barrier or reduction rule
    pub fn required_masks(&self) -> BTreeSet<MaskLayer> {
        let barriers = self.barriers.iter().map(|b| b.mask);
        let reductions = self
            .reductions
            .iter()
            .flat_map(|r| std::iter::once(r.mask).chain(r.validity));
        barriers.chain(reductions).collect()
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, value, "must be finite"))
    }
}
