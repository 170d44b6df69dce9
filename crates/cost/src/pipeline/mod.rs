//! Cost-surface pipeline
//!
//! Runs the stages in a fixed order:
//!
//! `Load → Validate → Transform → WeightedSum → OverlayBarriers →
//! OverlayReductions → Quantize → PropagateNodata → Emit`
//!
//! `Validate` is the only fatal boundary for input data: once it passes,
//! every later stage works on co-registered grids and cannot fail on
//! user input. Missing data travels as NaN until the final nodata pass.

mod inputs;
mod surface;

pub use inputs::PipelineInputs;
pub use surface::CostSurface;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use skiroute_core::raster::{Raster, ReferenceGrid};
use skiroute_core::{Error, Result};
use tracing::{debug, info, trace};

use crate::combine::{max_combine, min_combine, weighted_sum};
use crate::config::CostSurfaceConfig;
use crate::layer::{MaskLayer, RawLayer};
use crate::mask::{barrier_layer, reduction_layer, ElevationPenalty, FeatureMask};
use crate::membership::apply_transform;
use crate::quantize::{clip_round, propagate_nodata};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Load,
    Validate,
    Transform,
    WeightedSum,
    OverlayBarriers,
    OverlayReductions,
    Quantize,
    PropagateNodata,
    Emit,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Load,
        Stage::Validate,
        Stage::Transform,
        Stage::WeightedSum,
        Stage::OverlayBarriers,
        Stage::OverlayReductions,
        Stage::Quantize,
        Stage::PropagateNodata,
        Stage::Emit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Validate => "validate",
            Stage::Transform => "transform",
            Stage::WeightedSum => "weighted_sum",
            Stage::OverlayBarriers => "overlay_barriers",
            Stage::OverlayReductions => "overlay_reductions",
            Stage::Quantize => "quantize",
            Stage::PropagateNodata => "propagate_nodata",
            Stage::Emit => "emit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Float grids produced along the way, for inspection and debug dumps
#[derive(Debug, Clone)]
pub struct Intermediates {
    /// Transformed unit-cost layer per weighted raw layer
    pub unit_costs: BTreeMap<RawLayer, Raster<f32>>,
    /// Weighted terrain cost before any overlay
    pub terrain: Raster<f32>,
    /// Terrain with barriers applied
    pub with_barriers: Raster<f32>,
    /// Terrain with barriers and reductions applied, before quantization
    pub with_reductions: Raster<f32>,
}

/// Cost-surface generator bound to one validated configuration.
///
/// Holds no state besides the configuration, so one pipeline can serve
/// any number of runs, also concurrently.
#[derive(Debug, Clone)]
pub struct CostSurfacePipeline {
    config: CostSurfaceConfig,
}

fn timed<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let out = f()?;
    debug!(stage = %stage, elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "stage done");
    Ok(out)
}

impl CostSurfacePipeline {
    /// Validate `config` and build a pipeline for it
    pub fn new(config: CostSurfaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CostSurfaceConfig {
        &self.config
    }

    /// Produce the cost surface for one set of inputs
    pub fn run(&self, inputs: &PipelineInputs) -> Result<CostSurface> {
        self.run_with_intermediates(inputs).map(|(surface, _)| surface)
    }

    /// Like [`run`](Self::run), also returning the float grids of every
    /// stage up to quantization
    pub fn run_with_intermediates(
        &self,
        inputs: &PipelineInputs,
    ) -> Result<(CostSurface, Intermediates)> {
        let run_start = Instant::now();
        let config = &self.config;

        timed(Stage::Load, || {
            debug!(
                raw = inputs.raw.len(),
                masks = inputs.masks.len(),
                "inputs received"
            );
            Ok(())
        })?;

        let grid = timed(Stage::Validate, || self.validate_inputs(inputs))?;

        let unit_costs = timed(Stage::Transform, || {
            let mut unit_costs = BTreeMap::new();
            for (&layer, transform) in &config.transforms {
                let raw = required_raw(inputs, layer)?;
                trace!(layer = %layer, ?transform, "transforming");
                unit_costs.insert(layer, apply_transform(raw, transform, config.cost_bounds)?);
            }
            Ok(unit_costs)
        })?;

        let terrain = timed(Stage::WeightedSum, || weighted_sum(&unit_costs, &config.weights))?;

        let with_barriers = timed(Stage::OverlayBarriers, || {
            let layers = config
                .barriers
                .iter()
                .map(|rule| {
                    trace!(mask = %rule.mask, value = rule.value, "barrier");
                    barrier_layer(required_mask(inputs, rule.mask)?, rule.value as f32, rule.floor_value())
                })
                .collect::<Result<Vec<_>>>()?;
            let mut operands = vec![&terrain];
            operands.extend(layers.iter());
            max_combine(&operands)
        })?;

        let with_reductions = timed(Stage::OverlayReductions, || {
            let layers = config
                .reductions
                .iter()
                .map(|rule| {
                    trace!(mask = %rule.mask, low = rule.low_value, "reduction");
                    let mask = required_mask(inputs, rule.mask)?;
                    let validity = rule
                        .validity
                        .map(|v| required_mask(inputs, v))
                        .transpose()?;
                    let penalty = match &rule.elevation_penalty {
                        Some(p) => Some(ElevationPenalty {
                            elevation: required_raw(inputs, RawLayer::Elevation)?,
                            threshold: p.threshold as f32,
                            factor: p.factor as f32,
                        }),
                        None => None,
                    };
                    reduction_layer(
                        mask,
                        validity,
                        rule.low_value as f32,
                        rule.neutral_value(),
                        penalty.as_ref(),
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            let mut operands = vec![&with_barriers];
            operands.extend(layers.iter());
            min_combine(&operands)
        })?;

        let quantized = timed(Stage::Quantize, || {
            clip_round(&with_reductions, config.output_bounds, config.nodata)
        })?;

        let quantized = timed(Stage::PropagateNodata, || {
            let sources = config
                .required_layers()
                .into_iter()
                .map(|layer| required_raw(inputs, layer))
                .collect::<Result<Vec<_>>>()?;
            propagate_nodata(quantized, &sources, config.nodata)
        })?;

        let surface = timed(Stage::Emit, || {
            let mut raster = quantized;
            raster.set_transform(grid.transform);
            raster.set_crs(grid.crs.clone());
            Ok(CostSurface::new(raster, config.nodata))
        })?;

        info!(
            rows = grid.rows,
            cols = grid.cols,
            nodata_cells = surface.nodata_count(),
            elapsed_ms = run_start.elapsed().as_secs_f64() * 1e3,
            "cost surface ready"
        );

        Ok((
            surface,
            Intermediates {
                unit_costs,
                terrain,
                with_barriers,
                with_reductions,
            },
        ))
    }

    /// Presence and co-registration of every grid the run needs
    fn validate_inputs(&self, inputs: &PipelineInputs) -> Result<ReferenceGrid> {
        for layer in self.config.required_layers() {
            required_raw(inputs, layer)?;
        }
        for mask in self.config.required_masks() {
            required_mask(inputs, mask)?;
        }

        let grid = inputs
            .reference_grid()
            .ok_or(Error::EmptyInput("cost surface pipeline"))?;

        for (layer, raster) in &inputs.raw {
            grid.check(&raster.reference_grid(), layer.name())?;
        }
        for (layer, mask) in &inputs.masks {
            grid.check(mask.reference_grid(), layer.name())?;
        }
        Ok(grid)
    }
}

fn required_raw(inputs: &PipelineInputs, layer: RawLayer) -> Result<&Raster<f32>> {
    inputs
        .raw(layer)
        .ok_or_else(|| Error::MissingLayer(layer.to_string()))
}

fn required_mask(inputs: &PipelineInputs, layer: MaskLayer) -> Result<&FeatureMask> {
    inputs
        .mask(layer)
        .ok_or_else(|| Error::MissingMask(layer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::Weights;
    use crate::config::{BarrierRule, ReductionRule};
    use crate::membership::{CostBounds, LayerTransform, MembershipFunction};
    use skiroute_core::{GeoTransform, CRS};

    fn transform() -> GeoTransform {
        GeoTransform::new(500_000.0, 7_000_000.0, 10.0, -10.0)
    }

    fn raw(values: Vec<f32>) -> Raster<f32> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(transform());
        r
    }

    fn mask(values: Vec<f32>) -> FeatureMask {
        FeatureMask::from_raster(&raw(values))
    }

    fn slope_only() -> CostSurfaceConfig {
        let mut config = CostSurfaceConfig {
            weights: Weights::new().with(RawLayer::Slope, 1.0),
            transforms: BTreeMap::new(),
            barriers: Vec::new(),
            reductions: Vec::new(),
            ..CostSurfaceConfig::default()
        };
        config.transforms.insert(
            RawLayer::Slope,
            LayerTransform::new(MembershipFunction::GeneralizedBell {
                scale: 11.0,
                shape: 4.0,
                center: 43.0,
            }),
        );
        config
    }

    fn default_inputs() -> PipelineInputs {
        PipelineInputs::new()
            .with_raw(RawLayer::Elevation, raw(vec![600.0, 900.0, 700.0, 1000.0]))
            .with_raw(RawLayer::Slope, raw(vec![43.0, 43.0, 35.0, 50.0]))
            .with_raw(RawLayer::Curvature, raw(vec![0.0, -3.0, 3.0, 1.0]))
            .with_raw(RawLayer::TravelAngle, raw(vec![43.0, 43.0, 40.0, 30.0]))
            .with_mask(MaskLayer::Roads, mask(vec![0.0, 0.0, 0.0, 0.0]))
            .with_mask(MaskLayer::Trails, mask(vec![0.0, 1.0, 0.0, 0.0]))
            .with_mask(MaskLayer::Rivers, mask(vec![0.0, 0.0, 1.0, 0.0]))
            .with_mask(MaskLayer::Bridges, mask(vec![0.0, 0.0, 0.0, 0.0]))
            .with_mask(MaskLayer::Forest, mask(vec![1.0, 1.0, 1.0, 1.0]))
    }

    #[test]
    fn test_stage_order() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::PropagateNodata.to_string(), "propagate_nodata");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = slope_only();
        config.weights = Weights::new();
        assert!(CostSurfacePipeline::new(config).is_err());
    }

    #[test]
    fn test_default_run() {
        let pipeline = CostSurfacePipeline::new(CostSurfaceConfig::default()).unwrap();
        let (surface, stages) = pipeline.run_with_intermediates(&default_inputs()).unwrap();

        assert_eq!(surface.shape(), (2, 2));
        assert_eq!(surface.raster().transform(), &transform());
        // River barrier
        assert_eq!(surface.get(1, 0).unwrap(), 99);
        // Forest trail above 800 m: 2 * 7
        assert_eq!(surface.get(0, 1).unwrap(), 14);
        assert_eq!(stages.unit_costs.len(), 3);
        for code in surface.raster().data().iter() {
            assert!((1..=99).contains(code));
        }
    }

    #[test]
    fn test_missing_layer_and_mask() {
        let pipeline = CostSurfacePipeline::new(CostSurfaceConfig::default()).unwrap();

        let mut inputs = default_inputs();
        inputs.raw.remove(&RawLayer::Elevation);
        match pipeline.run(&inputs) {
            Err(Error::MissingLayer(name)) => assert_eq!(name, "elevation"),
            other => panic!("expected MissingLayer, got {other:?}"),
        }

        let mut inputs = default_inputs();
        inputs.masks.remove(&MaskLayer::Forest);
        assert!(matches!(pipeline.run(&inputs), Err(Error::MissingMask(_))));
    }

    #[test]
    fn test_misaligned_input_is_rejected() {
        let pipeline = CostSurfacePipeline::new(slope_only()).unwrap();
        let mut shifted = raw(vec![1.0; 4]);
        shifted.set_transform(GeoTransform::new(500_010.0, 7_000_000.0, 10.0, -10.0));
        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, raw(vec![43.0; 4]))
            .with_raw(RawLayer::Curvature, shifted);
        match pipeline.run(&inputs) {
            Err(Error::GeoreferenceMismatch { layer, .. }) => assert_eq!(layer, "curvature"),
            other => panic!("expected GeoreferenceMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_crs_mismatch_is_rejected() {
        let pipeline = CostSurfacePipeline::new(slope_only()).unwrap();
        let mut a = raw(vec![43.0; 4]);
        a.set_crs(Some(CRS::from_epsg(25833)));
        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, a)
            .with_raw(RawLayer::TravelAngle, raw(vec![43.0; 4]));
        match pipeline.run(&inputs) {
            Err(Error::CrsMismatch { layer, .. }) => assert_eq!(layer, "travel_angle"),
            other => panic!("expected CrsMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_shape_mismatch_names_layer() {
        let pipeline = CostSurfacePipeline::new(slope_only()).unwrap();
        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, raw(vec![43.0; 4]))
            .with_mask(
                MaskLayer::Forest,
                FeatureMask::from_raster(&Raster::<f32>::filled(3, 3, 1.0)),
            );
        match pipeline.run(&inputs) {
            Err(Error::ShapeMismatch { layer, .. }) => assert_eq!(layer, "forest"),
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_unused_layer_does_not_propagate_nodata() {
        let pipeline = CostSurfacePipeline::new(slope_only()).unwrap();
        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, raw(vec![43.0; 4]))
            .with_raw(RawLayer::Curvature, raw(vec![f32::NAN; 4]));
        let surface = pipeline.run(&inputs).unwrap();
        assert_eq!(surface.nodata_count(), 0);
    }

    #[test]
    fn test_hazard_layer_combined_with_slope() {
        use crate::hazard::{avalanche_hazard, HazardParams};

        let travel_angle = raw(vec![35.0, 0.0, 0.0, 0.0]);
        let pra_raw = raw(vec![0.7, 0.0, 0.0, 0.0]);
        let release = mask(vec![1.0, 0.0, 0.0, 0.0]);
        let hazard =
            avalanche_hazard(&travel_angle, &pra_raw, &release, &HazardParams::default()).unwrap();

        let mut config = slope_only();
        config.weights = Weights::new()
            .with(RawLayer::Slope, 6.0)
            .with(RawLayer::AvalancheHazard, 4.0);
        config.transforms.insert(
            RawLayer::AvalancheHazard,
            LayerTransform::new(MembershipFunction::Precomputed),
        );
        config.reductions = vec![ReductionRule::new(MaskLayer::Roads)];
        let pipeline = CostSurfacePipeline::new(config).unwrap();

        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, raw(vec![20.0; 4]))
            .with_raw(RawLayer::AvalancheHazard, hazard)
            .with_mask(MaskLayer::Roads, mask(vec![0.0; 4]));
        let surface = pipeline.run(&inputs).unwrap();

        assert_eq!(surface.nodata_count(), 0);
        // Single release cell: midpoint of [7.2, 99] weighted 4 against slope cost ~1.27
        assert_eq!(surface.get(0, 0).unwrap(), 22);
        for (row, col) in [(0, 1), (1, 0), (1, 1)] {
            assert_eq!(surface.get(row, col).unwrap(), 1);
        }
    }

    #[test]
    fn test_precomputed_terrain_above_default_sentinel_is_kept() {
        let mut config = slope_only();
        config
            .transforms
            .insert(RawLayer::Slope, LayerTransform::new(MembershipFunction::Precomputed));
        config.cost_bounds = CostBounds::new(1.0, 200.0);
        config.output_bounds = CostBounds::new(1.0, 200.0);
        config.reductions = vec![ReductionRule::new(MaskLayer::Roads)];
        config.barriers = vec![BarrierRule::new(MaskLayer::Rivers)];
        let pipeline = CostSurfacePipeline::new(config).unwrap();

        let inputs = PipelineInputs::new()
            .with_raw(RawLayer::Slope, raw(vec![150.0, 150.0, 0.5, 150.0]))
            .with_mask(MaskLayer::Roads, mask(vec![0.0; 4]))
            .with_mask(MaskLayer::Rivers, mask(vec![0.0; 4]));
        let (surface, stages) = pipeline.run_with_intermediates(&inputs).unwrap();

        assert_eq!(stages.with_reductions.data(), stages.terrain.data());
        assert_eq!(surface.get(0, 0).unwrap(), 150);
        assert_eq!(surface.get(1, 0).unwrap(), 1);
    }

    #[test]
    fn test_surface_carries_crs() {
        let pipeline = CostSurfacePipeline::new(slope_only()).unwrap();
        let mut slope = raw(vec![43.0; 4]);
        slope.set_crs(Some(CRS::from_epsg(25833)));
        let surface = pipeline.run(&PipelineInputs::new().with_raw(RawLayer::Slope, slope)).unwrap();
        assert_eq!(surface.raster().crs().and_then(|c| c.epsg()), Some(25833));
        assert_eq!(surface.nodata(), 255);
        assert_eq!(surface.raster().nodata(), Some(255));
    }
}
