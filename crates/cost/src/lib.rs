//! # skiroute cost
//!
//! Terrain cost-surface generation for least-cost ski-tour routing.
//!
//! ## Building blocks
//!
//! - **membership**: bell / logistic transforms from physical quantities to cost
//! - **mask**: feature masks, barrier and reduction overlay layers
//! - **combine**: normalized weighted sum, MAX / MIN overlay reducers
//! - **quantize**: clip-round to 8-bit friction codes, nodata propagation
//! - **hazard**: avalanche release/runout hazard layer preparation
//! - **config**: validated, immutable run configuration
//! - **pipeline**: the fixed-order stage runner producing a [`CostSurface`]

mod kernel;
mod maybe_rayon;

pub mod combine;
pub mod config;
pub mod hazard;
pub mod layer;
pub mod mask;
pub mod membership;
pub mod pipeline;
pub mod quantize;

pub use config::{BarrierRule, CostSurfaceConfig, PenaltyRule, ReductionRule};
pub use layer::{MaskLayer, RawLayer};
pub use mask::FeatureMask;
pub use pipeline::{CostSurface, CostSurfacePipeline, Intermediates, PipelineInputs, Stage};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::combine::{max_combine, min_combine, weighted_sum, Weights};
    pub use crate::config::{BarrierRule, CostSurfaceConfig, PenaltyRule, ReductionRule};
    pub use crate::hazard::{avalanche_hazard, HazardParams};
    pub use crate::layer::{MaskLayer, RawLayer};
    pub use crate::mask::{barrier_layer, reduction_layer, ElevationPenalty, FeatureMask};
    pub use crate::membership::{
        apply_transform, cost_map, generalized_bell, logistic, CostBounds, LayerTransform,
        MembershipFunction,
    };
    pub use crate::pipeline::{
        CostSurface, CostSurfacePipeline, Intermediates, PipelineInputs, Stage,
    };
    pub use crate::quantize::{clip_round, propagate_nodata, DEFAULT_NODATA};
    pub use skiroute_core::prelude::*;
}
