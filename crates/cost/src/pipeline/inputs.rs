use std::collections::BTreeMap;

use skiroute_core::raster::{Raster, ReferenceGrid};

use crate::layer::{MaskLayer, RawLayer};
use crate::mask::FeatureMask;

/// Decoded grids handed to a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub raw: BTreeMap<RawLayer, Raster<f32>>,
    pub masks: BTreeMap<MaskLayer, FeatureMask>,
}

impl PipelineInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, layer: RawLayer, raster: Raster<f32>) -> Self {
        self.raw.insert(layer, raster);
        self
    }

    pub fn with_mask(mut self, layer: MaskLayer, mask: FeatureMask) -> Self {
        self.masks.insert(layer, mask);
        self
    }

    pub fn raw(&self, layer: RawLayer) -> Option<&Raster<f32>> {
        self.raw.get(&layer)
    }

    pub fn mask(&self, layer: MaskLayer) -> Option<&FeatureMask> {
        self.masks.get(&layer)
    }

    /// Grid of the first supplied raw layer, in [`RawLayer::ALL`] order
    pub fn reference_grid(&self) -> Option<ReferenceGrid> {
        self.raw.values().next().map(Raster::reference_grid)
    }
}
