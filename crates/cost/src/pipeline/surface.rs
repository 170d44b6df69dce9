use skiroute_core::raster::{Raster, RasterStatistics, ReferenceGrid};
use skiroute_core::Result;

/// Final quantized friction grid.
///
/// Valid cells hold codes within the configured output bounds; every other
/// cell holds the nodata code.
#[derive(Debug, Clone)]
pub struct CostSurface {
    raster: Raster<u8>,
    nodata: u8,
}

impl CostSurface {
    pub(crate) fn new(raster: Raster<u8>, nodata: u8) -> Self {
        Self { raster, nodata }
    }

    pub fn raster(&self) -> &Raster<u8> {
        &self.raster
    }

    pub fn into_raster(self) -> Raster<u8> {
        self.raster
    }

    pub fn nodata(&self) -> u8 {
        self.nodata
    }

    pub fn reference_grid(&self) -> ReferenceGrid {
        self.raster.reference_grid()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<u8> {
        self.raster.get(row, col)
    }

    /// Number of cells carrying the nodata code
    pub fn nodata_count(&self) -> usize {
        self.raster.data().iter().filter(|&&c| c == self.nodata).count()
    }

    /// Statistics over the valid codes
    pub fn statistics(&self) -> RasterStatistics<u8> {
        self.raster.statistics()
    }
}
