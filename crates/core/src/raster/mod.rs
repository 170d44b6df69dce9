//! Raster data structures

mod element;
mod geotransform;
mod grid;
mod reference;

pub use element::RasterElement;
pub use geotransform::{GeoTransform, GEOTRANSFORM_TOLERANCE};
pub use grid::{Raster, RasterStatistics};
pub use reference::ReferenceGrid;
