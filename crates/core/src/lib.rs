//! # skiroute core
//!
//! Core types shared by the skiroute crates.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `ReferenceGrid`: the shape + georeference every grid of a run must share
//! - `CRS`: Coordinate Reference System identity
//! - `Error`: the error taxonomy (validation, configuration, I/O)

pub mod crs;
pub mod error;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, ErrorKind, Result};
pub use raster::{GeoTransform, Raster, RasterElement, ReferenceGrid};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, ReferenceGrid};
}
