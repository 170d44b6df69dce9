//! Layer roles
//!
//! Every grid entering the pipeline is either a raw physical quantity or a
//! feature-presence mask. Both are closed enumerations so that weights,
//! transforms and overlay rules are keyed by something the compiler checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use skiroute_core::Error;

/// Raw physical-quantity grids.
///
/// Missing cells in any raw layer a run consumes become nodata in the
/// output cost surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawLayer {
    /// Elevation above sea level (metres)
    #[serde(alias = "dem")]
    Elevation,
    /// Slope angle (degrees, 0-90)
    Slope,
    /// Terrain curvature / wind shelter index, from ridges (< 0) to bowls (> 0)
    #[serde(alias = "windshelter")]
    Curvature,
    /// Avalanche runout travel angle (degrees)
    TravelAngle,
    /// Combined avalanche release/runout hazard, already in cost units
    #[serde(alias = "pra_runout_combined")]
    AvalancheHazard,
}

impl RawLayer {
    /// All raw layers, in reference-grid precedence order
    pub const ALL: [RawLayer; 5] = [
        RawLayer::Elevation,
        RawLayer::Slope,
        RawLayer::Curvature,
        RawLayer::TravelAngle,
        RawLayer::AvalancheHazard,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RawLayer::Elevation => "elevation",
            RawLayer::Slope => "slope",
            RawLayer::Curvature => "curvature",
            RawLayer::TravelAngle => "travel_angle",
            RawLayer::AvalancheHazard => "avalanche_hazard",
        }
    }
}

/// Boolean feature-presence grids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskLayer {
    Roads,
    /// Tractor roads and hiking trails
    #[serde(alias = "tractorroads_trails")]
    Trails,
    #[serde(alias = "river")]
    Rivers,
    #[serde(alias = "bridge")]
    Bridges,
    Forest,
}

impl MaskLayer {
    pub const ALL: [MaskLayer; 5] = [
        MaskLayer::Roads,
        MaskLayer::Trails,
        MaskLayer::Rivers,
        MaskLayer::Bridges,
        MaskLayer::Forest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaskLayer::Roads => "roads",
            MaskLayer::Trails => "trails",
            MaskLayer::Rivers => "rivers",
            MaskLayer::Bridges => "bridges",
            MaskLayer::Forest => "forest",
        }
    }
}

impl fmt::Display for RawLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for MaskLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RawLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elevation" | "dem" => Ok(RawLayer::Elevation),
            "slope" => Ok(RawLayer::Slope),
            "curvature" | "windshelter" => Ok(RawLayer::Curvature),
            "travel_angle" => Ok(RawLayer::TravelAngle),
            "avalanche_hazard" | "pra_runout_combined" => Ok(RawLayer::AvalancheHazard),
            _ => Err(Error::invalid_parameter("layer", s, "unknown raster layer")),
        }
    }
}

impl FromStr for MaskLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "roads" => Ok(MaskLayer::Roads),
            "trails" | "tractorroads_trails" => Ok(MaskLayer::Trails),
            "rivers" | "river" => Ok(MaskLayer::Rivers),
            "bridges" | "bridge" => Ok(MaskLayer::Bridges),
            "forest" => Ok(MaskLayer::Forest),
            _ => Err(Error::invalid_parameter("mask", s, "unknown mask layer")),
        }
    }
}
