//! Layer combination
//!
//! - [`weighted_sum`]: auto-normalized Σ(w·v) / Σw over unit-cost layers
//! - [`max_combine`] / [`min_combine`]: elementwise dominance reducers used
//!   for barrier and reduction overlays
//!
//! Missing cells (NaN) in any operand are missing in the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skiroute_core::raster::Raster;
use skiroute_core::{Error, Result};

use crate::kernel::map_cells;
use crate::layer::RawLayer;

/// Non-negative weight per raw layer.
///
/// There is no default weight: a layer without an entry is an error
/// wherever the weights are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<RawLayer, f64>);

impl Weights {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, layer: RawLayer, weight: f64) -> Self {
        self.0.insert(layer, weight);
        self
    }

    pub fn insert(&mut self, layer: RawLayer, weight: f64) {
        self.0.insert(layer, weight);
    }

    pub fn get(&self, layer: RawLayer) -> Option<f64> {
        self.0.get(&layer).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RawLayer, f64)> + '_ {
        self.0.iter().map(|(&layer, &w)| (layer, w))
    }

    pub fn layers(&self) -> impl Iterator<Item = RawLayer> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Every weight multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|(&l, &w)| (l, w * factor)).collect())
    }

    /// Each weight finite and >= 0, total > 0
    pub fn validate(&self) -> Result<()> {
        for (layer, w) in self.iter() {
            check_weight(layer, w)?;
        }
        let total = self.total();
        if !(total > 0.0) {
            return Err(Error::NonPositiveTotalWeight(total));
        }
        Ok(())
    }
}

impl FromIterator<(RawLayer, f64)> for Weights {
    fn from_iter<I: IntoIterator<Item = (RawLayer, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn check_weight(layer: RawLayer, w: f64) -> Result<()> {
    if !w.is_finite() || w < 0.0 {
        return Err(Error::invalid_parameter(
            format!("weights.{}", layer),
            w,
            "must be finite and >= 0",
        ));
    }
    Ok(())
}

fn ensure_same_shape(first: &Raster<f32>, other: &Raster<f32>) -> Result<()> {
    if first.shape() != other.shape() {
        return Err(Error::SizeMismatch {
            er: first.rows(),
            ec: first.cols(),
            ar: other.rows(),
            ac: other.cols(),
        });
    }
    Ok(())
}

/// Weighted mean of unit-cost layers.
///
/// Accumulates Σ(w·v) and Σw over every layer in `layers` and divides,
/// so the result stays within the layers' common cost range whatever the
/// absolute weight magnitudes. Accumulation runs in f64 in layer order.
///
/// # Errors
/// - [`Error::MissingWeight`] if a layer has no weight entry
/// - [`Error::NonPositiveTotalWeight`] if the weights of the layers sum to <= 0
/// - [`Error::SizeMismatch`] if the layers disagree in shape
/// - [`Error::EmptyInput`] if `layers` is empty
pub fn weighted_sum(layers: &BTreeMap<RawLayer, Raster<f32>>, weights: &Weights) -> Result<Raster<f32>> {
    let entries: Vec<(f64, &Raster<f32>)> = layers
        .iter()
        .map(|(&layer, grid)| {
            let w = weights
                .get(layer)
                .ok_or_else(|| Error::MissingWeight(layer.to_string()))?;
            check_weight(layer, w)?;
            Ok((w, grid))
        })
        .collect::<Result<_>>()?;

    let (_, first) = *entries.first().ok_or(Error::EmptyInput("weighted_sum"))?;
    for (_, grid) in &entries[1..] {
        ensure_same_shape(first, grid)?;
    }

    let total: f64 = entries.iter().map(|(w, _)| w).sum();
    if !(total > 0.0) {
        return Err(Error::NonPositiveTotalWeight(total));
    }

    let data = map_cells(first.data(), |row, col, _| {
        let mut acc = 0.0f64;
        for (w, grid) in &entries {
            acc += w * grid.data()[(row, col)] as f64;
        }
        (acc / total) as f32
    })?;

    let mut output = first.with_data(data)?;
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}

/// Elementwise maximum over one or more equally shaped grids
pub fn max_combine(grids: &[&Raster<f32>]) -> Result<Raster<f32>> {
    fold_grids(grids, "max_combine", f32::max)
}

/// Elementwise minimum over one or more equally shaped grids
pub fn min_combine(grids: &[&Raster<f32>]) -> Result<Raster<f32>> {
    fold_grids(grids, "min_combine", f32::min)
}

fn fold_grids(
    grids: &[&Raster<f32>],
    name: &'static str,
    pick: fn(f32, f32) -> f32,
) -> Result<Raster<f32>> {
    let (first, rest) = grids.split_first().ok_or(Error::EmptyInput(name))?;
    for grid in rest {
        ensure_same_shape(first, grid)?;
    }

    let data = map_cells(first.data(), |row, col, v| {
        rest.iter().fold(v, |acc, grid| {
            let other = grid.data()[(row, col)];
            // f32::max/min ignore NaN; missing must stay missing
            if acc.is_nan() || other.is_nan() {
                f32::NAN
            } else {
                pick(acc, other)
            }
        })
    })?;

    let mut output = first.with_data(data)?;
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}
