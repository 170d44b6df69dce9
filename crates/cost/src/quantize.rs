//! Quantization of the float cost grid into the 8-bit friction code

use skiroute_core::raster::{Raster, RasterElement};
use skiroute_core::{Error, Result};

use crate::kernel::map_cells;
use crate::membership::CostBounds;

/// Reserved code for impassable / missing cells
pub const DEFAULT_NODATA: u8 = 255;

/// Clamp, round and cast a cost grid to `u8`.
///
/// Finite values are clamped into `bounds` and rounded half away from zero;
/// infinities clamp to the nearer bound. NaN cells get `nodata`, which is
/// also declared as the output's no-data value.
pub fn clip_round(grid: &Raster<f32>, bounds: CostBounds, nodata: u8) -> Result<Raster<u8>> {
    let (lo, hi) = (bounds.min as f32, bounds.max as f32);

    let data = map_cells(grid.data(), |_, _, v: f32| {
        if v.is_nan() {
            return nodata;
        }
        quantize_value(v, lo, hi)
    })?;

    let mut output = grid.with_data(data)?;
    output.set_nodata(Some(nodata));
    Ok(output)
}

/// `as u8` saturates, so bounds outside 0..=255 cannot wrap
fn quantize_value(v: f32, lo: f32, hi: f32) -> u8 {
    v.max(lo).min(hi).round() as u8
}

/// Overwrite with `nodata` every cell where any raw source is missing.
///
/// Sources count as missing where they are NaN or equal to their declared
/// no-data value. This runs after every overlay, so it overrides barrier,
/// reduction and transform results alike.
pub fn propagate_nodata(
    mut quantized: Raster<u8>,
    raw_sources: &[&Raster<f32>],
    nodata: u8,
) -> Result<Raster<u8>> {
    for source in raw_sources {
        if source.shape() != quantized.shape() {
            return Err(Error::SizeMismatch {
                er: quantized.rows(),
                ec: quantized.cols(),
                ar: source.rows(),
                ac: source.cols(),
            });
        }
    }

    let missing = map_cells(quantized.data(), |row, col, _| {
        raw_sources.iter().any(|source| {
            let v = source.data()[(row, col)];
            v.is_nodata(source.nodata())
        })
    })?;

    for (code, &gone) in quantized.data_mut().iter_mut().zip(missing.iter()) {
        if gone {
            *code = nodata;
        }
    }
    quantized.set_nodata(Some(nodata));
    Ok(quantized)
}
