//! Row-parallel cell kernel shared by every elementwise stage

use ndarray::Array2;
use skiroute_core::{Error, Result};

use crate::maybe_rayon::*;

/// Build a new array by evaluating `f(row, col, value)` for every cell of `src`.
///
/// Rows are processed in parallel; the output keeps row-major order, so the
/// result does not depend on scheduling.
pub(crate) fn map_cells<T, U, F>(src: &Array2<T>, f: F) -> Result<Array2<U>>
where
    T: Copy + Send + Sync,
    U: Copy + Send + Sync,
    F: Fn(usize, usize, T) -> U + Send + Sync,
{
    let (rows, cols) = src.dim();

    let data: Vec<U> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            src.row(row)
                .iter()
                .enumerate()
                .map(|(col, &v)| f(row, col, v))
                .collect::<Vec<U>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}
