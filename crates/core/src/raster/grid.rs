//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement, ReferenceGrid};
use ndarray::{Array2, ArrayView2};
use num_traits::Float;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS).
///
/// # Type Parameters
///
/// - `T`: The cell value type, must implement [`RasterElement`]
///
/// # Example
///
/// ```
/// use skiroute_core::Raster;
///
/// let mut slope: Raster<f32> = Raster::filled(3, 3, 30.0);
/// slope.set(1, 1, f32::NAN).unwrap();
///
/// assert!(slope.is_nodata_at(1, 1).unwrap());
/// assert_eq!(slope.get(0, 0).unwrap(), 30.0);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster on the given reference grid with the given cells
    pub fn on_grid(grid: &ReferenceGrid, data: Array2<T>) -> Result<Self> {
        if data.dim() != grid.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: grid.rows,
                ec: grid.cols,
                ar,
                ac,
            });
        }
        Ok(Self {
            data,
            transform: grid.transform,
            crs: grid.crs.clone(),
            nodata: None,
        })
    }

    /// Create a raster with the same georeference from new cell data.
    ///
    /// The no-data value is not carried over, since it belongs to the
    /// old cell type.
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        Raster::on_grid(&self.reference_grid(), data)
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Shape and georeference of this raster
    pub fn reference_grid(&self) -> ReferenceGrid {
        ReferenceGrid::new(self.rows(), self.cols(), self.transform, self.crs.clone())
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = RasterElement::to_f64(value) {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

impl<T: RasterElement + Float> Raster<T> {
    /// Rewrite declared no-data cells as NaN.
    ///
    /// Afterwards NaN is the only missing-data marker, so arithmetic on a
    /// missing cell yields a missing result.
    pub fn normalize_nodata(&mut self) {
        if let Some(nd) = self.nodata {
            if !nd.is_nan() {
                self.data
                    .mapv_inplace(|v| if v.is_nodata(Some(nd)) { T::nan() } else { v });
            }
        }
        self.nodata = Some(T::nan());
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(matches!(
            raster.get(10, 0),
            Err(Error::IndexOutOfBounds { row: 10, .. })
        ));
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Raster::<f32>::from_vec(vec![0.0; 5], 2, 3).is_err());
        let r = Raster::<f32>::from_vec((0..6).map(|v| v as f32).collect(), 2, 3).unwrap();
        assert_eq!(r.get(1, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_with_data_keeps_georeference() {
        let mut slope: Raster<f32> = Raster::filled(2, 2, 10.0);
        slope.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
        slope.set_crs(Some(CRS::from_epsg(25833)));
        slope.set_nodata(Some(-9999.0));

        let codes = slope.with_data(Array2::<u8>::from_elem((2, 2), 7)).unwrap();
        assert_eq!(codes.transform(), slope.transform());
        assert_eq!(codes.crs(), slope.crs());
        assert_eq!(codes.nodata(), None);

        assert!(slope.with_data(Array2::<u8>::zeros((3, 2))).is_err());
    }

    #[test]
    fn test_normalize_nodata() {
        let mut dem = Raster::from_vec(vec![812.0, -9999.0, 790.5, -9999.0], 2, 2).unwrap();
        dem.set_nodata(Some(-9999.0f32));
        dem.normalize_nodata();

        assert_eq!(dem.get(0, 0).unwrap(), 812.0);
        assert!(dem.get(0, 1).unwrap().is_nan());
        assert!(dem.get(1, 1).unwrap().is_nan());
        assert!(dem.nodata().unwrap().is_nan());
    }

    #[test]
    fn test_raster_statistics() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f32).unwrap();
            }
        }
        raster.set(0, 0, f32::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_u8_statistics_skip_declared_nodata() {
        let mut codes = Raster::from_vec(vec![1u8, 99, 255, 50], 2, 2).unwrap();
        codes.set_nodata(Some(255));
        let stats = codes.statistics();
        assert_eq!(stats.max, Some(99));
        assert_eq!(stats.nodata_count, 1);
    }
}
