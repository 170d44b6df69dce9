//! GeoTIFF reading and writing (native, via the `tiff` crate)
//!
//! Only what a cost-surface run needs: single-band grids, north-up
//! georeference from ModelPixelScale + ModelTiepoint, the EPSG code from
//! the GeoKey directory, and the GDAL no-data tag.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use skiroute_core::{GeoTransform, Raster, CRS};
use tempfile::NamedTempFile;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read the first band of a GeoTIFF as `f32`.
///
/// A declared GDAL no-data value is rewritten to NaN, so the grid leaves
/// this function with NaN as its only missing-data marker.
pub fn read_grid(path: &Path) -> Result<Raster<f32>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut raster =
        decode_grid(file).with_context(|| format!("Cannot decode {}", path.display()))?;
    raster.normalize_nodata();
    Ok(raster)
}

fn decode_grid<R: Read + Seek>(reader: R) -> Result<Raster<f32>> {
    let mut decoder = Decoder::new(reader).context("TIFF decode error")?;
    let (width, height) = decoder.dimensions().context("Cannot read dimensions")?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<f32> = match decoder.read_image().context("Cannot read image data")? {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => bail!("Unsupported TIFF pixel format"),
    };

    if data.len() != rows * cols {
        bail!(
            "Expected {} single-band samples, found {} (multi-band files are not supported)",
            rows * cols,
            data.len()
        );
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));
    raster.set_nodata(read_nodata(&mut decoder));
    Ok(raster)
}

fn cast_all<T: num_traits::NumCast + Copy>(buf: &[T]) -> Vec<f32> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    let entries = keys.get(4..)?;

    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            // Location 0: value stored inline
            .find(|k| k[0] == wanted && k[1] == 0)
            .map(|k| k[3] as u32)
            .filter(|&code| code != 0 && code != 32767)
    };
    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    text.trim_matches(char::from(0)).trim().parse::<f32>().ok()
}

fn geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok());
    let mut keys: Vec<u16> = vec![
        1, 1, 0, 2, // Version 1.1.0, key count patched below
        GT_MODEL_TYPE_KEY, 0, 1, 1, // ModelTypeProjected
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        // EPSG 4326-style codes are geographic
        let (model, key) = if (4000..5000).contains(&code) {
            (2, GEOGRAPHIC_TYPE_KEY)
        } else {
            (1, PROJECTED_CS_TYPE_KEY)
        };
        keys[7] = model;
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

fn encode<C, T, W>(
    writer: W,
    rows: usize,
    cols: usize,
    transform: &GeoTransform,
    crs: Option<&CRS>,
    nodata: Option<String>,
    data: &[T],
) -> Result<()>
where
    C: ColorType<Inner = T>,
    [T]: TiffValue,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).context("TIFF encoder error")?;
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .context("Cannot create TIFF image")?;

    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
        .context("Cannot write scale tag")?;

    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
        .context("Cannot write tiepoint tag")?;

    let keys = geo_keys(crs);
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), keys.as_slice())
        .context("Cannot write geokey tag")?;

    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), nodata.as_str())
            .context("Cannot write nodata tag")?;
    }

    image.write_data(data).context("Cannot write image data")?;
    Ok(())
}

/// Run `write` against a temporary file next to `path` and move it into
/// place only once `write` succeeded. On failure `path` is left as it was.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer).with_context(|| format!("Cannot write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Cannot write {}", path.display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    Ok(())
}

/// Write an 8-bit cost surface with its no-data code
pub fn write_u8(raster: &Raster<u8>, path: &Path) -> Result<()> {
    let data: Vec<u8> = raster.data().iter().copied().collect();
    write_atomically(path, |writer| {
        encode::<Gray8, _, _>(
            writer,
            raster.rows(),
            raster.cols(),
            raster.transform(),
            raster.crs(),
            raster.nodata().map(|v| v.to_string()),
            &data,
        )
    })
}

/// Write a float grid; NaN cells are declared as no-data
pub fn write_f32(raster: &Raster<f32>, path: &Path) -> Result<()> {
    let data: Vec<f32> = raster.data().iter().copied().collect();
    write_atomically(path, |writer| {
        encode::<Gray32Float, _, _>(
            writer,
            raster.rows(),
            raster.cols(),
            raster.transform(),
            raster.crs(),
            Some("nan".to_string()),
            &data,
        )
    })
}
