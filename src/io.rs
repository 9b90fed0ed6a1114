// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::core::Field;
use crate::error::{RelaxError, Result};

/// Digits after the decimal point in text output.
pub const TEXT_PRECISION: usize = 5;
/// Minimum width of each value column in text output.
pub const TEXT_WIDTH: usize = 10;

/// Supported file formats for field I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Whitespace-separated fixed-precision text, one grid row per line.
    Text,
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") | Some("dat") => Ok(FileFormat::Text),
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(RelaxError::UnsupportedFileFormat(ext.to_string())),
        None => Err(RelaxError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Write row-major `data` as text, `cols` values per line.
///
/// Each value is printed with [`TEXT_PRECISION`] decimals, left-aligned in a
/// [`TEXT_WIDTH`]-wide column and followed by a single space.
pub fn write_text<W: Write>(w: &mut W, data: &[f64], cols: usize) -> Result<()> {
    if cols == 0 {
        return Ok(());
    }
    for row in data.chunks(cols) {
        for v in row {
            write!(w, "{:<width$.prec$} ", v, width = TEXT_WIDTH, prec = TEXT_PRECISION)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Save an array as text. The last axis becomes the line; 1-D arrays are
/// written one value per line.
pub fn save_text(data: &[f64], shape: &[usize], path: &Path) -> Result<()> {
    let cols = if shape.len() >= 2 {
        shape[shape.len() - 1]
    } else {
        1
    };
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    write_text(&mut w, data, cols)?;
    w.flush()?;
    Ok(())
}

fn to_array(data: &[f64], shape: &[usize]) -> Result<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
        .map_err(|e| RelaxError::Other(format!("shape error: {}", e)))
}

/// Save a row-major array to a .npy file.
pub fn save_npy(data: &[f64], shape: &[usize], path: &Path) -> Result<()> {
    let arr = to_array(data, shape)?;
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RelaxError::Other(format!("npy write error: {}", e)))
}

/// Load a row-major array of `expected_shape` from a .npy file.
/// `f32` files are promoted to `f64`.
pub fn load_npy(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(_) => {
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| RelaxError::Other(format!("npy read error: {}", e)))?;
            arr32.mapv(f64::from)
        }
    };
    if arr.shape() != expected_shape {
        return Err(RelaxError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: arr.shape().to_vec(),
        });
    }
    // Fortran-order files must be re-laid out before taking the raw buffer.
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Save a row-major array to a Level 5 .mat file under `var_name`.
pub fn save_mat(data: &[f64], shape: &[usize], path: &Path, var_name: &str) -> Result<()> {
    let arr = to_array(data, shape)?;
    // MATLAB is column-major: transpose, then read in standard order.
    let col_major: Vec<f64> = arr.t().as_standard_layout().to_owned().into_raw_vec();
    let mut dims: Vec<usize> = shape.to_vec();
    if dims.len() == 1 {
        dims.push(1);
    }
    write_mat_level5(path, var_name, &dims, &col_major)
}

/// Load variable `var_name` of `expected_shape` from a .mat file.
pub fn load_mat(path: &Path, var_name: &str, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| RelaxError::Other(format!("MAT parse error: {}", e)))?;

    let array = mat.find_by_name(var_name).ok_or_else(|| {
        let available: Vec<&str> = mat.arrays().iter().map(|a| a.name()).collect();
        RelaxError::Other(format!(
            "MAT variable '{}' not found; available variables: {:?}",
            var_name, available
        ))
    })?;

    let data: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, .. } => real.clone(),
        matfile::NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        _ => {
            return Err(RelaxError::Other(
                "MAT array is not f64 or f32".to_string(),
            ))
        }
    };

    // Vectors are stored as n x 1, matching `save_mat`. A reversed shape is a
    // transposed grid, so only an exact match is accepted.
    let mat_shape = array.size().to_vec();
    let mut stored_shape = expected_shape.to_vec();
    if stored_shape.len() == 1 {
        stored_shape.push(1);
    }
    if mat_shape != stored_shape || data.len() != expected_shape.iter().product::<usize>() {
        return Err(RelaxError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: mat_shape,
        });
    }
    let arr = ArrayD::from_shape_vec(IxDyn(expected_shape).f(), data)
        .map_err(|e| RelaxError::Other(format!("shape error: {}", e)))?;
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Minimal MAT-file Level 5 writer for one real double array, uncompressed.
///
/// Layout: a 128-byte header, then a single miMATRIX element holding the
/// array-flags, dimensions, name and real-part sub-elements, each padded to
/// 8 bytes.
fn write_mat_level5(path: &Path, var_name: &str, dims: &[usize], data: &[f64]) -> Result<()> {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;

    fn padded(n: u32) -> u32 {
        n.div_ceil(8) * 8
    }
    fn tag<W: Write>(w: &mut W, ty: u32, size: u32) -> std::io::Result<()> {
        w.write_all(&ty.to_le_bytes())?;
        w.write_all(&size.to_le_bytes())
    }
    fn pad<W: Write>(w: &mut W, written: u32) -> std::io::Result<()> {
        let extra = (padded(written) - written) as usize;
        w.write_all(&[0u8; 8][..extra])
    }

    let too_large = || RelaxError::Other("array too large for MAT Level 5".to_string());
    let dims_size = u32::try_from(dims.len() * 4).map_err(|_| too_large())?;
    let name = var_name.as_bytes();
    let name_size = u32::try_from(name.len()).map_err(|_| too_large())?;
    let data_size = u32::try_from(data.len() * 8).map_err(|_| too_large())?;
    let matrix_size = 16 + (8 + padded(dims_size)) + (8 + padded(name_size)) + (8 + padded(data_size));

    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    let mut header = [b' '; 116];
    let desc = b"MATLAB 5.0 MAT-file, created by jacobi-relax";
    header[..desc.len()].copy_from_slice(desc);
    w.write_all(&header)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(&0x0100u16.to_le_bytes())?;
    w.write_all(b"IM")?;

    tag(&mut w, MI_MATRIX, matrix_size)?;

    tag(&mut w, MI_UINT32, 8)?;
    w.write_all(&MX_DOUBLE_CLASS.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;

    tag(&mut w, MI_INT32, dims_size)?;
    for &d in dims {
        let d = i32::try_from(d).map_err(|_| too_large())?;
        w.write_all(&d.to_le_bytes())?;
    }
    pad(&mut w, dims_size)?;

    tag(&mut w, MI_INT8, name_size)?;
    w.write_all(name)?;
    pad(&mut w, name_size)?;

    tag(&mut w, MI_DOUBLE, data_size)?;
    for &v in data {
        w.write_all(&v.to_le_bytes())?;
    }

    w.flush()?;
    Ok(())
}

/// Save an array, inferring the format from the extension.
pub fn save_array(data: &[f64], shape: &[usize], path: &Path) -> Result<()> {
    match infer_format(path)? {
        FileFormat::Text => save_text(data, shape, path),
        FileFormat::Npy => save_npy(data, shape, path),
        FileFormat::Mat => save_mat(data, shape, path, "field"),
    }
}

/// Save the field's current buffer, inferring the format from the extension.
pub fn save_field(field: &Field, path: &Path) -> Result<()> {
    save_array(field.current(), &field.shape(), path)
}

/// Load a `[rows, cols]` grid from .npy or .mat (variable `field`).
pub fn load_grid(path: &Path, shape: [usize; 2]) -> Result<Vec<f64>> {
    match infer_format(path)? {
        FileFormat::Npy => load_npy(path, &shape),
        FileFormat::Mat => load_mat(path, "field", &shape),
        FileFormat::Text => Err(RelaxError::UnsupportedFileFormat(
            "text grids cannot be loaded".to_string(),
        )),
    }
}
