//! A self-describing binary dump compatible with the `.npy` container
//! format: a fixed magic + version, a padded ASCII header describing shape
//! and dtype, followed by raw little-endian `f64` data in row-major order.
//! Only round-tripping through [`write_array`]/[`read_array`] is
//! guaranteed — this is not a general-purpose NumPy reader.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::PersistError;

const MAGIC: &[u8] = b"\x93NUMPY";

fn header_for(shape: (usize, usize)) -> String {
    format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        shape.0, shape.1
    )
}

/// Writes `rows` (each the same length) as a `(n_rows, n_cols)` `f64` array.
pub fn write_array(path: &Path, rows: &[Vec<f64>]) -> Result<(), PersistError> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let file = File::create(path).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    let mut out = BufWriter::new(file);

    out.write_all(MAGIC).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    out.write_all(&[1, 0]).map_err(|e| PersistError::Io(path.to_path_buf(), e))?; // version 1.0

    let mut header = header_for((n_rows, n_cols));
    // Pad so magic(6) + version(2) + header_len(2) + header + '\n' is a
    // multiple of 64 bytes, matching the .npy alignment convention.
    let prefix_len = MAGIC.len() + 2 + 2;
    let unpadded = prefix_len + header.len() + 1;
    let pad = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    out.write_u16::<LittleEndian>(header.len() as u16)
        .map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    out.write_all(header.as_bytes()).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;

    for row in rows {
        for &v in row {
            out.write_f64::<LittleEndian>(v).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
        }
    }
    out.flush().map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    Ok(())
}

/// Reads back a `(n_rows, n_cols)` array written by [`write_array`].
pub fn read_array(path: &Path) -> Result<Vec<Vec<f64>>, PersistError> {
    let file = File::open(path).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    let mut input = BufReader::new(file);

    let mut magic = [0u8; 6];
    input.read_exact(&mut magic).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    if magic != MAGIC {
        return Err(PersistError::Codec(path.to_path_buf(), "bad magic".into()));
    }
    let mut version = [0u8; 2];
    input.read_exact(&mut version).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;

    let header_len = input
        .read_u16::<LittleEndian>()
        .map_err(|e| PersistError::Io(path.to_path_buf(), e))? as usize;
    let mut header_bytes = vec![0u8; header_len];
    input.read_exact(&mut header_bytes).map_err(|e| PersistError::Io(path.to_path_buf(), e))?;
    let header = String::from_utf8_lossy(&header_bytes);

    let shape = parse_shape(&header)
        .ok_or_else(|| PersistError::Codec(path.to_path_buf(), format!("unparseable header: {header}")))?;

    let mut data = vec![0f64; shape.0 * shape.1];
    input
        .read_f64_into::<LittleEndian>(&mut data)
        .map_err(|e| PersistError::Io(path.to_path_buf(), e))?;

    Ok(data.chunks(shape.1.max(1)).map(|c| c.to_vec()).collect())
}

fn parse_shape(header: &str) -> Option<(usize, usize)> {
    let start = header.find("'shape': (")? + "'shape': (".len();
    let end = header[start..].find(')')? + start;
    let inner = &header[start..end];
    let mut parts = inner.split(',').map(str::trim).filter(|s| !s.is_empty());
    let rows: usize = parts.next()?.parse().ok()?;
    let cols: usize = parts.next().unwrap_or("0").parse().ok()?;
    Some((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_same_writer_and_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.npy");
        let rows = vec![vec![0.0, 0.25, 0.75], vec![0.1, 0.3, 0.6]];
        write_array(&path, &rows).unwrap();
        let back = read_array(&path).unwrap();
        assert_eq!(rows, back);
    }

    #[test]
    fn header_is_64_byte_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.npy");
        write_array(&path, &[vec![1.0; 4]]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
    }
}
