//! Sparse regridding weights and their on-disk format.
//!
//! A weights file holds one sparse matrix per source face (one for lat-lon
//! sources, six for cubed-sphere sources) mapping source cells onto the
//! full target grid.
//!
//! # File layout (little endian)
//!
//! ```text
//! "GCRW" | version u32 | src label (u32 len + utf8) | dst label (u32 len + utf8)
//!        | face count u32
//!        | per face: n_src u32 | n_dst u32 | nnz u32 | nnz x (dst u32, src u32, weight f64)
//!        | crc32 of everything above
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bench_common::GridDescriptor;

use crate::error::{RegridError, Result};

const MAGIC: &[u8; 4] = b"GCRW";
const VERSION: u32 = 1;

/// A sparse `n_dst x n_src` matrix in coordinate form.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseWeights {
    n_src: usize,
    n_dst: usize,
    rows: Vec<u32>,
    cols: Vec<u32>,
    vals: Vec<f64>,
}

impl SparseWeights {
    pub fn new(n_src: usize, n_dst: usize) -> Self {
        Self {
            n_src,
            n_dst,
            rows: Vec::new(),
            cols: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Add `weight` for the contribution of source cell `src` to target cell `dst`.
    #[inline]
    pub fn push(&mut self, dst: usize, src: usize, weight: f64) {
        debug_assert!(dst < self.n_dst && src < self.n_src);
        self.rows.push(dst as u32);
        self.cols.push(src as u32);
        self.vals.push(weight);
    }

    pub fn n_src(&self) -> usize {
        self.n_src
    }

    pub fn n_dst(&self) -> usize {
        self.n_dst
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    /// Accumulate `W * src` into `dst`.
    pub fn apply_into(&self, src: &[f64], dst: &mut [f64]) -> Result<()> {
        if src.len() != self.n_src || dst.len() != self.n_dst {
            return Err(RegridError::shape_mismatch(format!(
                "weights map {} -> {} cells, got {} -> {}",
                self.n_src,
                self.n_dst,
                src.len(),
                dst.len()
            )));
        }

        for ((&r, &c), &w) in self.rows.iter().zip(&self.cols).zip(&self.vals) {
            dst[r as usize] += w * src[c as usize];
        }
        Ok(())
    }

    /// Sum of weights per target cell.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_dst];
        for (&r, &w) in self.rows.iter().zip(&self.vals) {
            sums[r as usize] += w;
        }
        sums
    }
}

/// Weights for one (source, target) grid pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightsFile {
    pub source: GridDescriptor,
    pub target: GridDescriptor,
    pub faces: Vec<SparseWeights>,
}

impl WeightsFile {
    /// Conventional file name for a grid pair, e.g. `conservative_c24_4x5.wts`.
    pub fn file_name(source: &GridDescriptor, target: &GridDescriptor) -> String {
        format!("conservative_{}_{}.wts", source.label(), target.label())
    }

    /// Path of the weights file for a grid pair inside `dir`.
    pub fn path_in(dir: &Path, source: &GridDescriptor, target: &GridDescriptor) -> PathBuf {
        dir.join(Self::file_name(source, target))
    }

    /// Whether these weights can serve the given grid pair.
    pub fn matches(&self, source: &GridDescriptor, target: &GridDescriptor) -> bool {
        let expected_faces = if source.is_cubed_sphere() { 6 } else { 1 };
        let face_cells = source.cell_count() / expected_faces;

        self.source == *source
            && self.target == *target
            && self.faces.len() == expected_faces
            && self
                .faces
                .iter()
                .all(|f| f.n_src == face_cells && f.n_dst == target.cell_count())
    }

    /// Serialize to a writer.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        write_str(&mut buf, &self.source.label());
        write_str(&mut buf, &self.target.label());
        buf.extend_from_slice(&(self.faces.len() as u32).to_le_bytes());

        for face in &self.faces {
            buf.extend_from_slice(&(face.n_src as u32).to_le_bytes());
            buf.extend_from_slice(&(face.n_dst as u32).to_le_bytes());
            buf.extend_from_slice(&(face.nnz() as u32).to_le_bytes());
            for ((&r, &c), &w) in face.rows.iter().zip(&face.cols).zip(&face.vals) {
                buf.extend_from_slice(&r.to_le_bytes());
                buf.extend_from_slice(&c.to_le_bytes());
                buf.extend_from_slice(&w.to_le_bytes());
            }
        }

        let crc = crc32fast::hash(&buf);
        writer.write_all(&buf)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Deserialize from a reader, verifying magic, version and checksum.
    pub fn load<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() < MAGIC.len() + 4 {
            return Err(RegridError::Truncated("missing header".to_string()));
        }
        if &bytes[..4] != MAGIC {
            return Err(RegridError::InvalidMagic);
        }

        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(RegridError::ChecksumMismatch { expected, actual });
        }

        let mut cursor = ByteCursor::new(&body[4..]);
        let version = cursor.u32()?;
        if version != VERSION {
            return Err(RegridError::UnsupportedVersion(version));
        }

        let source = parse_label(&cursor.string()?)?;
        let target = parse_label(&cursor.string()?)?;
        let face_count = cursor.u32()? as usize;

        let mut faces = Vec::with_capacity(face_count);
        for _ in 0..face_count {
            let n_src = cursor.u32()? as usize;
            let n_dst = cursor.u32()? as usize;
            let nnz = cursor.u32()? as usize;
            let mut face = SparseWeights::new(n_src, n_dst);
            face.rows.reserve(nnz);
            face.cols.reserve(nnz);
            face.vals.reserve(nnz);
            for _ in 0..nnz {
                let r = cursor.u32()?;
                let c = cursor.u32()?;
                let w = cursor.f64()?;
                if r as usize >= n_dst || c as usize >= n_src {
                    return Err(RegridError::Truncated(format!(
                        "entry ({}, {}) outside {}x{} matrix",
                        r, c, n_dst, n_src
                    )));
                }
                face.rows.push(r);
                face.cols.push(c);
                face.vals.push(w);
            }
            faces.push(face);
        }

        Ok(Self {
            source,
            target,
            faces,
        })
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn parse_label(label: &str) -> Result<GridDescriptor> {
    GridDescriptor::parse(label)
        .map_err(|_| RegridError::Truncated(format!("invalid grid label '{}'", label)))
}

/// Bounds-checked little-endian reader over a byte slice.
struct ByteCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        if end > self.bytes.len() {
            return Err(RegridError::Truncated(format!(
                "need {} bytes at offset {}, have {}",
                len,
                self.offset,
                self.bytes.len()
            )));
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(f64::from_le_bytes(arr))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let b = self.take(len)?;
        String::from_utf8(b.to_vec())
            .map_err(|_| RegridError::Truncated("grid label is not utf-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> WeightsFile {
        let source = GridDescriptor::LatLon { nlat: 91, nlon: 144 };
        let target = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        let mut w = SparseWeights::new(source.cell_count(), target.cell_count());
        w.push(0, 0, 0.25);
        w.push(0, 1, 0.75);
        w.push(3311, 13103, 1.0);
        WeightsFile {
            source,
            target,
            faces: vec![w],
        }
    }

    #[test]
    fn test_apply_into_accumulates() {
        let mut w = SparseWeights::new(3, 2);
        w.push(0, 0, 0.5);
        w.push(0, 1, 0.5);
        w.push(1, 2, 1.0);

        let mut dst = vec![1.0, 0.0];
        w.apply_into(&[2.0, 4.0, 8.0], &mut dst).unwrap();
        assert_eq!(dst, vec![4.0, 8.0]);
        assert_eq!(w.row_sums(), vec![1.0, 1.0]);

        assert!(w.apply_into(&[1.0], &mut dst).is_err());
    }

    #[test]
    fn test_file_name() {
        let cs = GridDescriptor::CubedSphere { n: 24 };
        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        assert_eq!(WeightsFile::file_name(&cs, &ll), "conservative_c24_4x5.wts");
    }

    #[test]
    fn test_save_load() {
        let file = sample_file();
        let mut buffer = Vec::new();
        file.save(&mut buffer).unwrap();

        let restored = WeightsFile::load(&buffer[..]).unwrap();
        assert_eq!(restored, file);
        assert!(restored.matches(&file.source, &file.target));
        assert!(!restored.matches(&file.target, &file.source));
    }

    #[test]
    fn test_load_detects_corruption() {
        let mut buffer = Vec::new();
        sample_file().save(&mut buffer).unwrap();

        let mut corrupted = buffer.clone();
        let mid = corrupted.len() / 2;
        corrupted[mid] ^= 0xff;
        assert!(matches!(
            WeightsFile::load(&corrupted[..]),
            Err(RegridError::ChecksumMismatch { .. })
        ));

        let mut bad_magic = buffer.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            WeightsFile::load(&bad_magic[..]),
            Err(RegridError::InvalidMagic)
        ));

        assert!(WeightsFile::load(&buffer[..3]).is_err());
    }
}
