//! Buffer geometry for FFT configurations.
//!
//! Every backend sizes its buffers, transfers and plans from the same
//! [`Geometry`], so the numbers computed here are used verbatim for
//! allocation and for transfer byte counts. Axis order is fixed: the last
//! extent is the contiguous axis and the only one the half-spectrum rule
//! touches.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Largest supported transform rank.
pub const MAX_RANK: usize = 3;

/// Buffers at or above this many bytes need the 64-bit indexing API.
pub const WIDE_INDEX_THRESHOLD: u64 = 1 << 32;

/// Transform extents, one entry per dimension, last entry contiguous.
///
/// Holds 1..=3 strictly positive entries; construction rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Extent(Vec<usize>);

impl Extent {
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(BenchError::InvalidExtent {
                reason: format!("rank must be 1..={MAX_RANK}, got {}", dims.len()),
                extents: dims,
            });
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(BenchError::InvalidExtent {
                extents: dims,
                reason: "every extent must be positive".into(),
            });
        }
        Ok(Self(dims))
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Length of the contiguous axis.
    pub fn last(&self) -> usize {
        self.0[self.0.len() - 1]
    }
}

impl TryFrom<Vec<usize>> for Extent {
    type Error = BenchError;

    fn try_from(dims: Vec<usize>) -> Result<Self> {
        Extent::new(dims)
    }
}

impl From<Extent> for Vec<usize> {
    fn from(e: Extent) -> Self {
        e.0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl FromStr for Extent {
    type Err = BenchError;

    /// Parses `1024`, `32x32`, `16x16x16` (`,` is accepted as separator too).
    fn from_str(s: &str) -> Result<Self> {
        let dims = s
            .trim()
            .split(|c| c == 'x' || c == 'X' || c == ',')
            .map(|part| {
                part.trim().parse::<usize>().map_err(|_| BenchError::InvalidExtent {
                    extents: Vec::new(),
                    reason: format!("cannot parse {s:?}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Extent::new(dims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    #[serde(rename = "real")]
    RealToComplex,
    #[serde(rename = "complex")]
    ComplexToComplex,
}

impl TransformKind {
    pub const ALL: [TransformKind; 2] =
        [TransformKind::RealToComplex, TransformKind::ComplexToComplex];

    pub fn is_real(self) -> bool {
        self == TransformKind::RealToComplex
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformKind::RealToComplex => "Real",
            TransformKind::ComplexToComplex => "Complex",
        })
    }
}

impl FromStr for TransformKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" | "r2c" => Ok(TransformKind::RealToComplex),
            "complex" | "c2c" => Ok(TransformKind::ComplexToComplex),
            other => Err(BenchError::Config(format!("unknown transform kind {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    #[serde(rename = "inplace")]
    InPlace,
    #[serde(rename = "outplace")]
    OutOfPlace,
}

impl Placement {
    pub const ALL: [Placement; 2] = [Placement::InPlace, Placement::OutOfPlace];

    pub fn is_inplace(self) -> bool {
        self == Placement::InPlace
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Placement::InPlace => "Inplace",
            Placement::OutOfPlace => "Outplace",
        })
    }
}

impl FromStr for Placement {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inplace" | "in-place" => Ok(Placement::InPlace),
            "outplace" | "out-of-place" | "outofplace" => Ok(Placement::OutOfPlace),
            other => Err(BenchError::Config(format!("unknown placement {other:?}"))),
        }
    }
}

/// Serialized with the same labels `Display` prints; `"single"` is accepted
/// on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "float", alias = "single")]
    Single,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "half")]
    Half,
}

impl Precision {
    pub const ALL: [Precision; 3] = [Precision::Single, Precision::Double, Precision::Half];

    /// Report label, shared by every output format.
    pub fn label(self) -> &'static str {
        match self {
            Precision::Single => "float",
            Precision::Double => "double",
            Precision::Half => "half",
        }
    }

    /// Bytes of one real element.
    pub fn real_size(self) -> u64 {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
            Precision::Half => 2,
        }
    }

    /// Bytes of one interleaved complex element.
    pub fn complex_size(self) -> u64 {
        2 * self.real_size()
    }

    /// Bytes of one space-domain element for the given transform kind.
    pub fn value_size(self, kind: TransformKind) -> u64 {
        if kind.is_real() {
            self.real_size()
        } else {
            self.complex_size()
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Precision {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "float" | "f32" => Ok(Precision::Single),
            "double" | "f64" => Ok(Precision::Double),
            "half" | "f16" | "float16" => Ok(Precision::Half),
            other => Err(BenchError::Config(format!("unknown precision {other:?}"))),
        }
    }
}

/// One point of the benchmark parameter space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub kind: TransformKind,
    pub placement: Placement,
    pub precision: Precision,
    pub extents: Extent,
}

impl Configuration {
    pub fn new(
        kind: TransformKind,
        placement: Placement,
        precision: Precision,
        extents: Extent,
    ) -> Self {
        Self {
            kind,
            placement,
            precision,
            extents,
        }
    }

    pub fn geometry(&self) -> Result<Geometry> {
        compute_geometry(&self.extents, self.kind, self.placement, self.precision)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}/{}/{}",
            self.placement, self.kind, self.precision, self.extents
        )
    }
}

/// Row layout of a real in-place multi-dimensional buffer.
///
/// Each of `rows` logical rows carries `width` meaningful bytes and starts
/// `pitch` bytes after the previous one. Bytes in `width..pitch` are padding
/// reserved for the half-spectrum output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPitch {
    pub rows: u64,
    pub width: u64,
    pub pitch: u64,
}

/// Derived buffer sizes of a configuration. All sizes are in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub kind: TransformKind,
    pub placement: Placement,
    pub precision: Precision,
    pub extents: Extent,
    pub extents_complex: Vec<usize>,
    /// Space-domain element count.
    pub n: u64,
    /// Transform-domain element count.
    pub n_complex: u64,
    /// Primary buffer size.
    pub data_size: u64,
    /// Secondary buffer size; zero for in-place.
    pub complex_buffer_size: u64,
    /// Bytes moved by one upload or download.
    pub transfer_size: u64,
    pub use_wide_indexing: bool,
}

impl Geometry {
    /// Bytes of one space-domain element.
    pub fn value_size(&self) -> u64 {
        self.precision.value_size(self.kind)
    }

    /// Bytes reserved by `allocate()`.
    pub fn allocation_size(&self) -> u64 {
        self.data_size.saturating_add(self.complex_buffer_size)
    }

    pub fn is_inplace_real(&self) -> bool {
        self.kind.is_real() && self.placement.is_inplace()
    }

    /// Number of contiguous rows along the last axis.
    pub fn rows(&self) -> u64 {
        self.n / self.extents.last() as u64
    }

    /// Row pitch of the padded layout, present only for real in-place
    /// transforms of rank > 1. A 1-D padded buffer is a single row and is
    /// copied contiguously.
    pub fn row_pitch(&self) -> Option<RowPitch> {
        if !self.is_inplace_real() || self.extents.rank() < 2 {
            return None;
        }
        let last = self.extents.last() as u64;
        Some(RowPitch {
            rows: self.rows(),
            width: last * self.precision.real_size(),
            pitch: (last / 2 + 1) * self.precision.complex_size(),
        })
    }

    /// Rejects a host slice whose length differs from `transfer_size`.
    pub fn check_transfer(&self, operation: &'static str, actual: usize) -> Result<()> {
        if actual as u64 != self.transfer_size {
            return Err(BenchError::TransferSize {
                operation,
                expected: self.transfer_size,
                actual: actual as u64,
            });
        }
        Ok(())
    }

    /// Copies `host` into a primary buffer laid out by this geometry.
    ///
    /// Padding bytes of a pitched layout are left untouched.
    pub fn scatter_rows(&self, host: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.check_transfer("upload", host.len())?;
        let buffer_bytes = buffer_len(buffer);
        let overflow = || BenchError::TransferSize {
            operation: "upload",
            expected: self.data_size,
            actual: buffer_bytes,
        };
        match self.row_pitch() {
            Some(p) => {
                let (width, pitch) = (p.width as usize, p.pitch as usize);
                for (r, row) in host.chunks_exact(width).enumerate() {
                    let off = r * pitch;
                    buffer
                        .get_mut(off..off + width)
                        .ok_or_else(overflow)?
                        .copy_from_slice(row);
                }
            }
            None => buffer
                .get_mut(..host.len())
                .ok_or_else(overflow)?
                .copy_from_slice(host),
        }
        Ok(())
    }

    /// Inverse of [`Geometry::scatter_rows`].
    pub fn gather_rows(&self, buffer: &[u8], host: &mut [u8]) -> Result<()> {
        self.check_transfer("download", host.len())?;
        let overflow = || BenchError::TransferSize {
            operation: "download",
            expected: self.data_size,
            actual: buffer.len() as u64,
        };
        match self.row_pitch() {
            Some(p) => {
                let (width, pitch) = (p.width as usize, p.pitch as usize);
                for (r, row) in host.chunks_exact_mut(width).enumerate() {
                    let off = r * pitch;
                    row.copy_from_slice(buffer.get(off..off + width).ok_or_else(overflow)?);
                }
            }
            None => {
                let len = host.len();
                host.copy_from_slice(buffer.get(..len).ok_or_else(overflow)?);
            }
        }
        Ok(())
    }
}

fn buffer_len(buffer: &[u8]) -> u64 {
    buffer.len() as u64
}

fn checked_product(dims: &[usize], extents: &Extent) -> Result<u64> {
    dims.iter().try_fold(1u64, |acc, &d| {
        acc.checked_mul(d as u64)
            .ok_or_else(|| overflow(extents, "element count"))
    })
}

fn checked_bytes(count: u64, size: u64, extents: &Extent, what: &str) -> Result<u64> {
    count
        .checked_mul(size)
        .ok_or_else(|| overflow(extents, what))
}

fn overflow(extents: &Extent, what: &str) -> BenchError {
    BenchError::InvalidExtent {
        extents: extents.dims().to_vec(),
        reason: format!("{what} overflows 64 bits"),
    }
}

/// Computes the buffer geometry of a configuration.
///
/// Pure and deterministic. The only failure is a size that does not fit in
/// 64 bits, which is an invariant violation rather than a skip.
pub fn compute_geometry(
    extents: &Extent,
    kind: TransformKind,
    placement: Placement,
    precision: Precision,
) -> Result<Geometry> {
    let n = checked_product(extents.dims(), extents)?;

    let mut extents_complex = extents.dims().to_vec();
    if kind.is_real() {
        let last = extents.last();
        let rank = extents_complex.len();
        extents_complex[rank - 1] = last / 2 + 1;
    }
    let n_complex = checked_product(&extents_complex, extents)?;

    let value_size = precision.value_size(kind);
    let data_elems = if placement.is_inplace() && kind.is_real() {
        n_complex
            .checked_mul(2)
            .ok_or_else(|| overflow(extents, "padded element count"))?
    } else {
        n
    };
    let data_size = checked_bytes(data_elems, value_size, extents, "data size")?;
    let complex_buffer_size = if placement.is_inplace() {
        0
    } else {
        checked_bytes(n_complex, precision.complex_size(), extents, "complex buffer size")?
    };
    let transfer_size = checked_bytes(n, value_size, extents, "transfer size")?;
    let use_wide_indexing =
        data_size >= WIDE_INDEX_THRESHOLD || complex_buffer_size >= WIDE_INDEX_THRESHOLD;

    Ok(Geometry {
        kind,
        placement,
        precision,
        extents: extents.clone(),
        extents_complex,
        n,
        n_complex,
        data_size,
        complex_buffer_size,
        transfer_size,
        use_wide_indexing,
    })
}
