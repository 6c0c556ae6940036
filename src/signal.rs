//! Benchmark input and round-trip validation.

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::layout::{Geometry, Precision};

/// Host input of `transfer_size` bytes, uniform in `[0, 1)`.
///
/// Complex inputs fill real and imaginary parts alike. The same seed always
/// yields the same bytes for a given geometry.
pub fn generate_input(geometry: &Geometry, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let real = geometry.precision.real_size();
    let count = geometry.transfer_size / real;
    let mut out = Vec::with_capacity(geometry.transfer_size as usize);
    for _ in 0..count {
        let v: f64 = rng.gen();
        match geometry.precision {
            Precision::Single => out.extend_from_slice(&(v as f32).to_ne_bytes()),
            Precision::Double => out.extend_from_slice(&v.to_ne_bytes()),
            Precision::Half => out.extend_from_slice(&f16::from_f64(v).to_ne_bytes()),
        }
    }
    out
}

fn scalars(precision: Precision, bytes: &[u8]) -> Vec<f64> {
    match precision {
        Precision::Single => bytes
            .chunks_exact(4)
            .map(|c| f64::from(bytemuck::pod_read_unaligned::<f32>(c)))
            .collect(),
        Precision::Double => bytes
            .chunks_exact(8)
            .map(bytemuck::pod_read_unaligned::<f64>)
            .collect(),
        Precision::Half => bytes
            .chunks_exact(2)
            .map(|c| bytemuck::pod_read_unaligned::<f16>(c).to_f64())
            .collect(),
    }
}

/// Error of a forward/inverse round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deviation {
    pub max_abs: f64,
    pub rms: f64,
}

/// Compares downloaded data against the input it came from.
///
/// Unnormalized backends return `n * x`; their output is scaled by `1/n`.
pub fn deviation(
    geometry: &Geometry,
    input: &[u8],
    output: &[u8],
    normalized: bool,
) -> Result<Deviation> {
    geometry.check_transfer("validate", input.len())?;
    geometry.check_transfer("validate", output.len())?;
    let scale = if normalized {
        1.0
    } else {
        1.0 / geometry.n as f64
    };
    let expected = scalars(geometry.precision, input);
    let actual = scalars(geometry.precision, output);
    if expected.is_empty() {
        return Err(BenchError::backend("validate", "deviation", "empty signal"));
    }
    let mut max_abs = 0.0f64;
    let mut sum_sq = 0.0f64;
    for (e, a) in expected.iter().zip(&actual) {
        let d = a * scale - e;
        max_abs = max_abs.max(d.abs());
        sum_sq += d * d;
    }
    Ok(Deviation {
        max_abs,
        rms: (sum_sq / expected.len() as f64).sqrt(),
    })
}

/// Largest accepted RMS round-trip error per precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBounds {
    pub single: f64,
    pub double: f64,
    pub half: f64,
}

impl Default for ErrorBounds {
    fn default() -> Self {
        Self {
            single: 1e-5,
            double: 1e-10,
            half: 1e-2,
        }
    }
}

impl ErrorBounds {
    pub fn for_precision(&self, precision: Precision) -> f64 {
        match precision {
            Precision::Single => self.single,
            Precision::Double => self.double,
            Precision::Half => self.half,
        }
    }

    pub fn accepts(&self, precision: Precision, deviation: &Deviation) -> bool {
        deviation.rms.is_finite() && deviation.rms <= self.for_precision(precision)
    }
}
