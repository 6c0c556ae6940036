//! Host backend built on `rustfft` and `realfft`.
//!
//! Multi-dimensional transforms run the 1-D plans along every axis: the
//! contiguous last axis in batches, the outer axes through a line buffer
//! (gather, transform, scatter). Real transforms use `realfft` on the last
//! axis and complex plans on the half-spectrum for the outer axes.
//!
//! Plans, scratch and line buffers are built during the plan phases so the
//! execute phases never allocate.

use std::sync::Arc;

use bytemuck::Pod;
use log::{debug, info};
use num_complex::Complex;
use num_traits::{FromPrimitive, One, Zero};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftNum, FftPlanner, Length};

use crate::adapter::TransformAdapter;
use crate::context::{ensure_precision_supported, BackendContext, DeviceCapabilities, PlanReuse};
use crate::error::{BenchError, Result};
use crate::layout::{Configuration, Geometry, Precision, TransformKind};
use crate::memory;
use crate::timer::{HostTimer, Timer};

const BACKEND: &str = "host";

/// Element types the host backend can transform.
pub trait HostScalar: FftNum + Pod {
    const PRECISION: Precision;
}

impl HostScalar for f32 {
    const PRECISION: Precision = Precision::Single;
}

impl HostScalar for f64 {
    const PRECISION: Precision = Precision::Double;
}

/// Host backend settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostOptions {
    /// Scale the inverse transform by `1/n` inside `execute_inverse`.
    pub normalize: bool,
}

pub struct HostContext {
    options: HostOptions,
    host_bytes: u64,
    description: String,
    destroyed: bool,
}

impl HostContext {
    pub fn create(options: HostOptions) -> Result<Self> {
        Ok(Self::new(options, memory::physical_memory_bytes()?))
    }

    /// Context with an explicit host memory size.
    pub fn new(options: HostOptions, host_bytes: u64) -> Self {
        let memory = if host_bytes == u64::MAX {
            "unknown memory".to_string()
        } else {
            format!("{} MiB", host_bytes >> 20)
        };
        let scaling = if options.normalize { "scaled" } else { "unscaled" };
        let description = format!("CPU, {} threads, {memory}, {scaling}", num_cpus::get());
        info!("host backend ready: {description}");
        Self {
            options,
            host_bytes,
            description,
            destroyed: false,
        }
    }
}

impl BackendContext for HostContext {
    fn title(&self) -> &str {
        "rustfft"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            supports_half_precision: false,
            available_device_bytes: self.host_bytes,
            device_description: self.description.clone(),
        }
    }

    fn available_host_bytes(&self) -> u64 {
        self.host_bytes
    }

    fn plan_reuse(&self, kind: TransformKind) -> PlanReuse {
        match kind {
            TransformKind::ComplexToComplex => PlanReuse::Reusable,
            TransformKind::RealToComplex => PlanReuse::NotReusable,
        }
    }

    fn is_normalized(&self) -> bool {
        self.options.normalize
    }

    fn create_adapter(&self, configuration: &Configuration) -> Result<Box<dyn TransformAdapter>> {
        if self.destroyed {
            return Err(BenchError::ContextUnavailable("host context destroyed".into()));
        }
        ensure_precision_supported(&self.capabilities(), configuration.precision)?;
        match configuration.precision {
            Precision::Single => Ok(Box::new(HostAdapter::<f32>::with_options(
                configuration,
                self.options,
            )?)),
            Precision::Double => Ok(Box::new(HostAdapter::<f64>::with_options(
                configuration,
                self.options,
            )?)),
            Precision::Half => Err(BenchError::UnsupportedPrecision {
                precision: Precision::Half,
                device: self.description.clone(),
            }),
        }
    }

    fn destroy(&mut self) -> Result<()> {
        self.destroyed = true;
        Ok(())
    }
}

/// Per-direction plan set.
///
/// Complex transforms keep one forward and one inverse plan per axis. Real
/// transforms keep the row plan of the current direction plus complex plans
/// for the outer axes.
struct Plan<T: FftNum> {
    forward: Vec<Arc<dyn Fft<T>>>,
    inverse: Vec<Arc<dyn Fft<T>>>,
    r2c: Option<Arc<dyn RealToComplex<T>>>,
    c2r: Option<Arc<dyn ComplexToReal<T>>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Workspace {
    scratch: usize,
    line: usize,
    real_line: usize,
}

impl<T: FftNum> Plan<T> {
    fn complex(dims: &[usize], planner: &mut FftPlanner<T>) -> Self {
        Self {
            forward: dims.iter().map(|&d| planner.plan_fft_forward(d)).collect(),
            inverse: dims.iter().map(|&d| planner.plan_fft_inverse(d)).collect(),
            r2c: None,
            c2r: None,
        }
    }

    fn real_forward(
        dims_complex: &[usize],
        last: usize,
        planner: &mut FftPlanner<T>,
        real_planner: &mut RealFftPlanner<T>,
    ) -> Self {
        let outer = &dims_complex[..dims_complex.len() - 1];
        Self {
            forward: outer.iter().map(|&d| planner.plan_fft_forward(d)).collect(),
            inverse: Vec::new(),
            r2c: Some(real_planner.plan_fft_forward(last)),
            c2r: None,
        }
    }

    fn real_inverse(
        dims_complex: &[usize],
        last: usize,
        planner: &mut FftPlanner<T>,
        real_planner: &mut RealFftPlanner<T>,
    ) -> Self {
        let outer = &dims_complex[..dims_complex.len() - 1];
        Self {
            forward: Vec::new(),
            inverse: outer.iter().map(|&d| planner.plan_fft_inverse(d)).collect(),
            r2c: None,
            c2r: Some(real_planner.plan_fft_inverse(last)),
        }
    }

    fn workspace(&self, real_len: usize) -> Workspace {
        let mut ws = Workspace::default();
        for fft in self.forward.iter().chain(self.inverse.iter()) {
            ws.scratch = ws
                .scratch
                .max(fft.get_inplace_scratch_len())
                .max(fft.get_outofplace_scratch_len());
            ws.line = ws.line.max(fft.len());
        }
        if let Some(r2c) = &self.r2c {
            ws.scratch = ws.scratch.max(r2c.get_scratch_len());
            ws.real_line = real_len;
        }
        if let Some(c2r) = &self.c2r {
            ws.scratch = ws.scratch.max(c2r.get_scratch_len());
            ws.real_line = real_len;
        }
        ws
    }
}

/// Host transform adapter for one configuration.
pub struct HostAdapter<T: HostScalar> {
    geometry: Geometry,
    timer: Arc<HostTimer>,
    planner: FftPlanner<T>,
    real_planner: RealFftPlanner<T>,
    plan: Option<Plan<T>>,
    primary: Vec<T>,
    secondary: Vec<T>,
    scratch: Vec<Complex<T>>,
    line: Vec<Complex<T>>,
    real_line: Vec<T>,
    /// `1/n` when the inverse is normalized.
    scale: Option<T>,
}

impl<T: HostScalar> HostAdapter<T> {
    pub fn new(configuration: &Configuration) -> Result<Self> {
        Self::with_options(configuration, HostOptions::default())
    }

    pub fn with_options(configuration: &Configuration, options: HostOptions) -> Result<Self> {
        if configuration.precision != T::PRECISION {
            return Err(BenchError::UnsupportedPrecision {
                precision: configuration.precision,
                device: format!("host adapter for {}", T::PRECISION),
            });
        }
        let geometry = configuration.geometry()?;
        let scale = if options.normalize {
            let n = T::from_u64(geometry.n).ok_or_else(|| {
                BenchError::backend(BACKEND, "normalize", format!("n = {} out of range", geometry.n))
            })?;
            Some(T::one() / n)
        } else {
            None
        };
        Ok(Self {
            scale,
            geometry,
            timer: Arc::new(HostTimer),
            planner: FftPlanner::new(),
            real_planner: RealFftPlanner::new(),
            plan: None,
            primary: Vec::new(),
            secondary: Vec::new(),
            scratch: Vec::new(),
            line: Vec::new(),
            real_line: Vec::new(),
        })
    }

    fn last(&self) -> usize {
        self.geometry.extents.last()
    }

    fn build_plan(
        g: &Geometry,
        inverse: bool,
        planner: &mut FftPlanner<T>,
        real_planner: &mut RealFftPlanner<T>,
    ) -> Plan<T> {
        let last = g.extents.last();
        match (g.kind, inverse) {
            (TransformKind::ComplexToComplex, _) => Plan::complex(g.extents.dims(), planner),
            (TransformKind::RealToComplex, false) => {
                Plan::real_forward(&g.extents_complex, last, planner, real_planner)
            }
            (TransformKind::RealToComplex, true) => {
                Plan::real_inverse(&g.extents_complex, last, planner, real_planner)
            }
        }
    }

    fn install_plan(&mut self, inverse: bool) -> Result<()> {
        let plan = Self::build_plan(
            &self.geometry,
            inverse,
            &mut self.planner,
            &mut self.real_planner,
        );

        let ws = plan.workspace(self.last());
        grow(&mut self.scratch, ws.scratch, Complex::zero(), "scratch")?;
        grow(&mut self.line, ws.line, Complex::zero(), "line")?;
        grow(&mut self.real_line, ws.real_line, T::zero(), "real line")?;
        self.plan = Some(plan);
        Ok(())
    }

    fn plan(&self, operation: &'static str) -> Result<&Plan<T>> {
        self.plan
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, operation, "no plan"))
    }

    fn run_complex(&mut self, inverse: bool) -> Result<()> {
        let operation = if inverse { "execute_inverse" } else { "execute_forward" };
        let inplace = self.geometry.placement.is_inplace();
        let dims = self.geometry.extents.dims();
        let rank = dims.len();
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, operation, "no plan"))?;
        let ffts = if inverse { &plan.inverse } else { &plan.forward };
        let (outer, last) = ffts.split_at(rank - 1);
        let last = &last[0];

        let primary = as_complex(self.primary.as_mut_slice(), operation)?;
        if inplace {
            transform_rows(last.as_ref(), primary, &mut self.scratch, operation)?;
            return transform_outer(primary, dims, outer, &mut self.line, &mut self.scratch, operation);
        }
        let secondary = as_complex(self.secondary.as_mut_slice(), operation)?;
        if inverse {
            transform_outer(secondary, dims, outer, &mut self.line, &mut self.scratch, operation)?;
            transform_rows_outofplace(last.as_ref(), secondary, primary, &mut self.scratch, operation)
        } else {
            transform_rows_outofplace(last.as_ref(), primary, secondary, &mut self.scratch, operation)?;
            transform_outer(secondary, dims, outer, &mut self.line, &mut self.scratch, operation)
        }
    }

    fn run_real_forward(&mut self) -> Result<()> {
        const OP: &str = "execute_forward";
        let last = self.last();
        let half = last / 2 + 1;
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, OP, "no plan"))?;
        let r2c = plan
            .r2c
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, OP, "no forward real plan"))?;
        let scratch = scratch_for(&mut self.scratch, r2c.get_scratch_len(), OP)?;

        let spectrum = if self.geometry.placement.is_inplace() {
            for row in self.primary.chunks_exact_mut(2 * half) {
                self.real_line.copy_from_slice(&row[..last]);
                let out = as_complex(row, OP)?;
                r2c.process_with_scratch(&mut self.real_line, out, scratch)
                    .map_err(|e| BenchError::backend(BACKEND, OP, e.to_string()))?;
            }
            as_complex(self.primary.as_mut_slice(), OP)?
        } else {
            let secondary = as_complex(self.secondary.as_mut_slice(), OP)?;
            for (src, dst) in self
                .primary
                .chunks_exact_mut(last)
                .zip(secondary.chunks_exact_mut(half))
            {
                r2c.process_with_scratch(src, dst, scratch)
                    .map_err(|e| BenchError::backend(BACKEND, OP, e.to_string()))?;
            }
            secondary
        };
        transform_outer(
            spectrum,
            &self.geometry.extents_complex,
            &plan.forward,
            &mut self.line,
            &mut self.scratch,
            OP,
        )
    }

    fn run_real_inverse(&mut self) -> Result<()> {
        const OP: &str = "execute_inverse";
        let last = self.last();
        let half = last / 2 + 1;
        let inplace = self.geometry.placement.is_inplace();
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, OP, "no plan"))?;
        let c2r = plan
            .c2r
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, OP, "no inverse real plan"))?;

        {
            let spectrum = if inplace {
                as_complex(self.primary.as_mut_slice(), OP)?
            } else {
                as_complex(self.secondary.as_mut_slice(), OP)?
            };
            transform_outer(
                spectrum,
                &self.geometry.extents_complex,
                &plan.inverse,
                &mut self.line,
                &mut self.scratch,
                OP,
            )?;
        }

        let scratch = scratch_for(&mut self.scratch, c2r.get_scratch_len(), OP)?;
        if inplace {
            for row in self.primary.chunks_exact_mut(2 * half) {
                let spectrum = as_complex(&mut *row, OP)?;
                clear_edge_imaginary(spectrum, last);
                c2r.process_with_scratch(spectrum, &mut self.real_line, scratch)
                    .map_err(|e| BenchError::backend(BACKEND, OP, e.to_string()))?;
                row[..last].copy_from_slice(&self.real_line);
            }
        } else {
            let secondary = as_complex(self.secondary.as_mut_slice(), OP)?;
            for (src, dst) in secondary
                .chunks_exact_mut(half)
                .zip(self.primary.chunks_exact_mut(last))
            {
                clear_edge_imaginary(src, last);
                c2r.process_with_scratch(src, dst, scratch)
                    .map_err(|e| BenchError::backend(BACKEND, OP, e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl<T: HostScalar> TransformAdapter for HostAdapter<T> {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn timer(&self) -> Arc<dyn Timer> {
        self.timer.clone()
    }

    fn plan_size_estimate(&mut self) -> Result<u64> {
        Ok(estimate_plan_bytes(&self.geometry, core::mem::size_of::<T>() as u64))
    }

    fn allocate(&mut self) -> Result<()> {
        let real = core::mem::size_of::<T>() as u64;
        self.primary = zeroed(self.geometry.data_size / real, "data", self.geometry.data_size)?;
        if !self.geometry.placement.is_inplace() {
            self.secondary = zeroed(
                self.geometry.complex_buffer_size / real,
                "complex",
                self.geometry.complex_buffer_size,
            )?;
        }
        debug!(
            "host allocate: {} + {} bytes",
            self.geometry.data_size, self.geometry.complex_buffer_size
        );
        Ok(())
    }

    fn init_forward(&mut self) -> Result<()> {
        if self.geometry.use_wide_indexing {
            debug!("host plans index with usize, no separate wide path");
        }
        self.install_plan(false)
    }

    fn init_inverse(&mut self) -> Result<()> {
        if !self.geometry.kind.is_real() {
            return Ok(());
        }
        self.plan = None;
        self.install_plan(true)
    }

    fn upload(&mut self, host: &[u8]) -> Result<()> {
        self.geometry
            .scatter_rows(host, bytemuck::cast_slice_mut(&mut self.primary))
    }

    fn execute_forward(&mut self) -> Result<()> {
        self.plan("execute_forward")?;
        match self.geometry.kind {
            TransformKind::ComplexToComplex => self.run_complex(false),
            TransformKind::RealToComplex => self.run_real_forward(),
        }
    }

    fn execute_inverse(&mut self) -> Result<()> {
        self.plan("execute_inverse")?;
        match self.geometry.kind {
            TransformKind::ComplexToComplex => self.run_complex(true)?,
            TransformKind::RealToComplex => self.run_real_inverse()?,
        }
        if let Some(scale) = self.scale {
            // padding of an in-place real buffer is scaled too; it is never read back
            for v in self.primary.iter_mut() {
                *v = *v * scale;
            }
        }
        Ok(())
    }

    fn download(&mut self, host: &mut [u8]) -> Result<()> {
        self.geometry
            .gather_rows(bytemuck::cast_slice(&self.primary), host)
    }

    fn destroy(&mut self) -> Result<()> {
        // the planners stay: their cache is what a reused adapter benefits from
        self.plan = None;
        self.primary = Vec::new();
        self.secondary = Vec::new();
        self.scratch = Vec::new();
        self.line = Vec::new();
        self.real_line = Vec::new();
        Ok(())
    }
}

/// Plan workspace in bytes, derived from the extents alone.
///
/// Counts one twiddle table per axis and direction plus the scratch and line
/// buffers the plan phases size, each at most one axis long. Nothing is
/// planned, so oversized extents cost nothing here.
pub fn estimate_plan_bytes(geometry: &Geometry, real_size: u64) -> u64 {
    let complex_size = 2 * real_size;
    let dims: &[usize] = &geometry.extents_complex;
    let rank = dims.len();
    let (complex_axes, real_axis): (&[usize], Option<u64>) = match geometry.kind {
        TransformKind::ComplexToComplex => (dims, None),
        TransformKind::RealToComplex => {
            (&dims[..rank - 1], Some(geometry.extents.last() as u64))
        }
    };
    let longest = complex_axes
        .iter()
        .map(|&d| d as u64)
        .chain(real_axis.map(|l| l / 2 + 1))
        .max()
        .unwrap_or(0);
    let twiddles = complex_axes
        .iter()
        .fold(0u64, |acc, &d| acc.saturating_add((d as u64).saturating_mul(2)))
        .saturating_add(real_axis.unwrap_or(0));
    // twiddles, scratch and line, all complex; plus the real line
    let complex_elems = twiddles.saturating_add(longest.saturating_mul(2));
    complex_elems
        .saturating_mul(complex_size)
        .saturating_add(real_axis.unwrap_or(0).saturating_mul(real_size))
}

fn zeroed<E: Pod>(len: u64, buffer: &'static str, bytes: u64) -> Result<Vec<E>> {
    let fail = || BenchError::Allocation {
        backend: BACKEND,
        buffer,
        bytes,
    };
    let len = usize::try_from(len).map_err(|_| fail())?;
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| fail())?;
    v.resize(len, E::zeroed());
    Ok(v)
}

fn grow<E: Copy>(v: &mut Vec<E>, len: usize, value: E, buffer: &'static str) -> Result<()> {
    if v.len() < len {
        v.try_reserve_exact(len - v.len())
            .map_err(|_| BenchError::Allocation {
                backend: BACKEND,
                buffer,
                bytes: len as u64,
            })?;
        v.resize(len, value);
    }
    Ok(())
}

fn as_complex<'a, T: HostScalar>(
    data: &'a mut [T],
    operation: &'static str,
) -> Result<&'a mut [Complex<T>]> {
    bytemuck::try_cast_slice_mut(data)
        .map_err(|e| BenchError::backend(BACKEND, operation, format!("complex view: {e}")))
}

fn scratch_for<'a, E>(
    scratch: &'a mut [E],
    len: usize,
    operation: &'static str,
) -> Result<&'a mut [E]> {
    let available = scratch.len();
    scratch.get_mut(..len).ok_or_else(|| {
        BenchError::backend(
            BACKEND,
            operation,
            format!("scratch holds {available} elements, plan needs {len}"),
        )
    })
}

/// Zeroes the imaginary parts the inverse real transform requires to vanish.
fn clear_edge_imaginary<T: FftNum>(spectrum: &mut [Complex<T>], len: usize) {
    if let Some(first) = spectrum.first_mut() {
        first.im = T::zero();
    }
    if len % 2 == 0 {
        if let Some(nyquist) = spectrum.last_mut() {
            nyquist.im = T::zero();
        }
    }
}

/// Transforms every contiguous row of `data` in place.
fn transform_rows<T: FftNum>(
    fft: &dyn Fft<T>,
    data: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
    operation: &'static str,
) -> Result<()> {
    let scratch = scratch_for(scratch, fft.get_inplace_scratch_len(), operation)?;
    fft.process_with_scratch(data, scratch);
    Ok(())
}

fn transform_rows_outofplace<T: FftNum>(
    fft: &dyn Fft<T>,
    input: &mut [Complex<T>],
    output: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
    operation: &'static str,
) -> Result<()> {
    let scratch = scratch_for(scratch, fft.get_outofplace_scratch_len(), operation)?;
    fft.process_outofplace_with_scratch(input, output, scratch);
    Ok(())
}

/// Runs `ffts[axis]` along each leading axis of the row-major array `data`
/// with shape `dims`. The last axis is never touched here.
fn transform_outer<T: FftNum>(
    data: &mut [Complex<T>],
    dims: &[usize],
    ffts: &[Arc<dyn Fft<T>>],
    line: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
    operation: &'static str,
) -> Result<()> {
    if ffts.is_empty() {
        return Ok(());
    }
    let total: usize = dims.iter().product();
    if data.len() != total {
        return Err(BenchError::backend(
            BACKEND,
            operation,
            format!("buffer holds {} elements, shape needs {total}", data.len()),
        ));
    }
    for (axis, fft) in ffts.iter().enumerate() {
        let len = dims[axis];
        let stride: usize = dims[axis + 1..].iter().product();
        let outer: usize = dims[..axis].iter().product();
        let buf = scratch_for(&mut *line, len, operation)?;
        let work = scratch_for(&mut *scratch, fft.get_inplace_scratch_len(), operation)?;
        for o in 0..outer {
            let block = o * len * stride;
            for j in 0..stride {
                let base = block + j;
                for (i, v) in buf.iter_mut().enumerate() {
                    *v = data[base + i * stride];
                }
                fft.process_with_scratch(buf, work);
                for (i, v) in buf.iter().enumerate() {
                    data[base + i * stride] = *v;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Extent, Placement};

    fn adapter<T: HostScalar>(
        dims: &[usize],
        kind: TransformKind,
        placement: Placement,
    ) -> HostAdapter<T> {
        let config = Configuration::new(
            kind,
            placement,
            T::PRECISION,
            Extent::new(dims.to_vec()).unwrap(),
        );
        HostAdapter::new(&config).unwrap()
    }

    fn ones_f64(n: usize) -> Vec<u8> {
        bytemuck::cast_slice(&vec![1.0f64; n]).to_vec()
    }

    #[test]
    fn real_forward_of_constant_is_dc_only() {
        for placement in Placement::ALL {
            let mut a = adapter::<f64>(&[4, 6], TransformKind::RealToComplex, placement);
            a.allocate().unwrap();
            a.init_forward().unwrap();
            a.upload(&ones_f64(24)).unwrap();
            a.execute_forward().unwrap();
            let spectrum: &[Complex<f64>] = if placement.is_inplace() {
                bytemuck::cast_slice(&a.primary)
            } else {
                bytemuck::cast_slice(&a.secondary)
            };
            assert_eq!(spectrum.len(), 16);
            assert!((spectrum[0].re - 24.0).abs() < 1e-12);
            for c in &spectrum[1..] {
                assert!(c.norm() < 1e-12, "{placement}: {c}");
            }
        }
    }

    #[test]
    fn complex_impulse_gives_flat_spectrum() {
        let mut a = adapter::<f32>(&[2, 4], TransformKind::ComplexToComplex, Placement::OutOfPlace);
        let mut input = vec![Complex::<f32>::zero(); 8];
        input[0] = Complex::new(1.0, 0.0);
        a.allocate().unwrap();
        a.init_forward().unwrap();
        a.upload(bytemuck::cast_slice(&input)).unwrap();
        a.execute_forward().unwrap();
        let spectrum: &[Complex<f32>] = bytemuck::cast_slice(&a.secondary);
        for c in spectrum {
            assert!((c.re - 1.0).abs() < 1e-6 && c.im.abs() < 1e-6);
        }
    }

    #[test]
    fn inverse_plan_replaces_forward_plan() {
        let mut a = adapter::<f32>(&[8], TransformKind::RealToComplex, Placement::InPlace);
        a.allocate().unwrap();
        a.init_forward().unwrap();
        assert!(a.plan.as_ref().unwrap().r2c.is_some());
        a.init_inverse().unwrap();
        let plan = a.plan.as_ref().unwrap();
        assert!(plan.r2c.is_none() && plan.c2r.is_some());
    }

    #[test]
    fn estimate_leaves_no_plan_behind() {
        let mut a = adapter::<f64>(&[16, 16], TransformKind::RealToComplex, Placement::OutOfPlace);
        let bytes = a.plan_size_estimate().unwrap();
        assert!(bytes >= 16 * 8);
        assert!(a.plan.is_none());
        assert!(a.scratch.is_empty());
    }

    #[test]
    fn estimate_for_oversized_extent_is_arithmetic_only() {
        let a = adapter::<f32>(&[1 << 40], TransformKind::ComplexToComplex, Placement::InPlace);
        // 2 twiddle tables plus scratch and line, 8 bytes each
        assert_eq!(estimate_plan_bytes(&a.geometry, 4), (4u64 << 40) * 8);
        assert!(a.plan.is_none());

        let g = Configuration::new(
            TransformKind::RealToComplex,
            Placement::OutOfPlace,
            Precision::Double,
            Extent::new(vec![4, 6]).unwrap(),
        )
        .geometry()
        .unwrap();
        // outer axis 4: 8 twiddles, last axis 6: 6 twiddles, longest 4
        assert_eq!(estimate_plan_bytes(&g, 8), (8 + 6 + 8) * 16 + 6 * 8);
    }

    #[test]
    fn inverse_is_scaled_when_normalized() {
        let config = Configuration::new(
            TransformKind::ComplexToComplex,
            Placement::InPlace,
            Precision::Double,
            Extent::new(vec![8]).unwrap(),
        );
        let options = HostOptions { normalize: true };
        let mut a = HostAdapter::<f64>::with_options(&config, options).unwrap();
        let input: Vec<Complex<f64>> = (0..8).map(|i| Complex::new(i as f64, 1.0)).collect();
        a.allocate().unwrap();
        a.init_forward().unwrap();
        a.upload(bytemuck::cast_slice(&input)).unwrap();
        a.execute_forward().unwrap();
        a.execute_inverse().unwrap();
        let out: &[Complex<f64>] = bytemuck::cast_slice(&a.primary);
        for (x, y) in input.iter().zip(out) {
            assert!((x - y).norm() < 1e-12, "{x} vs {y}");
        }
    }

    #[test]
    fn destroy_releases_buffers() {
        let mut a = adapter::<f32>(&[32], TransformKind::ComplexToComplex, Placement::OutOfPlace);
        a.allocate().unwrap();
        assert_eq!(a.primary.len() * 4, a.geometry.data_size as usize);
        assert_eq!(a.secondary.len() * 4, a.geometry.complex_buffer_size as usize);
        a.destroy().unwrap();
        a.destroy().unwrap();
        assert!(a.primary.is_empty() && a.secondary.is_empty() && a.plan.is_none());
    }

    #[test]
    fn context_rejects_half_precision() {
        let ctx = HostContext::new(HostOptions::default(), 1 << 30);
        assert!(!ctx.is_normalized());
        let config = Configuration::new(
            TransformKind::ComplexToComplex,
            Placement::InPlace,
            Precision::Half,
            Extent::new(vec![16]).unwrap(),
        );
        let err = ctx.create_adapter(&config).err().unwrap();
        assert!(matches!(err, BenchError::UnsupportedPrecision { .. }));
        assert_eq!(ctx.plan_reuse(TransformKind::RealToComplex), PlanReuse::NotReusable);
        assert_eq!(ctx.plan_reuse(TransformKind::ComplexToComplex), PlanReuse::Reusable);
    }
}
