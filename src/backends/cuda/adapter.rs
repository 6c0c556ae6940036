//! cuFFT transform adapter.

use std::ffi::{c_int, c_longlong, c_void};
use std::ptr;
use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DevicePtrMut};
use log::debug;

use super::sys::{self, check, cufftHandle, cufftType};
use super::timer::CudaEventTimer;
use crate::adapter::TransformAdapter;
use crate::error::{BenchError, Result};
use crate::layout::{Configuration, Geometry, Precision, TransformKind};
use crate::timer::Timer;

const BACKEND: &str = "cuda";

/// Owned cuFFT plan, destroyed on drop.
struct PlanHandle(cufftHandle);

impl PlanHandle {
    fn create() -> Result<Self> {
        let mut handle: cufftHandle = 0;
        check(unsafe { sys::cufftCreate(&mut handle) }, "cufftCreate")?;
        Ok(Self(handle))
    }

    fn release(self) -> Result<()> {
        let handle = self.0;
        std::mem::forget(self);
        check(unsafe { sys::cufftDestroy(handle) }, "cufftDestroy")
    }
}

impl Drop for PlanHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = sys::cufftDestroy(self.0);
        }
    }
}

/// Which cuFFT API builds the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanApi {
    /// `cufftPlan{1,2,3}d`
    Basic,
    /// `cufftMakePlanMany64`
    Wide,
    /// `cufftXtMakePlanMany` with 16-bit data types
    Half,
}

/// Transform type for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

fn plan_api(geometry: &Geometry) -> PlanApi {
    if geometry.precision == Precision::Half {
        PlanApi::Half
    } else if geometry.use_wide_indexing {
        PlanApi::Wide
    } else {
        PlanApi::Basic
    }
}

fn cufft_type(kind: TransformKind, precision: Precision, direction: Direction) -> cufftType {
    match (kind, precision, direction) {
        (TransformKind::ComplexToComplex, Precision::Double, _) => sys::CUFFT_Z2Z,
        (TransformKind::ComplexToComplex, _, _) => sys::CUFFT_C2C,
        (TransformKind::RealToComplex, Precision::Double, Direction::Forward) => sys::CUFFT_D2Z,
        (TransformKind::RealToComplex, Precision::Double, Direction::Inverse) => sys::CUFFT_Z2D,
        (TransformKind::RealToComplex, _, Direction::Forward) => sys::CUFFT_R2C,
        (TransformKind::RealToComplex, _, Direction::Inverse) => sys::CUFFT_C2R,
    }
}

/// Input, output and execution data types of a half-precision plan.
fn half_types(kind: TransformKind, direction: Direction) -> (sys::cudaDataType, sys::cudaDataType) {
    match (kind, direction) {
        (TransformKind::ComplexToComplex, _) => (sys::CUDA_C_16F, sys::CUDA_C_16F),
        (TransformKind::RealToComplex, Direction::Forward) => (sys::CUDA_R_16F, sys::CUDA_C_16F),
        (TransformKind::RealToComplex, Direction::Inverse) => (sys::CUDA_C_16F, sys::CUDA_R_16F),
    }
}

fn narrow_dims(geometry: &Geometry, operation: &'static str) -> Result<Vec<c_int>> {
    geometry
        .extents
        .dims()
        .iter()
        .map(|&d| {
            c_int::try_from(d).map_err(|_| {
                BenchError::backend(BACKEND, operation, format!("extent {d} exceeds 32 bits"))
            })
        })
        .collect()
}

fn wide_dims(geometry: &Geometry) -> Vec<c_longlong> {
    geometry
        .extents
        .dims()
        .iter()
        .map(|&d| d as c_longlong)
        .collect()
}

/// Builds a plan on `handle`, or only sizes it when `size_only` is set.
fn make_plan(
    handle: &mut cufftHandle,
    geometry: &Geometry,
    direction: Direction,
    size_only: bool,
) -> Result<usize> {
    let ty = cufft_type(geometry.kind, geometry.precision, direction);
    let mut work: usize = 0;
    match plan_api(geometry) {
        PlanApi::Basic => {
            let n = narrow_dims(geometry, "cufftPlan")?;
            let h = *handle;
            let (code, op) = match (n.as_slice(), size_only) {
                ([nx], false) => (unsafe { sys::cufftPlan1d(handle, *nx, ty, 1) }, "cufftPlan1d"),
                ([nx, ny], false) => (unsafe { sys::cufftPlan2d(handle, *nx, *ny, ty) }, "cufftPlan2d"),
                ([nx, ny, nz], false) => (
                    unsafe { sys::cufftPlan3d(handle, *nx, *ny, *nz, ty) },
                    "cufftPlan3d",
                ),
                ([nx], true) => (
                    unsafe { sys::cufftGetSize1d(h, *nx, ty, 1, &mut work) },
                    "cufftGetSize1d",
                ),
                ([nx, ny], true) => (
                    unsafe { sys::cufftGetSize2d(h, *nx, *ny, ty, &mut work) },
                    "cufftGetSize2d",
                ),
                ([nx, ny, nz], true) => (
                    unsafe { sys::cufftGetSize3d(h, *nx, *ny, *nz, ty, &mut work) },
                    "cufftGetSize3d",
                ),
                _ => {
                    return Err(BenchError::backend(BACKEND, "cufftPlan", "rank must be 1..=3"))
                }
            };
            check(code, op)?;
        }
        PlanApi::Wide => {
            let mut n = wide_dims(geometry);
            let rank = n.len() as c_int;
            let null = ptr::null_mut();
            let code = unsafe {
                if size_only {
                    sys::cufftGetSizeMany64(
                        *handle, rank, n.as_mut_ptr(), null, 1, 0, null, 1, 0, ty, 1, &mut work,
                    )
                } else {
                    sys::cufftMakePlanMany64(
                        *handle, rank, n.as_mut_ptr(), null, 1, 0, null, 1, 0, ty, 1, &mut work,
                    )
                }
            };
            check(code, if size_only { "cufftGetSizeMany64" } else { "cufftMakePlanMany64" })?;
        }
        PlanApi::Half => {
            let mut n = wide_dims(geometry);
            let rank = n.len() as c_int;
            let (input, output) = half_types(geometry.kind, direction);
            let null = ptr::null_mut();
            let code = unsafe {
                if size_only {
                    sys::cufftXtGetSizeMany(
                        *handle,
                        rank,
                        n.as_mut_ptr(),
                        null,
                        1,
                        0,
                        input,
                        null,
                        1,
                        0,
                        output,
                        1,
                        &mut work,
                        sys::CUDA_C_16F,
                    )
                } else {
                    sys::cufftXtMakePlanMany(
                        *handle,
                        rank,
                        n.as_mut_ptr(),
                        null,
                        1,
                        0,
                        input,
                        null,
                        1,
                        0,
                        output,
                        1,
                        &mut work,
                        sys::CUDA_C_16F,
                    )
                }
            };
            check(code, if size_only { "cufftXtGetSizeMany" } else { "cufftXtMakePlanMany" })?;
        }
    }
    Ok(work)
}

pub struct CudaAdapter {
    geometry: Geometry,
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    timer: Arc<CudaEventTimer>,
    plan: Option<PlanHandle>,
    primary: Option<CudaSlice<u8>>,
    secondary: Option<CudaSlice<u8>>,
}

impl CudaAdapter {
    pub fn new(
        configuration: &Configuration,
        ctx: Arc<CudaContext>,
        stream: Arc<CudaStream>,
    ) -> Result<Self> {
        let geometry = configuration.geometry()?;
        let timer = Arc::new(CudaEventTimer::new(&ctx, stream.clone())?);
        Ok(Self {
            geometry,
            ctx,
            stream,
            timer,
            plan: None,
            primary: None,
            secondary: None,
        })
    }

    fn bind(&self, operation: &'static str) -> Result<()> {
        self.ctx
            .bind_to_thread()
            .map_err(|e| BenchError::backend(BACKEND, operation, e.to_string()))
    }

    fn build_plan(&mut self, direction: Direction) -> Result<()> {
        let operation = match direction {
            Direction::Forward => "init_forward",
            Direction::Inverse => "init_inverse",
        };
        self.bind(operation)?;
        if let Some(old) = self.plan.take() {
            old.release()?;
        }
        let api = plan_api(&self.geometry);
        let (plan, work) = match api {
            PlanApi::Basic => {
                // cufftPlan*d creates the handle itself
                let mut raw: cufftHandle = 0;
                let work = make_plan(&mut raw, &self.geometry, direction, false)?;
                (PlanHandle(raw), work)
            }
            PlanApi::Wide | PlanApi::Half => {
                let plan = PlanHandle::create()?;
                let mut raw = plan.0;
                let work = make_plan(&mut raw, &self.geometry, direction, false)?;
                (plan, work)
            }
        };
        check(
            unsafe { sys::cufftSetStream(plan.0, self.stream.cu_stream() as sys::cudaStream_t) },
            "cufftSetStream",
        )?;
        debug!("cufft {api:?} plan, {work} bytes workspace");
        self.plan = Some(plan);
        Ok(())
    }

    fn execute(&mut self, direction: Direction) -> Result<()> {
        let operation = match direction {
            Direction::Forward => "execute_forward",
            Direction::Inverse => "execute_inverse",
        };
        let missing = |what: &str| BenchError::backend(BACKEND, operation, format!("no {what}"));
        let handle = self.plan.as_ref().ok_or_else(|| missing("plan"))?.0;
        let stream = &self.stream;
        let primary = self.primary.as_mut().ok_or_else(|| missing("data buffer"))?;
        let (primary_ptr, _primary_sync) = primary.device_ptr_mut(stream);
        let primary_ptr = primary_ptr as *mut c_void;
        let mut secondary_sync = None;
        let secondary_ptr = match self.secondary.as_mut() {
            Some(buf) => {
                let (p, sync) = buf.device_ptr_mut(stream);
                secondary_sync = Some(sync);
                p as *mut c_void
            }
            None => primary_ptr,
        };
        let (input, output) = match direction {
            Direction::Forward => (primary_ptr, secondary_ptr),
            Direction::Inverse => (secondary_ptr, primary_ptr),
        };
        let kind = self.geometry.kind;
        let (code, call) = unsafe {
            match (self.geometry.precision, kind, direction) {
                (Precision::Half, _, Direction::Forward) => {
                    (sys::cufftXtExec(handle, input, output, sys::CUFFT_FORWARD), "cufftXtExec")
                }
                (Precision::Half, _, Direction::Inverse) => {
                    (sys::cufftXtExec(handle, input, output, sys::CUFFT_INVERSE), "cufftXtExec")
                }
                (Precision::Single, TransformKind::ComplexToComplex, d) => (
                    sys::cufftExecC2C(handle, input, output, sign(d)),
                    "cufftExecC2C",
                ),
                (Precision::Double, TransformKind::ComplexToComplex, d) => (
                    sys::cufftExecZ2Z(handle, input, output, sign(d)),
                    "cufftExecZ2Z",
                ),
                (Precision::Single, TransformKind::RealToComplex, Direction::Forward) => {
                    (sys::cufftExecR2C(handle, input, output), "cufftExecR2C")
                }
                (Precision::Single, TransformKind::RealToComplex, Direction::Inverse) => {
                    (sys::cufftExecC2R(handle, input, output), "cufftExecC2R")
                }
                (Precision::Double, TransformKind::RealToComplex, Direction::Forward) => {
                    (sys::cufftExecD2Z(handle, input, output), "cufftExecD2Z")
                }
                (Precision::Double, TransformKind::RealToComplex, Direction::Inverse) => {
                    (sys::cufftExecZ2D(handle, input, output), "cufftExecZ2D")
                }
            }
        };
        drop(secondary_sync);
        check(code, call)
    }
}

fn sign(direction: Direction) -> c_int {
    match direction {
        Direction::Forward => sys::CUFFT_FORWARD,
        Direction::Inverse => sys::CUFFT_INVERSE,
    }
}

fn device_alloc(
    stream: &Arc<CudaStream>,
    bytes: u64,
    buffer: &'static str,
) -> Result<CudaSlice<u8>> {
    let fail = || BenchError::Allocation {
        backend: BACKEND,
        buffer,
        bytes,
    };
    let len = usize::try_from(bytes).map_err(|_| fail())?;
    stream.alloc_zeros::<u8>(len).map_err(|_| fail())
}

impl TransformAdapter for CudaAdapter {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn timer(&self) -> Arc<dyn Timer> {
        self.timer.clone()
    }

    fn plan_size_estimate(&mut self) -> Result<u64> {
        self.bind("plan_size_estimate")?;
        let mut directions = vec![Direction::Forward];
        if self.geometry.kind.is_real() {
            directions.push(Direction::Inverse);
        }
        let mut estimate = 0u64;
        for direction in directions {
            let temp = PlanHandle::create()?;
            let mut raw = temp.0;
            let work = make_plan(&mut raw, &self.geometry, direction, true)?;
            temp.release()?;
            estimate = estimate.max(work as u64);
        }
        Ok(estimate)
    }

    fn allocate(&mut self) -> Result<()> {
        self.bind("allocate")?;
        self.primary = Some(device_alloc(&self.stream, self.geometry.data_size, "data")?);
        if !self.geometry.placement.is_inplace() {
            self.secondary = Some(device_alloc(
                &self.stream,
                self.geometry.complex_buffer_size,
                "complex",
            )?);
        }
        Ok(())
    }

    fn init_forward(&mut self) -> Result<()> {
        self.build_plan(Direction::Forward)
    }

    fn init_inverse(&mut self) -> Result<()> {
        if !self.geometry.kind.is_real() {
            return Ok(());
        }
        self.build_plan(Direction::Inverse)
    }

    fn upload(&mut self, host: &[u8]) -> Result<()> {
        self.geometry.check_transfer("upload", host.len())?;
        let err = |e: cudarc::driver::DriverError| BenchError::backend(BACKEND, "upload", e.to_string());
        let buf = self
            .primary
            .as_mut()
            .ok_or_else(|| BenchError::backend(BACKEND, "upload", "no data buffer"))?;
        match self.geometry.row_pitch() {
            Some(p) => {
                let (width, pitch) = (p.width as usize, p.pitch as usize);
                for (r, row) in host.chunks_exact(width).enumerate() {
                    let off = r * pitch;
                    let mut dst = buf
                        .try_slice_mut(off..off + width)
                        .ok_or_else(|| BenchError::backend(BACKEND, "upload", "row outside buffer"))?;
                    self.stream.memcpy_htod(row, &mut dst).map_err(err)?;
                }
            }
            None => {
                let mut dst = buf
                    .try_slice_mut(0..host.len())
                    .ok_or_else(|| BenchError::backend(BACKEND, "upload", "buffer too small"))?;
                self.stream.memcpy_htod(host, &mut dst).map_err(err)?;
            }
        }
        Ok(())
    }

    fn execute_forward(&mut self) -> Result<()> {
        self.execute(Direction::Forward)
    }

    fn execute_inverse(&mut self) -> Result<()> {
        self.execute(Direction::Inverse)
    }

    fn download(&mut self, host: &mut [u8]) -> Result<()> {
        self.geometry.check_transfer("download", host.len())?;
        let err =
            |e: cudarc::driver::DriverError| BenchError::backend(BACKEND, "download", e.to_string());
        let buf = self
            .primary
            .as_ref()
            .ok_or_else(|| BenchError::backend(BACKEND, "download", "no data buffer"))?;
        match self.geometry.row_pitch() {
            Some(p) => {
                let (width, pitch) = (p.width as usize, p.pitch as usize);
                for (r, row) in host.chunks_exact_mut(width).enumerate() {
                    let off = r * pitch;
                    let src = buf
                        .try_slice(off..off + width)
                        .ok_or_else(|| BenchError::backend(BACKEND, "download", "row outside buffer"))?;
                    self.stream.memcpy_dtoh(&src, row).map_err(err)?;
                }
            }
            None => {
                let len = host.len();
                let src = buf
                    .try_slice(0..len)
                    .ok_or_else(|| BenchError::backend(BACKEND, "download", "buffer too small"))?;
                self.stream.memcpy_dtoh(&src, host).map_err(err)?;
            }
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        let plan = self.plan.take();
        self.primary = None;
        self.secondary = None;
        match plan {
            Some(plan) => plan.release(),
            None => Ok(()),
        }
    }
}
