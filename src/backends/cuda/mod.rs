//! cuFFT backend.
//!
//! `cudarc` owns the context, stream, device memory and events; cuFFT itself
//! is reached through the hand-written bindings in [`sys`].

pub mod adapter;
pub mod sys;
pub mod timer;

use std::sync::Arc;

use cudarc::driver::{sys as cu, CudaContext, CudaStream};
use log::{info, warn};

use crate::adapter::TransformAdapter;
use crate::backends::{ContextOptions, DeviceInfo};
use crate::context::{ensure_precision_supported, BackendContext, DeviceCapabilities, PlanReuse};
use crate::error::{BenchError, Result};
use crate::layout::{Configuration, TransformKind};
use crate::memory;

pub use adapter::CudaAdapter;
pub use timer::CudaEventTimer;

fn unavailable(e: cudarc::driver::DriverError) -> BenchError {
    BenchError::ContextUnavailable(e.to_string())
}

fn compute_capability(ctx: &CudaContext) -> Result<(i32, i32)> {
    let major = ctx
        .attribute(cu::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)
        .map_err(unavailable)?;
    let minor = ctx
        .attribute(cu::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)
        .map_err(unavailable)?;
    Ok((major, minor))
}

/// Native half-precision arithmetic starts with compute capability 5.3.
pub fn supports_half(cc: (i32, i32)) -> bool {
    cc.0 > 5 || (cc.0 == 5 && cc.1 >= 3)
}

/// Free and total memory of the context's device.
fn mem_info(ctx: &CudaContext) -> Result<(u64, u64)> {
    ctx.bind_to_thread().map_err(unavailable)?;
    let (free, total) = cudarc::driver::result::mem_get_info().map_err(unavailable)?;
    Ok((free as u64, total as u64))
}

fn device_count() -> Result<usize> {
    let count = CudaContext::device_count().map_err(unavailable)?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn cufft_version() -> Result<String> {
    let mut version = 0;
    sys::check(unsafe { sys::cufftGetVersion(&mut version) }, "cufftGetVersion")?;
    Ok(format!(
        "{}.{}.{}",
        version / 1000,
        (version % 1000) / 100,
        version % 100
    ))
}

pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let count = device_count()?;
    let mut devices = Vec::with_capacity(count);
    for ordinal in 0..count {
        if options.normalize {
            warn!("cuFFT does not scale inverse transforms, ignoring normalization");
        }
        let ctx = CudaContext::new(ordinal).map_err(unavailable)?;
        let name = ctx.name().map_err(unavailable)?;
        let (_, total) = mem_info(&ctx)?;
        devices.push(DeviceInfo {
            ordinal,
            name,
            compute_capability: Some(compute_capability(&ctx)?),
            total_memory: total,
        });
    }
    Ok(devices)
}

pub struct CudaBackendContext {
    ctx: Option<Arc<CudaContext>>,
    stream: Option<Arc<CudaStream>>,
    title: String,
    description: String,
    supports_half: bool,
    total_memory: u64,
    host_bytes: u64,
}

impl CudaBackendContext {
    pub fn create(options: ContextOptions) -> Result<Self> {
        let count = device_count()?;
        if count == 0 {
            return Err(BenchError::ContextUnavailable("no CUDA device found".into()));
        }
        let ordinal = if options.device < count {
            options.device
        } else {
            warn!(
                "device {} out of range ({count} devices), using device 0",
                options.device
            );
            0
        };
        let ctx = CudaContext::new(ordinal).map_err(unavailable)?;
        let stream = ctx.default_stream();
        let cc = compute_capability(&ctx)?;
        let name = ctx.name().map_err(unavailable)?;
        let (free, total) = mem_info(&ctx)?;
        let title = format!("cufft {}", cufft_version()?);
        let description = format!(
            "\"ID\",{ordinal},\"{name}\",\"CC\",\"{}.{}\",\"Memory [MiB]\",{},\"Free [MiB]\",{}",
            cc.0,
            cc.1,
            total >> 20,
            free >> 20
        );
        info!("{title} on {description}");
        Ok(Self {
            ctx: Some(ctx),
            stream: Some(stream),
            title,
            description,
            supports_half: supports_half(cc),
            total_memory: total,
            host_bytes: memory::physical_memory_bytes()?,
        })
    }

    fn live(&self) -> Result<(&Arc<CudaContext>, &Arc<CudaStream>)> {
        match (&self.ctx, &self.stream) {
            (Some(ctx), Some(stream)) => Ok((ctx, stream)),
            _ => Err(BenchError::ContextUnavailable("cuda context destroyed".into())),
        }
    }
}

impl BackendContext for CudaBackendContext {
    fn title(&self) -> &str {
        &self.title
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let available = match self.live().and_then(|(ctx, _)| mem_info(ctx)) {
            Ok((free, _)) => free,
            Err(e) => {
                warn!("cannot query free device memory ({e}), using total");
                self.total_memory
            }
        };
        DeviceCapabilities {
            supports_half_precision: self.supports_half,
            available_device_bytes: available,
            device_description: self.description.clone(),
        }
    }

    fn available_host_bytes(&self) -> u64 {
        self.host_bytes
    }

    fn plan_reuse(&self, _kind: TransformKind) -> PlanReuse {
        PlanReuse::Reusable
    }

    fn is_normalized(&self) -> bool {
        false
    }

    fn timer_name(&self) -> &'static str {
        "cuda-event"
    }

    fn create_adapter(&self, configuration: &Configuration) -> Result<Box<dyn TransformAdapter>> {
        let (ctx, stream) = self.live()?;
        ensure_precision_supported(&self.capabilities(), configuration.precision)?;
        Ok(Box::new(CudaAdapter::new(
            configuration,
            ctx.clone(),
            stream.clone(),
        )?))
    }

    fn destroy(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream
                .synchronize()
                .map_err(|e| BenchError::backend("cuda", "cuStreamSynchronize", e.to_string()))?;
        }
        self.ctx = None;
        Ok(())
    }
}
