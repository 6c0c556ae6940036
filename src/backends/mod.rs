//! Backend selection.
//!
//! The host backend is always built; cuFFT needs the `cuda` feature.

use core::fmt;
use core::str::FromStr;

use serde::Serialize;

use crate::context::BackendContext;
use crate::error::{BenchError, Result};

#[cfg(feature = "cuda")]
pub mod cuda;
pub mod host;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Host,
    Cuda,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Host, Backend::Cuda];

    /// Whether this build can create the backend at all.
    pub fn is_compiled(self) -> bool {
        match self {
            Backend::Host => true,
            Backend::Cuda => cfg!(feature = "cuda"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Host => "host",
            Backend::Cuda => "cuda",
        })
    }
}

impl FromStr for Backend {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" | "cpu" | "rustfft" => Ok(Backend::Host),
            "cuda" | "cufft" => Ok(Backend::Cuda),
            other => Err(BenchError::Config(format!("unknown backend {other:?}"))),
        }
    }
}

/// Bring-up options shared by all backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOptions {
    /// Device ordinal; ignored by the host backend.
    pub device: usize,
    /// Scale inverse transforms by `1/n`; cuFFT never scales.
    pub normalize: bool,
}

/// One entry of `--list-devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub ordinal: usize,
    pub name: String,
    pub compute_capability: Option<(i32, i32)>,
    pub total_memory: u64,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"ID\",{},\"{}\"", self.ordinal, self.name)?;
        if let Some((major, minor)) = self.compute_capability {
            write!(f, ",\"CC\",\"{major}.{minor}\"")?;
        }
        write!(f, ",\"Memory [MiB]\",{}", self.total_memory >> 20)
    }
}

pub fn create_context(backend: Backend, options: ContextOptions) -> Result<Box<dyn BackendContext>> {
    match backend {
        Backend::Host => Ok(Box::new(host::HostContext::create(host::HostOptions {
            normalize: options.normalize,
        })?)),
        #[cfg(feature = "cuda")]
        Backend::Cuda => Ok(Box::new(cuda::CudaBackendContext::create(options)?)),
        #[cfg(not(feature = "cuda"))]
        Backend::Cuda => {
            let _ = options;
            Err(BenchError::ContextUnavailable(
                "built without the `cuda` feature".into(),
            ))
        }
    }
}

pub fn list_devices(backend: Backend) -> Result<Vec<DeviceInfo>> {
    match backend {
        Backend::Host => Ok(vec![DeviceInfo {
            ordinal: 0,
            name: format!("CPU ({} threads)", num_cpus::get()),
            compute_capability: None,
            total_memory: crate::memory::physical_memory_bytes()?,
        }]),
        #[cfg(feature = "cuda")]
        Backend::Cuda => cuda::list_devices(),
        #[cfg(not(feature = "cuda"))]
        Backend::Cuda => Err(BenchError::ContextUnavailable(
            "built without the `cuda` feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip() {
        for b in Backend::ALL {
            assert_eq!(b.to_string().parse::<Backend>().unwrap(), b);
        }
        assert_eq!("cuFFT".parse::<Backend>().unwrap(), Backend::Cuda);
        assert!("opencl".parse::<Backend>().is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cuda_without_feature_is_fatal() {
        let err = create_context(Backend::Cuda, ContextOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.class(), crate::error::ErrorClass::Fatal);
    }

    #[test]
    fn host_context_follows_scaling_option() {
        for normalize in [false, true] {
            let options = ContextOptions { device: 0, normalize };
            let ctx = create_context(Backend::Host, options).unwrap();
            assert_eq!(ctx.is_normalized(), normalize);
        }
    }
}
