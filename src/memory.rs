//! Host memory lookup used by the capacity check.

use log::warn;

use crate::error::{BenchError, Result};

pub const ENV_HOST_MEMORY_BYTES: &str = "FFTBENCH_HOST_MEMORY_BYTES";

/// Total physical host memory in bytes.
///
/// `FFTBENCH_HOST_MEMORY_BYTES` takes precedence over the platform lookup.
/// When nothing can be read the budget is unlimited.
pub fn physical_memory_bytes() -> Result<u64> {
    if let Ok(v) = std::env::var(ENV_HOST_MEMORY_BYTES) {
        return v.trim().parse::<u64>().map_err(|_| {
            BenchError::Config(format!("{ENV_HOST_MEMORY_BYTES}={v:?} is not a byte count"))
        });
    }
    Ok(system_memory().unwrap_or_else(|| {
        warn!("cannot determine physical memory, host capacity check disabled");
        u64::MAX
    }))
}

#[cfg(target_os = "linux")]
fn system_memory() -> Option<u64> {
    match procfs::Meminfo::new() {
        Ok(info) => Some(info.mem_total),
        Err(e) => {
            warn!("reading /proc/meminfo failed: {e}");
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn system_memory() -> Option<u64> {
    None
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    #[test]
    fn meminfo_reports_nonzero_total() {
        assert!(super::system_memory().unwrap_or(1) > 0);
    }
}
