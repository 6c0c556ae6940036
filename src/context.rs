//! Backend bring-up contract.
//!
//! A context is created once per process run, handed by reference to the
//! suite driver and destroyed once at the end. It answers capability queries
//! and builds one adapter per configuration.

use serde::Serialize;

use crate::adapter::TransformAdapter;
use crate::error::{BenchError, Result};
use crate::layout::{Configuration, Precision, TransformKind};

/// What the selected device can do right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCapabilities {
    pub supports_half_precision: bool,
    /// Free device memory; host backends report their host budget here.
    pub available_device_bytes: u64,
    pub device_description: String,
}

/// Whether one adapter instance may serve every trial of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanReuse {
    Reusable,
    NotReusable,
}

pub trait BackendContext {
    /// Backend title used in reports, e.g. `"rustfft"` or `"cufft 11.0.2"`.
    fn title(&self) -> &str;

    fn capabilities(&self) -> DeviceCapabilities;

    /// Physical host memory in bytes.
    fn available_host_bytes(&self) -> u64;

    fn plan_reuse(&self, kind: TransformKind) -> PlanReuse;

    /// `true` when inverse(forward(x)) == x without a `1/n` scale.
    fn is_normalized(&self) -> bool;

    /// Name of the timer the adapters of this backend use.
    fn timer_name(&self) -> &'static str {
        "wall"
    }

    /// Builds the adapter matching `configuration`.
    ///
    /// Fails with a configuration-class error on a capability gap. Never
    /// allocates transform buffers.
    fn create_adapter(&self, configuration: &Configuration) -> Result<Box<dyn TransformAdapter>>;

    /// Releases process-wide backend resources. Idempotent.
    fn destroy(&mut self) -> Result<()>;
}

/// Rejects precisions the device cannot execute.
pub fn ensure_precision_supported(
    capabilities: &DeviceCapabilities,
    precision: Precision,
) -> Result<()> {
    if precision == Precision::Half && !capabilities.supports_half_precision {
        return Err(BenchError::UnsupportedPrecision {
            precision,
            device: capabilities.device_description.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn half_is_gated_on_capability() {
        let mut caps = DeviceCapabilities {
            supports_half_precision: false,
            available_device_bytes: 0,
            device_description: "test device".into(),
        };
        let err = ensure_precision_supported(&caps, Precision::Half).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert!(err.to_string().contains("test device"));
        assert!(ensure_precision_supported(&caps, Precision::Double).is_ok());

        caps.supports_half_precision = true;
        assert!(ensure_precision_supported(&caps, Precision::Half).is_ok());
    }
}
