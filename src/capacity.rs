//! Pre-allocation admission check.
//!
//! A configuration is only allowed to allocate when both the device and the
//! host budget can hold it. Budgets are a fraction of the available bytes and
//! every sum saturates instead of wrapping.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::layout::Geometry;

pub const ENV_DEVICE_FRACTION: &str = "FFTBENCH_DEVICE_FRACTION";
pub const ENV_HOST_FRACTION: &str = "FFTBENCH_HOST_FRACTION";
pub const ENV_HOST_BUFFERS: &str = "FFTBENCH_HOST_BUFFERS";

/// Safety margins applied by [`check_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityLimits {
    /// Share of available device memory a configuration may claim.
    pub device_fraction: f64,
    /// Share of physical host memory the host-side buffers may claim.
    pub host_fraction: f64,
    /// Number of `transferSize` host buffers the driver keeps alive
    /// (input, output and scratch).
    pub host_buffer_multiplier: u64,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            device_fraction: 0.95,
            host_fraction: 0.95,
            host_buffer_multiplier: 3,
        }
    }
}

impl CapacityLimits {
    /// Defaults overridden by `FFTBENCH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CapacityLimits::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut limits = Self::default();
        if let Some(v) = lookup(ENV_DEVICE_FRACTION) {
            limits.device_fraction = parse_env(ENV_DEVICE_FRACTION, &v)?;
        }
        if let Some(v) = lookup(ENV_HOST_FRACTION) {
            limits.host_fraction = parse_env(ENV_HOST_FRACTION, &v)?;
        }
        if let Some(v) = lookup(ENV_HOST_BUFFERS) {
            limits.host_buffer_multiplier = parse_env(ENV_HOST_BUFFERS, &v)?;
        }
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, f) in [
            ("device_fraction", self.device_fraction),
            ("host_fraction", self.host_fraction),
        ] {
            if !(f > 0.0 && f <= 1.0) {
                return Err(BenchError::Config(format!(
                    "{name} must be in (0, 1], got {f}"
                )));
            }
        }
        if self.host_buffer_multiplier == 0 {
            return Err(BenchError::Config(
                "host_buffer_multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| BenchError::Config(format!("{key}={value:?} is not a valid value")))
}

/// Why a configuration was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsufficientMemory {
    #[error(
        "insufficient device memory: plan {plan} B + data {data} B + complex {complex} B = \
         {required} B exceeds budget {budget} B of {available} B available"
    )]
    Device {
        plan: u64,
        data: u64,
        complex: u64,
        required: u64,
        budget: u64,
        available: u64,
    },
    #[error(
        "insufficient host memory: {buffers} x transfer {transfer} B = {required} B \
         exceeds budget {budget} B of {available} B physical"
    )]
    Host {
        buffers: u64,
        transfer: u64,
        required: u64,
        budget: u64,
        available: u64,
    },
}

/// `floor(available * fraction)`, monotone in `available`.
pub fn budget(available: u64, fraction: f64) -> u64 {
    if fraction >= 1.0 {
        return available;
    }
    // float rounding and the saturating cast are both monotone
    let scaled = (available as f64 * fraction.max(0.0)).floor() as u64;
    scaled.min(available)
}

/// Decides whether `geometry` fits before anything is allocated.
///
/// The device check runs first; when both fail the device diagnostic wins.
pub fn check_capacity(
    geometry: &Geometry,
    estimated_plan_bytes: u64,
    available_device_bytes: u64,
    available_host_bytes: u64,
    limits: &CapacityLimits,
) -> core::result::Result<(), InsufficientMemory> {
    let required = estimated_plan_bytes
        .saturating_add(geometry.data_size)
        .saturating_add(geometry.complex_buffer_size);
    let device_budget = budget(available_device_bytes, limits.device_fraction);
    if required > device_budget {
        return Err(InsufficientMemory::Device {
            plan: estimated_plan_bytes,
            data: geometry.data_size,
            complex: geometry.complex_buffer_size,
            required,
            budget: device_budget,
            available: available_device_bytes,
        });
    }

    let host_required = limits
        .host_buffer_multiplier
        .saturating_mul(geometry.transfer_size);
    let host_budget = budget(available_host_bytes, limits.host_fraction);
    if host_required > host_budget {
        return Err(InsufficientMemory::Host {
            buffers: limits.host_buffer_multiplier,
            transfer: geometry.transfer_size,
            required: host_required,
            budget: host_budget,
            available: available_host_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{compute_geometry, Extent, Placement, Precision, TransformKind};
    use std::collections::HashMap;

    fn scenario_a() -> Geometry {
        compute_geometry(
            &Extent::new(vec![8]).unwrap(),
            TransformKind::RealToComplex,
            Placement::OutOfPlace,
            Precision::Single,
        )
        .unwrap()
    }

    #[test]
    fn budget_is_floor_of_fraction() {
        assert_eq!(budget(100, 0.95), 95);
        assert_eq!(budget(99, 0.5), 49);
        assert_eq!(budget(u64::MAX, 1.0), u64::MAX);
        assert!(budget(u64::MAX, 0.95) < u64::MAX);
    }

    #[test]
    fn device_check_names_byte_counts() {
        let g = scenario_a();
        let err = check_capacity(&g, 100, 100, u64::MAX, &CapacityLimits::default()).unwrap_err();
        match &err {
            InsufficientMemory::Device {
                required, budget, ..
            } => {
                assert_eq!(*required, 172);
                assert_eq!(*budget, 95);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("172 B"));
    }

    #[test]
    fn host_check_uses_multiplier() {
        let g = scenario_a();
        // 3 x 32 = 96 > floor(100 * 0.95)
        let err = check_capacity(&g, 0, u64::MAX, 100, &CapacityLimits::default()).unwrap_err();
        assert!(matches!(err, InsufficientMemory::Host { required: 96, .. }));
        assert!(check_capacity(&g, 0, u64::MAX, 102, &CapacityLimits::default()).is_ok());
    }

    #[test]
    fn saturating_plan_estimate_is_rejected() {
        let g = scenario_a();
        let err = check_capacity(&g, u64::MAX, u64::MAX, u64::MAX, &CapacityLimits::default());
        assert!(matches!(
            err,
            Err(InsufficientMemory::Device {
                required: u64::MAX,
                ..
            })
        ));
    }

    #[test]
    fn limits_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_DEVICE_FRACTION, "0.5"),
            (ENV_HOST_BUFFERS, "4"),
        ]
        .into_iter()
        .collect();
        let limits = CapacityLimits::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(limits.device_fraction, 0.5);
        assert_eq!(limits.host_fraction, 0.95);
        assert_eq!(limits.host_buffer_multiplier, 4);
    }

    #[test]
    fn invalid_env_values_are_fatal() {
        let bad = |k: &str| (k == ENV_HOST_FRACTION).then(|| "lots".to_string());
        assert!(CapacityLimits::from_lookup(bad).is_err());
        let zero = |k: &str| (k == ENV_DEVICE_FRACTION).then(|| "0".to_string());
        assert!(CapacityLimits::from_lookup(zero).is_err());
    }
}
