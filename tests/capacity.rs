use fftbench::capacity::{budget, check_capacity, CapacityLimits, InsufficientMemory};
use fftbench::layout::{compute_geometry, Extent, Placement, Precision, TransformKind};
use proptest::prelude::*;

fn geometry(dims: &[usize]) -> fftbench::Geometry {
    compute_geometry(
        &Extent::new(dims.to_vec()).unwrap(),
        TransformKind::ComplexToComplex,
        Placement::OutOfPlace,
        Precision::Double,
    )
    .unwrap()
}

#[test]
fn device_and_host_failures_are_distinct() {
    let g = geometry(&[1024]);
    let limits = CapacityLimits::default();
    let device = check_capacity(&g, 0, 1000, u64::MAX, &limits).unwrap_err();
    let host = check_capacity(&g, 0, u64::MAX, 1000, &limits).unwrap_err();
    assert!(matches!(device, InsufficientMemory::Device { .. }));
    assert!(matches!(host, InsufficientMemory::Host { .. }));
    assert!(device.to_string().contains("device"));
    assert!(host.to_string().contains("host"));
    assert_ne!(device.to_string(), host.to_string());
}

#[test]
fn exact_budget_is_accepted() {
    let g = geometry(&[8]);
    // plan 0 + data 128 + complex 128 = 256; 3 x 128 = 384
    let limits = CapacityLimits {
        device_fraction: 1.0,
        host_fraction: 1.0,
        host_buffer_multiplier: 3,
    };
    assert!(check_capacity(&g, 0, 256, 384, &limits).is_ok());
    assert!(check_capacity(&g, 1, 256, 384, &limits).is_err());
    assert!(check_capacity(&g, 0, 256, 383, &limits).is_err());
}

#[test]
fn insufficient_memory_is_a_skip() {
    let g = geometry(&[8]);
    let err: fftbench::BenchError = check_capacity(&g, 0, 0, 0, &CapacityLimits::default())
        .unwrap_err()
        .into();
    assert_eq!(err.class(), fftbench::ErrorClass::Configuration);
}

proptest! {
    #[test]
    fn budget_is_monotone(a in any::<u64>(), b in any::<u64>(), f in 0.01f64..1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(budget(lo, f) <= budget(hi, f));
        prop_assert!(budget(hi, f) <= hi);
    }

    #[test]
    fn more_memory_never_turns_go_into_no_go(
        len in 1usize..4096,
        plan in 0u64..1 << 20,
        device in 0u64..1 << 24,
        host in 0u64..1 << 24,
        extra_device in 0u64..1 << 24,
        extra_host in 0u64..1 << 24,
    ) {
        let g = geometry(&[len]);
        let limits = CapacityLimits::default();
        if check_capacity(&g, plan, device, host, &limits).is_ok() {
            prop_assert!(check_capacity(&g, plan, device + extra_device, host + extra_host, &limits).is_ok());
        }
    }
}
