use fftbench::backends::host::{HostAdapter, HostContext, HostOptions};
use fftbench::signal::{deviation, generate_input, ErrorBounds};
use fftbench::{
    BackendContext, Configuration, Extent, Lifecycle, LifecycleState, Placement, Precision, TransformAdapter,
    TransformKind,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(dims: &[usize], kind: TransformKind, placement: Placement, precision: Precision) -> Configuration {
    Configuration::new(kind, placement, precision, Extent::new(dims.to_vec()).unwrap())
}

fn boxed(configuration: &Configuration) -> Box<dyn TransformAdapter> {
    match configuration.precision {
        Precision::Single => Box::new(HostAdapter::<f32>::new(configuration).unwrap()),
        Precision::Double => Box::new(HostAdapter::<f64>::new(configuration).unwrap()),
        Precision::Half => unreachable!("host has no half adapter"),
    }
}

const SHAPES: &[&[usize]] = &[&[16], &[15], &[4, 6], &[5, 7], &[4, 4, 8], &[3, 5, 6]];

#[test]
fn download_returns_uploaded_bytes() {
    init_logging();
    // padded in-place real layouts must hide their padding from the host
    for dims in SHAPES {
        for kind in TransformKind::ALL {
            for placement in Placement::ALL {
                let c = config(dims, kind, placement, Precision::Single);
                let mut adapter = boxed(&c);
                let input = generate_input(adapter.geometry(), 7);
                adapter.allocate().unwrap();
                adapter.init_forward().unwrap();
                adapter.upload(&input).unwrap();
                let mut out = vec![0u8; input.len()];
                adapter.download(&mut out).unwrap();
                assert_eq!(out, input, "{c}");
                adapter.destroy().unwrap();
            }
        }
    }
}

#[test]
fn forward_then_inverse_recovers_input() {
    init_logging();
    let bounds = ErrorBounds::default();
    for dims in SHAPES {
        for kind in TransformKind::ALL {
            for placement in Placement::ALL {
                for precision in [Precision::Single, Precision::Double] {
                    let c = config(dims, kind, placement, precision);
                    let mut life = Lifecycle::new(boxed(&c));
                    let input = generate_input(life.geometry(), 42);
                    let mut output = vec![0u8; input.len()];

                    life.allocate().unwrap();
                    life.init_forward().unwrap();
                    life.upload(&input).unwrap();
                    life.execute_forward().unwrap();
                    if kind.is_real() {
                        life.init_inverse().unwrap();
                    }
                    life.execute_inverse().unwrap();
                    life.download(&mut output).unwrap();
                    assert_eq!(life.state(), LifecycleState::Downloaded);

                    let d = deviation(life.geometry(), &input, &output, false).unwrap();
                    assert!(bounds.accepts(precision, &d), "{c}: {d:?}");
                    life.destroy().unwrap();
                }
            }
        }
    }
}

#[test]
fn reused_complex_adapter_gives_same_result_each_trial() {
    let c = config(&[8, 8], TransformKind::ComplexToComplex, Placement::InPlace, Precision::Double);
    let mut life = Lifecycle::new(boxed(&c));
    let input = generate_input(life.geometry(), 1);
    let mut first = Vec::new();
    for trial in 0..3 {
        let mut output = vec![0u8; input.len()];
        life.allocate().unwrap();
        life.init_forward().unwrap();
        life.upload(&input).unwrap();
        life.execute_forward().unwrap();
        life.execute_inverse().unwrap();
        life.download(&mut output).unwrap();
        life.destroy().unwrap();
        life.rearm().unwrap();
        if trial == 0 {
            first = output;
        } else {
            assert_eq!(output, first);
        }
    }
}

#[test]
fn wrong_transfer_length_is_an_execution_error() {
    let c = config(&[8], TransformKind::RealToComplex, Placement::InPlace, Precision::Single);
    let mut life = Lifecycle::new(boxed(&c));
    life.allocate().unwrap();
    life.init_forward().unwrap();
    let err = life.upload(&[0u8; 40]).unwrap_err();
    assert_eq!(err.class(), fftbench::ErrorClass::Execution);
    assert_eq!(life.state(), LifecycleState::ForwardPlanned);
}

#[test]
fn scaling_option_decides_how_output_validates() {
    init_logging();
    let bounds = ErrorBounds::default();
    for normalize in [false, true] {
        let ctx = HostContext::new(HostOptions { normalize }, 1 << 30);
        assert_eq!(ctx.is_normalized(), normalize);
        for dims in [&[16][..], &[4, 6], &[3, 5, 6]] {
            for kind in TransformKind::ALL {
                for placement in Placement::ALL {
                    let c = config(dims, kind, placement, Precision::Double);
                    let mut life = Lifecycle::new(ctx.create_adapter(&c).unwrap());
                    let input = generate_input(life.geometry(), 3);
                    let mut output = vec![0u8; input.len()];
                    life.allocate().unwrap();
                    life.init_forward().unwrap();
                    life.upload(&input).unwrap();
                    life.execute_forward().unwrap();
                    if kind.is_real() {
                        life.init_inverse().unwrap();
                    }
                    life.execute_inverse().unwrap();
                    life.download(&mut output).unwrap();

                    let g = life.geometry();
                    let matching = deviation(g, &input, &output, normalize).unwrap();
                    let other = deviation(g, &input, &output, !normalize).unwrap();
                    assert!(bounds.accepts(Precision::Double, &matching), "{c}: {matching:?}");
                    assert!(!bounds.accepts(Precision::Double, &other), "{c}: {other:?}");
                    life.destroy().unwrap();
                }
            }
        }
    }
}
