use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use fftbench::{compute_geometry, Extent, Placement, Precision, SuiteConfig, TransformKind};

fn bench_compute_geometry(c: &mut Criterion) {
    let extents: Vec<Extent> = ["1024", "4096x4096", "256x256x256", "1000x999"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    c.bench_function("compute_geometry", |b| {
        b.iter(|| {
            for e in &extents {
                for kind in TransformKind::ALL {
                    for placement in Placement::ALL {
                        black_box(
                            compute_geometry(black_box(e), kind, placement, Precision::Single)
                                .unwrap(),
                        );
                    }
                }
            }
        });
    });
}

fn bench_configurations(c: &mut Criterion) {
    let config = SuiteConfig {
        extents: (4..16)
            .map(|p| Extent::new(vec![1usize << p]).unwrap())
            .collect(),
        precisions: vec![Precision::Single, Precision::Double, Precision::Half],
        ..SuiteConfig::default()
    };
    c.bench_function("suite_configurations", |b| {
        b.iter(|| black_box(config.configurations()))
    });
}

criterion_group!(benches, bench_compute_geometry, bench_configurations);
criterion_main!(benches);
