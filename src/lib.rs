//! # fftbench - Phase-level FFT benchmarks across backends
//!
//! Measures every phase of an FFT's lifecycle (allocation, planning, upload,
//! forward and inverse execution, download, teardown) on interchangeable
//! backends, over the cross product of transform kind, placement, precision
//! and extents.
//!
//! ## Features
//!
//! - **Uniform geometry**: one layout calculator sizes buffers for every
//!   backend, including half-spectrum padding for in-place real transforms
//! - **Capacity guard**: configurations that would not fit in device or host
//!   memory are skipped before anything is allocated
//! - **Timed lifecycle**: a state machine enforces the phase order and times
//!   each phase with the backend's own timer
//! - **Skip vs. fail**: capability gaps are skipped, backend errors are
//!   failed, neither disturbs other configurations
//! - **Reports**: CSV, JSON lines and (optionally) SQLite
//!
//! ## Cargo Features
//!
//! - `cuda`: NVIDIA cuFFT backend (needs the CUDA toolkit at build time)
//! - `sqlite-report`: SQLite report sink
//!
//! ## Backends
//!
//! | Backend | Library | Precisions | Timer |
//! |---------|---------|------------|-------|
//! | `host`  | rustfft + realfft | single, double | wall clock |
//! | `cuda`  | cuFFT | single, double, half (CC >= 5.3) | CUDA events |
//!
//! ## Example
//!
//! ```no_run
//! use fftbench::backends::{create_context, Backend, ContextOptions};
//! use fftbench::report::MemorySink;
//! use fftbench::suite::{BenchmarkSuite, SuiteConfig};
//!
//! # fn main() -> fftbench::Result<()> {
//! let mut context = create_context(Backend::Host, ContextOptions::default())?;
//! let config = SuiteConfig {
//!     extents: vec!["1024".parse()?, "64x64".parse()?],
//!     ..SuiteConfig::default()
//! };
//! let mut sink = MemorySink::new();
//! let summary = BenchmarkSuite::new(context.as_ref(), config).run(&mut sink)?;
//! println!("{} ok, {} skipped", summary.ok, summary.skipped);
//! context.destroy()?;
//! # Ok(())
//! # }
//! ```

/// Lifecycle contract every backend implements, and its timed state machine.
pub mod adapter;
pub mod backends;
/// Pre-allocation memory admission.
pub mod capacity;
pub mod context;
pub mod error;
/// Extents, transform parameters and the buffer geometry derived from them.
pub mod layout;
pub mod memory;
/// Result records and report sinks.
pub mod report;
/// Seeded input generation and round-trip validation.
pub mod signal;
pub mod suite;
pub mod timer;

pub use adapter::{Lifecycle, LifecycleState, Phase, TransformAdapter};
pub use capacity::{check_capacity, CapacityLimits, InsufficientMemory};
pub use context::{BackendContext, DeviceCapabilities, PlanReuse};
pub use error::{BenchError, ErrorClass, Result};
pub use layout::{
    compute_geometry, Configuration, Extent, Geometry, Placement, Precision, RowPitch,
    TransformKind,
};
pub use report::{ReportHeader, ReportSink, ResultRecord, Status};
pub use suite::{BenchmarkSuite, SuiteConfig, SuiteSummary};
pub use timer::{HostTimer, Timer};
