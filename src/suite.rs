//! Benchmark suite driver.
//!
//! Walks the configuration cross product, admits each configuration through
//! the capacity check and drives its lifecycle for every trial. Each timed
//! phase becomes one [`ResultRecord`]. Configuration-class errors are
//! recorded as skipped, execution-class errors as failed, and fatal errors
//! abort the suite.

use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::adapter::{Lifecycle, Phase};
use crate::capacity::{check_capacity, CapacityLimits};
use crate::context::{BackendContext, PlanReuse};
use crate::error::{BenchError, ErrorClass, Result};
use crate::layout::{Configuration, Extent, Placement, Precision, TransformKind};
use crate::report::{ReportHeader, ReportSink, ResultRecord, Status};
use crate::signal::{deviation, generate_input, ErrorBounds};

/// Parameter space and trial settings of one suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    pub extents: Vec<Extent>,
    pub kinds: Vec<TransformKind>,
    pub placements: Vec<Placement>,
    pub precisions: Vec<Precision>,
    pub runs: usize,
    pub warmups: usize,
    pub validate: bool,
    pub seed: u64,
    pub limits: CapacityLimits,
    pub error_bounds: ErrorBounds,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            extents: Vec::new(),
            kinds: TransformKind::ALL.to_vec(),
            placements: Placement::ALL.to_vec(),
            precisions: vec![Precision::Single, Precision::Double],
            runs: 5,
            warmups: 1,
            validate: true,
            seed: 42,
            limits: CapacityLimits::default(),
            error_bounds: ErrorBounds::default(),
        }
    }
}

impl SuiteConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BenchError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extents.is_empty() {
            return Err(BenchError::Config("no extents given".into()));
        }
        if self.kinds.is_empty() || self.placements.is_empty() || self.precisions.is_empty() {
            return Err(BenchError::Config(
                "kinds, placements and precisions must not be empty".into(),
            ));
        }
        if self.runs == 0 {
            return Err(BenchError::Config("runs must be at least 1".into()));
        }
        self.limits.validate()
    }

    /// The cross product in run order, transform kind outermost.
    pub fn configurations(&self) -> Vec<Configuration> {
        let mut out = Vec::with_capacity(
            self.kinds.len() * self.placements.len() * self.precisions.len() * self.extents.len(),
        );
        for &kind in &self.kinds {
            for &placement in &self.placements {
                for &precision in &self.precisions {
                    for extents in &self.extents {
                        out.push(Configuration::new(kind, placement, precision, extents.clone()));
                    }
                }
            }
        }
        out
    }
}

/// Per-configuration outcome counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SuiteSummary {
    fn add(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::Skipped => self.skipped += 1,
            Status::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.skipped + self.failed
    }
}

pub struct BenchmarkSuite<'a> {
    context: &'a dyn BackendContext,
    config: SuiteConfig,
}

impl<'a> BenchmarkSuite<'a> {
    pub fn new(context: &'a dyn BackendContext, config: SuiteConfig) -> Self {
        Self { context, config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Runs every configuration and reports into `sink`.
    pub fn run(&self, sink: &mut dyn ReportSink) -> Result<SuiteSummary> {
        self.config.validate()?;
        let caps = self.context.capabilities();
        let header = ReportHeader::now(
            self.context.title(),
            &caps.device_description,
            self.context.timer_name(),
        );
        sink.begin(&header)?;

        let configurations = self.config.configurations();
        info!(
            "{}: {} configurations, {} warmups + {} runs each",
            self.context.title(),
            configurations.len(),
            self.config.warmups,
            self.config.runs
        );
        let mut summary = SuiteSummary::default();
        for configuration in &configurations {
            let status = self.run_configuration(configuration, sink)?;
            summary.add(status);
        }
        sink.finish()?;
        info!(
            "done: {} ok, {} skipped, {} failed",
            summary.ok, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    fn record(&self, configuration: &Configuration, phase: Phase, status: Status) -> ResultRecord {
        ResultRecord::new(self.context.title(), configuration, phase, status)
    }

    /// Emits the skip/failure record for `err`, or hands a fatal error back.
    fn classify(
        &self,
        configuration: &Configuration,
        phase: Phase,
        trial: Option<(usize, bool)>,
        err: BenchError,
        sink: &mut dyn ReportSink,
    ) -> Result<Status> {
        let status = match err.class() {
            ErrorClass::Configuration => {
                warn!("skipping {configuration}: {err}");
                Status::Skipped
            }
            ErrorClass::Execution => {
                error!("{configuration} failed in {phase}: {err}");
                Status::Failed
            }
            ErrorClass::Fatal => return Err(err),
        };
        let mut record = self.record(configuration, phase, status);
        if let Some((run, warmup)) = trial {
            record.run = run;
            record.warmup = warmup;
        }
        record.message = Some(err.to_string());
        sink.record(&record)?;
        Ok(status)
    }

    /// Runs all trials of one configuration.
    ///
    /// The adapter is destroyed on every path out of this function.
    pub fn run_configuration(
        &self,
        configuration: &Configuration,
        sink: &mut dyn ReportSink,
    ) -> Result<Status> {
        debug!("configuration {configuration}");
        let mut lifecycle = match self.context.create_adapter(configuration) {
            Ok(adapter) => Lifecycle::new(adapter),
            Err(e) => return self.classify(configuration, Phase::Setup, None, e, sink),
        };

        if let Err(e) = self.admit(&mut lifecycle) {
            release(&mut lifecycle);
            return self.classify(configuration, Phase::Setup, None, e, sink);
        }

        let geometry = lifecycle.geometry().clone();
        let input = generate_input(&geometry, self.config.seed);
        let mut output = vec![0u8; input.len()];
        let reuse = self.context.plan_reuse(configuration.kind);

        let trials = self.config.warmups + self.config.runs;
        for trial in 0..trials {
            let warmup = trial < self.config.warmups;
            let run = if warmup {
                trial
            } else {
                trial - self.config.warmups
            };

            if trial > 0 {
                match reuse {
                    PlanReuse::Reusable => lifecycle.rearm()?,
                    PlanReuse::NotReusable => match self.context.create_adapter(configuration) {
                        Ok(adapter) => lifecycle = Lifecycle::new(adapter),
                        Err(e) => {
                            return self.classify(
                                configuration,
                                Phase::Setup,
                                Some((run, warmup)),
                                e,
                                sink,
                            )
                        }
                    },
                }
            }

            let mut timings = Vec::with_capacity(10);
            let started = Instant::now();
            let outcome = run_trial(&mut lifecycle, &input, &mut output, &mut timings);
            let total = started.elapsed();

            for (phase, elapsed) in &timings {
                let mut record = self.record(configuration, *phase, Status::Ok);
                record.run = run;
                record.warmup = warmup;
                record.duration_ns = nanos(*elapsed);
                sink.record(&record)?;
            }
            if let Err((phase, e)) = outcome {
                release(&mut lifecycle);
                return self.classify(configuration, phase, Some((run, warmup)), e, sink);
            }
            let mut record = self.record(configuration, Phase::Total, Status::Ok);
            record.run = run;
            record.warmup = warmup;
            record.duration_ns = nanos(total);
            sink.record(&record)?;
        }

        if self.config.validate {
            return self.validate(configuration, &geometry, &input, &output, sink);
        }
        Ok(Status::Ok)
    }

    fn admit(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        let estimate = lifecycle.plan_size_estimate()?;
        let caps = self.context.capabilities();
        check_capacity(
            lifecycle.geometry(),
            estimate,
            caps.available_device_bytes,
            self.context.available_host_bytes(),
            &self.config.limits,
        )?;
        Ok(())
    }

    fn validate(
        &self,
        configuration: &Configuration,
        geometry: &crate::layout::Geometry,
        input: &[u8],
        output: &[u8],
        sink: &mut dyn ReportSink,
    ) -> Result<Status> {
        let dev = deviation(geometry, input, output, self.context.is_normalized())?;
        let bound = self.config.error_bounds.for_precision(configuration.precision);
        let ok = self
            .config
            .error_bounds
            .accepts(configuration.precision, &dev);
        let status = if ok { Status::Ok } else { Status::Failed };
        let mut record = self.record(configuration, Phase::Validate, status);
        record.message = Some(format!(
            "rms {:.3e}, max {:.3e}, bound {bound:.1e}",
            dev.rms, dev.max_abs
        ));
        if !ok {
            error!("{configuration}: round trip error above bound ({:?})", record.message);
        }
        sink.record(&record)?;
        Ok(status)
    }
}

/// Runs one trial, pushing the duration of each completed phase.
fn run_trial(
    lifecycle: &mut Lifecycle,
    input: &[u8],
    output: &mut [u8],
    timings: &mut Vec<(Phase, Duration)>,
) -> core::result::Result<(), (Phase, BenchError)> {
    let real = lifecycle.geometry().kind.is_real();
    for &phase in Phase::trial_sequence(lifecycle.geometry().kind) {
        let result = match phase {
            Phase::Allocate => lifecycle.allocate(),
            Phase::PlanForward => lifecycle.init_forward(),
            Phase::Upload => lifecycle.upload(input),
            Phase::ExecuteForward => lifecycle.execute_forward(),
            Phase::PlanInverse if real => lifecycle.init_inverse(),
            Phase::ExecuteInverse => lifecycle.execute_inverse(),
            Phase::Download => lifecycle.download(output),
            Phase::Destroy => lifecycle.destroy(),
            _ => continue,
        };
        match result {
            Ok(elapsed) => timings.push((phase, elapsed)),
            Err(e) => return Err((phase, e)),
        }
    }
    Ok(())
}

fn release(lifecycle: &mut Lifecycle) {
    if let Err(e) = lifecycle.destroy() {
        warn!("destroy after failure: {e}");
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
