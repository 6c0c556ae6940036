//! Transform adapter contract and the timed lifecycle around it.
//!
//! Backends implement [`TransformAdapter`]; the suite never calls an adapter
//! directly but goes through [`Lifecycle`], which enforces the phase order,
//! times every phase with the adapter's own timer and guarantees `destroy`.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::layout::{Geometry, TransformKind};
use crate::timer::Timer;

/// Backend side of one configuration run.
///
/// Implementations own one plan and one or two buffers sized from
/// [`TransformAdapter::geometry`]. They may assume calls arrive in lifecycle
/// order; [`Lifecycle`] checks it.
pub trait TransformAdapter {
    fn geometry(&self) -> &Geometry;

    /// Timer used for every phase of this adapter.
    fn timer(&self) -> Arc<dyn Timer>;

    /// Plan workspace in bytes. Leaves no plan state behind.
    fn plan_size_estimate(&mut self) -> Result<u64>;

    /// Reserves `data_size` bytes, plus `complex_buffer_size` when
    /// out-of-place.
    fn allocate(&mut self) -> Result<()>;

    fn init_forward(&mut self) -> Result<()>;

    /// Replaces the forward plan with an inverse plan. Real transforms only.
    fn init_inverse(&mut self) -> Result<()>;

    /// Copies exactly `transfer_size` bytes into the primary buffer.
    fn upload(&mut self, host: &[u8]) -> Result<()>;

    fn execute_forward(&mut self) -> Result<()>;

    fn execute_inverse(&mut self) -> Result<()>;

    /// Copies exactly `transfer_size` bytes out of the primary buffer.
    fn download(&mut self, host: &mut [u8]) -> Result<()>;

    /// Releases buffers and plans. Idempotent, valid in any state.
    fn destroy(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Allocated,
    ForwardPlanned,
    Uploaded,
    ForwardExecuted,
    InversePlanned,
    InverseExecuted,
    Downloaded,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Timed unit reported per trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Allocate,
    PlanForward,
    Upload,
    ExecuteForward,
    PlanInverse,
    ExecuteInverse,
    Download,
    Destroy,
    Total,
    Validate,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Allocate => "allocate",
            Phase::PlanForward => "plan_forward",
            Phase::Upload => "upload",
            Phase::ExecuteForward => "execute_forward",
            Phase::PlanInverse => "plan_inverse",
            Phase::ExecuteInverse => "execute_inverse",
            Phase::Download => "download",
            Phase::Destroy => "destroy",
            Phase::Total => "total",
            Phase::Validate => "validate",
        }
    }

    /// Timed phases of one trial, in execution order.
    pub fn trial_sequence(kind: TransformKind) -> &'static [Phase] {
        const REAL: &[Phase] = &[
            Phase::Allocate,
            Phase::PlanForward,
            Phase::Upload,
            Phase::ExecuteForward,
            Phase::PlanInverse,
            Phase::ExecuteInverse,
            Phase::Download,
            Phase::Destroy,
        ];
        const COMPLEX: &[Phase] = &[
            Phase::Allocate,
            Phase::PlanForward,
            Phase::Upload,
            Phase::ExecuteForward,
            Phase::ExecuteInverse,
            Phase::Download,
            Phase::Destroy,
        ];
        if kind.is_real() {
            REAL
        } else {
            COMPLEX
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timed state machine around a [`TransformAdapter`].
pub struct Lifecycle {
    adapter: Box<dyn TransformAdapter>,
    timer: Arc<dyn Timer>,
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new(adapter: Box<dyn TransformAdapter>) -> Self {
        let timer = adapter.timer();
        Self {
            adapter,
            timer,
            state: LifecycleState::Constructed,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn geometry(&self) -> &Geometry {
        self.adapter.geometry()
    }

    pub fn timer_name(&self) -> &'static str {
        self.timer.name()
    }

    fn kind(&self) -> TransformKind {
        self.adapter.geometry().kind
    }

    fn expect_state(&self, phase: Phase, expected: LifecycleState) -> Result<()> {
        if self.state != expected {
            return Err(BenchError::InvalidTransition {
                phase: phase.to_string(),
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn step(
        &mut self,
        phase: Phase,
        from: LifecycleState,
        to: LifecycleState,
        mut op: impl FnMut(&mut dyn TransformAdapter) -> Result<()>,
    ) -> Result<Duration> {
        self.expect_state(phase, from)?;
        let adapter = &mut *self.adapter;
        let elapsed = self.timer.measure(&mut || op(adapter))?;
        debug!("{phase}: {elapsed:?}");
        self.state = to;
        Ok(elapsed)
    }

    /// Plan workspace estimate, only meaningful before allocation.
    pub fn plan_size_estimate(&mut self) -> Result<u64> {
        self.expect_state(Phase::Setup, LifecycleState::Constructed)?;
        self.adapter.plan_size_estimate()
    }

    pub fn allocate(&mut self) -> Result<Duration> {
        self.step(
            Phase::Allocate,
            LifecycleState::Constructed,
            LifecycleState::Allocated,
            |a| a.allocate(),
        )
    }

    pub fn init_forward(&mut self) -> Result<Duration> {
        self.step(
            Phase::PlanForward,
            LifecycleState::Allocated,
            LifecycleState::ForwardPlanned,
            |a| a.init_forward(),
        )
    }

    pub fn upload(&mut self, host: &[u8]) -> Result<Duration> {
        self.step(
            Phase::Upload,
            LifecycleState::ForwardPlanned,
            LifecycleState::Uploaded,
            |a| a.upload(host),
        )
    }

    pub fn execute_forward(&mut self) -> Result<Duration> {
        self.step(
            Phase::ExecuteForward,
            LifecycleState::Uploaded,
            LifecycleState::ForwardExecuted,
            |a| a.execute_forward(),
        )
    }

    /// Real transforms only; complex transforms reuse the forward plan.
    pub fn init_inverse(&mut self) -> Result<Duration> {
        if !self.kind().is_real() {
            return Err(BenchError::InvalidTransition {
                phase: Phase::PlanInverse.to_string(),
                state: format!("{} (complex transform)", self.state),
            });
        }
        self.step(
            Phase::PlanInverse,
            LifecycleState::ForwardExecuted,
            LifecycleState::InversePlanned,
            |a| a.init_inverse(),
        )
    }

    pub fn execute_inverse(&mut self) -> Result<Duration> {
        let from = if self.kind().is_real() {
            LifecycleState::InversePlanned
        } else {
            LifecycleState::ForwardExecuted
        };
        self.step(
            Phase::ExecuteInverse,
            from,
            LifecycleState::InverseExecuted,
            |a| a.execute_inverse(),
        )
    }

    pub fn download(&mut self, host: &mut [u8]) -> Result<Duration> {
        self.step(
            Phase::Download,
            LifecycleState::InverseExecuted,
            LifecycleState::Downloaded,
            |a| a.download(host),
        )
    }

    /// Releases everything from any state. A second call is a no-op.
    ///
    /// The lifecycle ends up `Destroyed` even when the adapter reports an
    /// error.
    pub fn destroy(&mut self) -> Result<Duration> {
        if self.state == LifecycleState::Destroyed {
            return Ok(Duration::ZERO);
        }
        let adapter = &mut *self.adapter;
        let result = self.timer.measure(&mut || adapter.destroy());
        self.state = LifecycleState::Destroyed;
        result
    }

    /// Takes a destroyed lifecycle back to `Constructed` so the same adapter
    /// can serve another trial.
    pub fn rearm(&mut self) -> Result<()> {
        self.expect_state(Phase::Setup, LifecycleState::Destroyed)?;
        self.state = LifecycleState::Constructed;
        Ok(())
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if self.state != LifecycleState::Destroyed {
            if let Err(e) = self.adapter.destroy() {
                warn!("destroy during drop failed: {e}");
            }
        }
    }
}
