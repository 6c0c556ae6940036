//! Phase timers.
//!
//! A [`Timer`] runs one bounded operation and reports how long it took. The
//! host variant reads the monotonic wall clock; accelerator backends provide
//! event-based timers that measure device time on their stream.

use std::time::{Duration, Instant};

use crate::error::Result;

pub trait Timer {
    /// Short identifier written into reports (`"wall"`, `"cuda-event"`).
    fn name(&self) -> &'static str;

    /// Runs `op` once and returns its elapsed time.
    ///
    /// A failing operation yields its error and no duration. Implementations
    /// block until all work issued by `op` has completed.
    fn measure(&self, op: &mut dyn FnMut() -> Result<()>) -> Result<Duration>;
}

/// Wall-clock timer backed by [`Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HostTimer;

impl Timer for HostTimer {
    fn name(&self) -> &'static str {
        "wall"
    }

    fn measure(&self, op: &mut dyn FnMut() -> Result<()>) -> Result<Duration> {
        let start = Instant::now();
        op()?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;

    #[test]
    fn host_timer_measures_sleep() {
        let d = HostTimer
            .measure(&mut || {
                std::thread::sleep(Duration::from_millis(5));
                Ok(())
            })
            .unwrap();
        assert!(d >= Duration::from_millis(5));
    }

    #[test]
    fn host_timer_propagates_failure() {
        let mut calls = 0;
        let err = HostTimer
            .measure(&mut || {
                calls += 1;
                Err(BenchError::backend("host", "execute_forward", "boom"))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("boom"));
    }
}
