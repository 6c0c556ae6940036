//! Device-side phase timer.

use std::sync::Arc;
use std::time::Duration;

use cudarc::driver::{sys, CudaContext, CudaEvent, CudaStream};

use crate::error::{BenchError, Result};
use crate::timer::Timer;

/// Brackets an operation with two events on the stream and reports the
/// device time between them.
pub struct CudaEventTimer {
    stream: Arc<CudaStream>,
    start: CudaEvent,
    stop: CudaEvent,
}

impl CudaEventTimer {
    pub fn new(ctx: &Arc<CudaContext>, stream: Arc<CudaStream>) -> Result<Self> {
        let event = || {
            ctx.new_event(Some(sys::CUevent_flags::CU_EVENT_DEFAULT))
                .map_err(|e| BenchError::backend("cuda", "cuEventCreate", e.to_string()))
        };
        Ok(Self {
            start: event()?,
            stop: event()?,
            stream,
        })
    }
}

fn driver(operation: &'static str) -> impl Fn(cudarc::driver::DriverError) -> BenchError {
    move |e| BenchError::backend("cuda", operation, e.to_string())
}

impl Timer for CudaEventTimer {
    fn name(&self) -> &'static str {
        "cuda-event"
    }

    fn measure(&self, op: &mut dyn FnMut() -> Result<()>) -> Result<Duration> {
        self.start
            .record(&self.stream)
            .map_err(driver("cuEventRecord"))?;
        let outcome = op();
        self.stop
            .record(&self.stream)
            .map_err(driver("cuEventRecord"))?;
        self.stop
            .synchronize()
            .map_err(driver("cuEventSynchronize"))?;
        outcome?;
        let ms = self
            .start
            .elapsed_ms(&self.stop)
            .map_err(driver("cuEventElapsedTime"))?;
        Ok(Duration::from_secs_f64(f64::from(ms.max(0.0)) / 1e3))
    }
}
