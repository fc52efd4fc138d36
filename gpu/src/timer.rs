//! Event-timed device-to-host transfers
//!
//! Each copy is bracketed by a start and a stop event on the default stream.
//! The host waits on the stop event before reading the elapsed time, so the
//! reported duration is the device-side transfer time and consecutive samples
//! never overlap.

use thiserror::Error;
use tracing::warn;

use crate::{DeviceBuffer, EventHandle, GpuError, GpuRuntime, HostBuffer};

/// One timed iteration
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingSample {
    /// Device-measured copy time, in seconds
    pub seconds: f64,

    /// Bytes moved by the copy
    pub bytes: u64,
}

/// Failure of a timed iteration
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TimerError {
    /// The copy (or the stop marker fencing it) was rejected
    #[error("failed to perform memcpy")]
    Transfer(#[source] GpuError),

    /// The copy ran but its duration could not be read back
    #[error("failed to get elapsed time")]
    ElapsedRead(#[source] GpuError),
}

/// Start/stop event pair used to time copies
pub struct TransferTimer<'rt, R: GpuRuntime + ?Sized> {
    runtime: &'rt R,
    start: EventHandle,
    stop: EventHandle,
}

impl<'rt, R: GpuRuntime + ?Sized> TransferTimer<'rt, R> {
    pub fn new(runtime: &'rt R) -> Result<Self, GpuError> {
        let start = runtime.create_event()?;
        let stop = match runtime.create_event() {
            Ok(stop) => stop,
            Err(e) => {
                destroy_event(runtime, start);
                return Err(e);
            }
        };
        Ok(Self {
            runtime,
            start,
            stop,
        })
    }

    /// Copy `src` into `dst` once and time it with the event pair
    ///
    /// If the copy call fails, the elapsed time is not read.
    pub fn time_copy(
        &self,
        dst: &HostBuffer<'_, R>,
        src: &DeviceBuffer<'_, R>,
    ) -> Result<TimingSample, TimerError> {
        let bytes = src.len().min(dst.len());

        self.runtime
            .record_event(self.start)
            .map_err(TimerError::Transfer)?;
        let copied = self
            .runtime
            .memcpy_dtoh_async(dst.as_ptr(), src.as_ptr(), bytes);
        let fenced = self
            .runtime
            .record_event(self.stop)
            .and_then(|()| self.runtime.synchronize_event(self.stop));

        copied.map_err(TimerError::Transfer)?;
        fenced.map_err(TimerError::Transfer)?;

        let millis = self
            .runtime
            .event_elapsed_ms(self.start, self.stop)
            .map_err(TimerError::ElapsedRead)?;

        Ok(TimingSample {
            seconds: f64::from(millis) / 1000.0,
            bytes,
        })
    }
}

impl<R: GpuRuntime + ?Sized> Drop for TransferTimer<'_, R> {
    fn drop(&mut self) {
        destroy_event(self.runtime, self.stop);
        destroy_event(self.runtime, self.start);
    }
}

fn destroy_event<R: GpuRuntime + ?Sized>(runtime: &R, event: EventHandle) {
    if let Err(e) = runtime.destroy_event(event) {
        warn!("failed to destroy timing event {:#x}: {}", event.0, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fault, FaultPoint, SimCall, SimulatedGpu};

    fn setup(gpu: &SimulatedGpu) {
        gpu.set_device(0).unwrap();
    }

    #[test]
    fn test_elapsed_time_is_converted_to_seconds() {
        // 1 GiB/s and no fixed latency: 1 MiB takes 1/1024 s
        let gpu = SimulatedGpu::new(1)
            .with_bandwidth(1024.0 * 1024.0 * 1024.0)
            .with_latency_secs(0.0);
        setup(&gpu);

        let src = DeviceBuffer::allocate(&gpu, 1 << 20).unwrap();
        let dst = HostBuffer::allocate_write_combined(&gpu, 1 << 20).unwrap();
        let timer = TransferTimer::new(&gpu).unwrap();

        let sample = timer.time_copy(&dst, &src).unwrap();
        assert_eq!(sample.bytes, 1 << 20);
        assert!((sample.seconds - 1.0 / 1024.0).abs() < 1e-6);
    }

    #[test]
    fn test_copy_failure_skips_elapsed_read() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::Copy);
        setup(&gpu);

        let src = DeviceBuffer::allocate(&gpu, 4096).unwrap();
        let dst = HostBuffer::allocate_write_combined(&gpu, 4096).unwrap();
        let timer = TransferTimer::new(&gpu).unwrap();

        let err = timer.time_copy(&dst, &src).unwrap_err();
        assert!(matches!(err, TimerError::Transfer(_)));
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::ElapsedTime)), 0);
        // The stop marker is still recorded and waited on
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::SynchronizeEvent)), 1);
    }

    #[test]
    fn test_elapsed_read_failure() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::ElapsedTime);
        setup(&gpu);

        let src = DeviceBuffer::allocate(&gpu, 4096).unwrap();
        let dst = HostBuffer::allocate_write_combined(&gpu, 4096).unwrap();
        let timer = TransferTimer::new(&gpu).unwrap();

        assert!(matches!(
            timer.time_copy(&dst, &src),
            Err(TimerError::ElapsedRead(_))
        ));
    }

    #[test]
    fn test_events_destroyed_on_drop() {
        let gpu = SimulatedGpu::new(1);
        setup(&gpu);
        {
            let _timer = TransferTimer::new(&gpu).unwrap();
            assert_eq!(gpu.live_events(), 2);
        }
        assert_eq!(gpu.live_events(), 0);
    }

    #[test]
    fn test_second_event_failure_releases_first() {
        let gpu = SimulatedGpu::new(1).with(Fault::new(FaultPoint::EventCreate).after(1));
        setup(&gpu);

        assert!(TransferTimer::new(&gpu).is_err());
        assert_eq!(gpu.live_events(), 0);
    }
}
