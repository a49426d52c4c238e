//! Drift-corrected sampling loop
//!
//! The [`Sampler`] is the single writer of the shared [`SensorState`]. Each
//! cycle it reads the sensor, commits the outcome and then sleeps for
//! whatever is left of the poll period, so transaction latency does not
//! push the cadence out. A cycle that overruns the period is followed
//! immediately by the next one; missed cycles are not made up.
//!
//! [`SensorState`]: crate::app_state::SensorState

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use log::{debug, info, warn};

use crate::app_state::StateWriter;
use crate::config::SamplerConfig;
use crate::sensors::{BusClient, Mcp9808};
use crate::temperature::{ErrorCode, Temperature};

/// Raised once to stop [`Sampler::run`] at the next cycle boundary.
pub type ShutdownSignal = Signal<CriticalSectionRawMutex, ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Sampling,
    Committing,
    Sleeping,
    Stopped,
}

/// How long to sleep after a cycle that took `elapsed`.
///
/// Zero once the cycle has used up the whole period.
pub fn next_delay(period: Duration, elapsed: Duration) -> Duration {
    period.checked_sub(elapsed).unwrap_or(Duration::MIN)
}

pub struct Sampler<'a, B, const N: usize> {
    sensor: Mcp9808<B>,
    writer: StateWriter<'a, N>,
    period: Duration,
    phase: PollPhase,
    cycles: u32,
}

impl<'a, B: BusClient, const N: usize> Sampler<'a, B, N> {
    pub fn new(bus: B, writer: StateWriter<'a, N>, config: &SamplerConfig) -> Self {
        Self {
            sensor: Mcp9808::new(bus, config.bus_address, config.bus_timeout()),
            writer,
            period: config.poll_period(),
            phase: PollPhase::Idle,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Number of completed sample/commit cycles.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Read the sensor once and commit the result.
    ///
    /// A bus failure is absorbed here: it is recorded as
    /// [`ErrorCode::SensorFailure`] and the next scheduled poll acts as the
    /// retry. The bus transaction runs before the state lock is taken, and the
    /// phase is back to [`PollPhase::Idle`] once the commit is done.
    pub async fn poll_once(&mut self) {
        self.phase = PollPhase::Sampling;
        let (value, error) = match self.sensor.read_temperature().await {
            Ok(value) => (value, ErrorCode::Ok),
            Err(e) => {
                warn!("Temperature poll failed: {}", e);
                (Temperature::NO_VALUE, ErrorCode::SensorFailure)
            }
        };

        self.phase = PollPhase::Committing;
        if !self.writer.update(value, error).await {
            warn!("Poll result dropped, state was busy");
        }
        self.cycles = self.cycles.wrapping_add(1);
        self.phase = PollPhase::Idle;
    }

    /// Poll on a fixed cadence until `shutdown` is raised.
    ///
    /// The signal is checked once per cycle, after the sleep and before the
    /// next transaction. A transaction in flight is never cancelled.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) {
        info!("Sampler running every {} ms", self.period.as_millis());

        while !shutdown.signaled() {
            let start = Instant::now();
            self.poll_once().await;

            let elapsed = start.elapsed();
            let delay = next_delay(self.period, elapsed);
            if delay == Duration::MIN {
                debug!("Cycle took {} ms, starting next one immediately", elapsed.as_millis());
            }

            self.phase = PollPhase::Sleeping;
            Timer::after(delay).await;
        }

        self.phase = PollPhase::Stopped;
        info!("Sampler stopped after {} cycles", self.cycles);
    }

    /// Give the bus and writer back, e.g. after [`Sampler::run`] returned.
    pub fn release(self) -> (B, StateWriter<'a, N>) {
        (self.sensor.release(), self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::SensorState;
    use crate::config::HISTORY_LEN;
    use crate::sensors::mock::ScriptedBus;
    use crate::sensors::{BusError, TEMPERATURE_REGISTER};
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use std::vec::Vec;

    /// Raises the shutdown signal once `remaining` transactions have run.
    struct StopAfter<'s> {
        inner: ScriptedBus,
        remaining: usize,
        shutdown: &'s ShutdownSignal,
    }

    impl BusClient for StopAfter<'_> {
        async fn transact<const LEN: usize>(
            &mut self,
            address: u8,
            write: &[u8],
            timeout: Duration,
        ) -> Result<[u8; LEN], BusError> {
            let result = self.inner.transact::<LEN>(address, write, timeout).await;
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.shutdown.signal(());
            }
            result
        }
    }

    fn config(period_ms: u32) -> SamplerConfig {
        SamplerConfig {
            poll_period_ms: period_ms,
            ..SamplerConfig::default()
        }
    }

    fn history(state: &SensorState<HISTORY_LEN>) -> Vec<i32> {
        block_on(state.get_history(HISTORY_LEN))
            .iter()
            .map(|v| v.hundredths())
            .collect()
    }

    #[test]
    fn test_next_delay() {
        let period = Duration::from_millis(100);
        assert_eq!(
            next_delay(period, Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(next_delay(period, period), Duration::MIN);
        assert_eq!(
            next_delay(period, Duration::from_millis(250)),
            Duration::MIN
        );
    }

    #[test]
    fn test_poll_once_commits_reading() {
        let state = SensorState::<HISTORY_LEN>::new();
        let mut bus = ScriptedBus::new();
        bus.respond(&[0x01, 0x98]);

        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(1000));
        assert_eq!(sampler.phase(), PollPhase::Idle);
        block_on(sampler.poll_once());

        assert_eq!(
            block_on(state.get_last()),
            (Temperature::from_hundredths(7790), ErrorCode::Ok)
        );
        assert_eq!(history(&state), [7790]);
        assert_eq!(sampler.cycles(), 1);
        assert_eq!(sampler.phase(), PollPhase::Idle);

        let (bus, _) = sampler.release();
        assert_eq!(bus.requests(), &[(0x18, TEMPERATURE_REGISTER)]);
    }

    #[test]
    fn test_poll_once_records_sensor_failure() {
        let state = SensorState::<HISTORY_LEN>::new();
        let mut bus = ScriptedBus::new();
        bus.respond(&[0x01, 0x98]);
        bus.fail(BusError::Nack);

        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(1000));
        block_on(sampler.poll_once());
        block_on(sampler.poll_once());
        assert_eq!(sampler.phase(), PollPhase::Idle);

        assert_eq!(
            block_on(state.get_last()),
            (Temperature::NO_VALUE, ErrorCode::SensorFailure)
        );
        assert_eq!(history(&state), [7790]);
    }

    #[test]
    fn test_slow_transaction_does_not_block_readers() {
        let state = SensorState::<HISTORY_LEN>::with_lock_timeout(Duration::from_millis(10));
        let mut bus = ScriptedBus::new().with_latency(Duration::from_millis(200));
        bus.respond(&[0x01, 0x98]);
        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(1000));

        let reader = async {
            // Well inside the 200 ms transaction
            Timer::after(Duration::from_millis(50)).await;
            let start = Instant::now();
            let last = state.get_last().await;
            (last, start.elapsed())
        };
        let ((), (last, waited)) = block_on(join(sampler.poll_once(), reader));

        assert_eq!(last, (Temperature::NO_VALUE, ErrorCode::Ok));
        assert!(waited < Duration::from_millis(10), "{:?}", waited);
        assert_eq!(
            block_on(state.get_last()),
            (Temperature::from_hundredths(7790), ErrorCode::Ok)
        );
    }

    #[test]
    fn test_run_stops_on_signal() {
        let state = SensorState::<HISTORY_LEN>::new();
        let shutdown = ShutdownSignal::new();

        let mut inner = ScriptedBus::new();
        inner.respond(&[0x01, 0x90]);
        inner.respond(&[0x01, 0x98]);
        inner.fail(BusError::Timeout);
        inner.respond(&[0x01, 0xA0]);
        let bus = StopAfter {
            inner,
            remaining: 4,
            shutdown: &shutdown,
        };

        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(5));
        block_on(sampler.run(&shutdown));

        assert_eq!(sampler.phase(), PollPhase::Stopped);
        assert_eq!(sampler.cycles(), 4);
        // 25.00, 25.50 and 26.00 C; the timed out poll left no trace
        assert_eq!(history(&state), [7880, 7790, 7700]);
        assert_eq!(
            block_on(state.get_last()),
            (Temperature::from_hundredths(7880), ErrorCode::Ok)
        );
    }

    #[test]
    fn test_run_returns_at_once_when_already_signalled() {
        let state = SensorState::<HISTORY_LEN>::new();
        let shutdown = ShutdownSignal::new();
        shutdown.signal(());

        let mut sampler = Sampler::new(ScriptedBus::new(), state.writer().unwrap(), &config(5));
        block_on(sampler.run(&shutdown));

        assert_eq!(sampler.cycles(), 0);
        assert_eq!(sampler.phase(), PollPhase::Stopped);
        let (bus, _) = sampler.release();
        assert!(bus.requests().is_empty());
    }

    #[test]
    fn test_sleep_absorbs_bus_latency() {
        let state = SensorState::<HISTORY_LEN>::new();
        let shutdown = ShutdownSignal::new();

        let mut inner = ScriptedBus::new().with_latency(Duration::from_millis(30));
        for _ in 0..4 {
            inner.respond(&[0x01, 0x98]);
        }
        let bus = StopAfter {
            inner,
            remaining: 4,
            shutdown: &shutdown,
        };

        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(50));
        let start = Instant::now();
        block_on(sampler.run(&shutdown));
        let elapsed = start.elapsed();

        // Four 50 ms cycles. Sleeping a full period after each 30 ms
        // transaction would take 320 ms.
        assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(290), "{:?}", elapsed);
    }

    #[test]
    fn test_overrun_cycle_starts_next_immediately() {
        let state = SensorState::<HISTORY_LEN>::new();
        let shutdown = ShutdownSignal::new();

        let mut inner = ScriptedBus::new().with_latency(Duration::from_millis(40));
        for _ in 0..3 {
            inner.respond(&[0x01, 0x98]);
        }
        let bus = StopAfter {
            inner,
            remaining: 3,
            shutdown: &shutdown,
        };

        let mut sampler = Sampler::new(bus, state.writer().unwrap(), &config(10));
        let start = Instant::now();
        block_on(sampler.run(&shutdown));
        let elapsed = start.elapsed();

        // No catch-up bursts, and no sleeping on top of an overrun cycle
        assert_eq!(sampler.cycles(), 3);
        assert!(elapsed >= Duration::from_millis(120), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "{:?}", elapsed);
    }
}
