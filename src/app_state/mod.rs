//! Shared temperature state and its access rules
//!
//! One [`SensorState`] lives for the whole process. The sampler is the only
//! writer (through the single [`StateWriter`]), while any number of readers
//! call [`SensorState::get_last`] and [`SensorState::get_history`].
//!
//! Every lock acquisition is bounded. A reader that cannot get the lock in
//! time receives a degraded answer instead of stalling its caller, and a
//! write that cannot get the lock is dropped; the next poll replaces it.

mod history;

pub use history::*;

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, with_timeout};
use log::{debug, warn};
use static_cell::StaticCell;
use thiserror_no_std::Error;

use crate::config::DEFAULT_LOCK_TIMEOUT_MS;
use crate::temperature::{ErrorCode, Temperature};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("sensor state was already initialized")]
    AlreadyInitialized,
    #[error("the state writer has already been handed out")]
    WriterTaken,
}

/// Everything guarded by the state lock.
#[derive(Debug, Clone)]
struct Snapshot<const N: usize> {
    last_value: Temperature,
    last_error: ErrorCode,
    history: History<N>,
}

impl<const N: usize> Snapshot<N> {
    const fn new() -> Self {
        Self {
            last_value: Temperature::NO_VALUE,
            last_error: ErrorCode::Ok,
            history: History::new(),
        }
    }
}

/// Last reading, last status and the rolling history of valid readings.
pub struct SensorState<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, Snapshot<N>>,
    lock_timeout: Duration,
    writer_taken: AtomicBool,
}

impl<const N: usize> SensorState<N> {
    /// State with everything set to "no value" and the default lock timeout.
    pub const fn new() -> Self {
        Self::with_lock_timeout(Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS as u64))
    }

    pub const fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Snapshot::new()),
            lock_timeout,
            writer_taken: AtomicBool::new(false),
        }
    }

    /// Place the process-wide state in `cell`.
    ///
    /// Must run exactly once before the sampler or any reader starts; a
    /// second call fails and startup should be aborted.
    pub fn init(
        cell: &'static StaticCell<Self>,
        lock_timeout: Duration,
    ) -> Result<&'static Self, InitError> {
        let state = cell
            .try_init(Self::with_lock_timeout(lock_timeout))
            .ok_or(InitError::AlreadyInitialized)?;
        debug!("Sensor state initialized with {} history slots", N);
        Ok(state)
    }

    /// Hand out the only handle allowed to mutate this state.
    pub fn writer(&self) -> Result<StateWriter<'_, N>, InitError> {
        if self.writer_taken.swap(true, Ordering::AcqRel) {
            return Err(InitError::WriterTaken);
        }
        Ok(StateWriter { state: self })
    }

    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Last reading and its status.
    ///
    /// Returns `(NO_VALUE, LockTimeout)` if the lock is not available within
    /// the lock timeout.
    pub async fn get_last(&self) -> (Temperature, ErrorCode) {
        match with_timeout(self.lock_timeout, self.inner.lock()).await {
            Ok(snapshot) => (snapshot.last_value, snapshot.last_error),
            Err(_) => {
                warn!("get_last: state lock timed out");
                (Temperature::NO_VALUE, ErrorCode::LockTimeout)
            }
        }
    }

    /// Up to `max_count` valid readings, newest first.
    ///
    /// Empty if nothing was recorded yet or the lock timed out.
    pub async fn get_history(&self, max_count: usize) -> heapless::Vec<Temperature, N> {
        let Ok(snapshot) = with_timeout(self.lock_timeout, self.inner.lock()).await else {
            warn!("get_history: state lock timed out");
            return heapless::Vec::new();
        };

        // newest_first never yields more than N entries
        snapshot.history.newest_first().take(max_count).collect()
    }
}

impl<const N: usize> Default for SensorState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive write access to a [`SensorState`].
///
/// Only one exists per state, so there is never write-write contention.
pub struct StateWriter<'a, const N: usize> {
    state: &'a SensorState<N>,
}

impl<'a, const N: usize> StateWriter<'a, N> {
    pub fn state(&self) -> &'a SensorState<N> {
        self.state
    }

    /// Commit the outcome of one poll.
    ///
    /// A successful reading becomes the last value and is appended to the
    /// history. A failure clears the last value and records the code, leaving
    /// the history alone. An `Ok` without a value is recorded as
    /// [`ErrorCode::SensorFailure`]. Returns `false` if the lock timed out and
    /// the update was dropped.
    pub async fn update(&mut self, value: Temperature, error: ErrorCode) -> bool {
        let error = if error.is_ok() && !value.is_valid() {
            warn!("update: successful poll without a value, recording sensor failure");
            ErrorCode::SensorFailure
        } else {
            error
        };

        let Ok(mut snapshot) = with_timeout(self.state.lock_timeout, self.state.inner.lock()).await
        else {
            warn!("update: state lock timed out, dropping {} ({})", value, error.label());
            return false;
        };

        if error.is_ok() {
            snapshot.last_value = value;
            snapshot.last_error = ErrorCode::Ok;
            snapshot.history.push(value);
        } else {
            snapshot.last_value = Temperature::NO_VALUE;
            snapshot.last_error = error;
        }
        true
    }
}
