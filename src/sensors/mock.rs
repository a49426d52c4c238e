//! Scripted bus used by unit tests

use std::collections::VecDeque;
use std::vec::Vec;

use embassy_time::{Duration, Timer};

use super::{BusClient, BusError};

/// Replays queued responses in order. Once the script runs out, every
/// transaction fails with [`BusError::Timeout`].
pub(crate) struct ScriptedBus {
    script: VecDeque<Result<Vec<u8>, BusError>>,
    requests: Vec<(u8, u8)>,
    latency: Duration,
}

impl ScriptedBus {
    pub(crate) fn new() -> Self {
        Self {
            script: VecDeque::new(),
            requests: Vec::new(),
            latency: Duration::from_ticks(0),
        }
    }

    /// Every transaction takes at least `latency` before resolving.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn respond(&mut self, bytes: &[u8]) {
        self.script.push_back(Ok(bytes.to_vec()));
    }

    pub(crate) fn fail(&mut self, error: BusError) {
        self.script.push_back(Err(error));
    }

    /// `(address, register)` of every transaction seen so far.
    pub(crate) fn requests(&self) -> &[(u8, u8)] {
        &self.requests
    }
}

impl BusClient for ScriptedBus {
    async fn transact<const LEN: usize>(
        &mut self,
        address: u8,
        write: &[u8],
        _timeout: Duration,
    ) -> Result<[u8; LEN], BusError> {
        self.requests.push((address, write[0]));
        if self.latency.as_ticks() > 0 {
            Timer::after(self.latency).await;
        }

        let bytes = self.script.pop_front().unwrap_or(Err(BusError::Timeout))?;
        let mut read = [0u8; LEN];
        read.copy_from_slice(&bytes);
        Ok(read)
    }
}
