mod mcp9808;
#[cfg(test)]
pub(crate) mod mock;

use embassy_time::Duration;
use thiserror_no_std::Error;

pub use mcp9808::*;

/// Failure of a single bus transaction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("bus transaction timed out")]
    Timeout,
    #[error("device did not acknowledge")]
    Nack,
    #[error("bus fault (arbitration loss, overrun or similar)")]
    Fault,
}

/// Request/response primitive for talking to a device on the sensor bus.
///
/// One call writes `write` to the device at `address` and reads back exactly
/// `LEN` bytes. It must resolve within `timeout`, failing with
/// [`BusError::Timeout`] otherwise. Implementations never retry; retry policy
/// belongs to the caller.
pub trait BusClient {
    fn transact<const LEN: usize>(
        &mut self,
        address: u8,
        write: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<[u8; LEN], BusError>>;
}

impl<B: BusClient> BusClient for &mut B {
    async fn transact<const LEN: usize>(
        &mut self,
        address: u8,
        write: &[u8],
        timeout: Duration,
    ) -> Result<[u8; LEN], BusError> {
        (**self).transact::<LEN>(address, write, timeout).await
    }
}
