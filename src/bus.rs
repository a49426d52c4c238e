//! Bus adapters implementing [`BusClient`]
//!
//! [`I2cBus`] turns any `embedded-hal-async` I2C master into a bounded-time
//! request/response client. [`SharedBus`] lets several clients (the sampler
//! and the diagnostic device-info path) take turns on one bus.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, with_timeout};
use embedded_hal_async::i2c::{Error as _, ErrorKind, I2c};
use log::warn;

use crate::sensors::{BusClient, BusError};

impl From<ErrorKind> for BusError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(_) => Self::Nack,
            _ => Self::Fault,
        }
    }
}

/// [`BusClient`] over an async I2C master.
///
/// Each transaction is a single write-read. If the master has not finished
/// within the timeout the future is dropped and [`BusError::Timeout`] is
/// returned.
pub struct I2cBus<I> {
    i2c: I,
}

impl<I: I2c> I2cBus<I> {
    #[inline]
    pub const fn new(i2c: I) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> BusClient for I2cBus<I> {
    async fn transact<const LEN: usize>(
        &mut self,
        address: u8,
        write: &[u8],
        timeout: Duration,
    ) -> Result<[u8; LEN], BusError> {
        let mut read = [0u8; LEN];
        let result = with_timeout(timeout, self.i2c.write_read(address, write, &mut read)).await;
        match result {
            Ok(Ok(())) => Ok(read),
            Ok(Err(e)) => Err(BusError::from(e.kind())),
            Err(_) => Err(BusError::Timeout),
        }
    }
}

/// Shares one [`BusClient`] between several users through an async mutex.
///
/// Waiting for the bus counts against the caller's timeout, so a slow
/// transaction on another handle cannot stretch this one past its bound.
///
/// # Example
///
/// ```rust,ignore
/// use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
/// use embassy_sync::mutex::Mutex;
/// use static_cell::StaticCell;
///
/// static I2C_BUS: StaticCell<Mutex<CriticalSectionRawMutex, I2cBus<MyI2c>>> = StaticCell::new();
///
/// let bus = I2C_BUS.init(Mutex::new(I2cBus::new(i2c)));
///
/// let sampler_bus = SharedBus::new(bus);
/// let info_bus = SharedBus::new(bus);
/// ```
pub struct SharedBus<'a, B> {
    bus: &'a Mutex<CriticalSectionRawMutex, B>,
}

impl<'a, B> SharedBus<'a, B> {
    #[inline]
    pub const fn new(bus: &'a Mutex<CriticalSectionRawMutex, B>) -> Self {
        Self { bus }
    }
}

impl<B> Clone for SharedBus<'_, B> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<B: BusClient> BusClient for SharedBus<'_, B> {
    async fn transact<const LEN: usize>(
        &mut self,
        address: u8,
        write: &[u8],
        timeout: Duration,
    ) -> Result<[u8; LEN], BusError> {
        let start = Instant::now();
        let mut bus = with_timeout(timeout, self.bus.lock()).await.map_err(|_| {
            warn!("Bus busy for {} ms, giving up on {:#04x}", timeout.as_millis(), address);
            BusError::Timeout
        })?;

        let remaining = timeout.checked_sub(start.elapsed()).unwrap_or(Duration::MIN);
        bus.transact::<LEN>(address, write, remaining).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::ScriptedBus;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    /// I2C master that answers every write-read from a fixed register file.
    struct FakeI2c {
        registers: [[u8; 2]; 8],
        fail_with: Option<ErrorKind>,
        stall: bool,
    }

    #[derive(Debug)]
    struct FakeError(ErrorKind);

    impl embedded_hal_async::i2c::Error for FakeError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    impl ErrorType for FakeI2c {
        type Error = FakeError;
    }

    impl I2c for FakeI2c {
        async fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.stall {
                core::future::pending::<()>().await;
            }
            if let Some(kind) = self.fail_with {
                return Err(FakeError(kind));
            }

            let mut register = 0usize;
            for op in operations {
                match op {
                    Operation::Write(bytes) => register = usize::from(bytes[0]),
                    Operation::Read(buf) => buf.copy_from_slice(&self.registers[register][..buf.len()]),
                }
            }
            Ok(())
        }
    }

    fn fake() -> FakeI2c {
        let mut registers = [[0u8; 2]; 8];
        registers[5] = [0x01, 0x98];
        FakeI2c {
            registers,
            fail_with: None,
            stall: false,
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_i2c_write_read() {
        let mut bus = I2cBus::new(fake());
        let read = block_on(bus.transact::<2>(0x18, &[0x05], TIMEOUT));
        assert_eq!(read, Ok([0x01, 0x98]));
    }

    #[test]
    fn test_i2c_nack_maps_to_nack() {
        let mut i2c = fake();
        i2c.fail_with = Some(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        let mut bus = I2cBus::new(i2c);
        assert_eq!(
            block_on(bus.transact::<2>(0x18, &[0x05], TIMEOUT)),
            Err(BusError::Nack)
        );
    }

    #[test]
    fn test_i2c_other_errors_map_to_fault() {
        let mut i2c = fake();
        i2c.fail_with = Some(ErrorKind::ArbitrationLoss);
        let mut bus = I2cBus::new(i2c);
        assert_eq!(
            block_on(bus.transact::<2>(0x18, &[0x05], TIMEOUT)),
            Err(BusError::Fault)
        );
    }

    #[test]
    fn test_i2c_stall_times_out() {
        let mut i2c = fake();
        i2c.stall = true;
        let mut bus = I2cBus::new(i2c);
        assert_eq!(
            block_on(bus.transact::<2>(0x18, &[0x05], TIMEOUT)),
            Err(BusError::Timeout)
        );
    }

    #[test]
    fn test_shared_bus_forwards() {
        let mut scripted = ScriptedBus::new();
        scripted.respond(&[0x00, 0x54]);
        let mutex = Mutex::<CriticalSectionRawMutex, _>::new(scripted);

        let mut first = SharedBus::new(&mutex);
        let read = block_on(first.transact::<2>(0x18, &[0x06], TIMEOUT));
        assert_eq!(read, Ok([0x00, 0x54]));

        let mut second = first.clone();
        // Script exhausted
        assert_eq!(
            block_on(second.transact::<2>(0x18, &[0x06], TIMEOUT)),
            Err(BusError::Timeout)
        );
    }

    #[test]
    fn test_shared_bus_busy_times_out() {
        let mutex = Mutex::<CriticalSectionRawMutex, _>::new(ScriptedBus::new());
        let mut shared = SharedBus::new(&mutex);

        block_on(async {
            let _held = mutex.lock().await;
            assert_eq!(
                shared.transact::<2>(0x18, &[0x05], TIMEOUT).await,
                Err(BusError::Timeout)
            );
        });
    }
}
