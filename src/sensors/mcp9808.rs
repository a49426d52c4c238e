use embassy_time::Duration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{BusClient, BusError};
use crate::temperature::Temperature;

/// Default 7-bit address with A2..A0 tied low.
pub const MCP9808_ADDRESS: u8 = 0x18;

pub const TEMPERATURE_REGISTER: u8 = 0x05;
pub const MANUFACTURER_ID_REGISTER: u8 = 0x06;
pub const DEVICE_ID_REGISTER: u8 = 0x07;

pub const MCP9808_MANUFACTURER_ID: u16 = 0x0054;
pub const MCP9808_DEVICE_ID: u8 = 0x04;

const SIGN_BIT: u8 = 0x10;
const SCALE: i32 = 100;

/// Hundredths contributed by lsb bits 3..0. These approximate the sensor's
/// 1/16 °C steps and are part of the device calibration, keep them as is.
const FRACTION_WEIGHTS: [(u8, i32); 4] = [(0x08, 50), (0x04, 25), (0x02, 13), (0x01, 6)];

/// Convert the two bytes of the ambient temperature register into
/// hundredths of a degree Fahrenheit.
///
/// Integer-only: the target has no usable FPU, and the truncation points of
/// the Celsius to Fahrenheit step are relied upon by downstream consumers.
/// The upper three bits of `msb` carry alert flags and are ignored.
pub fn decode(msb: u8, lsb: u8) -> Temperature {
    let negative = msb & SIGN_BIT != 0;

    let whole = i32::from(((msb & 0x0F) << 4) | (lsb >> 4));
    let fraction: i32 = FRACTION_WEIGHTS
        .iter()
        .filter(|(mask, _)| lsb & mask != 0)
        .map(|(_, weight)| weight)
        .sum();

    let mut celsius = whole * SCALE + fraction;
    if negative {
        celsius = 256 * SCALE - celsius;
    }

    let fahrenheit = celsius * (9 * SCALE) / (5 * SCALE) + 32 * SCALE;
    Temperature::from_hundredths(fahrenheit)
}

/// Static identification data reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub manufacturer_id: u16,
    pub device_id: u8,
    pub device_revision: u8,
}

impl DeviceInfo {
    pub const fn is_mcp9808(&self) -> bool {
        self.manufacturer_id == MCP9808_MANUFACTURER_ID && self.device_id == MCP9808_DEVICE_ID
    }
}

/// MCP9808 driver over any [`BusClient`].
pub struct Mcp9808<B> {
    bus: B,
    address: u8,
    timeout: Duration,
}

impl<B: BusClient> Mcp9808<B> {
    pub const fn new(bus: B, address: u8, timeout: Duration) -> Self {
        Self {
            bus,
            address,
            timeout,
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Read the ambient temperature register and decode it.
    pub async fn read_temperature(&mut self) -> Result<Temperature, BusError> {
        let [msb, lsb] = self
            .bus
            .transact::<2>(self.address, &[TEMPERATURE_REGISTER], self.timeout)
            .await
            .map_err(|e| {
                warn!("MCP9808 temperature read failed: {}", e);
                e
            })?;

        let value = decode(msb, lsb);
        debug!("MCP9808 raw ({:#04x}, {:#04x}) -> {}", msb, lsb, value);
        Ok(value)
    }

    /// Read manufacturer id, device id and revision.
    ///
    /// Goes straight to the bus; the shared temperature state is not touched.
    pub async fn read_device_info(&mut self) -> Result<DeviceInfo, BusError> {
        let manufacturer = self
            .bus
            .transact::<2>(self.address, &[MANUFACTURER_ID_REGISTER], self.timeout)
            .await?;
        let [device_id, device_revision] = self
            .bus
            .transact::<2>(self.address, &[DEVICE_ID_REGISTER], self.timeout)
            .await?;

        let info = DeviceInfo {
            manufacturer_id: u16::from_be_bytes(manufacturer),
            device_id,
            device_revision,
        };
        debug!("MCP9808 device info: {:?}", info);
        Ok(info)
    }
}
