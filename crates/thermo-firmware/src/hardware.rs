//! I2C bus bring-up for the sensor port

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::I2C0;
use esp_hal::time::Rate;
use log::{info, warn};
use static_cell::StaticCell;
use thermo_rs::bus::{I2cBus, SharedBus};
use thermo_rs::{BusError, DeviceInfo, Mcp9808, SamplerConfig};

pub const I2C_FREQUENCY_KHZ: u32 = 400;

pub type I2cMaster = I2c<'static, esp_hal::Async>;

/// Handle to the sensor bus; cheap to clone, one per user.
pub type SensorBus = SharedBus<'static, I2cBus<I2cMaster>>;

/// Bring up I2C0 on the given pins and put it behind a shared bus.
///
/// Returns one handle for the sampler and one for diagnostics.
pub fn init_sensor_bus(
    i2c0: I2C0<'static>,
    sda: impl PeripheralOutput<'static>,
    scl: impl PeripheralOutput<'static>,
) -> (SensorBus, SensorBus) {
    static I2C0_BUS: StaticCell<AsyncMutex<CriticalSectionRawMutex, I2cBus<I2cMaster>>> =
        StaticCell::new();

    let i2c = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQUENCY_KHZ)),
    )
    .expect("Invalid I2C configuration")
    .with_sda(sda)
    .with_scl(scl)
    .into_async();

    let bus = I2C0_BUS.init(AsyncMutex::new(I2cBus::new(i2c)));
    info!("I2C0 ready at {} kHz", I2C_FREQUENCY_KHZ);

    let sampler_bus = SharedBus::new(bus);
    (sampler_bus.clone(), sampler_bus)
}

/// Query and log the sensor's identification registers.
pub async fn probe_sensor(bus: SensorBus, config: &SamplerConfig) -> Result<DeviceInfo, BusError> {
    let mut sensor = Mcp9808::new(bus, config.bus_address, config.bus_timeout());
    let info = sensor.read_device_info().await?;

    if info.is_mcp9808() {
        info!(
            "MCP9808 found at {:#04x}, revision {}",
            config.bus_address, info.device_revision
        );
    } else {
        warn!(
            "Unexpected device at {:#04x}: manufacturer {:#06x}, device {:#04x}",
            config.bus_address, info.manufacturer_id, info.device_id
        );
    }
    Ok(info)
}
