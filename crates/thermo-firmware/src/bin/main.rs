#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use static_cell::StaticCell;

use thermo_firmware::hardware::{SensorBus, init_sensor_bus, probe_sensor};
use thermo_rs::stats::HistoryStats;
use thermo_rs::{HISTORY_LEN, Sampler, SamplerConfig, SensorState, ShutdownSignal};

/// How often the current reading and history are reported over RTT.
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static SENSOR_STATE: StaticCell<SensorState<HISTORY_LEN>> = StaticCell::new();

/// Never raised on hardware; the sampler runs for the life of the device.
static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();

#[embassy_executor::task]
async fn sampler_task(mut sampler: Sampler<'static, SensorBus, HISTORY_LEN>) {
    sampler.run(&SHUTDOWN).await;
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let config = SamplerConfig::default();

    // Port A on the CoreS3: SDA = GPIO2, SCL = GPIO1
    let (sampler_bus, info_bus) =
        init_sensor_bus(peripherals.I2C0, peripherals.GPIO2, peripherals.GPIO1);

    let state = SensorState::init(&SENSOR_STATE, config.lock_timeout())
        .expect("Failed to initialize sensor state");
    let writer = state.writer().expect("Sensor state writer already taken");

    if let Err(e) = probe_sensor(info_bus, &config).await {
        error!("Could not read sensor identification: {}", e);
    }

    let sampler = Sampler::new(sampler_bus, writer, &config);
    spawner.spawn(sampler_task(sampler).expect("Sampler task already spawned"));

    info!("Initialization complete");

    loop {
        Timer::after(REPORT_INTERVAL).await;

        let (value, status) = state.get_last().await;
        info!("Last reading: {} F ({}, code {})", value, status.label(), status.code());

        let history = state.get_history(HISTORY_LEN).await;
        if let Some(stats) = HistoryStats::from_readings(&history) {
            info!(
                "History: {} readings, min {} / avg {} / max {}",
                stats.count, stats.min, stats.avg, stats.max
            );
        }
    }
}
