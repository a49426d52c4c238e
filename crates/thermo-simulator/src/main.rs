//! Desktop simulator for the thermo-rs sampling loop.
//!
//! Runs the real [`Sampler`] against a synthetic MCP9808 on the host, while
//! the main thread plays the presentation layer and reports the last reading
//! and history. The sensor drops out now and then so the failure path is
//! visible too.
//!
//! Set `RUST_LOG=debug` to see every transaction.

use std::thread;
use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;
use log::{error, info};
use static_cell::StaticCell;

use thermo_rs::bus::SharedBus;
use thermo_rs::sensors::{
    DEVICE_ID_REGISTER, MANUFACTURER_ID_REGISTER, MCP9808_DEVICE_ID, MCP9808_MANUFACTURER_ID,
    TEMPERATURE_REGISTER,
};
use thermo_rs::stats::HistoryStats;
use thermo_rs::{
    BusClient, BusError, HISTORY_LEN, Mcp9808, Sampler, SamplerConfig, SensorState,
    ShutdownSignal,
};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Sampling period used instead of the one-minute hardware default.
const SIM_POLL_PERIOD_MS: u32 = 500;

/// How often the "presentation layer" reports.
const REPORT_INTERVAL: StdDuration = StdDuration::from_secs(2);

/// Number of reports before the sampler is shut down.
const REPORTS: u32 = 8;

/// Every n-th transaction is not acknowledged.
const NACK_EVERY: u32 = 7;

/// Simulated transaction latency.
const BUS_LATENCY: Duration = Duration::from_millis(15);

// ---------------------------------------------------------------------------
// Synthetic sensor
// ---------------------------------------------------------------------------

/// Register-level MCP9808 stand-in producing a slowly varying temperature.
struct SyntheticMcp9808 {
    transactions: u32,
}

impl SyntheticMcp9808 {
    fn new() -> Self {
        Self { transactions: 0 }
    }

    /// Ambient register encoding for a Celsius value in hundredths.
    ///
    /// Only non-negative values are produced, so the sign bit stays clear.
    fn encode(celsius_hundredths: u32) -> [u8; 2] {
        let whole = (celsius_hundredths / 100).min(255) as u8;
        let mut remainder = celsius_hundredths % 100;

        let mut fraction = 0u8;
        for (bit, weight) in [(0x08, 50), (0x04, 25), (0x02, 13), (0x01, 6)] {
            if remainder >= weight {
                fraction |= bit;
                remainder -= weight;
            }
        }

        [whole >> 4, (whole << 4) | fraction]
    }

    fn ambient(&self) -> [u8; 2] {
        let t = f64::from(self.transactions);
        // 21-25 C with a slower drift on top
        let celsius = 23.0 + 2.0 * (t / 9.0).sin() + 0.4 * (t / 3.7).cos();
        Self::encode((celsius * 100.0) as u32)
    }
}

impl BusClient for SyntheticMcp9808 {
    async fn transact<const LEN: usize>(
        &mut self,
        _address: u8,
        write: &[u8],
        timeout: Duration,
    ) -> Result<[u8; LEN], BusError> {
        self.transactions += 1;
        if BUS_LATENCY > timeout {
            return Err(BusError::Timeout);
        }
        embassy_time::Timer::after(BUS_LATENCY).await;

        if self.transactions % NACK_EVERY == 0 {
            return Err(BusError::Nack);
        }

        let reply = match write.first().copied() {
            Some(TEMPERATURE_REGISTER) => self.ambient(),
            Some(MANUFACTURER_ID_REGISTER) => MCP9808_MANUFACTURER_ID.to_be_bytes(),
            Some(DEVICE_ID_REGISTER) => [MCP9808_DEVICE_ID, 0x00],
            _ => return Err(BusError::Nack),
        };

        let mut read = [0u8; LEN];
        let n = LEN.min(reply.len());
        read[..n].copy_from_slice(&reply[..n]);
        Ok(read)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

static BUS: StaticCell<Mutex<CriticalSectionRawMutex, SyntheticMcp9808>> = StaticCell::new();
static STATE: StaticCell<SensorState<HISTORY_LEN>> = StaticCell::new();
static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SamplerConfig {
        poll_period_ms: SIM_POLL_PERIOD_MS,
        ..SamplerConfig::default()
    };

    let bus = BUS.init(Mutex::new(SyntheticMcp9808::new()));
    let state = match SensorState::init(&STATE, config.lock_timeout()) {
        Ok(state) => state,
        Err(e) => {
            error!("Startup aborted: {}", e);
            return;
        }
    };
    let writer = match state.writer() {
        Ok(writer) => writer,
        Err(e) => {
            error!("Startup aborted: {}", e);
            return;
        }
    };

    let mut probe = Mcp9808::new(SharedBus::new(bus), config.bus_address, config.bus_timeout());
    match block_on(probe.read_device_info()) {
        Ok(info) => info!("Device info: {:?} (MCP9808: {})", info, info.is_mcp9808()),
        Err(e) => error!("Device info unavailable: {}", e),
    }

    let sampler_thread = thread::spawn(move || {
        let mut sampler = Sampler::new(SharedBus::new(bus), writer, &config);
        block_on(sampler.run(&SHUTDOWN));
        sampler.cycles()
    });

    for _ in 0..REPORTS {
        thread::sleep(REPORT_INTERVAL);

        let (value, status) = block_on(state.get_last());
        let history = block_on(state.get_history(HISTORY_LEN));
        info!("Last: {} F [{}]", value, status.label());

        let rendered: Vec<String> = history.iter().map(ToString::to_string).collect();
        info!("History (newest first): {}", rendered.join(", "));

        if let Some(stats) = HistoryStats::from_readings(&history) {
            info!(
                "min {} / avg {} / max {} over {} readings",
                stats.min, stats.avg, stats.max, stats.count
            );
        }
    }

    SHUTDOWN.signal(());
    match sampler_thread.join() {
        Ok(cycles) => info!("Sampler stopped after {} cycles", cycles),
        Err(_) => error!("Sampler thread panicked"),
    }
}
