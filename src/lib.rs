//! Hardware-independent core library for thermo-rs
//!
//! This crate contains all platform-agnostic logic for the thermo sampling
//! device: the MCP9808 fixed-point decoder, the bus abstraction, the shared
//! temperature state with its rolling history, and the drift-corrected
//! sampling loop that ties them together.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod app_state;
pub mod bus;
pub mod config;
pub mod sampling;
pub mod sensors;
pub mod stats;
pub mod temperature;

pub use app_state::{InitError, SensorState, StateWriter};
pub use config::{HISTORY_LEN, SamplerConfig};
pub use sampling::{PollPhase, Sampler, ShutdownSignal};
pub use sensors::{BusClient, BusError, DeviceInfo, Mcp9808};
pub use temperature::{ErrorCode, Temperature};
