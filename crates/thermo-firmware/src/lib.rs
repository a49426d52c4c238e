//! ESP32-S3 firmware-specific modules for thermo-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: I2C peripheral setup and the concrete bus types the sampler and
//! the diagnostic path run on.

#![no_std]

pub mod hardware;
