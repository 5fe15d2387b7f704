//! # bme280-i2c
//!
//! This crate reads a BME280 temperature/humidity/pressure sensor through
//! the Linux I2C character device. Each bus path has at most one open
//! session. Repeated acquisitions share it, and it closes when the last
//! handle is dropped.
//!
//! # Examples
//! ```no_run
//! # #[cfg(target_os = "linux")] {
//! use bme280_i2c::{acquire, pa_to_hg, Config, DEFAULT_ADDRESS};
//!
//! let bme = acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
//! let mut sensor = bme.lock();
//! println!("{:.2} °C", sensor.temperature().unwrap());
//! println!("{:.2} %", sensor.humidity().unwrap());
//! println!("{:.2} mmHg", pa_to_hg(sensor.qfe_pressure().unwrap() as f32));
//! # }
//! ```
//!
//! A session does not serialize register transactions itself. Use it from
//! several threads only through `SessionHandle::lock`.

extern crate chrono;
extern crate i2cdev;
#[macro_use]
extern crate log;
extern crate nix;

#[cfg(target_os = "linux")]
use std::sync::OnceLock;

mod bme280;
mod calibration;
mod compensation;
mod config;
mod error;
mod registry;
mod transport;
mod utils;

pub use bme280::*;
pub use calibration::{unpack_h4_h5, CalibrationData, SOFT_RESET_ATTEMPTS};
pub use compensation::{dewpoint, pa_to_hg, qnh_pressure};
pub use config::*;
pub use error::*;
pub use registry::*;
pub use transport::*;

/// Raw-count compensation formulas, usable without a device.
pub mod formulas {
    pub use compensation::*;
}

/// Sessions of the Linux I2C buses of this process.
#[cfg(target_os = "linux")]
pub fn sessions() -> &'static Registry<LinuxBus> {
    static REGISTRY: OnceLock<Registry<LinuxBus>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new(LinuxBus))
}

/// Acquires the process-wide session of the Linux I2C bus at `path`.
#[cfg(target_os = "linux")]
pub fn acquire(path: &str, address: u16, config: Config) -> Result<SessionHandle<LinuxBus>> {
    sessions().acquire(path, address, config)
}
