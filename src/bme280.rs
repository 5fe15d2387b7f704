use std::{thread, time};

use chrono::{DateTime, Utc};

use calibration::{self, CalibrationData, SOFT_RESET_ATTEMPTS};
use compensation::*;
use config::Config;
use error::{Channel, Error, Result};
use transport::{Bus, Transport};

pub const DEFAULT_ADDRESS: u16 = 0x77;
pub const CHIP_ID: u8 = 0x60;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESS: u8 = 0xF7;
const REG_TEMP: u8 = 0xFA;
const REG_HUM: u8 = 0xFD;

/// press_msb..hum_lsb, F7..=FE.
const BURST_LEN: usize = 8;
const MODE_SETTLE: time::Duration = time::Duration::from_millis(250);

/// One compensated sample of all three channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// Pa, at the sensor (QFE)
    pub pressure: u32,
}

/// A BME280 on one bus device path.
///
/// Closed until `open`; readings need a completed `calibrate` as well.
/// Register transactions are not serialized internally: share a session
/// between threads only behind a lock, as `SessionHandle` does.
pub struct BME280<B: Bus> {
    bus: B,
    path: String,
    address: u16,
    transport: Option<B::Transport>,
    config: Config,
    calibration: CalibrationData,
}

impl<B: Bus> BME280<B> {
    pub fn new(bus: B, path: &str, address: u16, config: Config) -> BME280<B> {
        BME280 {
            bus: bus,
            path: path.to_string(),
            address: address,
            transport: None,
            config: config,
            calibration: CalibrationData::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn opened(&self) -> bool {
        self.transport.is_some()
    }

    /// Opens the device file and binds the slave address. A fresh open
    /// starts uncalibrated.
    pub fn open(&mut self) -> Result<()> {
        if self.opened() {
            return Ok(());
        }
        let transport = self.bus.open(&self.path, self.address)?;
        self.transport = Some(transport);
        self.calibration = CalibrationData::default();
        info!("opened {} at {:#04x}", self.path, self.address);
        Ok(())
    }

    /// Releases the handle. On failure the session stays open so the
    /// caller may retry.
    pub fn close(&mut self) -> Result<()> {
        if let Some(ref mut transport) = self.transport {
            transport.close()?;
        }
        if self.transport.take().is_some() {
            info!("closed {}", self.path);
        }
        Ok(())
    }

    fn transport(&mut self) -> Result<&mut B::Transport> {
        match self.transport {
            Some(ref mut transport) => Ok(transport),
            None => Err(Error::Precondition("bme280 session is closed")),
        }
    }

    fn ready(&mut self) -> Result<(&mut B::Transport, &CalibrationData)> {
        let transport = match self.transport {
            Some(ref mut transport) => transport,
            None => return Err(Error::Precondition("bme280 session is closed")),
        };
        if !self.calibration.is_complete() {
            return Err(Error::Precondition("bme280 session is not calibrated"));
        }
        Ok((transport, &self.calibration))
    }

    /// Verifies the chip-ID register.
    pub fn check(&mut self) -> Result<()> {
        let found = self.transport()?.read_byte(REG_CHIP_ID)?;
        if found != CHIP_ID {
            return Err(Error::Protocol {
                expected: CHIP_ID,
                found: found,
            });
        }
        Ok(())
    }

    pub fn soft_reset(&mut self) -> Result<()> {
        calibration::soft_reset(self.transport()?, SOFT_RESET_ATTEMPTS)
    }

    /// Soft-resets the sensor and reloads the compensation coefficients.
    /// Costs up to a second while the reset completes.
    pub fn calibrate(&mut self) -> Result<()> {
        let calibration = calibration::acquire(self.transport()?)?;
        self.calibration = calibration;
        Ok(())
    }

    pub fn was_calibrated(&self) -> bool {
        self.calibration.is_complete()
    }

    pub fn last_calibration(&self) -> Option<DateTime<Utc>> {
        self.calibration.updated
    }

    pub fn calibration(&self) -> &CalibrationData {
        &self.calibration
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Writes filter/standby, humidity oversampling, then temperature and
    /// pressure oversampling with the mode, and waits for the mode to settle.
    pub fn configure(&mut self, config: Config) -> Result<()> {
        {
            let dev = self.transport()?;
            dev.write_byte(REG_CONFIG, config.config_reg())?;
            // ctrl_hum only takes effect after a write to ctrl_meas
            dev.write_byte(REG_CTRL_HUM, config.ctrl_hum_reg())?;
            dev.write_byte(REG_CTRL_MEAS, config.ctrl_meas_reg())?;
        }
        self.config = config;
        info!("configured {}: {:?}", self.path, config);
        thread::sleep(MODE_SETTLE);
        Ok(())
    }

    /// Open, identify, calibrate and configure. Does nothing on a session
    /// that is already open, whatever `config` says.
    pub fn activate(&mut self, config: Config) -> Result<()> {
        if self.opened() {
            return Ok(());
        }
        self.open()?;
        if let Err(e) = self.bring_up(config) {
            if let Err(close_err) = self.close() {
                warn!("failed to close {} after {}: {}", self.path, e, close_err);
            }
            return Err(e);
        }
        Ok(())
    }

    fn bring_up(&mut self, config: Config) -> Result<()> {
        self.check()?;
        self.calibrate()?;
        self.configure(config)
    }

    /// Temperature in °C.
    pub fn temperature(&mut self) -> Result<f32> {
        let (dev, cal) = self.ready()?;
        let t_fine = read_fine_temperature(dev, cal)?;
        Ok(temperature_celsius(t_fine))
    }

    /// Relative humidity in %, compensated with a fresh temperature sample.
    pub fn humidity(&mut self) -> Result<f32> {
        let (dev, cal) = self.ready()?;
        let t_fine = read_fine_temperature(dev, cal)?;
        let mut buf = [0u8; 2];
        dev.read_exact(REG_HUM, &mut buf)?;
        let raw = raw_16bit(buf)?;
        debug!("raw humidity {}", raw);
        Ok(humidity_percent(raw, t_fine, cal))
    }

    /// Station pressure in Pa, compensated with a fresh temperature sample.
    pub fn qfe_pressure(&mut self) -> Result<u32> {
        let (dev, cal) = self.ready()?;
        let t_fine = read_fine_temperature(dev, cal)?;
        let mut buf = [0u8; 3];
        dev.read_exact(REG_PRESS, &mut buf)?;
        let raw = raw_20bit(buf, Channel::Pressure)?;
        debug!("raw pressure {}", raw);
        pressure_pa(raw, t_fine, cal)
    }

    /// Pressure reduced to sea level for a sensor `altitude` metres up.
    pub fn qnh_pressure(&mut self, altitude: f64) -> Result<u32> {
        let qfe = self.qfe_pressure()?;
        Ok(qnh_pressure(qfe, altitude))
    }

    /// Reads all data registers in one burst so every channel comes from the
    /// same measurement cycle and shares one fine temperature.
    pub fn measure(&mut self) -> Result<Measurement> {
        let (dev, cal) = self.ready()?;
        let mut buf = [0u8; BURST_LEN];
        dev.read_exact(REG_PRESS, &mut buf)?;

        let raw_p = raw_20bit([buf[0], buf[1], buf[2]], Channel::Pressure)?;
        let raw_t = raw_20bit([buf[3], buf[4], buf[5]], Channel::Temperature)?;
        let raw_h = raw_16bit([buf[6], buf[7]])?;
        debug!("raw burst p={} t={} h={}", raw_p, raw_t, raw_h);

        let t_fine = fine_temperature(raw_t, cal);
        Ok(Measurement {
            temperature: temperature_celsius(t_fine),
            humidity: humidity_percent(raw_h, t_fine, cal),
            pressure: pressure_pa(raw_p, t_fine, cal)?,
        })
    }
}

fn read_fine_temperature<T: Transport>(dev: &mut T, cal: &CalibrationData) -> Result<i32> {
    let mut buf = [0u8; 3];
    dev.read_exact(REG_TEMP, &mut buf)?;
    let raw = raw_20bit(buf, Channel::Temperature)?;
    debug!("raw temperature {}", raw);
    Ok(fine_temperature(raw, cal))
}

impl<B: Bus> Drop for BME280<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close {}: {}", self.path, e);
        }
    }
}
