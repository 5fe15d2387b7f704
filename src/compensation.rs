//! Fixed-point compensation of raw ADC counts.
//!
//! Integer arithmetic follows the vendor reference formulas, right-shift
//! truncation included. Fine temperature is passed in explicitly so humidity
//! and pressure never pick up a stale value.

use calibration::CalibrationData;
use error::{Channel, Error, Result};

const SKIPPED_MSB: u8 = 0x80;
const HUMIDITY_MAX_Q22_10: i32 = 419_430_400;

/// Assembles a 20-bit temperature or pressure reading from MSB, LSB, XLSB.
pub fn raw_20bit(bytes: [u8; 3], channel: Channel) -> Result<i32> {
    if bytes == [SKIPPED_MSB, 0, 0] {
        return Err(Error::NotReady(channel));
    }
    Ok(((bytes[0] as i32) << 12) | ((bytes[1] as i32) << 4) | ((bytes[2] as i32) >> 4))
}

/// Assembles a 16-bit humidity reading from MSB, LSB.
pub fn raw_16bit(bytes: [u8; 2]) -> Result<i32> {
    if bytes == [SKIPPED_MSB, 0] {
        return Err(Error::NotReady(Channel::Humidity));
    }
    Ok(((bytes[0] as i32) << 8) | bytes[1] as i32)
}

pub fn fine_temperature(raw: i32, cal: &CalibrationData) -> i32 {
    let t1 = cal.t1 as i32;
    let t2 = cal.t2 as i32;
    let t3 = cal.t3 as i32;

    let var1 = (((raw >> 3) - (t1 << 1)) * t2) >> 11;
    let var2 = (((((raw >> 4) - t1) * ((raw >> 4) - t1)) >> 12) * t3) >> 14;
    var1 + var2
}

/// Temperature in hundredths of a degree Celsius.
pub fn temperature_centi(t_fine: i32) -> i32 {
    (t_fine * 5 + 128) >> 8
}

pub fn temperature_celsius(t_fine: i32) -> f32 {
    temperature_centi(t_fine) as f32 / 100.0
}

/// Pressure in whole pascals.
pub fn pressure_pa(raw: i32, t_fine: i32, cal: &CalibrationData) -> Result<u32> {
    let mut var1 = t_fine as i64 - 128000;
    let mut var2 = var1 * var1 * cal.p6 as i64;
    var2 += (var1 * cal.p5 as i64) << 17;
    var2 += (cal.p4 as i64) << 35;
    var1 = ((var1 * var1 * cal.p3 as i64) >> 8) + ((var1 * cal.p2 as i64) << 12);
    var1 = (((1i64 << 47) + var1) * cal.p1 as i64) >> 33;
    if var1 == 0 {
        return Err(Error::DivideByZero);
    }

    let mut p = 1_048_576 - raw as i64;
    p = (((p << 31) - var2) * 3125) / var1;
    var1 = (cal.p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
    var2 = (cal.p8 as i64 * p) >> 19;
    // Q24.8
    p = ((p + var1 + var2) >> 8) + ((cal.p7 as i64) << 4);
    Ok((p / 256) as u32)
}

/// Relative humidity in Q22.10 (divide by 1024 for %RH).
pub fn humidity_q22_10(raw: i32, t_fine: i32, cal: &CalibrationData) -> u32 {
    let h1 = cal.h1 as i32;
    let h2 = cal.h2 as i32;
    let h3 = cal.h3 as i32;
    let h4 = cal.h4 as i32;
    let h5 = cal.h5 as i32;
    let h6 = cal.h6 as i32;

    let mut x = t_fine - 76800;
    x = ((((raw << 14) - (h4 << 20) - (h5 * x)) + 16384) >> 15)
        * (((((((x * h6) >> 10) * (((x * h3) >> 11) + 32768)) >> 10) + 2_097_152) * h2 + 8192)
            >> 14);
    x -= ((((x >> 15) * (x >> 15)) >> 7) * h1) >> 4;
    let x = x.max(0).min(HUMIDITY_MAX_Q22_10);
    (x >> 12) as u32
}

pub fn humidity_percent(raw: i32, t_fine: i32, cal: &CalibrationData) -> f32 {
    humidity_q22_10(raw, t_fine, cal) as f32 / 1024.0
}

/// Station pressure reduced to sea level for a sensor at `altitude` metres.
pub fn qnh_pressure(qfe: u32, altitude: f64) -> u32 {
    let factor = (1.0 - 2.25577e-5 * altitude).powf(-5.25588);
    (qfe as f64 * factor) as u32
}

/// Pascals to millimetres of mercury using the 75/10000 approximation
/// (1 mmHg taken as 133.33 Pa rather than 133.322 Pa).
pub fn pa_to_hg(pa: f32) -> f32 {
    (pa * 75.0) / 10000.0
}

/// Dew point in °C by the Magnus formula.
pub fn dewpoint(humidity: f32, temperature: f32) -> f32 {
    let (b, c) = (17.67, 243.5);
    let t = temperature as f64;
    let gamma = (b * t) / (c + t) + (humidity as f64 / 100.0).ln();
    (c * gamma / (b - gamma)) as f32
}
