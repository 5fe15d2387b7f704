use std::{thread, time};

use chrono::{DateTime, Utc};

use error::{Error, Result};
use transport::Transport;
use utils::*;

pub const REG_TEMP_PRESS_CALIB: u8 = 0x88;
pub const REG_HUM_CALIB_H1: u8 = 0xA1;
/// H2..H6 live in 0xE1..=0xE7.
pub const REG_HUM_CALIB_H2: u8 = 0xE1;
pub const REG_SOFT_RESET: u8 = 0xE0;
pub const REG_STATUS: u8 = 0xF3;

pub const TEMP_PRESS_CALIB_LEN: usize = 24;
pub const HUM_CALIB_LEN: usize = 7;

pub const SOFT_RESET_COMMAND: u8 = 0xB6;
/// Status polls (1 ms apart) before a soft reset is given up.
pub const SOFT_RESET_ATTEMPTS: u16 = 1000;
const STATUS_IDLE: u8 = 0;

/// Factory trimming coefficients of one sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationData {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,

    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,

    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,

    /// Set once every coefficient has been read from the sensor.
    pub updated: Option<DateTime<Utc>>,
}

impl CalibrationData {
    pub fn is_complete(&self) -> bool {
        self.updated.is_some()
    }

    /// Fills T1..T3 and P1..P9 from the block at 0x88.
    pub fn decode_temp_press(&mut self, block: &[u8; TEMP_PRESS_CALIB_LEN]) {
        self.t1 = le_unsigned(block, 0);
        self.t2 = le_signed(block, 2);
        self.t3 = le_signed(block, 4);

        self.p1 = le_unsigned(block, 6);
        self.p2 = le_signed(block, 8);
        self.p3 = le_signed(block, 10);
        self.p4 = le_signed(block, 12);
        self.p5 = le_signed(block, 14);
        self.p6 = le_signed(block, 16);
        self.p7 = le_signed(block, 18);
        self.p8 = le_signed(block, 20);
        self.p9 = le_signed(block, 22);
    }

    /// Fills H1..H6 from register 0xA1 and registers 0xE1..=0xE7.
    pub fn decode_humidity(&mut self, h1: u8, regs: &[u8; HUM_CALIB_LEN]) {
        self.h1 = h1;
        self.h2 = signed_short(regs[0], regs[1]);
        self.h3 = regs[2];
        let (h4, h5) = unpack_h4_h5(regs[3], regs[4], regs[5]);
        self.h4 = h4;
        self.h5 = h5;
        self.h6 = regs[6] as i8;
    }
}

/// Splits the two 12-bit signed coefficients sharing 0xE4..=0xE6.
///
/// H4 = 0xE4[7:0] 0xE5[3:0], H5 = 0xE6[7:0] 0xE5[7:4]. The sign of each
/// comes from its whole byte (0xE4, 0xE6).
pub fn unpack_h4_h5(e4: u8, e5: u8, e6: u8) -> (i16, i16) {
    let h4 = ((e4 as i8 as i16) << 4) | (e5 & 0x0F) as i16;
    let h5 = ((e6 as i8 as i16) << 4) | (e5 >> 4) as i16;
    (h4, h5)
}

/// Writes the reset command and waits for the sensor to go idle, reading
/// the status register at most `attempts` times.
pub fn soft_reset<T: Transport>(dev: &mut T, attempts: u16) -> Result<()> {
    dev.write_byte(REG_SOFT_RESET, SOFT_RESET_COMMAND)?;

    let mut remaining = attempts;
    while dev.read_byte(REG_STATUS)? != STATUS_IDLE {
        remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            return Err(Error::Timeout { attempts });
        }
        thread::sleep(time::Duration::from_millis(1));
    }
    Ok(())
}

/// Resets the sensor and reads every compensation coefficient.
pub fn acquire<T: Transport>(dev: &mut T) -> Result<CalibrationData> {
    soft_reset(dev, SOFT_RESET_ATTEMPTS)?;

    let mut calibration = CalibrationData::default();

    let mut block = [0u8; TEMP_PRESS_CALIB_LEN];
    dev.read_exact(REG_TEMP_PRESS_CALIB, &mut block)?;
    calibration.decode_temp_press(&block);

    let h1 = dev.read_byte(REG_HUM_CALIB_H1)?;
    let mut regs = [0u8; HUM_CALIB_LEN];
    for (i, reg) in regs.iter_mut().enumerate() {
        *reg = dev.read_byte(REG_HUM_CALIB_H2 + i as u8)?;
    }
    calibration.decode_humidity(h1, &regs);

    calibration.updated = Some(Utc::now());
    debug!("calibration coefficients: {:?}", calibration);
    Ok(calibration)
}
