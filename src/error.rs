use std::error;
use std::fmt;
use std::result;

#[cfg(target_os = "linux")]
use i2cdev::linux::LinuxI2CError;
use nix;

/// Which raw measurement a failed reading belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    Pressure,
    Humidity,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Channel::Temperature => write!(f, "temperature"),
            Channel::Pressure => write!(f, "pressure"),
            Channel::Humidity => write!(f, "humidity"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// Open, close or transfer failed in the OS. Carries the OS error text.
    Io(String),
    /// The chip-ID register did not hold the BME280 identity.
    Protocol { expected: u8, found: u8 },
    /// The status register never went idle after a soft reset.
    Timeout { attempts: u16 },
    /// A block read reported more bytes than the caller's buffer holds.
    Range { reported: usize, capacity: usize },
    /// The raw register still holds the power-on-reset value. Retry after a short delay.
    NotReady(Channel),
    /// Pressure calibration is degenerate.
    DivideByZero,
    /// The session is closed or not calibrated yet.
    Precondition(&'static str),
}

impl Error {
    /// Only `NotReady` is worth retrying; every other kind is fatal for the session.
    pub fn is_retryable(&self) -> bool {
        match *self {
            Error::NotReady(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref msg) => write!(f, "i2c io error: {}", msg),
            Error::Protocol { expected, found } => write!(
                f,
                "unexpected device: chip id {:#04x}, expected {:#04x}",
                found, expected
            ),
            Error::Timeout { attempts } => write!(
                f,
                "soft reset did not complete after {} status polls",
                attempts
            ),
            Error::Range { reported, capacity } => write!(
                f,
                "block read returned {} bytes, buffer holds {}",
                reported, capacity
            ),
            Error::NotReady(channel) => write!(f, "{} measurement not ready yet", channel),
            Error::DivideByZero => write!(f, "pressure calibration is degenerate (division by zero)"),
            Error::Precondition(what) => write!(f, "{}", what),
        }
    }
}

impl error::Error for Error {}

#[cfg(target_os = "linux")]
impl From<LinuxI2CError> for Error {
    fn from(e: LinuxI2CError) -> Error {
        Error::Io(e.to_string())
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Error {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;
