#[cfg(target_os = "linux")]
use std::mem;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::*;
#[cfg(target_os = "linux")]
use nix::unistd;

use error::{Error, Result};

/// Register access against one bound I2C slave.
///
/// Every call is one blocking bus transaction; nothing here retries.
pub trait Transport {
    fn read_byte(&mut self, register: u8) -> Result<u8>;

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()>;

    /// Block transfer of up to `len` bytes, returning as many bytes as the
    /// device reported.
    fn transfer_block(&mut self, register: u8, len: u8) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;

    /// Block read bounded by `max_len`. A device that reports more than that
    /// is out of step with the host.
    fn read_block(&mut self, register: u8, max_len: u8) -> Result<Vec<u8>> {
        let data = self.transfer_block(register, max_len)?;
        if data.len() > max_len as usize {
            return Err(Error::Range {
                reported: data.len(),
                capacity: max_len as usize,
            });
        }
        Ok(data)
    }

    /// Fills `buf` from consecutive registers starting at `register`.
    fn read_exact(&mut self, register: u8, buf: &mut [u8]) -> Result<()> {
        let data = self.read_block(register, buf.len() as u8)?;
        if data.len() != buf.len() {
            return Err(Error::Io(format!(
                "short block read at {:#04x}: {} of {} bytes",
                register,
                data.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }
}

/// Opens transports on a bus device path.
pub trait Bus {
    type Transport: Transport;

    /// Opens the device file and binds it to the 7-bit `address`.
    fn open(&self, path: &str, address: u16) -> Result<Self::Transport>;
}

/// The Linux i2c-dev character devices (`/dev/i2c-N`).
#[derive(Clone, Copy, Debug, Default)]
pub struct LinuxBus;

#[cfg(target_os = "linux")]
impl Bus for LinuxBus {
    type Transport = LinuxTransport;

    /// `LinuxI2CDevice::new` opens the file and binds the slave address with
    /// the `I2C_SLAVE` ioctl; a failure of either is `Io`.
    fn open(&self, path: &str, address: u16) -> Result<LinuxTransport> {
        let device = LinuxI2CDevice::new(path, address)?;
        Ok(LinuxTransport {
            device: Some(device),
        })
    }
}

#[cfg(target_os = "linux")]
pub struct LinuxTransport {
    device: Option<LinuxI2CDevice>,
}

#[cfg(target_os = "linux")]
impl LinuxTransport {
    fn device(&mut self) -> Result<&mut LinuxI2CDevice> {
        match self.device {
            Some(ref mut dev) => Ok(dev),
            None => Err(Error::Io("i2c device is closed".to_string())),
        }
    }
}

#[cfg(target_os = "linux")]
impl Transport for LinuxTransport {
    fn read_byte(&mut self, register: u8) -> Result<u8> {
        Ok(self.device()?.smbus_read_byte_data(register)?)
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        Ok(self.device()?.smbus_write_byte_data(register, value)?)
    }

    fn transfer_block(&mut self, register: u8, len: u8) -> Result<Vec<u8>> {
        Ok(self.device()?.smbus_read_i2c_block_data(register, len)?)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(device) = self.device.take() {
            // The descriptor is closed here, not by the device's File.
            let fd = device.as_raw_fd();
            mem::forget(device);
            unistd::close(fd)?;
        }
        Ok(())
    }
}

/// In-memory register file standing in for a sensor on the bus.
#[cfg(test)]
pub mod mock {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::{Bus, Transport};
    use error::{Error, Result};

    pub struct Registers {
        pub regs: [u8; 256],
        /// Extra bytes a block transfer reports beyond what was asked for.
        pub block_overrun: usize,
        pub fail_open: bool,
        pub fail_close: bool,
        /// How long a close takes before it completes.
        pub close_delay: Option<Duration>,
        pub opens: usize,
        pub closes: usize,
        /// Handles open right now, and the most ever open at once.
        pub open_now: usize,
        pub max_open: usize,
        pub block_reads: usize,
        pub status_reads: usize,
        pub writes: Vec<(u8, u8)>,
        pub address: Option<u16>,
    }

    impl Registers {
        pub fn new() -> Registers {
            Registers {
                regs: [0; 256],
                block_overrun: 0,
                fail_open: false,
                fail_close: false,
                close_delay: None,
                opens: 0,
                closes: 0,
                open_now: 0,
                max_open: 0,
                block_reads: 0,
                status_reads: 0,
                writes: Vec::new(),
                address: None,
            }
        }

        pub fn writes_to(&self, register: u8) -> usize {
            self.writes.iter().filter(|w| w.0 == register).count()
        }
    }

    #[derive(Clone)]
    pub struct MockBus {
        pub state: Arc<Mutex<Registers>>,
    }

    impl MockBus {
        pub fn new(registers: Registers) -> MockBus {
            MockBus {
                state: Arc::new(Mutex::new(registers)),
            }
        }

        pub fn with<R, F: FnOnce(&mut Registers) -> R>(&self, f: F) -> R {
            let mut state = self.state.lock().unwrap();
            f(&mut *state)
        }
    }

    pub struct MockTransport {
        state: Arc<Mutex<Registers>>,
    }

    impl MockTransport {
        pub fn new(registers: Registers) -> MockTransport {
            MockTransport {
                state: Arc::new(Mutex::new(registers)),
            }
        }

        pub fn with<R, F: FnOnce(&mut Registers) -> R>(&self, f: F) -> R {
            let mut state = self.state.lock().unwrap();
            f(&mut *state)
        }
    }

    impl Bus for MockBus {
        type Transport = MockTransport;

        fn open(&self, _path: &str, address: u16) -> Result<MockTransport> {
            let mut state = self.state.lock().unwrap();
            if state.fail_open {
                return Err(Error::Io("No such file or directory".to_string()));
            }
            state.opens += 1;
            state.open_now += 1;
            state.max_open = state.max_open.max(state.open_now);
            state.address = Some(address);
            Ok(MockTransport {
                state: self.state.clone(),
            })
        }
    }

    impl Transport for MockTransport {
        fn read_byte(&mut self, register: u8) -> Result<u8> {
            let mut state = self.state.lock().unwrap();
            if register == 0xF3 {
                state.status_reads += 1;
            }
            Ok(state.regs[register as usize])
        }

        fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.writes.push((register, value));
            if register != 0xE0 {
                state.regs[register as usize] = value;
            }
            Ok(())
        }

        fn transfer_block(&mut self, register: u8, len: u8) -> Result<Vec<u8>> {
            let mut state = self.state.lock().unwrap();
            state.block_reads += 1;
            let start = register as usize;
            let end = (start + len as usize + state.block_overrun).min(256);
            Ok(state.regs[start..end].to_vec())
        }

        fn close(&mut self) -> Result<()> {
            let delay = self.state.lock().unwrap().close_delay;
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let mut state = self.state.lock().unwrap();
            if state.fail_close {
                return Err(Error::Io("Bad file descriptor".to_string()));
            }
            state.closes += 1;
            state.open_now = state.open_now.saturating_sub(1);
            Ok(())
        }
    }
}
