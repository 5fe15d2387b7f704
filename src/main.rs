extern crate bme280_i2c;
extern crate docopt;
extern crate env_logger;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use docopt::Docopt;

use std::process;
use std::{thread, time};

use bme280_i2c::*;

const USAGE: &'static str = "
Reading BME280 sensor value

Usage:
  bme280 <device> [--address <addr>] [--altitude <m>] [--interval <ms>] [--count <n>]
  bme280 (-h | --help)
  bme280 (-v | --version)

Options:
  -h --help            Show this help text.
  --address <addr>     I2C device address [default: 119] (=0x77)
  --altitude <m>       Sensor altitude in metres, for sea-level pressure [default: 0]
  --interval <ms>      Milliseconds between readings [default: 1000]
  --count <n>          Number of readings, 0 for no limit [default: 0]
  -v --version         Show version.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_device: String,
    flag_address: u16,
    flag_altitude: f64,
    flag_interval: u64,
    flag_count: u64,
    flag_version: bool,
}

#[cfg(target_os = "linux")]
fn print_measurement(m: &Measurement, altitude: f64) {
    println!("Temperature {:.2}°C", m.temperature);
    println!("Humidity {:.2}%", m.humidity);
    println!("Pressure {:.2}mmHg", pa_to_hg(m.pressure as f32));
    if altitude != 0.0 {
        println!("Sea-level pressure {}Pa", qnh_pressure(m.pressure, altitude));
    }
    println!("Dewpoint {:.2}°C", dewpoint(m.humidity, m.temperature));
    println!();
}

#[cfg(target_os = "linux")]
fn run(args: &Args) -> Result<()> {
    let bme280 = acquire(&args.arg_device, args.flag_address, Config::default())?;
    let interval = time::Duration::from_millis(args.flag_interval);

    let mut taken = 0;
    while args.flag_count == 0 || taken < args.flag_count {
        match bme280.lock().measure() {
            Ok(m) => print_measurement(&m, args.flag_altitude),
            Err(ref e) if e.is_retryable() => warn!("{}", e),
            Err(e) => return Err(e),
        }
        taken += 1;
        if args.flag_count == 0 || taken < args.flag_count {
            thread::sleep(interval);
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    println!("This program can run only on Linux")
}

#[cfg(target_os = "linux")]
fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE).and_then(|d| d.deserialize()).unwrap_or_else(|e| e.exit());

    if args.flag_version {
        println!("bme280 {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
