/// Sensor power mode, bits 1-0 of ctrl_meas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Sleep,
    Forced,
    Normal,
}

impl Mode {
    pub fn value(&self) -> u8 {
        match *self {
            Mode::Sleep => 0,
            Mode::Forced => 1,
            Mode::Normal => 3,
        }
    }
}

/// IIR filter coefficient, bits 4-2 of config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Off,
    X2,
    X4,
    X8,
    X16,
}

impl Filter {
    pub fn value(&self) -> u8 {
        match *self {
            Filter::Off => 0,
            Filter::X2 => 1,
            Filter::X4 => 2,
            Filter::X8 => 3,
            Filter::X16 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Oversampling {
    /// No measurement; the channel reads back its reset value.
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    pub fn value(&self) -> u8 {
        match *self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 3,
            Oversampling::X8 => 4,
            Oversampling::X16 => 5,
        }
    }
}

/// Inactive time between measurements in normal mode, bits 7-5 of config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandbyTime {
    Ms0_5,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    Ms2000,
    Ms4000,
}

impl StandbyTime {
    pub fn value(&self) -> u8 {
        match *self {
            StandbyTime::Ms0_5 => 0,
            StandbyTime::Ms62_5 => 1,
            StandbyTime::Ms125 => 2,
            StandbyTime::Ms250 => 3,
            StandbyTime::Ms500 => 4,
            StandbyTime::Ms1000 => 5,
            StandbyTime::Ms2000 => 6,
            StandbyTime::Ms4000 => 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub filter: Filter,
    pub oversampling_temperature: Oversampling,
    pub oversampling_pressure: Oversampling,
    pub oversampling_humidity: Oversampling,
    pub standby_time: StandbyTime,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mode: Mode::Normal,
            filter: Filter::Off,
            oversampling_temperature: Oversampling::X4,
            oversampling_pressure: Oversampling::X4,
            oversampling_humidity: Oversampling::X4,
            standby_time: StandbyTime::Ms500,
        }
    }
}

impl Config {
    /// Value for the config register (0xF5).
    pub fn config_reg(&self) -> u8 {
        (self.standby_time.value() << 5) | (self.filter.value() << 2)
    }

    /// Value for the ctrl_hum register (0xF2).
    pub fn ctrl_hum_reg(&self) -> u8 {
        self.oversampling_humidity.value()
    }

    /// Value for the ctrl_meas register (0xF4).
    pub fn ctrl_meas_reg(&self) -> u8 {
        (self.oversampling_temperature.value() << 5)
            | (self.oversampling_pressure.value() << 2)
            | self.mode.value()
    }
}
