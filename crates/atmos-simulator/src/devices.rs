//! Simulated station hardware
//!
//! [`SimulatedBus`] answers I2C transactions the way a DPS310 and a PAS CO2
//! would, with readings that drift along slow sinusoids. [`SimulatedGpio`]
//! keeps output levels in memory and toggles the inputs over time.

use std::collections::HashMap;
use std::time::Instant;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use atmos_core::gpio::DigitalIo;
use atmos_core::sensors::{CalibrationCoefficients, OVERSAMPLING_SCALE};

/// Calibration image burned into the simulated DPS310.
const DPS310_COEFFICIENTS: [u8; 18] = [
    0x0C, 0xBE, 0xFC, 0x13, 0xD9, 0xAF, 0x2B, 0x34, 0xF3, 0xF7, 0x04, 0xFF, 0xDA, 0x5A, 0x00, 0x0A,
    0xFB, 0x1B,
];

const NEWTON_ITERATIONS: usize = 8;

/// Synthetic environment, as a function of seconds since start.
pub struct Environment;

impl Environment {
    /// 20-26 °C with slow drift.
    pub fn temperature(t: f64) -> f64 {
        23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos()
    }

    /// Around one standard atmosphere, in Pa.
    pub fn pressure(t: f64) -> f64 {
        101_325.0 + 300.0 * (t / 600.0).sin() + 40.0 * (t / 53.0).cos()
    }

    /// 400-800 ppm with a longer cycle.
    pub fn co2(t: f64) -> u16 {
        (600.0 + 200.0 * (t / 300.0).sin() + 30.0 * (t / 41.0).cos()) as u16
    }

    /// Inputs flip every few seconds, each pin on its own phase.
    pub fn input(t: f64, pin: u8) -> bool {
        (t / 5.0 + f64::from(pin)).sin() > 0.0
    }
}

enum TimeSource {
    Running(Instant),
    Frozen(f64),
}

impl TimeSource {
    fn seconds(&self) -> f64 {
        match self {
            Self::Running(start) => start.elapsed().as_secs_f64(),
            Self::Frozen(t) => *t,
        }
    }
}

/// A register-mapped device on the simulated bus.
trait RegisterDevice: Send {
    fn read(&mut self, register: u8, t: f64) -> u8;
    fn write(&mut self, register: u8, value: u8, t: f64);
}

/// DPS310 register model. Each measurement channel is latched when its most
/// significant byte is read so the three bytes belong together.
struct Dps310Model {
    coefficients: CalibrationCoefficients,
    latched: HashMap<u8, [u8; 3]>,
    scaled_t: f64,
}

impl Dps310Model {
    const PRESSURE: u8 = 0x00;
    const TEMPERATURE: u8 = 0x03;
    const COEFFICIENTS: u8 = 0x10;

    fn new() -> Self {
        Self {
            coefficients: CalibrationCoefficients::from_registers(&DPS310_COEFFICIENTS),
            latched: HashMap::new(),
            scaled_t: 0.0,
        }
    }

    fn encode(scaled: f64) -> [u8; 3] {
        let raw = (scaled * OVERSAMPLING_SCALE).round() as i32;
        let raw = raw.clamp(-(1 << 23), (1 << 23) - 1) as u32 & 0x00FF_FFFF;
        let [_, high, mid, low] = raw.to_be_bytes();
        [high, mid, low]
    }

    fn scaled_temperature(&self, t: f64) -> f64 {
        let c = &self.coefficients;
        (Environment::temperature(t) - f64::from(c.c0) * 0.5) / f64::from(c.c1)
    }

    /// Solve the compensation polynomial for the scaled pressure that yields
    /// the target pressure at the latched temperature.
    fn scaled_pressure(&self, t: f64) -> f64 {
        let c = &self.coefficients;
        let target = Environment::pressure(t);
        let st = self.scaled_t;
        let [c10, c20, c30, c11, c21] = [c.c10, c.c20, c.c30, c.c11, c.c21].map(f64::from);

        let mut sp = (target - f64::from(c.c00) - st * f64::from(c.c01)) / c10;
        for _ in 0..NEWTON_ITERATIONS {
            let residual = c.compensate_pressure(sp, st) - target;
            let slope = c10 + sp * (2.0 * c20 + 3.0 * sp * c30) + st * (c11 + 2.0 * sp * c21);
            sp -= residual / slope;
        }
        sp
    }
}

impl RegisterDevice for Dps310Model {
    fn read(&mut self, register: u8, t: f64) -> u8 {
        match register {
            Self::PRESSURE..=0x05 => {
                let base = register - register % 3;
                if register == base {
                    let bytes = if base == Self::TEMPERATURE {
                        self.scaled_t = self.scaled_temperature(t);
                        Self::encode(self.scaled_t)
                    } else {
                        Self::encode(self.scaled_pressure(t))
                    };
                    self.latched.insert(base, bytes);
                }
                self.latched.get(&base).map_or(0, |bytes| bytes[usize::from(register - base)])
            }
            Self::COEFFICIENTS..=0x21 => DPS310_COEFFICIENTS[usize::from(register - Self::COEFFICIENTS)],
            _ => 0,
        }
    }

    fn write(&mut self, register: u8, value: u8, _t: f64) {
        log::trace!("DPS310 0x{:02X} <- 0x{:02X}", register, value);
    }
}

/// PAS CO2 register model. A single-shot trigger latches a new concentration.
struct PasCo2Model {
    ppm: u16,
    pressure_ref: [u8; 2],
}

impl PasCo2Model {
    const STATUS_READY: u8 = 0x80;

    fn new() -> Self {
        Self {
            ppm: 0,
            pressure_ref: [0, 0],
        }
    }
}

impl RegisterDevice for PasCo2Model {
    fn read(&mut self, register: u8, _t: f64) -> u8 {
        let [high, low] = self.ppm.to_be_bytes();
        match register {
            0x01 => Self::STATUS_READY,
            0x05 => high,
            0x06 => low,
            0x0B => self.pressure_ref[0],
            0x0C => self.pressure_ref[1],
            _ => 0,
        }
    }

    fn write(&mut self, register: u8, value: u8, t: f64) {
        match (register, value) {
            (0x04, 0x01) => {
                self.ppm = Environment::co2(t);
                log::debug!(
                    "PAS CO2 single shot at {} hPa: {} ppm",
                    u16::from_be_bytes(self.pressure_ref),
                    self.ppm
                );
            }
            (0x0B, value) => self.pressure_ref[0] = value,
            (0x0C, value) => self.pressure_ref[1] = value,
            _ => {}
        }
    }
}

/// I2C bus carrying a simulated DPS310 and PAS CO2.
pub struct SimulatedBus {
    devices: HashMap<u8, Box<dyn RegisterDevice>>,
    time: TimeSource,
}

impl SimulatedBus {
    pub fn new(dps310_address: u8, co2_address: u8) -> Self {
        Self::with_time(dps310_address, co2_address, TimeSource::Running(Instant::now()))
    }

    fn with_time(dps310_address: u8, co2_address: u8, time: TimeSource) -> Self {
        let mut devices: HashMap<u8, Box<dyn RegisterDevice>> = HashMap::new();
        devices.insert(dps310_address, Box::new(Dps310Model::new()));
        devices.insert(co2_address, Box::new(PasCo2Model::new()));
        Self { devices, time }
    }
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for SimulatedBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let t = self.time.seconds();
        let device = self
            .devices
            .get_mut(&address)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        // Register pointer, auto-incremented across bytes.
        let mut register = 0u8;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((&first, values)) = bytes.split_first() {
                        register = first;
                        for &value in values {
                            device.write(register, value, t);
                            register = register.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        *slot = device.read(register, t);
                        register = register.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// In-memory GPIO. Outputs hold what was written, inputs follow
/// [`Environment::input`].
pub struct SimulatedGpio {
    outputs: HashMap<u8, bool>,
    time: TimeSource,
}

impl SimulatedGpio {
    pub fn new(outputs: &[u8]) -> Self {
        Self {
            outputs: outputs.iter().map(|&pin| (pin, false)).collect(),
            time: TimeSource::Running(Instant::now()),
        }
    }
}

impl DigitalIo for SimulatedGpio {
    type Error = &'static str;

    fn read_pin(&mut self, pin: u8) -> Result<bool, Self::Error> {
        Ok(self
            .outputs
            .get(&pin)
            .copied()
            .unwrap_or_else(|| Environment::input(self.time.seconds(), pin)))
    }

    fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), Self::Error> {
        match self.outputs.get_mut(&pin) {
            Some(level) => {
                *level = high;
                Ok(())
            }
            None => Err("not an output"),
        }
    }
}
