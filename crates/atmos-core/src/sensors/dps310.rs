//! Infineon DPS310 barometric pressure and temperature sensor
//!
//! The sensor is configured for 64x oversampling on both channels with
//! continuous background measurement, so a reading is three register reads
//! away at any time. Raw results are 24-bit two's-complement values which are
//! scaled and run through the vendor compensation polynomials using the
//! calibration coefficients burned into the device.
//!
//! ## Coefficient layout
//!
//! Registers `0x10..=0x21` hold nine coefficients packed into 12, 16 and
//! 20 bit fields. `[7:4]` and `[3:0]` denote the high and low nibble of a
//! register.
//!
//! | field | bits | source                                |
//! |-------|------|---------------------------------------|
//! | c0    | 12   | `0x10`, `0x11[7:4]`                   |
//! | c1    | 12   | `0x11[3:0]`, `0x12`                   |
//! | c00   | 20   | `0x13`, `0x14`, `0x15[7:4]`           |
//! | c10   | 20   | `0x15[3:0]`, `0x16`, `0x17`           |
//! | c01   | 16   | `0x18`, `0x19`                        |
//! | c11   | 16   | `0x1A`, `0x1B`                        |
//! | c20   | 16   | `0x1C`, `0x1D`                        |
//! | c21   | 16   | `0x1E`, `0x1F`                        |
//! | c30   | 16   | `0x20`, `0x21`                        |
//!
//! Every field is most-significant byte first.

use log::{debug, info, warn};

use super::{SensorError, twos_complement};
use crate::bus::RegisterIo;

const SENSOR: &str = "DPS310";

/// Addresses the DPS310 may answer on, depending on the SDO strap.
pub const DPS310_ADDRESSES: [u8; 2] = [0x77, 0x76];

/// Scale factor for 64x oversampling, shared by both channels.
pub const OVERSAMPLING_SCALE: f64 = 1_040_384.0;

const REG_PSR_B2: u8 = 0x00;
const REG_TMP_B2: u8 = 0x03;
const REG_COEF: u8 = 0x10;

/// Number of coefficient registers starting at `REG_COEF`.
pub const COEF_LEN: usize = 18;

/// Undocumented register sequence that fixes the temperature offset of
/// early silicon revisions.
const TEMPERATURE_CORRECTION: [(u8, u8); 5] = [
    (0x0E, 0xA5),
    (0x0F, 0x96),
    (0x62, 0x02),
    (0x0E, 0x00),
    (0x0F, 0x00),
];

/// PRS_CFG, TMP_CFG, MEAS_CFG and CFG_REG:
/// 4 measurements/s at 64x oversampling, external temperature sensor,
/// continuous pressure and temperature, result bit-shift on both channels.
const OVERSAMPLING_CONFIG: [(u8, u8); 4] = [(0x06, 0x26), (0x07, 0xA6), (0x08, 0x07), (0x09, 0x0C)];

/// Calibration coefficients read from the sensor's coefficient registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationCoefficients {
    pub c0: i32,
    pub c1: i32,
    pub c00: i32,
    pub c10: i32,
    pub c01: i32,
    pub c11: i32,
    pub c20: i32,
    pub c21: i32,
    pub c30: i32,
}

impl CalibrationCoefficients {
    /// Unpack the coefficient registers `0x10..=0x21`, in register order.
    pub fn from_registers(regs: &[u8; COEF_LEN]) -> Self {
        let r = regs.map(u32::from);
        let word = |hi: usize| (r[hi] << 8) | r[hi + 1];

        Self {
            c0: twos_complement((r[0] << 4) | (r[1] >> 4), 12),
            c1: twos_complement(((r[1] & 0x0F) << 8) | r[2], 12),
            c00: twos_complement((r[3] << 12) | (r[4] << 4) | (r[5] >> 4), 20),
            c10: twos_complement(((r[5] & 0x0F) << 16) | (r[6] << 8) | r[7], 20),
            c01: twos_complement(word(8), 16),
            c11: twos_complement(word(10), 16),
            c20: twos_complement(word(12), 16),
            c21: twos_complement(word(14), 16),
            c30: twos_complement(word(16), 16),
        }
    }

    /// Compensated temperature in °C from a scaled temperature reading.
    pub fn compensate_temperature(&self, scaled_t: f64) -> f64 {
        f64::from(self.c0) * 0.5 + scaled_t * f64::from(self.c1)
    }

    /// Compensated pressure in Pa from scaled pressure and temperature readings.
    pub fn compensate_pressure(&self, scaled_p: f64, scaled_t: f64) -> f64 {
        let [c00, c10, c20, c30, c01, c11, c21] =
            [self.c00, self.c10, self.c20, self.c30, self.c01, self.c11, self.c21].map(f64::from);

        c00 + scaled_p * (c10 + scaled_p * (c20 + scaled_p * c30))
            + scaled_t * (c01 + scaled_p * (c11 + scaled_p * c21))
    }
}

/// Divide a raw 24-bit reading by the oversampling scale factor.
pub fn scale_raw(raw: i32) -> f64 {
    f64::from(raw) / OVERSAMPLING_SCALE
}

/// An initialized DPS310.
///
/// The driver does not own the bus; every operation borrows it so one bus
/// can serve several devices under a single lock.
#[derive(Debug, Clone)]
pub struct Dps310 {
    address: u8,
    coefficients: CalibrationCoefficients,
}

impl Dps310 {
    /// Find the sensor, configure it and read its calibration.
    ///
    /// `candidates` are probed in order and the first address that answers
    /// is used. The configuration writes are one-shot side effects on the
    /// device and are not retried.
    pub fn initialize<B: RegisterIo>(bus: &mut B, candidates: &[u8]) -> Result<Self, SensorError> {
        let address = Self::probe(bus, candidates)?;
        info!("DPS310 found at 0x{:02X}", address);

        for (register, value) in TEMPERATURE_CORRECTION.into_iter().chain(OVERSAMPLING_CONFIG) {
            bus.write_byte(address, register, value)
                .map_err(SensorError::transport(SENSOR, "configure"))?;
        }

        let coefficients = Self::read_coefficients(bus, address)?;
        debug!("DPS310 coefficients: {:?}", coefficients);

        Ok(Self {
            address,
            coefficients,
        })
    }

    fn probe<B: RegisterIo>(bus: &mut B, candidates: &[u8]) -> Result<u8, SensorError> {
        for &address in candidates {
            match bus.probe(address) {
                Ok(()) => return Ok(address),
                Err(e) => debug!("DPS310 not at 0x{:02X}: {:?}", address, e),
            }
        }

        warn!("DPS310 did not answer on any of {:02X?}", candidates);
        Err(SensorError::DeviceNotFound { sensor: SENSOR })
    }

    fn read_coefficients<B: RegisterIo>(
        bus: &mut B,
        address: u8,
    ) -> Result<CalibrationCoefficients, SensorError> {
        let mut regs = [0u8; COEF_LEN];
        for (register, slot) in (REG_COEF..).zip(regs.iter_mut()) {
            *slot = bus
                .read_byte(address, register)
                .map_err(SensorError::transport(SENSOR, "read calibration coefficients"))?;
        }
        Ok(CalibrationCoefficients::from_registers(&regs))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn coefficients(&self) -> &CalibrationCoefficients {
        &self.coefficients
    }

    /// Compensated temperature in °C.
    pub fn read_temperature<B: RegisterIo>(&self, bus: &mut B) -> Result<f64, SensorError> {
        let scaled_t = self.read_scaled(bus, REG_TMP_B2, "read temperature")?;
        Ok(self.coefficients.compensate_temperature(scaled_t))
    }

    /// Compensated pressure in Pa.
    ///
    /// The compensation needs the temperature channel too, so it is read
    /// fresh alongside the pressure channel.
    pub fn read_pressure<B: RegisterIo>(&self, bus: &mut B) -> Result<f64, SensorError> {
        let scaled_t = self.read_scaled(bus, REG_TMP_B2, "read temperature")?;
        let scaled_p = self.read_scaled(bus, REG_PSR_B2, "read pressure")?;
        Ok(self.coefficients.compensate_pressure(scaled_p, scaled_t))
    }

    fn read_scaled<B: RegisterIo>(
        &self,
        bus: &mut B,
        base: u8,
        operation: &'static str,
    ) -> Result<f64, SensorError> {
        let mut raw = 0u32;
        for register in base..base + 3 {
            let byte = bus
                .read_byte(self.address, register)
                .map_err(SensorError::transport(SENSOR, operation))?;
            raw = (raw << 8) | u32::from(byte);
        }
        Ok(scale_raw(twos_complement(raw, 24)))
    }
}
