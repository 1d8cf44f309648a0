//! Infineon XENSIV PAS CO2 photoacoustic sensor
//!
//! Measurements are single-shot: the sensor is put into idle mode, given the
//! ambient pressure for compensation, triggered, and read back once the
//! measurement has settled. The waits are part of the device protocol.
//! Shortening or reordering them yields stale or garbage concentrations.

use embedded_hal::delay::DelayNs;
use log::debug;

use super::SensorError;
use crate::bus::RegisterIo;

const SENSOR: &str = "PAS CO2";

pub const PAS_CO2_ADDRESS: u8 = 0x28;

/// Standard atmosphere used for pressure compensation, in hPa.
pub const DEFAULT_PRESSURE_HPA: u16 = 1013;

const REG_SENS_STS: u8 = 0x01;
const REG_MEAS_CFG: u8 = 0x04;
const REG_CO2PPM_H: u8 = 0x05;
const REG_CO2PPM_L: u8 = 0x06;
const REG_PRESS_REF_H: u8 = 0x0B;
const REG_PRESS_REF_L: u8 = 0x0C;

const MODE_IDLE: u8 = 0x00;
const MODE_SINGLE_SHOT: u8 = 0x01;

const IDLE_SETTLE_MS: u32 = 400;
const MEASUREMENT_SETTLE_MS: u32 = 1150;
const RESULT_SETTLE_MS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasCo2 {
    address: u8,
    pressure_hpa: u16,
}

impl Default for PasCo2 {
    fn default() -> Self {
        Self::new(PAS_CO2_ADDRESS, DEFAULT_PRESSURE_HPA)
    }
}

impl PasCo2 {
    pub const fn new(address: u8, pressure_hpa: u16) -> Self {
        Self {
            address,
            pressure_hpa,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Run one single-shot measurement and return the CO2 concentration in ppm.
    ///
    /// Blocks for roughly 1.56 s.
    pub fn measure<B, D>(&self, bus: &mut B, delay: &mut D) -> Result<u16, SensorError>
    where
        B: RegisterIo,
        D: DelayNs,
    {
        self.write(bus, REG_MEAS_CFG, MODE_IDLE, "enter idle mode")?;
        delay.delay_ms(IDLE_SETTLE_MS);

        let [high, low] = self.pressure_hpa.to_be_bytes();
        self.write(bus, REG_PRESS_REF_H, high, "set pressure compensation")?;
        self.write(bus, REG_PRESS_REF_L, low, "set pressure compensation")?;

        self.write(bus, REG_MEAS_CFG, MODE_SINGLE_SHOT, "trigger measurement")?;
        delay.delay_ms(MEASUREMENT_SETTLE_MS);

        let high = self.read(bus, REG_CO2PPM_H, "read result")?;
        delay.delay_ms(RESULT_SETTLE_MS);
        let low = self.read(bus, REG_CO2PPM_L, "read result")?;
        delay.delay_ms(RESULT_SETTLE_MS);

        let ppm = u16::from_be_bytes([high, low]);
        debug!("PAS CO2: {} ppm", ppm);
        Ok(ppm)
    }

    /// Raw contents of the sensor status register.
    pub fn status<B: RegisterIo>(&self, bus: &mut B) -> Result<u8, SensorError> {
        self.read(bus, REG_SENS_STS, "read status")
    }

    fn read<B: RegisterIo>(
        &self,
        bus: &mut B,
        register: u8,
        operation: &'static str,
    ) -> Result<u8, SensorError> {
        bus.read_byte(self.address, register)
            .map_err(SensorError::transport(SENSOR, operation))
    }

    fn write<B: RegisterIo>(
        &self,
        bus: &mut B,
        register: u8,
        value: u8,
        operation: &'static str,
    ) -> Result<(), SensorError> {
        bus.write_byte(self.address, register, value)
            .map_err(SensorError::transport(SENSOR, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    /// Records every wait so the protocol timing can be checked.
    #[derive(Default)]
    struct RecordingDelay {
        waits_ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waits_ms.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.waits_ms.push(ms);
        }
    }

    fn measurement(result: [u8; 2]) -> Vec<I2cTransaction> {
        vec![
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_MEAS_CFG, MODE_IDLE]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_PRESS_REF_H, 0x03]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_PRESS_REF_L, 0xF5]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_MEAS_CFG, MODE_SINGLE_SHOT]),
            I2cTransaction::write_read(PAS_CO2_ADDRESS, vec![REG_CO2PPM_H], vec![result[0]]),
            I2cTransaction::write_read(PAS_CO2_ADDRESS, vec![REG_CO2PPM_L], vec![result[1]]),
        ]
    }

    #[test]
    fn test_measure_sequence_and_value() {
        let expectations = measurement([0x02, 0x1C]);
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let ppm = PasCo2::default().measure(&mut i2c, &mut delay).unwrap();

        assert_eq!(ppm, 540);
        assert_eq!(delay.waits_ms, vec![400, 1150, 5, 5]);
        i2c.done();
    }

    #[test]
    fn test_measure_is_unsigned() {
        let expectations = measurement([0xFF, 0xFF]);
        let mut i2c = I2cMock::new(&expectations);

        let ppm = PasCo2::default()
            .measure(&mut i2c, &mut RecordingDelay::default())
            .unwrap();

        assert_eq!(ppm, u16::MAX);
        i2c.done();
    }

    #[test]
    fn test_default_pressure_bytes() {
        assert_eq!(DEFAULT_PRESSURE_HPA.to_be_bytes(), [0x03, 0xF5]);
    }

    #[test]
    fn test_trigger_failure_stops_sequence() {
        let expectations = [
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_MEAS_CFG, MODE_IDLE]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_PRESS_REF_H, 0x03]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_PRESS_REF_L, 0xF5]),
            I2cTransaction::write(PAS_CO2_ADDRESS, vec![REG_MEAS_CFG, MODE_SINGLE_SHOT])
                .with_error(ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let result = PasCo2::default().measure(&mut i2c, &mut delay);

        assert!(matches!(
            result,
            Err(SensorError::Transport {
                sensor: "PAS CO2",
                operation: "trigger measurement",
                ..
            })
        ));
        assert_eq!(delay.waits_ms, vec![400]);
        i2c.done();
    }

    #[test]
    fn test_custom_address_and_pressure() {
        let sensor = PasCo2::new(0x29, 950);
        let expectations = [
            I2cTransaction::write(0x29, vec![REG_MEAS_CFG, MODE_IDLE]),
            I2cTransaction::write(0x29, vec![REG_PRESS_REF_H, 0x03]),
            I2cTransaction::write(0x29, vec![REG_PRESS_REF_L, 0xB6]),
            I2cTransaction::write(0x29, vec![REG_MEAS_CFG, MODE_SINGLE_SHOT]),
            I2cTransaction::write_read(0x29, vec![REG_CO2PPM_H], vec![0x01]),
            I2cTransaction::write_read(0x29, vec![REG_CO2PPM_L], vec![0x90]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let ppm = sensor
            .measure(&mut i2c, &mut RecordingDelay::default())
            .unwrap();

        assert_eq!(ppm, 400);
        i2c.done();
    }

    #[test]
    fn test_status() {
        let expectations = [I2cTransaction::write_read(
            PAS_CO2_ADDRESS,
            vec![REG_SENS_STS],
            vec![0x80],
        )];
        let mut i2c = I2cMock::new(&expectations);

        assert_eq!(PasCo2::default().status(&mut i2c).unwrap(), 0x80);
        i2c.done();
    }
}
