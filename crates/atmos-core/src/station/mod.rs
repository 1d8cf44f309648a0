//! Sampling facade over the station hardware
//!
//! [`Station`] owns the bus, the GPIO lines, the delay source and the clock,
//! and knows how to turn them into [`Sample`]s. It is strictly single-caller;
//! [`SharedStation`] is what concurrent callers use.

mod shared;

#[cfg(test)]
pub(crate) mod fakes;

pub use shared::*;

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};
use thiserror::Error;

use crate::bus::RegisterIo;
use crate::clock::Clock;
use crate::gpio::{DigitalIo, Level, PinConfig, PinState, PinStates};
use crate::sensors::{DPS310_ADDRESSES, Dps310, PasCo2, SensorError};
use crate::storage::{Quantity, Reading, Sample, Value};

const DPS310: &str = "DPS310";

/// Errors reported by station operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("GPIO pin {pin}: {details}")]
    Gpio { pin: u8, details: String },
    #[error("pin {0} is not a configured output")]
    UnknownPin(u8),
    #[error("no room to report pin {0}")]
    TooManyPins(u8),
    #[error("station did not respond in time")]
    Timeout,
    #[error("station call aborted before it returned")]
    Aborted,
}

/// Coarse classification of a [`StationError`], as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceNotFound,
    Transport,
    InvalidState,
    InvalidRequest,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceNotFound => "device_not_found",
            Self::Transport => "transport",
            Self::InvalidState => "invalid_state",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl StationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Sensor(SensorError::DeviceNotFound { .. }) => ErrorKind::DeviceNotFound,
            Self::Sensor(SensorError::Transport { .. }) => ErrorKind::Transport,
            Self::Sensor(SensorError::InvalidState { .. }) => ErrorKind::InvalidState,
            Self::Gpio { .. } | Self::Timeout | Self::Aborted => ErrorKind::Transport,
            Self::TooManyPins(_) => ErrorKind::InvalidState,
            Self::UnknownPin(_) => ErrorKind::InvalidRequest,
        }
    }

    fn gpio<E: Debug>(pin: u8) -> impl FnOnce(E) -> StationError {
        move |e| {
            error!("GPIO pin {} failed: {:?}", pin, e);
            StationError::Gpio {
                pin,
                details: format!("{:?}", e),
            }
        }
    }
}

/// Everything the station needs to know about its devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSettings {
    /// DPS310 addresses, probed in order.
    pub dps310_addresses: Vec<u8>,
    pub co2: PasCo2,
    pub pins: PinConfig,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            dps310_addresses: DPS310_ADDRESSES.to_vec(),
            co2: PasCo2::default(),
            pins: PinConfig::default(),
        }
    }
}

/// The sensors and I/O lines of one station.
///
/// The bus is owned here and lent to each driver per operation, so whoever
/// holds `&mut Station` has exclusive use of it.
pub struct Station<B, G, D, K> {
    bus: B,
    gpio: G,
    delay: D,
    clock: K,
    dps310: Option<Dps310>,
    co2: PasCo2,
    pins: PinConfig,
    dps310_addresses: Vec<u8>,
}

impl<B, G, D, K> Station<B, G, D, K>
where
    B: RegisterIo,
    G: DigitalIo,
    D: DelayNs,
    K: Clock,
{
    /// Build an uninitialized station. Call [`Station::initialize`] before
    /// reading the DPS310.
    pub fn new(bus: B, gpio: G, delay: D, clock: K, settings: StationSettings) -> Self {
        Self {
            bus,
            gpio,
            delay,
            clock,
            dps310: None,
            co2: settings.co2,
            pins: settings.pins,
            dps310_addresses: settings.dps310_addresses,
        }
    }

    /// Probe and configure the DPS310.
    ///
    /// On failure the station stays usable for CO2 and GPIO, and DPS310 reads
    /// keep failing with `InvalidState`.
    pub fn initialize(&mut self) -> Result<(), StationError> {
        let sensor = Dps310::initialize(&mut self.bus, &self.dps310_addresses)?;
        info!("Station ready, DPS310 at 0x{:02X}", sensor.address());
        self.dps310 = Some(sensor);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.dps310.is_some()
    }

    pub fn pins(&self) -> &PinConfig {
        &self.pins
    }

    pub fn read_temperature(&mut self) -> Result<f64, StationError> {
        let sensor = initialized(&self.dps310)?;
        Ok(sensor.read_temperature(&mut self.bus)?)
    }

    pub fn read_pressure(&mut self) -> Result<f64, StationError> {
        let sensor = initialized(&self.dps310)?;
        Ok(sensor.read_pressure(&mut self.bus)?)
    }

    /// Blocks for the full single-shot measurement.
    pub fn read_co2(&mut self) -> Result<u16, StationError> {
        Ok(self.co2.measure(&mut self.bus, &mut self.delay)?)
    }

    /// Levels of all input lines. Disabled lines are not touched.
    pub fn read_inputs(&mut self) -> Result<PinStates, StationError> {
        let mut states = PinStates::new();
        for input in &self.pins.inputs {
            let level = if input.enabled {
                let high = self
                    .gpio
                    .read_pin(input.pin)
                    .map_err(StationError::gpio(input.pin))?;
                Some(Level::from(high))
            } else {
                None
            };
            push_state(
                &mut states,
                PinState {
                    pin: input.pin,
                    level,
                },
            )?;
        }
        Ok(states)
    }

    /// Levels the output lines are currently driven to.
    pub fn read_outputs(&mut self) -> Result<PinStates, StationError> {
        let mut states = PinStates::new();
        for &pin in &self.pins.outputs {
            let high = self.gpio.read_pin(pin).map_err(StationError::gpio(pin))?;
            push_state(
                &mut states,
                PinState {
                    pin,
                    level: Some(Level::from(high)),
                },
            )?;
        }
        Ok(states)
    }

    /// Run one full sampling cycle.
    ///
    /// Any failed read fails the whole cycle. The result is not recorded
    /// anywhere; [`SharedStation`] takes care of history.
    pub fn sample_all(&mut self) -> Result<Sample, StationError> {
        let temperature = self.read_temperature()?;
        let pressure = self.read_pressure()?;
        let co2 = self.read_co2()?;
        let inputs = self.read_inputs()?;
        let outputs = self.read_outputs()?;

        let sample = Sample {
            temperature,
            pressure,
            co2,
            inputs,
            outputs,
            timestamp: self.clock.now(),
        };
        debug!("{}", sample);
        Ok(sample)
    }

    /// Read a single quantity.
    pub fn sample_one(&mut self, quantity: Quantity) -> Result<Reading, StationError> {
        let value = match quantity {
            Quantity::Temperature => Value::Temperature(self.read_temperature()?),
            Quantity::Pressure => Value::Pressure(self.read_pressure()?),
            Quantity::Co2 => Value::Co2(self.read_co2()?),
            Quantity::DigitalInputs => Value::DigitalInputs(self.read_inputs()?),
        };
        debug!("Read {}: {:?}", quantity.label(), value);

        Ok(Reading {
            value,
            timestamp: self.clock.now(),
        })
    }

    /// Drive a configured output line.
    pub fn apply_digital_output(&mut self, pin: u8, level: Level) -> Result<Reading, StationError> {
        if !self.pins.is_output(pin) {
            return Err(StationError::UnknownPin(pin));
        }

        self.gpio
            .write_pin(pin, level.is_high())
            .map_err(StationError::gpio(pin))?;
        info!("Output pin {} set {:?}", pin, level);

        Ok(Reading {
            value: Value::DigitalOutput(PinState {
                pin,
                level: Some(level),
            }),
            timestamp: self.clock.now(),
        })
    }
}

fn initialized(dps310: &Option<Dps310>) -> Result<&Dps310, SensorError> {
    dps310
        .as_ref()
        .ok_or(SensorError::InvalidState { sensor: DPS310 })
}

fn push_state(states: &mut PinStates, state: PinState) -> Result<(), StationError> {
    states.push(state).map_err(|state| {
        error!("Pin {} does not fit in a report", state.pin);
        StationError::TooManyPins(state.pin)
    })
}
