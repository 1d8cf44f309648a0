//! Sample records and their wire representation
//!
//! Everything here serializes to the flat key/value objects the dashboard
//! consumes: physical values under `temperature`, `pressure` and `co2`, one
//! `gpio<N>` key per pin, and `date_time` as `YYYY-MM-DD HH:MM:SS`.

use core::fmt::Display;
use core::str::FromStr;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::clock::format_date_time;
use crate::gpio::{Level, PinState, PinStates, wire_name};

/// One complete sampling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// °C
    pub temperature: f64,
    /// Pa
    pub pressure: f64,
    /// ppm
    pub co2: u16,
    pub inputs: PinStates,
    pub outputs: PinStates,
    pub timestamp: PrimitiveDateTime,
}

impl Sample {
    /// Input and output states, inputs first.
    pub fn pins(&self) -> impl Iterator<Item = &PinState> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Level recorded for `pin`, `None` when the pin is disabled or unknown.
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.pins().find(|state| state.pin == pin).and_then(|state| state.level)
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[Sample] {}: temperature: {:.2}°C, pressure: {:.1} Pa, co2: {} ppm",
            format_date_time(&self.timestamp),
            self.temperature,
            self.pressure,
            self.co2
        )
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("temperature", &self.temperature)?;
        map.serialize_entry("pressure", &self.pressure)?;
        map.serialize_entry("co2", &self.co2)?;
        for state in self.pins() {
            map.serialize_entry(&wire_name(state.pin), &state.level)?;
        }
        map.serialize_entry("date_time", &format_date_time(&self.timestamp))?;
        map.end()
    }
}

/// A single quantity the station can read on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Pressure,
    Co2,
    DigitalInputs,
}

impl Quantity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Co2 => "co2",
            Self::DigitalInputs => "digital-inputs",
        }
    }
}

impl FromStr for Quantity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "pressure" => Ok(Self::Pressure),
            "co2" => Ok(Self::Co2),
            "digital-inputs" | "gpio" | "distance" => Ok(Self::DigitalInputs),
            _ => Err(()),
        }
    }
}

/// Value of a single-quantity read.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Temperature(f64),
    Pressure(f64),
    Co2(u16),
    DigitalInputs(PinStates),
    /// Level an output was just driven to.
    DigitalOutput(PinState),
}

/// A single-quantity read or output write, stamped when it happened. Never
/// enters history.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Value,
    pub timestamp: PrimitiveDateTime,
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.value {
            Value::Temperature(t) => map.serialize_entry("temperature", t)?,
            Value::Pressure(p) => map.serialize_entry("pressure", p)?,
            Value::Co2(ppm) => map.serialize_entry("co2", ppm)?,
            Value::DigitalInputs(states) => {
                for state in states {
                    map.serialize_entry(&wire_name(state.pin), &state.level)?;
                }
            }
            Value::DigitalOutput(state) => {
                map.serialize_entry(&wire_name(state.pin), &state.level)?
            }
        }
        map.serialize_entry("date_time", &format_date_time(&self.timestamp))?;
        map.end()
    }
}

/// Column-wise view of a run of samples: one array per field.
///
/// Pin columns follow the pin layout of the newest sample.
pub struct HistoryColumns<'a> {
    samples: &'a [Sample],
}

impl<'a> HistoryColumns<'a> {
    pub fn new(samples: &'a [Sample]) -> Self {
        Self { samples }
    }
}

impl Serialize for HistoryColumns<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let samples = self.samples;
        let column = |f: fn(&Sample) -> f64| samples.iter().map(f).collect::<Vec<_>>();

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("temperature", &column(|s| s.temperature))?;
        map.serialize_entry("pressure", &column(|s| s.pressure))?;
        map.serialize_entry("co2", &samples.iter().map(|s| s.co2).collect::<Vec<_>>())?;

        if let Some(newest) = samples.last() {
            for state in newest.pins() {
                let levels: Vec<Option<Level>> = samples.iter().map(|s| s.level(state.pin)).collect();
                map.serialize_entry(&wire_name(state.pin), &levels)?;
            }
        }

        let stamps: Vec<String> = samples.iter().map(|s| format_date_time(&s.timestamp)).collect();
        map.serialize_entry("date_time", &stamps)?;
        map.end()
    }
}
