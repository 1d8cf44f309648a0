//! Digital I/O lines exposed by the station
//!
//! Pins are identified by their physical header number, which is also the
//! number used in the wire format (`gpio35`, `gpio27`, ...). Translating that
//! to whatever numbering the host driver uses is the job of the
//! [`DigitalIo`] implementation.

use core::fmt::Debug;

use serde::{Serialize, Serializer};

/// Maximum number of input or output pins the station tracks.
pub const MAX_PINS: usize = 8;

/// Read and drive digital lines by header pin number.
pub trait DigitalIo {
    /// Error reported when a line cannot be accessed.
    type Error: Debug;

    /// Returns `true` when the line is high. For outputs this is the level
    /// the line is currently driven to.
    fn read_pin(&mut self, pin: u8) -> Result<bool, Self::Error>;

    /// Drives an output line high (`true`) or low (`false`).
    fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), Self::Error>;
}

/// Logic level of a digital line.
///
/// Serialized as `0` / `1` to match what the dashboard expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    /// Parse the `0` / `1` form used in query strings.
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "0" | "low" | "off" => Some(Self::Low),
            "1" | "high" | "on" => Some(Self::High),
            _ => None,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.is_high() as u8)
    }
}

/// A digital input line and whether it takes part in sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPin {
    pub pin: u8,
    /// Disabled inputs are never read and report no level.
    pub enabled: bool,
}

/// Pin layout of the station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinConfig {
    pub inputs: heapless::Vec<InputPin, MAX_PINS>,
    pub outputs: heapless::Vec<u8, MAX_PINS>,
}

impl PinConfig {
    pub fn is_output(&self, pin: u8) -> bool {
        self.outputs.contains(&pin)
    }
}

/// Level observed on one pin during a sampling cycle.
///
/// `level` is `None` for disabled inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub pin: u8,
    pub level: Option<Level>,
}

pub type PinStates = heapless::Vec<PinState, MAX_PINS>;

/// Wire name of a pin, e.g. `gpio35`.
pub fn wire_name(pin: u8) -> String {
    format!("gpio{pin}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Level::Low).unwrap(), "0");
        assert_eq!(serde_json::to_string(&None::<Level>).unwrap(), "null");
    }

    #[test]
    fn test_level_from_query() {
        assert_eq!(Level::from_query("1"), Some(Level::High));
        assert_eq!(Level::from_query("off"), Some(Level::Low));
        assert_eq!(Level::from_query("2"), None);
    }

    #[test]
    fn test_is_output() {
        let mut pins = PinConfig::default();
        pins.outputs.push(27).unwrap();

        assert!(pins.is_output(27));
        assert!(!pins.is_output(35));
    }
}
