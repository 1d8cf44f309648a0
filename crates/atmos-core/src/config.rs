//! Runtime configuration
//!
//! Defaults match the reference station wiring. A JSON file named by
//! `ATMOS_CONFIG` can replace them, and individual `ATMOS_*` variables
//! override either.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpio::{InputPin, MAX_PINS, PinConfig};
use crate::sensors::{DEFAULT_PRESSURE_HPA, DPS310_ADDRESSES, PAS_CO2_ADDRESS, PasCo2};
use crate::station::StationSettings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable}={value:?}: {reason}")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
    #[error("{list} lists {count} pins, at most {max} are supported", max = MAX_PINS)]
    TooManyPins { list: &'static str, count: usize },
    #[error("cannot load {path}: {details}")]
    File { path: String, details: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sensors: SensorConfig,
    pub pins: PinsConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// HTTP worker threads.
    pub workers: usize,
    /// Upper bound on a single station call made for a request.
    pub sample_timeout_ms: u64,
    pub dashboard: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            workers: 4,
            sample_timeout_ms: 10_000,
            dashboard: PathBuf::from("dashboard.html"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SensorConfig {
    /// `/dev/i2c-<n>`
    pub i2c_bus: u8,
    pub dps310_addresses: Vec<u8>,
    pub co2_address: u8,
    pub co2_pressure_hpa: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            dps310_addresses: DPS310_ADDRESSES.to_vec(),
            co2_address: PAS_CO2_ADDRESS,
            co2_pressure_hpa: DEFAULT_PRESSURE_HPA,
        }
    }
}

/// Physical header pin numbers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PinsConfig {
    pub inputs: Vec<u8>,
    /// Inputs that are reported as `null` instead of being read.
    pub disabled: Vec<u8>,
    pub outputs: Vec<u8>,
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            inputs: vec![35, 36],
            disabled: Vec::new(),
            outputs: vec![27, 29, 31, 33],
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load using `lookup` to resolve variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("ATMOS_CONFIG") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let var = |name: &'static str| lookup(name).map(|value| (name, value));

        if let Some((_, value)) = var("ATMOS_BIND") {
            config.server.bind = value;
        }
        if let Some((name, value)) = var("ATMOS_PORT") {
            config.server.port = parse_number(name, &value)?;
        }
        if let Some((name, value)) = var("ATMOS_WORKERS") {
            config.server.workers = parse_number(name, &value)?;
            if config.server.workers == 0 {
                return Err(invalid(name, &value, "at least one worker is required"));
            }
        }
        if let Some((name, value)) = var("ATMOS_SAMPLE_TIMEOUT_MS") {
            config.server.sample_timeout_ms = parse_number(name, &value)?;
        }
        if let Some((_, value)) = var("ATMOS_DASHBOARD") {
            config.server.dashboard = PathBuf::from(value);
        }

        if let Some((name, value)) = var("ATMOS_I2C_BUS") {
            config.sensors.i2c_bus = parse_number(name, &value)?;
        }
        if let Some((name, value)) = var("ATMOS_DPS310_ADDRESSES") {
            config.sensors.dps310_addresses = parse_list(name, &value)?;
            if config.sensors.dps310_addresses.is_empty() {
                return Err(invalid(name, &value, "at least one address is required"));
            }
        }
        if let Some((name, value)) = var("ATMOS_CO2_ADDRESS") {
            config.sensors.co2_address = parse_byte(name, &value)?;
        }
        if let Some((name, value)) = var("ATMOS_CO2_PRESSURE_HPA") {
            config.sensors.co2_pressure_hpa = parse_number(name, &value)?;
        }

        if let Some((name, value)) = var("ATMOS_INPUT_PINS") {
            config.pins.inputs = parse_list(name, &value)?;
        }
        if let Some((name, value)) = var("ATMOS_DISABLED_PINS") {
            config.pins.disabled = parse_list(name, &value)?;
        }
        if let Some((name, value)) = var("ATMOS_OUTPUT_PINS") {
            config.pins.outputs = parse_list(name, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let file_error = |details: String| ConfigError::File {
            path: path.into(),
            details,
        };
        let text = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the station cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(invalid("server.workers", "0", "at least one worker is required"));
        }
        if self.sensors.dps310_addresses.is_empty() {
            return Err(invalid(
                "sensors.dps310_addresses",
                "[]",
                "at least one address is required",
            ));
        }
        self.pin_config().map(|_| ())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.server.sample_timeout_ms)
    }

    /// Pin layout with the disabled flags applied.
    pub fn pin_config(&self) -> Result<PinConfig, ConfigError> {
        let mut pins = PinConfig::default();
        for &pin in &self.pins.inputs {
            let input = InputPin {
                pin,
                enabled: !self.pins.disabled.contains(&pin),
            };
            pins.inputs.push(input).map_err(|_| ConfigError::TooManyPins {
                list: "inputs",
                count: self.pins.inputs.len(),
            })?;
        }
        for &pin in &self.pins.outputs {
            pins.outputs.push(pin).map_err(|_| ConfigError::TooManyPins {
                list: "outputs",
                count: self.pins.outputs.len(),
            })?;
        }
        Ok(pins)
    }

    pub fn station_settings(&self) -> Result<StationSettings, ConfigError> {
        Ok(StationSettings {
            dps310_addresses: self.sensors.dps310_addresses.clone(),
            co2: PasCo2::new(self.sensors.co2_address, self.sensors.co2_pressure_hpa),
            pins: self.pin_config()?,
        })
    }
}

fn invalid(variable: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        variable,
        value: value.into(),
        reason: reason.to_string(),
    }
}

fn parse_number<T>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e| invalid(variable, value, e))
}

/// Decimal or `0x` prefixed hexadecimal byte.
fn parse_byte(variable: &'static str, value: &str) -> Result<u8, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|e| invalid(variable, value, e))
}

/// Comma separated bytes. Blank entries are ignored, so an empty value is an
/// empty list.
fn parse_list(variable: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| parse_byte(variable, item))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
        assert_eq!(config.sample_timeout(), Duration::from_secs(10));
        assert_eq!(config.sensors.dps310_addresses, vec![0x77, 0x76]);

        let settings = config.station_settings().unwrap();
        assert_eq!(settings.co2, PasCo2::default());
        assert_eq!(settings.pins.inputs.len(), 2);
        assert!(settings.pins.inputs.iter().all(|input| input.enabled));
        assert_eq!(settings.pins.outputs.as_slice(), &[27, 29, 31, 33]);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ATMOS_PORT", "9000"),
            ("ATMOS_WORKERS", "2"),
            ("ATMOS_DPS310_ADDRESSES", "0x76"),
            ("ATMOS_CO2_ADDRESS", "41"),
            ("ATMOS_INPUT_PINS", "35, 36, 37"),
            ("ATMOS_DISABLED_PINS", "36"),
            ("ATMOS_OUTPUT_PINS", ""),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.workers, 2);
        assert_eq!(config.sensors.dps310_addresses, vec![0x76]);
        assert_eq!(config.sensors.co2_address, 41);

        let pins = config.pin_config().unwrap();
        let enabled: Vec<(u8, bool)> = pins.inputs.iter().map(|i| (i.pin, i.enabled)).collect();
        assert_eq!(enabled, vec![(35, true), (36, false), (37, true)]);
        assert!(pins.outputs.is_empty());
    }

    #[test]
    fn test_malformed_value() {
        let error = load(&[("ATMOS_PORT", "eighty")]).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                variable: "ATMOS_PORT",
                ..
            }
        ));

        assert!(load(&[("ATMOS_CO2_ADDRESS", "0x1FF")]).is_err());
        assert!(load(&[("ATMOS_WORKERS", "0")]).is_err());
        assert!(load(&[("ATMOS_DPS310_ADDRESSES", " ")]).is_err());
    }

    #[test]
    fn test_too_many_pins() {
        let error = load(&[("ATMOS_OUTPUT_PINS", "1,2,3,4,5,6,7,8,9")]).unwrap_err();
        assert_eq!(
            error,
            ConfigError::TooManyPins {
                list: "outputs",
                count: 9
            }
        );
    }

    #[test]
    fn test_json_fields_default_individually() {
        let config: Config =
            serde_json::from_str(r#"{"server": {"port": 8081}, "pins": {"disabled": [36]}}"#)
                .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.pins.inputs, vec![35, 36]);
        assert_eq!(config.pins.disabled, vec![36]);
    }

    #[test]
    fn test_missing_config_file() {
        let error = load(&[("ATMOS_CONFIG", "/nonexistent/atmos.json")]).unwrap_err();
        assert!(matches!(error, ConfigError::File { .. }));
    }

    fn load_file(name: &str, json: &str) -> Result<Config, ConfigError> {
        let path = std::env::temp_dir().join(format!("atmos-{}-{}.json", name, std::process::id()));
        fs::write(&path, json).unwrap();
        let result = load(&[("ATMOS_CONFIG", path.to_str().unwrap())]);
        fs::remove_file(&path).unwrap();
        result
    }

    #[test]
    fn test_config_file_is_validated() {
        let config = load_file("ok", r#"{"server": {"workers": 2}}"#).unwrap();
        assert_eq!(config.server.workers, 2);

        let error = load_file("workers", r#"{"server": {"workers": 0}}"#).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                variable: "server.workers",
                ..
            }
        ));

        let error = load_file("addresses", r#"{"sensors": {"dps310_addresses": []}}"#).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                variable: "sensors.dps310_addresses",
                ..
            }
        ));

        let error = load_file("pins", r#"{"pins": {"outputs": [1, 2, 3, 4, 5, 6, 7, 8, 9]}}"#)
            .unwrap_err();
        assert!(matches!(error, ConfigError::TooManyPins { .. }));
    }
}
