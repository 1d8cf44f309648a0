//! Application wiring and error types for atmos on the Raspberry Pi

mod hardware;

pub use hardware::*;

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use atmos_core::clock::{LocalClock, SleepDelay};
use atmos_core::config::{Config, ConfigError};
use atmos_core::http::{HttpServer, Router, ServerError};
use atmos_core::station::{SharedStation, Station};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot open /dev/i2c-{bus}: {source}")]
    I2c {
        bus: u8,
        #[source]
        source: rppal::i2c::Error,
    },
    #[error("cannot open GPIO: {0}")]
    GpioChip(#[source] rppal::gpio::Error),
    #[error("cannot claim GPIO for header pin {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: rppal::gpio::Error,
    },
    #[error("header pin {0} has no GPIO line")]
    UnmappedPin(u8),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Bring up the hardware and serve requests until the server stops.
///
/// A DPS310 that cannot be found is not fatal: CO2 and GPIO queries keep
/// working and temperature or pressure queries report `invalid_state`.
pub fn run(config: &Config) -> Result<(), AppError> {
    let settings = config.station_settings()?;

    // Must happen before any other thread exists.
    let clock = LocalClock::detect();

    let i2c = init_i2c_bus(config.sensors.i2c_bus)?;
    let gpio = RpiGpio::init(&settings.pins)?;

    let mut station = Station::new(i2c, gpio, SleepDelay::new(), clock, settings);
    match station.initialize() {
        Ok(()) => info!("Sensors initialized"),
        Err(e) => warn!("DPS310 unavailable, temperature and pressure disabled: {}", e),
    }

    let router = Router::new(
        Arc::new(SharedStation::new(station)),
        config.server.dashboard.clone(),
        config.sample_timeout(),
    )?;
    let server = HttpServer::bind(&config.listen_address(), router, config.server.workers)?;
    server.run()?;
    Ok(())
}
