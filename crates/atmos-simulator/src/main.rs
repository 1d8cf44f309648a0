//! Desktop simulator for the atmos sensor station.
//!
//! Serves the same HTTP interface as the Raspberry Pi build, backed by a
//! simulated DPS310 and PAS CO2 on an in-memory bus and simulated GPIO lines.
//! Configuration comes from the same `ATMOS_*` variables (and `.env`).
//!
//! CO2 settle times are shortened by `ATMOS_SIM_DELAY_SCALE` (default 0.1) so
//! requests come back quickly.

mod devices;

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;

use atmos_core::clock::{LocalClock, SleepDelay};
use atmos_core::config::{Config, ConfigError};
use atmos_core::http::{HttpServer, Router, ServerError};
use atmos_core::station::{SharedStation, Station};

use devices::{SimulatedBus, SimulatedGpio};

const DEFAULT_DELAY_SCALE: f64 = 0.1;

#[derive(Error, Debug)]
enum SimulatorError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("ATMOS_SIM_DELAY_SCALE={0:?} is not a finite non-negative number")]
    DelayScale(String),
    #[error(transparent)]
    Server(#[from] ServerError),
}

fn delay_scale() -> Result<f64, SimulatorError> {
    match std::env::var("ATMOS_SIM_DELAY_SCALE") {
        Ok(value) => parse_delay_scale(&value),
        Err(_) => Ok(DEFAULT_DELAY_SCALE),
    }
}

fn parse_delay_scale(value: &str) -> Result<f64, SimulatorError> {
    match value.trim().parse::<f64>() {
        Ok(scale) if scale.is_finite() && scale >= 0.0 => Ok(scale),
        _ => Err(SimulatorError::DelayScale(value.into())),
    }
}

fn run() -> Result<(), SimulatorError> {
    let config = Config::from_env()?;
    let settings = config.station_settings()?;
    let scale = delay_scale()?;

    // The simulated DPS310 answers on the first configured address.
    let dps310_address = settings.dps310_addresses.first().copied().unwrap_or(0x77);
    let bus = SimulatedBus::new(dps310_address, config.sensors.co2_address);
    let gpio = SimulatedGpio::new(&config.pins.outputs);

    let mut station = Station::new(
        bus,
        gpio,
        SleepDelay::scaled(scale),
        LocalClock::detect(),
        settings,
    );
    if let Err(e) = station.initialize() {
        warn!("Continuing without DPS310: {}", e);
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

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = dotenv {
        info!("Loaded {}", path.display());
    }
    info!("Starting atmos simulator");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
