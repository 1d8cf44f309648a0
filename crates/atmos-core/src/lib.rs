//! Hardware-independent core library for atmos
//!
//! This crate contains all platform-agnostic logic for the atmos sensor
//! station: register-level drivers for the DPS310 barometer and the PAS CO2
//! sensor, the rolling sample history, the sampling facade shared between
//! HTTP workers, configuration, and the HTTP query router.
//!
//! Hardware access goes through the [`bus::RegisterIo`] and
//! [`gpio::DigitalIo`] traits so the same code runs against a Raspberry Pi,
//! the desktop simulator, and the mocks used in tests.

pub mod bus;
pub mod clock;
pub mod config;
pub mod gpio;
pub mod http;
pub mod sensors;
pub mod station;
pub mod storage;
