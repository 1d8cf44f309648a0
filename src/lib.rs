//! Raspberry Pi build of the atmos sensor station.
//!
//! Hardware-independent logic lives in `atmos-core`; this crate opens the
//! Pi's I2C bus and GPIO lines and hands them to it.

pub mod app_state;
