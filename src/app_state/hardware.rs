//! Hardware initialization for the Raspberry Pi
//!
//! The station talks to its sensors over `/dev/i2c-<n>` and to its digital
//! lines through the GPIO character device, both via `rppal`. Pins are
//! configured by physical header number and translated to BCM here.

use std::collections::HashMap;

use log::info;
use rppal::gpio::{Gpio, InputPin, OutputPin, Pin};
use rppal::i2c::I2c;

use atmos_core::gpio::{DigitalIo, PinConfig};

use super::AppError;

/// Physical header pin to BCM GPIO number, for the 40-pin header.
///
/// Power and ground pins have no GPIO and map to `None`.
pub const fn board_to_bcm(pin: u8) -> Option<u8> {
    let bcm = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        27 => 0,
        28 => 1,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(bcm)
}

/// Open the I2C bus the sensors sit on.
pub fn init_i2c_bus(bus: u8) -> Result<I2c, AppError> {
    let i2c = I2c::with_bus(bus).map_err(|source| AppError::I2c { bus, source })?;
    info!("Opened /dev/i2c-{}", bus);
    Ok(i2c)
}

/// Station GPIO lines on the Raspberry Pi header.
pub struct RpiGpio {
    inputs: HashMap<u8, InputPin>,
    outputs: HashMap<u8, OutputPin>,
}

impl RpiGpio {
    /// Claim every configured line. Outputs start low. Disabled inputs are
    /// left unclaimed.
    pub fn init(pins: &PinConfig) -> Result<Self, AppError> {
        let gpio = Gpio::new().map_err(AppError::GpioChip)?;
        let claim = |pin: u8| -> Result<Pin, AppError> {
            let bcm = board_to_bcm(pin).ok_or(AppError::UnmappedPin(pin))?;
            gpio.get(bcm)
                .map_err(|source| AppError::Gpio { pin, source })
        };

        let mut inputs = HashMap::new();
        for input in pins.inputs.iter().filter(|input| input.enabled) {
            inputs.insert(input.pin, claim(input.pin)?.into_input());
        }

        let mut outputs = HashMap::new();
        for &pin in &pins.outputs {
            outputs.insert(pin, claim(pin)?.into_output_low());
        }

        info!(
            "GPIO ready: inputs {:?}, outputs {:?}",
            inputs.keys().collect::<Vec<_>>(),
            outputs.keys().collect::<Vec<_>>()
        );
        Ok(Self { inputs, outputs })
    }
}

impl DigitalIo for RpiGpio {
    type Error = &'static str;

    fn read_pin(&mut self, pin: u8) -> Result<bool, Self::Error> {
        if let Some(input) = self.inputs.get(&pin) {
            return Ok(input.is_high());
        }
        self.outputs
            .get(&pin)
            .map(|output| output.is_set_high())
            .ok_or("pin not claimed")
    }

    fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), Self::Error> {
        let output = self.outputs.get_mut(&pin).ok_or("pin is not an output")?;
        if high {
            output.set_high();
        } else {
            output.set_low();
        }
        Ok(())
    }
}
