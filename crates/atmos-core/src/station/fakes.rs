//! In-memory stand-ins for the station hardware, shared by the station and
//! router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use embedded_hal::delay::DelayNs;
use time::PrimitiveDateTime;
use time::macros::datetime;

use super::{Station, StationSettings};
use crate::bus::RegisterIo;
use crate::clock::Clock;
use crate::gpio::{DigitalIo, InputPin, PinConfig};

pub(crate) const DPS310_ADDRESS: u8 = 0x77;
pub(crate) const CO2_ADDRESS: u8 = 0x28;
pub(crate) const CO2_PPM: u16 = 540;

const COEF_IMAGE: [u8; 18] = [
    0x0C, 0xBE, 0xFC, 0x13, 0xD9, 0xAF, 0x2B, 0x34, 0xF3, 0xF7, 0x04, 0xFF, 0xDA, 0x5A, 0x00, 0x0A,
    0xFB, 0x1B,
];
const PRESSURE_BYTES: [u8; 3] = [0xFA, 0x20, 0x52];
const TEMPERATURE_BYTES: [u8; 3] = [0x04, 0xDA, 0xA5];

pub(crate) type TestStation = Station<RecordingBus, FakeGpio, NoDelay, FixedClock>;

/// One bus access, tagged with the thread that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Operation {
    pub thread: ThreadId,
    pub address: u8,
    pub register: Option<u8>,
}

struct BusState {
    registers: HashMap<(u8, u8), u8>,
    present: Vec<u8>,
    failing: Option<(u8, u8)>,
    operations: Vec<Operation>,
}

/// Register bank holding a DPS310 at 0x77 and a PAS CO2 at 0x28 that
/// records every access. Clones share state.
#[derive(Clone)]
pub(crate) struct RecordingBus {
    state: Arc<Mutex<BusState>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        let mut registers = HashMap::new();
        for (register, &value) in (0x10..).zip(COEF_IMAGE.iter()) {
            registers.insert((DPS310_ADDRESS, register), value);
        }
        for (register, &value) in (0x00..).zip(PRESSURE_BYTES.iter()) {
            registers.insert((DPS310_ADDRESS, register), value);
        }
        for (register, &value) in (0x03..).zip(TEMPERATURE_BYTES.iter()) {
            registers.insert((DPS310_ADDRESS, register), value);
        }
        let [high, low] = CO2_PPM.to_be_bytes();
        registers.insert((CO2_ADDRESS, 0x05), high);
        registers.insert((CO2_ADDRESS, 0x06), low);

        Self {
            state: Arc::new(Mutex::new(BusState {
                registers,
                present: vec![DPS310_ADDRESS, CO2_ADDRESS],
                failing: None,
                operations: Vec::new(),
            })),
        }
    }

    pub fn set_present(&self, addresses: &[u8]) {
        self.state.lock().unwrap().present = addresses.to_vec();
    }

    pub fn fail_register(&self, address: u8, register: u8) {
        self.state.lock().unwrap().failing = Some((address, register));
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    fn access(&mut self, address: u8, register: Option<u8>) -> Result<(), &'static str> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation {
            thread: thread::current().id(),
            address,
            register,
        });

        if !state.present.contains(&address) {
            return Err("no acknowledge");
        }
        match register {
            Some(register) if state.failing == Some((address, register)) => Err("bus fault"),
            _ => Ok(()),
        }
    }
}

impl RegisterIo for RecordingBus {
    type Error = &'static str;

    fn probe(&mut self, address: u8) -> Result<(), Self::Error> {
        self.access(address, None)
    }

    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Self::Error> {
        self.access(address, Some(register))?;
        let state = self.state.lock().unwrap();
        Ok(state.registers.get(&(address, register)).copied().unwrap_or(0))
    }

    fn write_byte(&mut self, address: u8, register: u8, _value: u8) -> Result<(), Self::Error> {
        self.access(address, Some(register))
    }
}

/// GPIO lines held in a map. Reading a pin that is not in the map fails.
pub(crate) struct FakeGpio {
    levels: HashMap<u8, bool>,
}

impl FakeGpio {
    pub fn fail(&mut self, pin: u8) {
        self.levels.remove(&pin);
    }
}

impl DigitalIo for FakeGpio {
    type Error = &'static str;

    fn read_pin(&mut self, pin: u8) -> Result<bool, Self::Error> {
        self.levels.get(&pin).copied().ok_or("pin not exported")
    }

    fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), Self::Error> {
        match self.levels.get_mut(&pin) {
            Some(level) => {
                *level = high;
                Ok(())
            }
            None => Err("pin not exported"),
        }
    }
}

pub(crate) struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub(crate) struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        datetime!(2024-06-01 12:00:00)
    }
}

/// Input 35 (high), input 36 (disabled), outputs 27 and 29 (low).
pub(crate) fn settings() -> StationSettings {
    let mut pins = PinConfig::default();
    pins.inputs
        .extend([InputPin { pin: 35, enabled: true }, InputPin { pin: 36, enabled: false }]);
    pins.outputs.extend([27, 29]);

    StationSettings {
        pins,
        ..StationSettings::default()
    }
}

/// An uninitialized station on a fresh bus, plus a handle to that bus.
pub(crate) fn station() -> (TestStation, RecordingBus) {
    let bus = RecordingBus::new();
    let gpio = FakeGpio {
        levels: HashMap::from([(35, true), (27, false), (29, false)]),
    };
    let station = Station::new(bus.clone(), gpio, NoDelay, FixedClock, settings());
    (station, bus)
}
