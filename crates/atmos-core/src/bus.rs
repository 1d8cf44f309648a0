//! Register-level bus access
//!
//! Both sensors on the station speak the same dialect: one byte per register,
//! addressed by a 7-bit device address and an 8-bit register number. This
//! module defines that capability as [`RegisterIo`] and provides it for every
//! blocking `embedded-hal` I2C implementation.

use core::fmt::Debug;

use embedded_hal::i2c::I2c;

/// Single-byte register access on a shared bus.
///
/// Implementations must not retry. A failed transfer is reported as-is and
/// the caller decides what to do with it.
pub trait RegisterIo {
    /// Transport error reported by the underlying bus.
    type Error: Debug;

    /// Reads one byte from `address` without selecting a register.
    ///
    /// Used to detect whether a device acknowledges its address.
    fn probe(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Reads the byte stored in `register` of the device at `address`.
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Self::Error>;

    /// Writes `value` into `register` of the device at `address`.
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error>;
}

/// Any blocking I2C bus is a register bus.
///
/// Register reads are issued as a write-read transaction (register number,
/// then one byte back) and register writes as a two byte write, which is what
/// SMBus "read/write byte data" looks like on the wire.
impl<T> RegisterIo for T
where
    T: I2c,
{
    type Error = T::Error;

    #[inline]
    fn probe(&mut self, address: u8) -> Result<(), Self::Error> {
        let mut buffer = [0u8; 1];
        self.read(address, &mut buffer)
    }

    #[inline]
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Self::Error> {
        let mut buffer = [0u8; 1];
        self.write_read(address, &[register], &mut buffer)?;
        Ok(buffer[0])
    }

    #[inline]
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error> {
        self.write(address, &[register, value])
    }
}
