mod dps310;
mod pas_co2;

pub use dps310::*;
pub use pas_co2::*;

use core::fmt::Debug;

use log::error;
use thiserror::Error;

/// Errors raised by the sensor drivers.
///
/// None of these are retried inside the drivers; they travel up to whoever
/// asked for the reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} did not answer on any probed address")]
    DeviceNotFound { sensor: &'static str },
    #[error("{sensor}: bus transfer failed during {operation}: {details}")]
    Transport {
        sensor: &'static str,
        operation: &'static str,
        details: String,
    },
    #[error("{sensor} used before it was initialized")]
    InvalidState { sensor: &'static str },
}

impl SensorError {
    /// Builds a `map_err` adapter that logs the bus error and wraps it as a
    /// [`SensorError::Transport`].
    pub(crate) fn transport<E: Debug>(
        sensor: &'static str,
        operation: &'static str,
    ) -> impl FnOnce(E) -> SensorError {
        move |e| {
            error!("{} {} failed: {:?}", sensor, operation, e);
            SensorError::Transport {
                sensor,
                operation,
                details: format!("{:?}", e),
            }
        }
    }
}

/// Decode a `bits` wide two's-complement field.
///
/// When bit `bits - 1` is set the value is negative and `2^bits` is
/// subtracted, otherwise it is returned unchanged. `raw` must fit in `bits`.
pub const fn twos_complement(raw: u32, bits: u32) -> i32 {
    debug_assert!(bits > 0 && bits < 32);
    if raw & (1 << (bits - 1)) != 0 {
        (raw as i64 - (1i64 << bits)) as i32
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTHS: [u32; 4] = [12, 16, 20, 24];

    #[test]
    fn test_zero_is_zero() {
        for bits in WIDTHS {
            assert_eq!(twos_complement(0, bits), 0, "{bits} bits");
        }
    }

    #[test]
    fn test_sign_bit_alone_is_most_negative() {
        for bits in WIDTHS {
            let expected = -(1i32 << (bits - 1));
            assert_eq!(twos_complement(1 << (bits - 1), bits), expected, "{bits} bits");
        }
    }

    #[test]
    fn test_below_threshold_is_unchanged() {
        for bits in WIDTHS {
            let max_positive = (1u32 << (bits - 1)) - 1;
            assert_eq!(twos_complement(max_positive, bits), max_positive as i32);
            assert_eq!(twos_complement(1, bits), 1);
        }
    }

    #[test]
    fn test_all_ones_is_minus_one() {
        for bits in WIDTHS {
            assert_eq!(twos_complement((1 << bits) - 1, bits), -1, "{bits} bits");
        }
    }

    #[test]
    fn test_matches_reference_formula_over_full_range() {
        for bits in [12u32, 16] {
            for raw in 0..(1u32 << bits) {
                let reference = if raw >= 1 << (bits - 1) {
                    raw as i64 - (1i64 << bits)
                } else {
                    raw as i64
                };
                assert_eq!(twos_complement(raw, bits) as i64, reference);
            }
        }
    }

    #[test]
    fn test_transport_error_keeps_context() {
        let error = SensorError::transport("DPS310", "read temperature")("NoAcknowledge");
        assert_eq!(
            error,
            SensorError::Transport {
                sensor: "DPS310",
                operation: "read temperature",
                details: "\"NoAcknowledge\"".into(),
            }
        );
    }
}
