//! Wall-clock time and blocking delays

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of sample timestamps.
pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> PrimitiveDateTime;
}

/// System clock shifted into the local time zone.
///
/// The UTC offset is captured once with [`LocalClock::detect`]. Querying it
/// later is refused by `time` on Unix once other threads are running, so
/// detection must happen before the HTTP workers start.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    pub const fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Capture the local UTC offset, falling back to UTC.
    pub fn detect() -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or_else(|e| {
            log::warn!("Local UTC offset unavailable ({}), timestamps will be UTC", e);
            UtcOffset::UTC
        });
        Self::new(offset)
    }
}

impl Clock for LocalClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_date_time(date_time: &PrimitiveDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    date_time.format(format).unwrap_or_default()
}

/// Blocking delay backed by `std::thread::sleep`.
///
/// `scale` shortens every wait; the simulator uses it to skip through the
/// CO2 settle times. Hardware must run with a scale of `1.0`.
#[derive(Debug, Clone, Copy)]
pub struct SleepDelay {
    scale: f64,
}

impl SleepDelay {
    pub const fn new() -> Self {
        Self { scale: 1.0 }
    }

    pub const fn scaled(scale: f64) -> Self {
        Self { scale }
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration.mul_f64(self.scale.max(0.0)));
    }
}

impl Default for SleepDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        self.sleep(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleep(Duration::from_millis(ms.into()));
    }
}
