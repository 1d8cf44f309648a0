use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::{Station, StationError};
use crate::bus::RegisterIo;
use crate::clock::Clock;
use crate::gpio::{DigitalIo, Level};
use crate::storage::{HistoryBuffer, Quantity, Reading, Sample};

/// Station operations available to request handlers.
///
/// Object safe so the HTTP layer can hold an `Arc<dyn Sampler>` without
/// knowing which hardware backs it.
pub trait Sampler: Send + Sync {
    /// Run a full sampling cycle and record it in history.
    fn sample_all(&self) -> Result<Sample, StationError>;

    /// Read one quantity. Not recorded.
    fn sample_one(&self, quantity: Quantity) -> Result<Reading, StationError>;

    fn apply_digital_output(&self, pin: u8, level: Level) -> Result<Reading, StationError>;

    /// Retained samples, oldest first.
    fn history_snapshot(&self) -> Vec<Sample>;
}

/// A [`Station`] plus its history, safe to share between threads.
///
/// Station calls are serialized by one mutex. History sits behind its own
/// read/write lock so snapshots never wait for a measurement in progress.
/// Appends happen while the station lock is still held, which keeps history
/// in sampling order.
pub struct SharedStation<B, G, D, K> {
    station: Mutex<Station<B, G, D, K>>,
    history: RwLock<HistoryBuffer>,
}

impl<B, G, D, K> SharedStation<B, G, D, K> {
    pub fn new(station: Station<B, G, D, K>) -> Self {
        Self {
            station: Mutex::new(station),
            history: RwLock::new(HistoryBuffer::new()),
        }
    }

    /// Exclusive access to the station. A panic in an earlier holder does
    /// not make the station unusable.
    fn lock(&self) -> MutexGuard<'_, Station<B, G, D, K>> {
        self.station.lock().unwrap_or_else(|poisoned| {
            warn!("Station lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn record(&self, sample: Sample) {
        let mut history = self
            .history
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(evicted) = history.append(sample) {
            debug!("History full, dropped sample from {}", evicted.timestamp);
        }
    }
}

impl<B, G, D, K> Sampler for SharedStation<B, G, D, K>
where
    B: RegisterIo + Send,
    G: DigitalIo + Send,
    D: DelayNs + Send,
    K: Clock + Send,
{
    fn sample_all(&self) -> Result<Sample, StationError> {
        let mut station = self.lock();
        let sample = station.sample_all()?;
        self.record(sample.clone());
        Ok(sample)
    }

    fn sample_one(&self, quantity: Quantity) -> Result<Reading, StationError> {
        self.lock().sample_one(quantity)
    }

    fn apply_digital_output(&self, pin: u8, level: Level) -> Result<Reading, StationError> {
        self.lock().apply_digital_output(pin, level)
    }

    fn history_snapshot(&self) -> Vec<Sample> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }
}
