pub mod history;
pub mod sample;

pub use history::*;
pub use sample::*;

/// Number of samples retained in memory.
pub const HISTORY_CAPACITY: usize = 50;
