pub mod categories;
pub mod config;
pub mod domain;
pub mod history;
pub mod logging;
pub mod stats;
pub mod storage;
pub mod tracker;

pub use categories::{CategoryLookup, CategoryStore};
pub use domain::{Category, DayPeriod, Granularity, Slot, SlotTime, generate_slots};
pub use history::{DayLedger, HistoryStore};
pub use stats::{CategoryCounts, PeriodSummary, StatsPeriod, day_stats, window_stats};
pub use storage::{BlobStore, FileStore, MemoryStore, StorageError};
pub use tracker::{Clock, FixedClock, SystemClock, Tracker};
