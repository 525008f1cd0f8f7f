//! Per-day time-series files for decoded gridded weather fields.
//!
//! Each `(field type, UTC day)` gets one `.nd` file holding, for every grid
//! cell, a fixed-length array of int16 slots (one per time interval). Slots
//! without an observation hold the sentinel `32767`; observed slots hold
//! `round(value * 100)`.
//!
//! # Architecture
//!
//! ```text
//! GRIB decoder (external)
//!      │
//!      ▼
//! GridDataset
//!      │
//!      ▼
//! DayFileStore::write
//!      │
//!      ├─► no file yet: create {type}_{day}.nd, all slots sentinel but one
//!      │
//!      └─► file exists: bump header counter, overwrite one slot per cell
//!               │
//!               ▼
//!      DayFileReader::open ──► locate_cell(lat, lng) ──► get_slots(i, j)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ndfile::{DayFileReader, DayFileStore, StoreConfig};
//!
//! let store = DayFileStore::new(StoreConfig::new("/srv/nd", 10)?)?;
//! let outcome = store.write(&dataset)?;
//!
//! let mut reader = DayFileReader::open(&outcome.path)?;
//! if let Some((lat, lng)) = reader.locate_cell(52.52, 13.40) {
//!     let slots = reader.get_slots(lat, lng)?;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod header;
pub mod layout;
pub mod quantize;
pub mod reader;
pub mod store;

// Re-export commonly used types at crate root
pub use cache::{ReaderCache, ReaderCacheStats};
pub use config::{CorruptFilePolicy, StoreConfig};
pub use dataset::{valid_time, ForecastTime, ForecastUnit, GridDataset, ParameterCode};
pub use error::{NdFileError, Result};
pub use header::FileHeader;
pub use layout::{BlockLayout, DayFileId, SlotInterval, SlotPosition};
pub use quantize::{dequantize, QuantizePolicy, SENTINEL};
pub use reader::{DayFileReader, PointSeries};
pub use store::{DayFileStore, WriteKind, WriteOutcome};
