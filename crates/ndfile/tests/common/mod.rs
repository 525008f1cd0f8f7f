//! Shared helpers for day-file integration tests.

#![allow(dead_code)]

use chrono::DateTime;
use ndfile::{DayFileStore, GridDataset, StoreConfig};
use std::path::Path;
use test_utils::grid::GridSpec;

/// Build a dataset on `spec` valid at `timestamp`.
pub fn dataset(spec: GridSpec, type_code: i32, timestamp: i64, values: Vec<f64>) -> GridDataset {
    let (la1, la2, lo1, lo2) = spec.bounds();
    GridDataset {
        type_code,
        nx: spec.nx,
        ny: spec.ny,
        la1,
        la2,
        lo1,
        lo2,
        dx: spec.step,
        dy: spec.step,
        values,
        latitudes: spec.latitudes(),
        longitudes: spec.longitudes(),
        valid_time: DateTime::from_timestamp(timestamp, 0).expect("timestamp in range"),
    }
}

/// Store rooted at `root` with the given slot width.
pub fn store(root: &Path, interval_minutes: u32) -> DayFileStore {
    DayFileStore::new(StoreConfig::new(root, interval_minutes).expect("valid interval"))
        .expect("Failed to create store")
}

/// `round(value * 100)` as stored on disk.
pub fn quantized(value: f64) -> i16 {
    (value * 100.0).round() as i16
}
