//! Slot arithmetic, file identities and data-section addressing.
//!
//! A day file looks like this on disk (little-endian throughout):
//!
//! ```text
//! offset 0            i64 header length
//! offset 8            header block
//! offset 8 + hdr_len  ny * nx per-cell blocks, each slots_per_day i16 values
//! ```
//!
//! [`BlockLayout`] is the only place that turns (cell, slot) into a byte
//! offset; both the writer and the reader go through it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NdFileError, Result};
use crate::header::FileHeader;

pub const MINUTES_PER_DAY: u32 = 24 * 60;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Size of the header-length prefix.
pub const HEADER_PREFIX_LEN: u64 = 8;

/// Bytes per stored value.
pub const VALUE_SIZE: u64 = 2;

/// Day-file extension.
pub const FILE_EXTENSION: &str = "nd";

/// Slot width in minutes. Always divides a day evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SlotInterval(u32);

impl SlotInterval {
    /// Validate an interval; `1440 % minutes` must be zero.
    pub fn new(minutes: u32) -> Result<Self> {
        if minutes == 0 || MINUTES_PER_DAY % minutes != 0 {
            return Err(NdFileError::InvalidInterval(minutes));
        }
        Ok(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn seconds(&self) -> i64 {
        self.0 as i64 * 60
    }

    /// Number of slots in one UTC day.
    pub fn slots_per_day(&self) -> usize {
        (MINUTES_PER_DAY / self.0) as usize
    }

    /// Place a timestamp on its day and slot.
    ///
    /// Fails with `MisalignedTimestamp` when the timestamp is not an exact
    /// multiple of the interval from UTC midnight.
    pub fn position(&self, timestamp: i64) -> Result<SlotPosition> {
        let day = timestamp.div_euclid(SECONDS_PER_DAY);
        let day_start = day * SECONDS_PER_DAY;
        let since_midnight = timestamp - day_start;

        if since_midnight % self.seconds() != 0 {
            return Err(NdFileError::MisalignedTimestamp {
                timestamp,
                interval_minutes: self.0,
            });
        }

        Ok(SlotPosition {
            day,
            day_start,
            slot_index: (since_midnight / self.seconds()) as usize,
        })
    }
}

impl Default for SlotInterval {
    fn default() -> Self {
        Self(10)
    }
}

impl TryFrom<u32> for SlotInterval {
    type Error = NdFileError;

    fn try_from(minutes: u32) -> Result<Self> {
        Self::new(minutes)
    }
}

impl From<SlotInterval> for u32 {
    fn from(interval: SlotInterval) -> Self {
        interval.0
    }
}

impl fmt::Display for SlotInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.0)
    }
}

/// Where a timestamp lands inside the day-file scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPosition {
    /// Days since the Unix epoch.
    pub day: i64,
    /// UTC midnight of `day` in epoch seconds.
    pub day_start: i64,
    pub slot_index: usize,
}

/// Identity of one day file: field type and UTC day number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayFileId {
    pub type_code: i32,
    pub day: i64,
}

impl DayFileId {
    pub fn new(type_code: i32, day: i64) -> Self {
        Self { type_code, day }
    }

    /// Identity of the file holding `timestamp` for `type_code`.
    pub fn for_timestamp(type_code: i32, timestamp: i64) -> Self {
        Self::new(type_code, timestamp.div_euclid(SECONDS_PER_DAY))
    }

    /// Identity for a calendar date.
    pub fn for_date(type_code: i32, date: NaiveDate) -> Self {
        let midnight = date.and_time(NaiveTime::MIN);
        Self::for_timestamp(type_code, Utc.from_utc_datetime(&midnight).timestamp())
    }

    /// `{type}_{day}.nd`
    pub fn file_name(&self) -> String {
        format!("{}_{}.{}", self.type_code, self.day, FILE_EXTENSION)
    }

    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(self.file_name())
    }

    /// UTC midnight of the stored day.
    pub fn day_start(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.day * SECONDS_PER_DAY, 0)
    }

    /// Recover the identity from a day-file name.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(FILE_EXTENSION)?.strip_suffix('.')?;
        let (type_code, day) = stem.split_once('_')?;
        Some(Self::new(type_code.parse().ok()?, day.parse().ok()?))
    }
}

impl fmt::Display for DayFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Fixed-stride addressing of the per-cell blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    data_offset: u64,
    cell_count: usize,
    slots_per_day: usize,
}

impl BlockLayout {
    pub fn new(header_len: usize, cell_count: usize, slots_per_day: usize) -> Self {
        Self {
            data_offset: HEADER_PREFIX_LEN + header_len as u64,
            cell_count,
            slots_per_day,
        }
    }

    /// Layout for a header that serializes to `header_len` bytes.
    pub fn for_header(header: &FileHeader, header_len: usize) -> Result<Self> {
        Ok(Self::new(
            header_len,
            header.cell_count(),
            header.slots_per_day()?,
        ))
    }

    /// Byte offset of the first cell block.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// Size of one cell block in bytes.
    pub fn block_len(&self) -> u64 {
        self.slots_per_day as u64 * VALUE_SIZE
    }

    /// Byte offset of the block for `cell` (row-major index).
    pub fn cell_offset(&self, cell: usize) -> u64 {
        debug_assert!(cell < self.cell_count);
        self.data_offset + cell as u64 * self.block_len()
    }

    /// Byte offset of a single slot value.
    pub fn slot_offset(&self, cell: usize, slot: usize) -> u64 {
        debug_assert!(slot < self.slots_per_day);
        self.cell_offset(cell) + slot as u64 * VALUE_SIZE
    }

    /// Exact length of a well-formed file with this layout.
    pub fn file_len(&self) -> u64 {
        self.data_offset + self.cell_count as u64 * self.block_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_intervals() {
        for (minutes, slots) in [(1, 1440), (5, 288), (10, 144), (15, 96), (30, 48), (60, 24)] {
            let interval = SlotInterval::new(minutes).unwrap();
            assert_eq!(interval.slots_per_day(), slots);
        }
    }

    #[test]
    fn test_non_divisor_intervals_rejected() {
        for minutes in [0, 7, 11, 25, 1441] {
            assert!(matches!(
                SlotInterval::new(minutes),
                Err(NdFileError::InvalidInterval(m)) if m == minutes
            ));
        }
    }

    #[test]
    fn test_interval_deserialize_validates() {
        let ok: SlotInterval = serde_json::from_str("15").unwrap();
        assert_eq!(ok.minutes(), 15);
        assert!(serde_json::from_str::<SlotInterval>("7").is_err());
    }

    #[test]
    fn test_position_aligned() {
        let interval = SlotInterval::new(10).unwrap();
        // 2024-01-15T12:30:00Z
        let pos = interval.position(1_705_276_800 + 12 * 3600 + 30 * 60).unwrap();
        assert_eq!(pos.day, 19_737);
        assert_eq!(pos.day_start, 1_705_276_800);
        assert_eq!(pos.slot_index, 75);
    }

    #[test]
    fn test_position_misaligned() {
        let interval = SlotInterval::new(10).unwrap();
        let result = interval.position(1_705_276_800 + 5 * 60);
        assert!(matches!(
            result,
            Err(NdFileError::MisalignedTimestamp { interval_minutes: 10, .. })
        ));
    }

    #[test]
    fn test_position_before_epoch() {
        let interval = SlotInterval::new(60).unwrap();
        // 1969-12-31T23:00:00Z
        let pos = interval.position(-3600).unwrap();
        assert_eq!(pos.day, -1);
        assert_eq!(pos.day_start, -86_400);
        assert_eq!(pos.slot_index, 23);
    }

    #[test]
    fn test_day_file_id_naming() {
        let id = DayFileId::for_timestamp(514, 1_705_276_800 + 3600);
        assert_eq!(id.file_name(), "514_19737.nd");
        assert_eq!(DayFileId::parse("514_19737.nd"), Some(id));
        assert_eq!(DayFileId::parse("514_19737.json"), None);
        assert_eq!(DayFileId::parse("garbage.nd"), None);
    }

    #[test]
    fn test_day_file_id_for_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(DayFileId::for_date(0, date).day, 19_737);
    }

    #[test]
    fn test_day_rollover_changes_identity() {
        let before = DayFileId::for_timestamp(0, 1_705_276_800 - 600);
        let after = DayFileId::for_timestamp(0, 1_705_276_800);
        assert_ne!(before, after);
        assert_ne!(before.file_name(), after.file_name());
    }

    #[test]
    fn test_block_layout_offsets() {
        let layout = BlockLayout::new(100, 6, 144);
        assert_eq!(layout.data_offset(), 108);
        assert_eq!(layout.block_len(), 288);
        assert_eq!(layout.cell_offset(0), 108);
        assert_eq!(layout.cell_offset(4), 108 + 4 * 288);
        assert_eq!(layout.slot_offset(4, 75), 108 + 4 * 288 + 150);
        assert_eq!(layout.file_len(), 108 + 6 * 288);
    }
}
