//! Day-file header and its little-endian codec.
//!
//! The header is a fixed block followed by the two distinct-axis arrays:
//!
//! ```text
//! type i32 | la1 la2 lo1 lo2 f64 | nx ny i32 | dx dy f64 |
//! start_ts i64 | interval_minutes i32 | slots_filled i32 |
//! lat_count i32 | lat f64 * lat_count | lon_count i32 | lon f64 * lon_count
//! ```
//!
//! Field order is part of the file format and must not change.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::dataset::GridDataset;
use crate::error::{NdFileError, Result};
use crate::layout::{SlotInterval, MINUTES_PER_DAY};

/// Size of the header fields that precede the axis arrays.
pub const FIXED_HEADER_LEN: usize = 4 + 4 * 8 + 2 * 4 + 2 * 8 + 8 + 4 + 4;

/// Metadata stored at the start of every day file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub type_code: i32,
    pub la1: f64,
    pub la2: f64,
    pub lo1: f64,
    pub lo2: f64,
    pub nx: i32,
    pub ny: i32,
    pub dx: f64,
    pub dy: f64,
    /// UTC midnight of the stored day, in epoch seconds.
    pub start_ts: i64,
    pub interval_minutes: i32,
    /// Incremented once per write into the file.
    pub slots_filled: i32,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

impl FileHeader {
    /// Build the header for a new day file from the first dataset written to it.
    pub fn for_dataset(
        dataset: &GridDataset,
        start_ts: i64,
        interval: SlotInterval,
        slots_filled: i32,
    ) -> Self {
        Self {
            type_code: dataset.type_code,
            la1: dataset.la1,
            la2: dataset.la2,
            lo1: dataset.lo1,
            lo2: dataset.lo2,
            nx: dataset.nx as i32,
            ny: dataset.ny as i32,
            dx: dataset.dx,
            dy: dataset.dy,
            start_ts,
            interval_minutes: interval.minutes() as i32,
            slots_filled,
            latitudes: dataset.latitudes.clone(),
            longitudes: dataset.longitudes.clone(),
        }
    }

    /// Number of grid points along the longitude axis.
    pub fn nx(&self) -> usize {
        self.nx as usize
    }

    /// Number of grid points along the latitude axis.
    pub fn ny(&self) -> usize {
        self.ny as usize
    }

    /// Total number of grid cells.
    pub fn cell_count(&self) -> usize {
        self.nx() * self.ny()
    }

    /// Slot width; `InvalidInterval` unless it divides a day.
    pub fn interval(&self) -> Result<SlotInterval> {
        let minutes = u32::try_from(self.interval_minutes)
            .map_err(|_| NdFileError::InvalidInterval(0))?;
        SlotInterval::new(minutes)
    }

    /// Number of time slots in each per-cell block.
    pub fn slots_per_day(&self) -> Result<usize> {
        Ok(self.interval()?.slots_per_day())
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + 4 + self.latitudes.len() * 8 + 4 + self.longitudes.len() * 8
    }

    /// Encode the header in file order.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        buf.put_i32_le(self.type_code);
        buf.put_f64_le(self.la1);
        buf.put_f64_le(self.la2);
        buf.put_f64_le(self.lo1);
        buf.put_f64_le(self.lo2);
        buf.put_i32_le(self.nx);
        buf.put_i32_le(self.ny);
        buf.put_f64_le(self.dx);
        buf.put_f64_le(self.dy);
        buf.put_i64_le(self.start_ts);
        buf.put_i32_le(self.interval_minutes);
        buf.put_i32_le(self.slots_filled);

        put_f64_array(&mut buf, &self.latitudes);
        put_f64_array(&mut buf, &self.longitudes);

        buf.freeze()
    }

    /// Decode a header previously produced by [`FileHeader::serialize`].
    ///
    /// The array counts stored in the stream decide the array lengths; they
    /// must then agree with `ny` and `nx`.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut buf = data;

        ensure_remaining(buf, FIXED_HEADER_LEN, "fixed fields")?;
        let type_code = buf.get_i32_le();
        let la1 = buf.get_f64_le();
        let la2 = buf.get_f64_le();
        let lo1 = buf.get_f64_le();
        let lo2 = buf.get_f64_le();
        let nx = buf.get_i32_le();
        let ny = buf.get_i32_le();
        let dx = buf.get_f64_le();
        let dy = buf.get_f64_le();
        let start_ts = buf.get_i64_le();
        let interval_minutes = buf.get_i32_le();
        let slots_filled = buf.get_i32_le();

        let latitudes = get_f64_array(&mut buf, "latitudes")?;
        let longitudes = get_f64_array(&mut buf, "longitudes")?;

        if buf.has_remaining() {
            return Err(NdFileError::malformed(format!(
                "{} trailing bytes after longitude array",
                buf.remaining()
            )));
        }
        if nx < 0 || ny < 0 {
            return Err(NdFileError::malformed(format!(
                "negative grid size {}x{}",
                nx, ny
            )));
        }
        if latitudes.len() != ny as usize {
            return Err(NdFileError::malformed(format!(
                "{} latitudes for ny={}",
                latitudes.len(),
                ny
            )));
        }
        if longitudes.len() != nx as usize {
            return Err(NdFileError::malformed(format!(
                "{} longitudes for nx={}",
                longitudes.len(),
                nx
            )));
        }
        if interval_minutes <= 0 || MINUTES_PER_DAY % interval_minutes as u32 != 0 {
            return Err(NdFileError::malformed(format!(
                "interval of {} minutes does not divide a day",
                interval_minutes
            )));
        }

        Ok(Self {
            type_code,
            la1,
            la2,
            lo1,
            lo2,
            nx,
            ny,
            dx,
            dy,
            start_ts,
            interval_minutes,
            slots_filled,
            latitudes,
            longitudes,
        })
    }
}

fn put_f64_array(buf: &mut BytesMut, values: &[f64]) {
    buf.put_i32_le(values.len() as i32);
    for value in values {
        buf.put_f64_le(*value);
    }
}

fn get_f64_array(buf: &mut &[u8], what: &str) -> Result<Vec<f64>> {
    ensure_remaining(*buf, 4, what)?;
    let count = buf.get_i32_le();
    if count < 0 {
        return Err(NdFileError::malformed(format!(
            "negative {} count {}",
            what, count
        )));
    }

    let count = count as usize;
    ensure_remaining(*buf, count * 8, what)?;
    Ok((0..count).map(|_| buf.get_f64_le()).collect())
}

fn ensure_remaining(buf: &[u8], needed: usize, what: &str) -> Result<()> {
    if buf.len() < needed {
        return Err(NdFileError::malformed(format!(
            "need {} bytes for {}, {} left",
            needed,
            what,
            buf.len()
        )));
    }
    Ok(())
}
