//! Read path: open a day file once and answer many point queries.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{NdFileError, Result};
use crate::header::FileHeader;
use crate::layout::{BlockLayout, HEADER_PREFIX_LEN};
use crate::quantize::dequantize;

/// Read the length prefix and header from the start of a day file.
///
/// `file_len` bounds the header length so a garbage prefix cannot trigger a
/// huge allocation. Short reads are reported as `MalformedHeader`.
pub(crate) fn read_header<R: Read>(reader: &mut R, file_len: u64) -> Result<(FileHeader, usize)> {
    let mut prefix = [0u8; HEADER_PREFIX_LEN as usize];
    reader.read_exact(&mut prefix).map_err(short_read)?;

    let header_len = i64::from_le_bytes(prefix);
    if header_len < 0 || header_len as u64 > file_len.saturating_sub(HEADER_PREFIX_LEN) {
        return Err(NdFileError::malformed(format!(
            "header length {} does not fit a {} byte file",
            header_len, file_len
        )));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    reader.read_exact(&mut header_bytes).map_err(short_read)?;

    let header = FileHeader::deserialize(&header_bytes)?;
    Ok((header, header_len as usize))
}

fn short_read(err: std::io::Error) -> NdFileError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        NdFileError::malformed("file ends inside the header")
    } else {
        NdFileError::Io(err)
    }
}

/// An open day file.
///
/// The header is loaded once; slot data is read from disk on every query,
/// so appends made after opening are visible in [`get_slots`] results.
/// Call [`refresh_header`] to pick up the updated slots-filled counter.
///
/// [`get_slots`]: DayFileReader::get_slots
/// [`refresh_header`]: DayFileReader::refresh_header
#[derive(Debug)]
pub struct DayFileReader {
    path: PathBuf,
    file: File,
    header: FileHeader,
    layout: BlockLayout,
}

impl DayFileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|source| NdFileError::FileUnreadable {
            path: path.clone(),
            source,
        })?;
        let file_len = file.metadata()?.len();
        let (header, header_len) = read_header(&mut file, file_len)?;
        let layout = BlockLayout::for_header(&header, header_len)?;

        debug!(
            path = %path.display(),
            nx = header.nx,
            ny = header.ny,
            slots_filled = header.slots_filled,
            "Opened day file"
        );

        Ok(Self {
            path,
            file,
            header,
            layout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Byte offset of the first cell block (`header length + 8`).
    pub fn data_offset(&self) -> u64 {
        self.layout.data_offset()
    }

    pub fn slots_per_day(&self) -> usize {
        self.layout.slots_per_day()
    }

    /// Re-read the header from disk.
    pub fn refresh_header(&mut self) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        self.file.seek(SeekFrom::Start(0))?;
        let (header, header_len) = read_header(&mut self.file, file_len)?;
        if header_len as u64 + HEADER_PREFIX_LEN != self.layout.data_offset() {
            return Err(NdFileError::HeaderLengthChanged {
                old: (self.layout.data_offset() - HEADER_PREFIX_LEN) as usize,
                new: header_len,
            });
        }
        self.header = header;
        Ok(())
    }

    /// Raw stored values for one cell, one per slot.
    pub fn get_slots(&mut self, lat_index: usize, lng_index: usize) -> Result<Vec<i16>> {
        let (nx, ny) = (self.header.nx(), self.header.ny());
        if lat_index >= ny || lng_index >= nx {
            return Err(NdFileError::IndexOutOfRange {
                lat_index,
                lng_index,
                ny,
                nx,
            });
        }

        let cell = lat_index * nx + lng_index;
        self.file
            .seek(SeekFrom::Start(self.layout.cell_offset(cell)))?;

        let mut buf = vec![0u8; self.layout.block_len() as usize];
        self.file.read_exact(&mut buf)?;

        Ok(buf
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Slot values in physical units; `None` marks missing slots.
    pub fn get_values(&mut self, lat_index: usize, lng_index: usize) -> Result<Vec<Option<f64>>> {
        Ok(self
            .get_slots(lat_index, lng_index)?
            .into_iter()
            .map(dequantize)
            .collect())
    }

    /// Find the grid cell within half a grid step (`dx / 2`) of a coordinate.
    ///
    /// Returns the first latitude and the first longitude within tolerance,
    /// scanning the distinct axes in stored order, or `None` if either axis
    /// has no match.
    pub fn locate_cell(&self, lat: f64, lng: f64) -> Option<(usize, usize)> {
        let tolerance = self.header.dx / 2.0;
        let within = |axis: f64, target: f64| axis >= target - tolerance && axis <= target + tolerance;

        let lat_index = self.header.latitudes.iter().position(|&v| within(v, lat))?;
        let lng_index = self.header.longitudes.iter().position(|&v| within(v, lng))?;
        Some((lat_index, lng_index))
    }

    /// Locate the cell nearest a coordinate and read its whole day.
    pub fn point_series(&mut self, lat: f64, lng: f64) -> Result<Option<PointSeries>> {
        let Some((lat_index, lng_index)) = self.locate_cell(lat, lng) else {
            return Ok(None);
        };

        let values = self.get_values(lat_index, lng_index)?;
        let start = DateTime::from_timestamp(self.header.start_ts, 0).ok_or_else(|| {
            NdFileError::malformed(format!("start timestamp {} out of range", self.header.start_ts))
        })?;

        Ok(Some(PointSeries {
            lat_index,
            lng_index,
            latitude: self.header.latitudes[lat_index],
            longitude: self.header.longitudes[lng_index],
            start,
            interval_minutes: self.header.interval_minutes as u32,
            values,
        }))
    }
}

/// One cell's values for a whole day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSeries {
    pub lat_index: usize,
    pub lng_index: usize,
    /// Grid latitude of the matched cell.
    pub latitude: f64,
    /// Grid longitude of the matched cell.
    pub longitude: f64,
    pub start: DateTime<Utc>,
    pub interval_minutes: u32,
    pub values: Vec<Option<f64>>,
}

impl PointSeries {
    /// Start time of slot `index`; `None` past the end of the day.
    pub fn slot_time(&self, index: usize) -> Option<DateTime<Utc>> {
        if index >= self.values.len() {
            return None;
        }
        let minutes = i64::try_from(index)
            .ok()?
            .checked_mul(self.interval_minutes as i64)?;
        self.start
            .checked_add_signed(Duration::try_minutes(minutes)?)
    }

    /// Observed slots only, with their times.
    pub fn observations(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((self.slot_time(i)?, (*v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header() -> FileHeader {
        FileHeader {
            type_code: 0,
            la1: 40.0,
            la2: 42.0,
            lo1: 10.0,
            lo2: 12.0,
            nx: 3,
            ny: 3,
            dx: 1.0,
            dy: 1.0,
            start_ts: 0,
            interval_minutes: 60,
            slots_filled: 1,
            latitudes: vec![40.0, 41.0, 42.0],
            longitudes: vec![10.0, 11.0, 12.0],
        }
    }

    #[test]
    fn test_read_header_from_prefix() {
        let header = header();
        let bytes = header.serialize();
        let mut data = (bytes.len() as i64).to_le_bytes().to_vec();
        data.extend_from_slice(&bytes);

        let (decoded, len) = read_header(&mut Cursor::new(&data), data.len() as u64).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn test_read_header_rejects_oversized_length() {
        let mut data = 1_000_000i64.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let result = read_header(&mut Cursor::new(&data), data.len() as u64);
        assert!(matches!(result, Err(NdFileError::MalformedHeader(_))));
    }

    #[test]
    fn test_read_header_rejects_short_prefix() {
        let data = [0u8; 3];
        let result = read_header(&mut Cursor::new(&data), 3);
        assert!(matches!(result, Err(NdFileError::MalformedHeader(_))));
    }

    #[test]
    fn test_point_series_slot_times() {
        let series = PointSeries {
            lat_index: 0,
            lng_index: 0,
            latitude: 40.0,
            longitude: 10.0,
            start: DateTime::from_timestamp(86_400, 0).unwrap(),
            interval_minutes: 30,
            values: vec![None, Some(1.5), None, Some(-2.0)],
        };
        let observations = series.observations();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].0.timestamp(), 86_400 + 1800);
        assert_eq!(observations[1], (DateTime::from_timestamp(86_400 + 5400, 0).unwrap(), -2.0));
    }

    #[test]
    fn test_slot_time_bounded_by_series() {
        let series = PointSeries {
            lat_index: 0,
            lng_index: 0,
            latitude: 40.0,
            longitude: 10.0,
            start: DateTime::from_timestamp(0, 0).unwrap(),
            interval_minutes: 10,
            values: vec![None; 144],
        };
        assert_eq!(series.slot_time(143).unwrap().timestamp(), 143 * 600);
        assert_eq!(series.slot_time(144), None);
        assert_eq!(series.slot_time(usize::MAX), None);
    }
}
