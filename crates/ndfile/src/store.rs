//! Write path: create a day file or patch one slot into an existing one.
//!
//! A write either creates the file for `(type, UTC day)` with every slot set
//! to the sentinel except the incoming one, or appends by overwriting the
//! header in place and then exactly two bytes per cell. Appends never touch
//! any other slot, so an interrupted append can only leave the slot being
//! written half-updated.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{CorruptFilePolicy, StoreConfig};
use crate::dataset::GridDataset;
use crate::error::{NdFileError, Result};
use crate::header::FileHeader;
use crate::layout::{BlockLayout, DayFileId, SlotPosition, HEADER_PREFIX_LEN};
use crate::quantize::SENTINEL;
use crate::reader::read_header;

/// How a write was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A new day file was created.
    Created,
    /// One slot was written into an existing file.
    Appended,
    /// A corrupt file was discarded and recreated.
    Replaced,
}

/// Result of a successful [`DayFileStore::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub id: DayFileId,
    pub path: PathBuf,
    pub kind: WriteKind,
    pub slot_index: usize,
    /// Value of the header's slots-filled counter after the write.
    pub slots_filled: i32,
}

/// What the writer finds at a day-file path.
#[derive(Debug)]
enum FileState {
    Absent,
    Valid {
        header: FileHeader,
        header_len: usize,
    },
    Corrupt(String),
}

/// Writer for per-day time-series files.
///
/// Holds no open handles; every write opens, mutates and closes its file.
/// Two stores writing the same day file concurrently will corrupt it.
#[derive(Debug, Clone)]
pub struct DayFileStore {
    config: StoreConfig,
}

impl DayFileStore {
    /// Create a store, creating the root directory if needed.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.root_path)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root_path
    }

    /// Path of the day file for `id`.
    pub fn path_for(&self, id: DayFileId) -> PathBuf {
        id.path_in(&self.config.root_path)
    }

    /// Store one dataset in the day file for its type and UTC day.
    ///
    /// Timestamp alignment, dataset shape and value ranges are all checked
    /// before any file is opened, so those failures never modify disk.
    pub fn write(&self, dataset: &GridDataset) -> Result<WriteOutcome> {
        dataset.validate()?;

        let position = self.config.interval.position(dataset.timestamp())?;
        let id = DayFileId::new(dataset.type_code, position.day);
        let path = self.path_for(id);
        let quantized = self.config.quantize_policy.quantize_all(&dataset.values)?;

        match probe(&path, id, position.day_start)? {
            FileState::Absent => {
                self.create(&path, id, dataset, position, &quantized, WriteKind::Created)
            }
            FileState::Valid { header, header_len } => self.append(
                &path,
                id,
                dataset,
                position,
                header,
                header_len,
                &quantized,
            ),
            FileState::Corrupt(reason) => match self.config.corrupt_file_policy {
                CorruptFilePolicy::Fail => Err(NdFileError::corrupt(&path, reason)),
                CorruptFilePolicy::Replace => {
                    warn!(path = %path.display(), reason = %reason, "Replacing corrupt day file");
                    self.create(&path, id, dataset, position, &quantized, WriteKind::Replaced)
                }
            },
        }
    }

    fn create(
        &self,
        path: &Path,
        id: DayFileId,
        dataset: &GridDataset,
        position: SlotPosition,
        quantized: &[i16],
        kind: WriteKind,
    ) -> Result<WriteOutcome> {
        let slots_filled = position.slot_index as i32 + 1;
        let header = FileHeader::for_dataset(
            dataset,
            position.day_start,
            self.config.interval,
            slots_filled,
        );
        let header_bytes = header.serialize();
        let layout = BlockLayout::for_header(&header, header_bytes.len())?;

        // Build next to the target and rename, so readers never see a partial file.
        let tmp_path = path.with_extension("nd.tmp");
        let result = write_new_file(&tmp_path, &header_bytes, layout, position.slot_index, quantized)
            .and_then(|_| fs::rename(&tmp_path, path).map_err(NdFileError::from));
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        info!(
            path = %path.display(),
            slot = position.slot_index,
            cells = layout.cell_count(),
            bytes = layout.file_len(),
            "Created day file"
        );

        Ok(WriteOutcome {
            id,
            path: path.to_path_buf(),
            kind,
            slot_index: position.slot_index,
            slots_filled,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        path: &Path,
        id: DayFileId,
        dataset: &GridDataset,
        position: SlotPosition,
        header: FileHeader,
        header_len: usize,
        quantized: &[i16],
    ) -> Result<WriteOutcome> {
        if header.nx() != dataset.nx || header.ny() != dataset.ny {
            return Err(NdFileError::GeometryMismatch {
                file_nx: header.nx,
                file_ny: header.ny,
                dataset_nx: dataset.nx,
                dataset_ny: dataset.ny,
            });
        }
        if header.interval_minutes != self.config.interval.minutes() as i32 {
            return Err(NdFileError::IntervalMismatch {
                file: header.interval_minutes,
                configured: self.config.interval.minutes(),
            });
        }

        let mut updated = header;
        updated.slots_filled = updated.slots_filled.saturating_add(1);
        let header_bytes = updated.serialize();
        if header_bytes.len() != header_len {
            return Err(NdFileError::HeaderLengthChanged {
                old: header_len,
                new: header_bytes.len(),
            });
        }

        let layout = BlockLayout::for_header(&updated, header_len)?;
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| NdFileError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        file.seek(SeekFrom::Start(HEADER_PREFIX_LEN))?;
        file.write_all(&header_bytes)?;

        for (cell, value) in quantized.iter().enumerate() {
            file.seek(SeekFrom::Start(layout.slot_offset(cell, position.slot_index)))?;
            file.write_all(&value.to_le_bytes())?;
        }
        file.sync_data()?;

        debug!(
            path = %path.display(),
            slot = position.slot_index,
            slots_filled = updated.slots_filled,
            "Appended slot to day file"
        );

        Ok(WriteOutcome {
            id,
            path: path.to_path_buf(),
            kind: WriteKind::Appended,
            slot_index: position.slot_index,
            slots_filled: updated.slots_filled,
        })
    }
}

fn write_new_file(
    path: &Path,
    header_bytes: &[u8],
    layout: BlockLayout,
    slot_index: usize,
    quantized: &[i16],
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(&(header_bytes.len() as i64).to_le_bytes())?;
    writer.write_all(header_bytes)?;

    let mut block: Vec<u8> = std::iter::repeat(SENTINEL.to_le_bytes())
        .take(layout.slots_per_day())
        .flatten()
        .collect();
    let slot = slot_index * 2..slot_index * 2 + 2;

    for value in quantized {
        block[slot.clone()].copy_from_slice(&value.to_le_bytes());
        writer.write_all(&block)?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Classify the file at `path`.
///
/// A file is valid when its header decodes, names the expected type and
/// day, and its size matches the header's geometry exactly.
fn probe(path: &Path, id: DayFileId, day_start: i64) -> Result<FileState> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileState::Absent),
        Err(source) => {
            return Err(NdFileError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file_len = file.metadata()?.len();

    let (header, header_len) = match read_header(&mut file, file_len) {
        Ok(read) => read,
        Err(NdFileError::MalformedHeader(reason)) => return Ok(FileState::Corrupt(reason)),
        Err(e) => return Err(e),
    };

    if header.type_code != id.type_code || header.start_ts != day_start {
        return Ok(FileState::Corrupt(format!(
            "header describes type {} starting at {}, expected type {} starting at {}",
            header.type_code, header.start_ts, id.type_code, day_start
        )));
    }

    let expected_len = BlockLayout::for_header(&header, header_len)?.file_len();
    if expected_len != file_len {
        return Ok(FileState::Corrupt(format!(
            "expected {} bytes, found {}",
            expected_len, file_len
        )));
    }

    Ok(FileState::Valid { header, header_len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dataset(hour: u32, minute: u32) -> GridDataset {
        GridDataset {
            type_code: 1,
            nx: 2,
            ny: 2,
            la1: 1.0,
            la2: 0.0,
            lo1: 0.0,
            lo2: 1.0,
            dx: 1.0,
            dy: 1.0,
            values: vec![0.5, 1.5, 2.5, 3.5],
            latitudes: vec![0.0, 1.0],
            longitudes: vec![0.0, 1.0],
            valid_time: Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap(),
        }
    }

    fn store(dir: &Path) -> DayFileStore {
        DayFileStore::new(StoreConfig::new(dir, 10).unwrap()).unwrap()
    }

    #[test]
    fn test_probe_absent() {
        let dir = tempfile::tempdir().unwrap();
        let id = DayFileId::new(1, 19_737);
        let state = probe(&id.path_in(dir.path()), id, 19_737 * 86_400).unwrap();
        assert!(matches!(state, FileState::Absent));
    }

    #[test]
    fn test_probe_valid_after_create() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = store(dir.path()).write(&dataset(1, 0)).unwrap();
        let state = probe(&outcome.path, outcome.id, 19_737 * 86_400).unwrap();
        match state {
            FileState::Valid { header, header_len } => {
                assert_eq!(header.slots_filled, 7);
                assert_eq!(header_len, header.encoded_len());
            }
            other => panic!("expected valid file, got {:?}", other),
        }
    }

    #[test]
    fn test_probe_truncated_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = store(dir.path()).write(&dataset(1, 0)).unwrap();
        let file = OpenOptions::new().write(true).open(&outcome.path).unwrap();
        let len = file.metadata().unwrap().len();
        file.set_len(len - 1).unwrap();

        let state = probe(&outcome.path, outcome.id, 19_737 * 86_400).unwrap();
        assert!(matches!(state, FileState::Corrupt(_)));
    }

    #[test]
    fn test_probe_wrong_day_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = store(dir.path()).write(&dataset(1, 0)).unwrap();
        let state = probe(&outcome.path, outcome.id, 19_738 * 86_400).unwrap();
        assert!(matches!(state, FileState::Corrupt(_)));
    }

    #[test]
    fn test_append_rejects_header_length_drift() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let outcome = store.write(&dataset(1, 0)).unwrap();
        let before = fs::read(&outcome.path).unwrap();

        let ds = dataset(1, 10);
        let position = store.config().interval.position(ds.timestamp()).unwrap();
        let quantized = store.config().quantize_policy.quantize_all(&ds.values).unwrap();
        let (header, header_len) = match probe(&outcome.path, outcome.id, position.day_start) {
            Ok(FileState::Valid { header, header_len }) => (header, header_len),
            other => panic!("expected valid file, got {:?}", other),
        };

        let result = store.append(
            &outcome.path,
            outcome.id,
            &ds,
            position,
            header,
            header_len + 8,
            &quantized,
        );
        assert!(matches!(
            result,
            Err(NdFileError::HeaderLengthChanged { .. })
        ));
        assert_eq!(fs::read(&outcome.path).unwrap(), before);
    }

    #[test]
    fn test_no_temporary_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path()).write(&dataset(1, 0)).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1_19737.nd".to_string()]);
    }
}
