//! Error types for day-file storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing or reading day files.
#[derive(Error, Debug)]
pub enum NdFileError {
    /// Header bytes are truncated or internally inconsistent.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The dataset timestamp does not fall on a slot boundary.
    #[error("timestamp {timestamp} is not a multiple of {interval_minutes} minutes from UTC midnight")]
    MisalignedTimestamp {
        timestamp: i64,
        interval_minutes: u32,
    },

    /// An append would change the serialized header size and shift the data section.
    #[error("header length changed from {old} to {new} bytes")]
    HeaderLengthChanged { old: usize, new: usize },

    /// The day file could not be opened.
    #[error("cannot open {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read, write or seek failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Query indices fall outside the grid.
    #[error("cell ({lat_index}, {lng_index}) is outside a {ny}x{nx} grid")]
    IndexOutOfRange {
        lat_index: usize,
        lng_index: usize,
        ny: usize,
        nx: usize,
    },

    /// The slot interval does not divide a day.
    #[error("interval of {0} minutes does not divide 1440")]
    InvalidInterval(u32),

    /// A physical value does not fit the int16 encoding.
    #[error("value {value} at cell {cell} does not fit the int16 encoding")]
    ValueOutOfRange { cell: usize, value: f64 },

    /// The dataset handed over by the decoder is inconsistent.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// The dataset grid differs from the grid recorded in the day file.
    #[error("dataset grid {dataset_nx}x{dataset_ny} differs from file grid {file_nx}x{file_ny}")]
    GeometryMismatch {
        file_nx: i32,
        file_ny: i32,
        dataset_nx: usize,
        dataset_ny: usize,
    },

    /// The day file was written with a different slot interval.
    #[error("file uses {file} minute slots, store is configured for {configured}")]
    IntervalMismatch { file: i32, configured: u32 },

    /// The day file exists but cannot be trusted.
    #[error("corrupt day file {path}: {reason}")]
    CorruptFile { path: PathBuf, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NdFileError {
    /// Create a MalformedHeader error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    /// Create a CorruptFile error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidDataset error.
    pub fn invalid_dataset(msg: impl Into<String>) -> Self {
        Self::InvalidDataset(msg.into())
    }
}

impl From<serde_json::Error> for NdFileError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDataset(err.to_string())
    }
}

/// Result type for day-file operations.
pub type Result<T> = std::result::Result<T, NdFileError>;
