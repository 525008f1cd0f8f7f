//! Physical value <-> stored int16 conversion.

use serde::{Deserialize, Serialize};

use crate::error::{NdFileError, Result};

/// Stored value meaning "no observation for this slot".
pub const SENTINEL: i16 = i16::MAX;

/// Physical values are stored as `round(value * SCALE_FACTOR)`.
pub const SCALE_FACTOR: f64 = 100.0;

/// Largest storable quantized value; the sentinel is reserved.
const MAX_STORED: f64 = (SENTINEL - 1) as f64;
const MIN_STORED: f64 = i16::MIN as f64;

/// What to do with values that do not fit the int16 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizePolicy {
    /// Fail the write with `ValueOutOfRange`.
    #[default]
    Reject,
    /// Saturate to the nearest storable value.
    Clamp,
}

impl QuantizePolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }

    /// Quantize one cell value. Non-finite input is stored as the sentinel.
    pub fn quantize(&self, cell: usize, value: f64) -> Result<i16> {
        if !value.is_finite() {
            return Ok(SENTINEL);
        }

        let scaled = (value * SCALE_FACTOR).round();
        if (MIN_STORED..=MAX_STORED).contains(&scaled) {
            return Ok(scaled as i16);
        }

        match self {
            Self::Reject => Err(NdFileError::ValueOutOfRange { cell, value }),
            Self::Clamp => Ok(scaled.clamp(MIN_STORED, MAX_STORED) as i16),
        }
    }

    /// Quantize a whole grid before anything touches disk.
    pub fn quantize_all(&self, values: &[f64]) -> Result<Vec<i16>> {
        values
            .iter()
            .enumerate()
            .map(|(cell, value)| self.quantize(cell, *value))
            .collect()
    }
}

/// Convert a stored value back to physical units.
pub fn dequantize(stored: i16) -> Option<f64> {
    if stored == SENTINEL {
        None
    } else {
        Some(stored as f64 / SCALE_FACTOR)
    }
}
