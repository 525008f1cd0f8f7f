//! Decoded grid snapshots handed over by the GRIB decoder.
//!
//! The decoder itself lives outside this crate. What it must produce is a
//! [`GridDataset`]: row-major values with any scan-mode reordering already
//! applied, per-degree spacing, ascending distinct axes, and a
//! forecast-adjusted valid time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NdFileError, Result};

/// One decoded field at one valid time.
///
/// The JSON form carries either `valid_time` or a `forecast` object
/// (`reference_time`, Code Table 4.4 `unit`, `forecast_time`) from which the
/// valid time is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetDocument")]
pub struct GridDataset {
    /// Packed parameter code, see [`ParameterCode`].
    pub type_code: i32,
    /// Points along a latitude line (longitude axis).
    pub nx: usize,
    /// Points along a meridian (latitude axis).
    pub ny: usize,
    pub la1: f64,
    pub la2: f64,
    pub lo1: f64,
    pub lo2: f64,
    pub dx: f64,
    pub dy: f64,
    /// Physical values, latitude-major.
    pub values: Vec<f64>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Reference time plus forecast offset.
    pub valid_time: DateTime<Utc>,
}

/// Forecast timing as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastTime {
    pub reference_time: DateTime<Utc>,
    /// Code Table 4.4 unit of `forecast_time`.
    pub unit: u8,
    pub forecast_time: i64,
}

impl ForecastTime {
    pub fn valid_time(&self) -> Result<DateTime<Utc>> {
        valid_time(
            self.reference_time,
            ForecastUnit::from_code(self.unit)?,
            self.forecast_time,
        )
    }
}

/// Wire form of [`GridDataset`].
#[derive(Deserialize)]
struct DatasetDocument {
    type_code: i32,
    nx: usize,
    ny: usize,
    la1: f64,
    la2: f64,
    lo1: f64,
    lo2: f64,
    dx: f64,
    dy: f64,
    values: Vec<f64>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    #[serde(default)]
    valid_time: Option<DateTime<Utc>>,
    #[serde(default)]
    forecast: Option<ForecastTime>,
}

impl TryFrom<DatasetDocument> for GridDataset {
    type Error = NdFileError;

    fn try_from(doc: DatasetDocument) -> Result<Self> {
        let valid_time = match (doc.valid_time, doc.forecast) {
            (Some(valid_time), None) => valid_time,
            (None, Some(forecast)) => forecast.valid_time()?,
            (Some(_), Some(_)) => {
                return Err(NdFileError::invalid_dataset(
                    "both valid_time and forecast given",
                ))
            }
            (None, None) => {
                return Err(NdFileError::invalid_dataset(
                    "one of valid_time or forecast is required",
                ))
            }
        };

        Ok(Self {
            type_code: doc.type_code,
            nx: doc.nx,
            ny: doc.ny,
            la1: doc.la1,
            la2: doc.la2,
            lo1: doc.lo1,
            lo2: doc.lo2,
            dx: doc.dx,
            dy: doc.dy,
            values: doc.values,
            latitudes: doc.latitudes,
            longitudes: doc.longitudes,
            valid_time,
        })
    }
}

impl GridDataset {
    /// Parse a dataset from its JSON form.
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Valid time in epoch seconds.
    pub fn timestamp(&self) -> i64 {
        self.valid_time.timestamp()
    }

    /// `nx * ny`, or `None` when the product overflows.
    pub fn cell_count(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)
    }

    /// Check that values and axes agree with the grid dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.nx > i32::MAX as usize || self.ny > i32::MAX as usize {
            return Err(NdFileError::invalid_dataset(format!(
                "grid {}x{} too large",
                self.nx, self.ny
            )));
        }
        let cell_count = self.cell_count().ok_or_else(|| {
            NdFileError::invalid_dataset(format!("grid {}x{} too large", self.nx, self.ny))
        })?;
        if self.values.len() != cell_count {
            return Err(NdFileError::invalid_dataset(format!(
                "{} values for a {}x{} grid",
                self.values.len(),
                self.nx,
                self.ny
            )));
        }
        if self.latitudes.len() != self.ny {
            return Err(NdFileError::invalid_dataset(format!(
                "{} distinct latitudes for ny={}",
                self.latitudes.len(),
                self.ny
            )));
        }
        if self.longitudes.len() != self.nx {
            return Err(NdFileError::invalid_dataset(format!(
                "{} distinct longitudes for nx={}",
                self.longitudes.len(),
                self.nx
            )));
        }
        if self.valid_time.timestamp_subsec_nanos() != 0 {
            return Err(NdFileError::invalid_dataset(
                "valid time has sub-second precision",
            ));
        }
        Ok(())
    }

    /// Reverse the latitude axis when the grid runs north to south but the
    /// decoder reported the distinct latitudes ascending.
    pub fn normalize_latitudes(&mut self) {
        let ascending = self
            .latitudes
            .last()
            .zip(self.latitudes.first())
            .map(|(last, first)| last > first)
            .unwrap_or(false);

        if self.ny > 1 && self.la2 < self.la1 && ascending {
            self.latitudes.reverse();
        }
    }
}

/// GRIB2 parameter identity packed into the file type code:
/// `discipline | category << 8 | number << 16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterCode {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
}

impl ParameterCode {
    pub fn from_parts(discipline: u8, category: u8, number: u8) -> Self {
        Self {
            discipline,
            category,
            number,
        }
    }

    /// Packed type code as stored in file names and headers.
    pub fn type_code(&self) -> i32 {
        self.discipline as i32 | (self.category as i32) << 8 | (self.number as i32) << 16
    }

    /// Unpack a type code; bits above the third byte are ignored.
    pub fn parts(type_code: i32) -> Self {
        Self {
            discipline: (type_code & 0xFF) as u8,
            category: ((type_code >> 8) & 0xFF) as u8,
            number: ((type_code >> 16) & 0xFF) as u8,
        }
    }
}

/// GRIB2 Code Table 4.4, indicator of unit of time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastUnit {
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Decade,
    Normal,
    Century,
    ThreeHours,
    SixHours,
    TwelveHours,
    Second,
    Missing,
}

impl ForecastUnit {
    pub fn from_code(code: u8) -> Result<Self> {
        let unit = match code {
            0 => Self::Minute,
            1 => Self::Hour,
            2 => Self::Day,
            3 => Self::Month,
            4 => Self::Year,
            5 => Self::Decade,
            6 => Self::Normal,
            7 => Self::Century,
            10 => Self::ThreeHours,
            11 => Self::SixHours,
            12 => Self::TwelveHours,
            13 => Self::Second,
            255 => Self::Missing,
            other => {
                return Err(NdFileError::invalid_dataset(format!(
                    "unsupported forecast time unit {}",
                    other
                )))
            }
        };
        Ok(unit)
    }

    /// Seconds in one unit. Months are 30 days and years 365 days.
    fn seconds(&self) -> i64 {
        const HOUR: i64 = 3600;
        const DAY: i64 = 24 * HOUR;
        const YEAR: i64 = 365 * DAY;
        match self {
            Self::Minute => 60,
            Self::Hour => HOUR,
            Self::Day => DAY,
            Self::Month => 30 * DAY,
            Self::Year => YEAR,
            Self::Decade => 10 * YEAR,
            Self::Normal => 30 * YEAR,
            Self::Century => 100 * YEAR,
            Self::ThreeHours => 3 * HOUR,
            Self::SixHours => 6 * HOUR,
            Self::TwelveHours => 12 * HOUR,
            Self::Second => 1,
            Self::Missing => 0,
        }
    }

    /// Length of `amount` units; `InvalidDataset` when it does not fit a
    /// `chrono::Duration`.
    pub fn duration(&self, amount: i64) -> Result<Duration> {
        self.seconds()
            .checked_mul(amount)
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                NdFileError::invalid_dataset(format!(
                    "forecast time {} {:?} out of range",
                    amount, self
                ))
            })
    }
}

/// Valid time of a forecast: reference time plus the forecast offset.
pub fn valid_time(
    reference_time: DateTime<Utc>,
    unit: ForecastUnit,
    forecast_time: i64,
) -> Result<DateTime<Utc>> {
    reference_time
        .checked_add_signed(unit.duration(forecast_time)?)
        .ok_or_else(|| {
            NdFileError::invalid_dataset(format!(
                "valid time {} + {} {:?} out of range",
                reference_time, forecast_time, unit
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn small_dataset() -> GridDataset {
        GridDataset {
            type_code: 0,
            nx: 3,
            ny: 2,
            la1: 55.0,
            la2: 54.0,
            lo1: 10.0,
            lo2: 12.0,
            dx: 1.0,
            dy: 1.0,
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            latitudes: vec![54.0, 55.0],
            longitudes: vec![10.0, 11.0, 12.0],
            valid_time: Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(small_dataset().validate().is_ok());
    }

    #[test]
    fn test_validate_value_count() {
        let mut dataset = small_dataset();
        dataset.values.pop();
        assert!(matches!(
            dataset.validate(),
            Err(NdFileError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_validate_axis_lengths() {
        let mut dataset = small_dataset();
        dataset.latitudes.push(56.0);
        assert!(dataset.validate().is_err());

        let mut dataset = small_dataset();
        dataset.longitudes.clear();
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_normalize_latitudes_reverses_north_to_south() {
        let mut dataset = small_dataset();
        dataset.normalize_latitudes();
        assert_eq!(dataset.latitudes, vec![55.0, 54.0]);
    }

    #[test]
    fn test_normalize_latitudes_keeps_south_to_north() {
        let mut dataset = small_dataset();
        dataset.la1 = 54.0;
        dataset.la2 = 55.0;
        dataset.normalize_latitudes();
        assert_eq!(dataset.latitudes, vec![54.0, 55.0]);
    }

    #[test]
    fn test_parameter_code_packing() {
        // discipline 0, category 2 (momentum), number 22 (wind gust)
        let code = ParameterCode::from_parts(0, 2, 22);
        assert_eq!(code.type_code(), 0x16_02_00);
        assert_eq!(ParameterCode::parts(code.type_code()), code);
    }

    #[test]
    fn test_forecast_units() {
        let reference = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

        let hour = ForecastUnit::from_code(1).unwrap();
        assert_eq!(
            valid_time(reference, hour, 6).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
        );

        let three_hours = ForecastUnit::from_code(10).unwrap();
        assert_eq!(three_hours.duration(2).unwrap(), Duration::hours(6));

        let month = ForecastUnit::from_code(3).unwrap();
        assert_eq!(month.duration(1).unwrap(), Duration::days(30));

        let missing = ForecastUnit::from_code(255).unwrap();
        assert_eq!(valid_time(reference, missing, 42).unwrap(), reference);
    }

    #[test]
    fn test_forecast_duration_overflow() {
        let century = ForecastUnit::from_code(7).unwrap();
        assert!(matches!(
            century.duration(i64::MAX / 1000),
            Err(NdFileError::InvalidDataset(_))
        ));
        assert!(ForecastUnit::from_code(13).unwrap().duration(i64::MAX).is_err());
    }

    #[test]
    fn test_valid_time_out_of_range() {
        let reference = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let year = ForecastUnit::from_code(4).unwrap();
        // fits a Duration, but not a DateTime
        assert!(year.duration(1_000_000).is_ok());
        assert!(matches!(
            valid_time(reference, year, 1_000_000),
            Err(NdFileError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_unknown_forecast_unit() {
        assert!(ForecastUnit::from_code(8).is_err());
    }

    #[test]
    fn test_validate_oversized_dimensions() {
        let mut dataset = small_dataset();
        dataset.nx = 1 << 32;
        dataset.ny = 1 << 32;
        assert!(matches!(
            dataset.validate(),
            Err(NdFileError::InvalidDataset(_))
        ));
        assert_eq!(dataset.cell_count(), None);

        let json = br#"{"type_code":0,"nx":4294967296,"ny":4294967296,
            "la1":0.0,"la2":0.0,"lo1":0.0,"lo2":0.0,"dx":1.0,"dy":1.0,
            "values":[],"latitudes":[],"longitudes":[],
            "valid_time":"2024-01-15T00:00:00Z"}"#;
        let parsed = GridDataset::from_json_slice(json).unwrap();
        assert!(matches!(
            parsed.validate(),
            Err(NdFileError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_json_forecast_time() {
        let json = br#"{"type_code":0,"nx":1,"ny":1,
            "la1":50.0,"la2":50.0,"lo1":10.0,"lo2":10.0,"dx":1.0,"dy":1.0,
            "values":[1.5],"latitudes":[50.0],"longitudes":[10.0],
            "forecast":{"reference_time":"2024-01-15T00:00:00Z","unit":10,"forecast_time":2}}"#;
        let parsed = GridDataset::from_json_slice(json).unwrap();
        assert_eq!(
            parsed.valid_time,
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_json_time_required_once() {
        let base = r#""type_code":0,"nx":1,"ny":1,
            "la1":50.0,"la2":50.0,"lo1":10.0,"lo2":10.0,"dx":1.0,"dy":1.0,
            "values":[1.5],"latitudes":[50.0],"longitudes":[10.0]"#;
        let forecast = r#""forecast":{"reference_time":"2024-01-15T00:00:00Z","unit":1,"forecast_time":3}"#;

        let neither = format!("{{{}}}", base);
        assert!(GridDataset::from_json_slice(neither.as_bytes()).is_err());

        let both = format!(
            "{{{},\"valid_time\":\"2024-01-15T03:00:00Z\",{}}}",
            base, forecast
        );
        assert!(GridDataset::from_json_slice(both.as_bytes()).is_err());

        let bad_unit = format!(
            "{{{},\"forecast\":{{\"reference_time\":\"2024-01-15T00:00:00Z\",\"unit\":9,\"forecast_time\":3}}}}",
            base
        );
        assert!(matches!(
            GridDataset::from_json_slice(bad_unit.as_bytes()),
            Err(NdFileError::InvalidDataset(_))
        ));

        let overflow = format!(
            "{{{},\"forecast\":{{\"reference_time\":\"2024-01-15T00:00:00Z\",\"unit\":7,\"forecast_time\":9223372036854775}}}}",
            base
        );
        assert!(GridDataset::from_json_slice(overflow.as_bytes()).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let dataset = small_dataset();
        let json = serde_json::to_vec(&dataset).unwrap();
        let parsed = GridDataset::from_json_slice(&json).unwrap();
        assert_eq!(parsed, dataset);
    }
}
