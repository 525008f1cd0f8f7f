//! Common test fixtures for day-file tests.

/// Fixed instants used across tests.
pub mod time {
    /// 2024-01-15T00:00:00Z in epoch seconds.
    pub const DAY_START: i64 = 1_705_276_800;

    /// Days since the Unix epoch for [`DAY_START`].
    pub const DAY_NUMBER: i64 = 19_737;

    /// Seconds in a day.
    pub const DAY: i64 = 86_400;

    /// Epoch seconds for `hour:minute` on the fixture day.
    pub const fn at(hour: i64, minute: i64) -> i64 {
        DAY_START + hour * 3600 + minute * 60
    }
}

/// Grid shapes for testing.
pub mod grid {
    /// Regular lat/lon grid description.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nx: usize,
        pub ny: usize,
        /// Southernmost latitude.
        pub lat0: f64,
        /// Westernmost longitude.
        pub lon0: f64,
        pub step: f64,
    }

    impl GridSpec {
        pub fn cell_count(&self) -> usize {
            self.nx * self.ny
        }

        pub fn latitudes(&self) -> Vec<f64> {
            crate::create_axis(self.lat0, self.step, self.ny)
        }

        pub fn longitudes(&self) -> Vec<f64> {
            crate::create_axis(self.lon0, self.step, self.nx)
        }

        /// (la1, la2, lo1, lo2) with the grid scanned south to north.
        pub fn bounds(&self) -> (f64, f64, f64, f64) {
            (
                self.lat0,
                self.lat0 + self.step * (self.ny.max(1) - 1) as f64,
                self.lon0,
                self.lon0 + self.step * (self.nx.max(1) - 1) as f64,
            )
        }
    }

    /// Three longitudes (10, 11, 12) by two latitudes (50, 51).
    pub const SMALL_3X2: GridSpec = GridSpec {
        nx: 3,
        ny: 2,
        lat0: 50.0,
        lon0: 10.0,
        step: 1.0,
    };

    /// Quarter-degree regional grid.
    pub const REGIONAL_40X30: GridSpec = GridSpec {
        nx: 40,
        ny: 30,
        lat0: 45.0,
        lon0: 5.0,
        step: 0.25,
    };
}

/// Packed parameter codes (`discipline | category << 8 | number << 16`).
pub mod parameters {
    /// Temperature (0, 0, 0).
    pub const TEMPERATURE: i32 = 0;

    /// Wind gust (0, 2, 22).
    pub const WIND_GUST: i32 = 2 << 8 | 22 << 16;

    /// Total precipitation (0, 1, 8).
    pub const PRECIPITATION: i32 = 1 << 8 | 8 << 16;
}
