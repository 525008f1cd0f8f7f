//! Test data generators for synthetic gridded fields.
//!
//! Values stay well inside the int16 encoding range (|v| < 327.67) so they
//! can be written to day files unchanged.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `row * 10 + col * 0.01`
///
/// # Arguments
///
/// * `nx` - Number of columns (longitude points)
/// * `ny` - Number of rows (latitude points)
///
/// # Returns
///
/// A `Vec<f64>` in row-major order (row 0 first, then row 1, etc.)
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 0.0);
/// assert_eq!(grid[10], 10.0); // col=0, row=1
/// ```
pub fn create_test_grid(nx: usize, ny: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(nx * ny);
    for row in 0..ny {
        for col in 0..nx {
            data.push(row as f64 * 10.0 + col as f64 * 0.01);
        }
    }
    data
}

/// Creates a test grid with 2 m temperature-like values in degrees Celsius.
///
/// Values run from about -20 C (first cell) to 40 C (last cell).
pub fn create_temperature_grid(nx: usize, ny: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(nx * ny);
    for row in 0..ny {
        for col in 0..nx {
            let x_factor = col as f64 / nx.max(1) as f64;
            let y_factor = row as f64 / ny.max(1) as f64;
            data.push(-20.0 + x_factor * 30.0 + y_factor * 30.0);
        }
    }
    data
}

/// Creates a grid where every cell has the same value.
pub fn create_constant_grid(nx: usize, ny: usize, value: f64) -> Vec<f64> {
    vec![value; nx * ny]
}

/// Creates a grid with NaN (missing) values at the given row-major indices.
pub fn create_grid_with_nans(nx: usize, ny: usize, nan_cells: &[usize]) -> Vec<f64> {
    let mut data = create_test_grid(nx, ny);
    for &cell in nan_cells {
        if cell < data.len() {
            data[cell] = f64::NAN;
        }
    }
    data
}

/// Creates an evenly spaced axis: `start, start + step, ...` with `n` points.
pub fn create_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}
