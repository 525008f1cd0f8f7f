//! Shared test utilities for the day-file workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic grid and axis generators
//! - Fixed timestamps, grid shapes and parameter codes
//! - Scratch directories with byte-level file inspection
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{create_test_grid, fixtures, ScratchDir};
//! ```

pub mod fixtures;
pub mod generators;
pub mod scratch;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use scratch::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for asserting that two byte buffers differ only inside the given ranges.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_bytes_differ_only_in;
///
/// assert_bytes_differ_only_in!(&before, &after, &[8..20, 150..152]);
/// ```
#[macro_export]
macro_rules! assert_bytes_differ_only_in {
    ($before:expr, $after:expr, $ranges:expr) => {{
        let before: &[u8] = $before;
        let after: &[u8] = $after;
        let ranges: &[std::ops::Range<usize>] = $ranges;
        assert_eq!(before.len(), after.len(), "buffer lengths differ");
        for (offset, (b, a)) in before.iter().zip(after.iter()).enumerate() {
            if b != a && !ranges.iter().any(|r| r.contains(&offset)) {
                panic!(
                    "unexpected change at byte {}: {:#04x} -> {:#04x}",
                    offset, b, a
                );
            }
        }
    }};
}
