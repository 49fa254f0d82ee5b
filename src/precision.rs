//! Precision constants for geometric comparisons.
//!
//! The values follow the classical CAD-kernel conventions; algorithms in
//! this crate assume them and they should not be changed casually.

/// Angular tolerance for checking equality of angles (radians).
/// Used for parallelism checks on axis directions.
pub const ANGULAR: f64 = 1.0e-12;

/// Confusion tolerance: two points closer than this coincide.
pub const CONFUSION: f64 = 1.0e-7;
