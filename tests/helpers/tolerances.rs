//! Tolerance constants for routing tests.

/// Floating point rounding errors (for passthrough, exact gain, sums of constants).
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;
