//! Common type aliases used throughout the engine.

/// Search depth.
pub type Depth = u32;

/// Score (disc difference: -64 to +64).
pub type Score = i32;

/// Floating-point score in discs.
pub type Scoref = f32;
