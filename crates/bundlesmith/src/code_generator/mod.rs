//! Code generation of bundle files
//!
//! This module turns resolved bundle definitions into script text:
//! - `builder` drives the per-section emission into a segment writer
//! - `embedding` escapes and minifies non-script resources
//! - `predefine` rewrites single registration modules into predefine calls

pub mod builder;
pub mod embedding;
pub mod predefine;

// Re-export the builder and its option and result types
pub use builder::{BuildOptions, Builder, BundleResult};
