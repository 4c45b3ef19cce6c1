//! Configuration module
//!
//! Loads and validates `holdwarp` configuration files: warp timing, the
//! sound cue fade, background music, the arrival animation and the
//! project ring.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
