//! Configuration module
//!
//! Loading and validation of protocol thresholds, windows, timing and
//! session policy. A loaded configuration is frozen behind an `Arc` and
//! shared read-only by every session.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
