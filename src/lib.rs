//! Sample-by-sample audio safety limiter.
//!
//! [`SafetyLimiter`] bounds one channel to unity with a held, exponentially
//! released peak envelope. [`render`] drives one limiter per channel over WAV
//! files.

pub mod analysis;
pub mod error;
pub mod limiter;
pub mod render;
pub mod settings;

pub use error::{Error, Result};
pub use limiter::{SafetyLimiter, sanitize};
pub use settings::{LimiterSettings, db_to_linear};
