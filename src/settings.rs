use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::limiter::{DEFAULT_HOLD_TIME, DEFAULT_RELEASE_TIME, SafetyLimiter};

/// Converts a decibel gain to a linear factor.
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LimiterSettings {
    /// Seconds for a held peak to decay by 60 dB.
    #[serde(default = "default_release_time")]
    pub release_time: f32,
    /// Seconds a new peak is held before release starts.
    #[serde(default = "default_hold_time")]
    pub hold_time: f32,
    /// Gain applied to the input before limiting, in dB.
    #[serde(default)]
    pub amplify_db: f32,
}

fn default_release_time() -> f32 {
    DEFAULT_RELEASE_TIME
}

fn default_hold_time() -> f32 {
    DEFAULT_HOLD_TIME
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            release_time: DEFAULT_RELEASE_TIME,
            hold_time: DEFAULT_HOLD_TIME,
            amplify_db: 0.0,
        }
    }
}

impl LimiterSettings {
    /// Reads settings from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), ?settings, "loaded limiter settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.release_time.is_finite() || self.release_time < 0.0 {
            return Err(Error::InvalidSetting {
                name: "release_time",
                value: self.release_time,
            });
        }
        if !self.hold_time.is_finite() || self.hold_time < 0.0 {
            return Err(Error::InvalidSetting {
                name: "hold_time",
                value: self.hold_time,
            });
        }
        if !self.amplify_db.is_finite() {
            return Err(Error::InvalidSetting {
                name: "amplify_db",
                value: self.amplify_db,
            });
        }
        Ok(())
    }

    pub fn amplify_gain(&self) -> f32 {
        db_to_linear(self.amplify_db)
    }

    /// Builds a limiter for one channel with these settings applied.
    pub fn build_limiter(&self, sample_rate: f32) -> Result<SafetyLimiter> {
        self.validate()?;
        let mut limiter = SafetyLimiter::try_new(sample_rate)?;
        limiter.set_release_time(self.release_time);
        limiter.set_hold_time(self.hold_time);
        Ok(limiter)
    }
}
