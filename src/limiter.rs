//! Per-channel safety limiter: a peak envelope follower with hold and
//! exponential release, driving a gain that pulls the envelope down to unity.

use crate::error::{Error, Result};

/// Release time applied by [`SafetyLimiter::new`], in seconds.
pub const DEFAULT_RELEASE_TIME: f32 = 0.1;

/// Hold time applied by [`SafetyLimiter::new`], in seconds.
pub const DEFAULT_HOLD_TIME: f32 = 0.1;

/// Level the envelope decays to after one release time (-60 dBFS).
const NEGATIVE_60_DBFS: f32 = 0.001;

/// Flushes NaN, infinities and subnormals to zero.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_infinite() {
        return 0.0;
    }
    if x.is_nan() {
        return 0.0;
    }
    if x.abs() < f32::MIN_POSITIVE {
        return 0.0;
    }
    x
}

#[derive(Debug, Clone)]
pub struct SafetyLimiter {
    sample_rate: f32,
    release_coef: f32,
    hold_samples: u32,
    last_amplitude: f32,
    hold_counter: u32,
}

impl SafetyLimiter {
    pub fn new(sample_rate: f32) -> Self {
        let mut limiter = SafetyLimiter {
            sample_rate,
            release_coef: 0.0,
            hold_samples: 0,
            last_amplitude: 0.0,
            hold_counter: 0,
        };
        limiter.set_release_time(DEFAULT_RELEASE_TIME);
        limiter.set_hold_time(DEFAULT_HOLD_TIME);
        limiter
    }

    /// Like [`SafetyLimiter::new`], but rejects rates that are not positive and finite.
    pub fn try_new(sample_rate: f32) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        Ok(Self::new(sample_rate))
    }

    /// Sets the time for a held peak to decay by 60 dB. Zero disables smoothing.
    pub fn set_release_time(&mut self, release_time: f32) {
        let release_samples = release_time * self.sample_rate;
        self.release_coef = if release_time == 0.0 {
            0.0
        } else if release_samples.is_finite() && release_samples > 0.0 {
            NEGATIVE_60_DBFS.powf(1.0 / release_samples)
        } else {
            // Degenerate rate or negative time: behave like instant release.
            0.0
        };
    }

    /// Sets how long a new peak is held before release, truncated to whole samples.
    pub fn set_hold_time(&mut self, hold_time: f32) {
        // `as` saturates: NaN and negative products become 0.
        self.hold_samples = (self.sample_rate * hold_time) as u32;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.process_sidechain(input, input)
    }

    /// Applies gain to `input` from an envelope that tracks `sidechain`.
    pub fn process_sidechain(&mut self, input: f32, sidechain: f32) -> f32 {
        let instant_amplitude = sanitize(sidechain).abs();

        // 1. Follow: freeze while holding, otherwise release toward the input
        let follower_amplitude = if self.hold_counter > 0 {
            self.hold_counter -= 1;
            self.last_amplitude
        } else {
            self.last_amplitude * self.release_coef + instant_amplitude * (1.0 - self.release_coef)
        };

        // 2. Peak detection restarts the hold
        let amplitude = if follower_amplitude > instant_amplitude {
            follower_amplitude
        } else {
            self.hold_counter = self.hold_samples;
            instant_amplitude
        };
        self.last_amplitude = sanitize(amplitude);

        // 3. Pull the envelope down to unity
        let gain = if amplitude > 1.0 { 1.0 / amplitude } else { 1.0 };
        input * gain
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Processes `samples` in place against `sidechain`, up to the shorter of the two.
    pub fn process_sidechain_block(&mut self, samples: &mut [f32], sidechain: &[f32]) {
        for (sample, &key) in samples.iter_mut().zip(sidechain) {
            *sample = self.process_sidechain(*sample, key);
        }
    }

    /// Clears the envelope and hold timer, keeping release and hold settings.
    pub fn reset(&mut self) {
        self.last_amplitude = 0.0;
        self.hold_counter = 0;
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn release_coefficient(&self) -> f32 {
        self.release_coef
    }

    pub fn hold_samples(&self) -> u32 {
        self.hold_samples
    }

    pub fn last_amplitude(&self) -> f32 {
        self.last_amplitude
    }

    pub fn hold_counter(&self) -> u32 {
        self.hold_counter
    }
}
