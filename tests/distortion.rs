//! Distortion and envelope behaviour on amplified sines.
use safety_limiter::SafetyLimiter;
use safety_limiter::analysis::{measure_thd, sine_wave};

const SAMPLE_RATE: f32 = 48000.0;
const FREQUENCY: f32 = 440.0;
const PARTIALS: usize = 8;

fn limit(signal: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut limiter = SafetyLimiter::new(SAMPLE_RATE);
    let mut out = Vec::with_capacity(signal.len());
    let mut amplitude = Vec::with_capacity(signal.len());
    for &x in signal {
        out.push(limiter.process(x));
        amplitude.push(limiter.last_amplitude());
    }
    (out, amplitude)
}

fn added_thd(signal: &[f32], out: &[f32]) -> f64 {
    measure_thd(out, SAMPLE_RATE, FREQUENCY, PARTIALS).unwrap()
        - measure_thd(signal, SAMPLE_RATE, FREQUENCY, PARTIALS).unwrap()
}

/// Scales a one second sine by a gain ramping linearly from `from` to `to`.
fn ramped_sine(from: f32, to: f32) -> Vec<f32> {
    let signal = sine_wave(FREQUENCY, 1.0, SAMPLE_RATE);
    let steps = (signal.len() - 1) as f32;
    signal
        .iter()
        .enumerate()
        .map(|(i, x)| x * (from + (to - from) * i as f32 / steps) * 8.0)
        .collect()
}

#[test]
fn test_under_threshold_passes_through() {
    let signal: Vec<f32> = sine_wave(FREQUENCY, 1.0, SAMPLE_RATE)
        .into_iter()
        .map(|x| x * 0.5)
        .collect();
    let (out, _) = limit(&signal);
    assert_eq!(out, signal);
}

#[test]
fn test_over_threshold_peak_is_bounded() {
    let signal: Vec<f32> = sine_wave(FREQUENCY, 1.0, SAMPLE_RATE)
        .into_iter()
        .map(|x| x * 1.2)
        .collect();
    let (out, _) = limit(&signal);
    let peak = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    assert!(peak <= 1.0 + f32::EPSILON, "peak {peak} exceeds unity");
}

#[test]
fn test_no_dips_after_attack() {
    // 440 Hz at 48 kHz repeats its sample phases every 11 cycles (1200
    // samples), and one of those samples sits exactly on the crest. After
    // that the hold bridges every cycle, so the envelope must never move.
    let signal: Vec<f32> = sine_wave(FREQUENCY, 1.0, SAMPLE_RATE)
        .into_iter()
        .map(|x| x * 1.2)
        .collect();
    let (_, amplitude) = limit(&signal);
    let settled = amplitude[1200];
    assert!((settled - 1.2).abs() < 1e-6);
    for (i, &a) in amplitude.iter().enumerate().skip(1200) {
        assert_eq!(a, settled, "envelope moved at sample {i}");
    }
}

#[test]
fn test_thd_static() {
    let signal: Vec<f32> = sine_wave(FREQUENCY, 1.0, SAMPLE_RATE)
        .into_iter()
        .map(|x| x * 8.0)
        .collect();
    let (out, _) = limit(&signal);
    let thd = added_thd(&signal, &out);
    assert!(thd < 0.001, "static sine gained {thd}% THD");
}

#[test]
fn test_thd_rising_envelope() {
    let signal = ramped_sine(1.0, 2.0);
    let (out, _) = limit(&signal);
    let thd = added_thd(&signal, &out);
    assert!(thd < 0.03, "rising sine gained {thd}% THD");
}

#[test]
fn test_thd_falling_envelope() {
    let signal = ramped_sine(2.0, 1.0);
    let (out, _) = limit(&signal);
    let thd = added_thd(&signal, &out);
    assert!(thd < 0.1, "falling sine gained {thd}% THD");
}
