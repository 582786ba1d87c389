//! Test signals and harmonic distortion measurement.

use realfft::RealFftPlanner;
use realfft::num_complex::Complex;

use crate::error::{Error, Result};

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = FFT_SIZE / 2;
/// A harmonic's amplitude sums bins `bin - BIN_RADIUS .. bin + BIN_RADIUS`
/// (half-open), where `bin` is the first bin above the harmonic.
const BIN_RADIUS: usize = 2;

/// Generates `duration` seconds of a unit sine at `frequency` Hz.
pub fn sine_wave(frequency: f32, duration: f32, sample_rate: f32) -> Vec<f32> {
    let len = (duration * sample_rate) as usize;
    let omega = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..len).map(|i| (i as f64 * omega).sin() as f32).collect()
}

/// Mean total harmonic distortion of `signal` in percent.
///
/// Harmonics 2..=`partials` of `f0` are measured against the fundamental
/// over Hann-windowed frames of 2048 samples with 50% overlap.
pub fn measure_thd(signal: &[f32], sample_rate: f32, f0: f32, partials: usize) -> Result<f64> {
    if partials == 0 {
        return Err(Error::NoPartials);
    }
    let nyquist = sample_rate * 0.5;
    if f0 * partials as f32 >= nyquist {
        return Err(Error::PartialsAboveNyquist {
            f0,
            partials,
            nyquist,
        });
    }
    if signal.len() <= FFT_SIZE {
        return Err(Error::SignalTooShort {
            len: signal.len(),
            needed: FFT_SIZE + 1,
        });
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let window: Vec<f64> = (0..FFT_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / FFT_SIZE as f64).cos()))
        .collect();

    let bin_width = sample_rate as f64 / FFT_SIZE as f64;
    let num_bins = FFT_SIZE / 2 + 1;
    // First bin strictly above each harmonic
    let harmonic_bins: Vec<usize> = (1..=partials)
        .map(|p| {
            let frequency = (f0 * p as f32) as f64;
            (0..num_bins)
                .find(|&k| k as f64 * bin_width > frequency)
                .unwrap_or(num_bins - 1)
        })
        .collect();

    let mut input = fft.make_input_vec();
    let mut spectrum: Vec<Complex<f64>> = fft.make_output_vec();
    let mut amplitudes = vec![0.0f64; partials];
    let mut thd_sum = 0.0;
    let mut frame_count = 0usize;

    for offset in (0..signal.len() - FFT_SIZE).step_by(HOP_SIZE) {
        let frame = &signal[offset..offset + FFT_SIZE];
        for ((x, &s), &w) in input.iter_mut().zip(frame).zip(&window) {
            *x = s as f64 * w;
        }
        fft.process(&mut input, &mut spectrum)
            .map_err(|e| Error::Analysis(e.to_string()))?;

        for (amplitude, &bin) in amplitudes.iter_mut().zip(&harmonic_bins) {
            let low = bin.saturating_sub(BIN_RADIUS);
            let high = (bin + BIN_RADIUS).min(num_bins);
            *amplitude = spectrum[low..high]
                .iter()
                .map(|c| c.norm_sqr())
                .sum::<f64>()
                .sqrt();
        }

        let harmonics: f64 = amplitudes[1..].iter().map(|a| a * a).sum();
        thd_sum += 100.0 * (harmonics / (amplitudes[0] * amplitudes[0])).sqrt();
        frame_count += 1;
    }

    Ok(thd_sum / frame_count as f64)
}
