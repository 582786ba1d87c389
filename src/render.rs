//! Offline driver: WAV in, one limiter per channel, 32-bit float WAV out.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use std::path::Path;

use crate::error::{Error, Result};
use crate::limiter::SafetyLimiter;
use crate::settings::LimiterSettings;

/// Samples handed to a limiter between progress reports.
const PROGRESS_CHUNK: usize = 4096;

/// Interleaved audio frames.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Length in seconds, or 0 when the rate is 0.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    fn deinterleave(&self) -> Vec<Vec<f32>> {
        let num_channel = self.channels as usize;
        let mut planes: Vec<Vec<f32>> = (0..num_channel)
            .map(|_| Vec::with_capacity(self.frames()))
            .collect();
        for frame in self.samples.chunks_exact(num_channel) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        planes
    }

    fn interleave(&mut self, planes: &[Vec<f32>]) {
        let num_channel = self.channels as usize;
        for (i, frame) in self.samples.chunks_exact_mut(num_channel).enumerate() {
            for (sample, plane) in frame.iter_mut().zip(planes) {
                *sample = plane[i];
            }
        }
    }
}

/// Decodes a WAV file to interleaved `f32` samples in [-1, 1).
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(Error::NoChannels(path.display().to_string()));
    }
    if spec.sample_rate == 0 {
        return Err(Error::InvalidSampleRate(0.0));
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        (format, bits) => return Err(Error::UnsupportedFormat { bits, format }),
    };

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "decoded input"
    );

    Ok(AudioBuffer {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Writes 32-bit float WAV so the limited signal is not re-quantized.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    if audio.channels == 0 {
        return Err(Error::NoChannels(path.display().to_string()));
    }
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Amplifies and limits every channel of `audio` in place.
///
/// Each channel gets its own limiter; channels run in parallel on the
/// current rayon pool. `progress` receives the number of samples finished
/// after each chunk, from whichever worker thread completed it.
pub fn limit_interleaved<F>(
    audio: &mut AudioBuffer,
    settings: &LimiterSettings,
    progress: F,
) -> Result<()>
where
    F: Fn(u64) + Sync,
{
    if audio.channels == 0 {
        return Err(Error::NoChannels("in-memory buffer".to_string()));
    }
    if audio.samples.len() % audio.channels as usize != 0 {
        return Err(Error::PartialFrame {
            len: audio.samples.len(),
            channels: audio.channels,
        });
    }

    let mut limiters = (0..audio.channels)
        .map(|_| settings.build_limiter(audio.sample_rate as f32))
        .collect::<Result<Vec<SafetyLimiter>>>()?;
    let amplify = settings.amplify_gain();

    tracing::info!(
        channels = audio.channels,
        frames = audio.frames(),
        amplify,
        release_time = settings.release_time,
        hold_time = settings.hold_time,
        "limiting"
    );

    let mut planes = audio.deinterleave();
    planes
        .par_iter_mut()
        .zip(limiters.par_iter_mut())
        .for_each(|(plane, limiter)| {
            for chunk in plane.chunks_mut(PROGRESS_CHUNK) {
                for sample in chunk.iter_mut() {
                    *sample = limiter.process(*sample * amplify);
                }
                progress(chunk.len() as u64);
            }
        });
    audio.interleave(&planes);

    Ok(())
}
