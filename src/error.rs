use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid setting `{name}`: {value}")]
    InvalidSetting { name: &'static str, value: f32 },

    #[error("Audio has no channels: {0}")]
    NoChannels(String),

    #[error("{len} samples do not divide into {channels}-channel frames")]
    PartialFrame { len: usize, channels: u16 },

    #[error("At least one partial is required for THD")]
    NoPartials,

    #[error("Unsupported sample format: {bits}-bit {format:?}")]
    UnsupportedFormat {
        bits: u16,
        format: hound::SampleFormat,
    },

    #[error("Partials exceed Nyquist frequency: {f0} Hz x {partials} >= {nyquist} Hz")]
    PartialsAboveNyquist { f0: f32, partials: usize, nyquist: f32 },

    #[error("Signal too short for analysis: {len} samples, need at least {needed}")]
    SignalTooShort { len: usize, needed: usize },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
