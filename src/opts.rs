/// Options that control the output format of a decoder session.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that other frontends
/// (audio engines, tests, batch jobs) can construct options programmatically.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOptions {
    /// Output sample rate in Hz.
    ///
    /// `None` (or a value equal to the stream's native rate) means no resampling.
    pub sample_rate: Option<u32>,

    /// Output channel count.
    ///
    /// `None` (or a value equal to the stream's channel count) means no channel mapping.
    pub channels: Option<usize>,

    /// Resampler quality, only consulted when resampling is active.
    pub quality: ResamplerQuality,

    /// Number of native frames fed to the resampler per processing block.
    ///
    /// Tradeoff: larger blocks = better throughput; smaller blocks = lower latency.
    pub chunk_frames: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: None,
            quality: ResamplerQuality::default(),
            chunk_frames: 1024,
        }
    }
}

impl SourceOptions {
    /// Native channels, resampled to `sample_rate`.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            ..Self::default()
        }
    }
}

/// Quality preset for the sample-rate converter.
///
/// With the `cli` feature this doubles as a `clap` value enum, so frontends can take it
/// straight from a flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ResamplerQuality {
    /// Cubic polynomial interpolation. Cheapest, audible aliasing on bright material.
    Fast,
    /// 64-tap sinc, linear interpolation.
    Normal,
    /// 256-tap sinc, the setting used for music playback.
    #[default]
    High,
}
