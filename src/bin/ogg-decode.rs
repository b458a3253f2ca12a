use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use vorbis_source::logging;
use vorbis_source::wav::write_wav_file;
use vorbis_source::{FileSource, OggVorbisSource, ResamplerQuality, SourceOptions};

fn main() -> Result<()> {
    let params = Params::parse();
    logging::init_with_verbosity(params.verbose);

    let options = SourceOptions {
        sample_rate: params.sample_rate,
        channels: params.channels,
        quality: params.quality,
        ..SourceOptions::default()
    };

    let origin = Arc::new(FileSource::new(&params.input));
    let mut source = OggVorbisSource::with_options(origin, options)
        .with_context(|| format!("failed to open {}", params.input.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if params.json {
        serde_json::to_writer_pretty(&mut out, &source.info())?;
        writeln!(out)?;
    } else {
        print_info(&mut out, &source)?;
    }

    let Some(output) = params.output else {
        return Ok(());
    };

    if let Some(seconds) = params.start_seconds {
        let frame = (seconds.max(0.0) * source.sample_rate() as f64).round() as u64;
        source.seek(frame);
    }

    let max_frames = params
        .duration_seconds
        .map(|seconds| (seconds.max(0.0) * source.sample_rate() as f64).round() as u64);

    let frames = write_wav_file(&mut source, &output, max_frames)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let diagnostics = source.diagnostics();
    if diagnostics != Default::default() {
        eprintln!("absorbed faults: {diagnostics:?}");
    }

    if !params.json {
        writeln!(
            out,
            "wrote {frames} frames ({:.3}s) to {}",
            frames as f64 / source.sample_rate() as f64,
            output.display()
        )?;
    }
    Ok(())
}

fn print_info(out: &mut impl Write, source: &OggVorbisSource) -> Result<()> {
    writeln!(out, "channels:    {}", source.num_channels())?;
    writeln!(out, "sample rate: {} Hz", source.sample_rate_native())?;
    match source.num_frames_native() {
        Some(frames) => writeln!(
            out,
            "length:      {frames} frames ({:.3}s)",
            frames as f64 / source.sample_rate_native() as f64
        )?,
        None => writeln!(out, "length:      unknown")?,
    }

    if source.output_channels() != source.num_channels()
        || source.sample_rate() != source.sample_rate_native()
    {
        writeln!(
            out,
            "output:      {} channels at {} Hz",
            source.output_channels(),
            source.sample_rate()
        )?;
    }

    let metadata = source.metadata();
    if !metadata.is_empty() {
        writeln!(out, "comments:")?;
        for line in metadata.lines() {
            writeln!(out, "  {line}")?;
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "ogg-decode")]
#[command(about = "Inspect an Ogg Vorbis file and optionally decode it to WAV")]
struct Params {
    /// Ogg Vorbis file to read.
    input: PathBuf,

    /// Write decoded audio to this 32-bit float WAV file.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Resample to this rate (Hz). Defaults to the stream's native rate.
    #[arg(short = 'r', long = "sample-rate")]
    sample_rate: Option<u32>,

    /// Map to this many output channels. Defaults to the stream's channel count.
    #[arg(short = 'c', long = "channels")]
    channels: Option<usize>,

    /// Resampler quality.
    #[arg(long = "quality", value_enum, default_value_t = ResamplerQuality::High)]
    quality: ResamplerQuality,

    /// Start decoding at this position (seconds).
    #[arg(long = "start-seconds")]
    start_seconds: Option<f64>,

    /// Decode at most this many seconds.
    #[arg(long = "duration-seconds")]
    duration_seconds: Option<f64>,

    /// Print stream info as JSON.
    #[arg(long = "json", default_value_t = false)]
    json: bool,

    /// Log this crate's events to stderr; repeat for more detail (-v warnings, -vv debug).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}
