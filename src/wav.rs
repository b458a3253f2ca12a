use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::source::AudioSource;

/// Frames requested from the source per read while rendering.
const RENDER_CHUNK_FRAMES: usize = 4096;

/// Render a source to 32-bit float WAV, from its current position.
///
/// The WAV takes the source's output format (`output_channels()` / `sample_rate()`). Rendering
/// stops at end of stream, or after `max_frames` frames when given.
///
/// Returns the number of frames written.
pub fn write_wav<W>(source: &mut dyn AudioSource, writer: W, max_frames: Option<u64>) -> Result<u64>
where
    W: Write + Seek,
{
    let channels = source.output_channels();
    let spec = WavSpec {
        channels: u16::try_from(channels)
            .map_err(|_| Error::msg(format!("{channels} channels do not fit in a WAV header")))?,
        sample_rate: source.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut wav = WavWriter::new(writer, spec)?;
    let mut buf = Buffer::new(RENDER_CHUNK_FRAMES, channels);
    let mut interleaved = Vec::with_capacity(RENDER_CHUNK_FRAMES * channels);
    let mut written = 0u64;

    loop {
        let want = match max_frames {
            Some(max) => (max - written).min(RENDER_CHUNK_FRAMES as u64) as usize,
            None => RENDER_CHUNK_FRAMES,
        };
        if want == 0 {
            break;
        }

        let n = source.perform_read(&mut buf, 0, want);
        if n == 0 {
            break;
        }

        buf.interleave_into(0, n, &mut interleaved);
        for &sample in &interleaved {
            wav.write_sample(sample)?;
        }
        written += n as u64;
    }

    wav.finalize()?;

    debug!(frames = written, channels, sample_rate = spec.sample_rate, "wrote wav");
    Ok(written)
}

/// [`write_wav`] into a new file at `path`.
pub fn write_wav_file(
    source: &mut dyn AudioSource,
    path: impl AsRef<Path>,
    max_frames: Option<u64>,
) -> Result<u64> {
    let file = File::create(path.as_ref())?;
    write_wav(source, BufWriter::new(file), max_frames)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Two-channel source: channel 0 counts up, channel 1 is its negation.
    struct CountSource {
        total: usize,
        position: usize,
    }

    impl AudioSource for CountSource {
        fn num_channels(&self) -> usize {
            2
        }

        fn sample_rate_native(&self) -> u32 {
            8_000
        }

        fn perform_read(&mut self, buffer: &mut Buffer, frame_offset: usize, frames: usize) -> usize {
            let n = frames.min(self.total - self.position);
            for i in 0..n {
                let v = (self.position + i) as f32 / 1000.0;
                buffer.channel_mut(0)[frame_offset + i] = v;
                buffer.channel_mut(1)[frame_offset + i] = -v;
            }
            self.position += n;
            n
        }

        fn perform_seek(&mut self, frame: u64) {
            self.position = (frame as usize).min(self.total);
        }

        fn metadata(&self) -> String {
            String::new()
        }

        fn clone_with_sample_rate(&self, _sample_rate: u32) -> Result<Box<dyn AudioSource>> {
            Err(Error::msg("not supported"))
        }
    }

    #[test]
    fn renders_interleaved_float_samples() -> anyhow::Result<()> {
        let mut source = CountSource {
            total: 5_000,
            position: 0,
        };

        let mut bytes = Cursor::new(Vec::new());
        let frames = write_wav(&mut source, &mut bytes, None)?;
        assert_eq!(frames, 5_000);

        bytes.set_position(0);
        let mut reader = hound::WavReader::new(bytes)?;
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.sample_format, SampleFormat::Float);

        let samples = reader.samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?;
        assert_eq!(samples.len(), 10_000);
        assert_eq!(&samples[..4], &[0.0, -0.0, 0.001, -0.001]);
        Ok(())
    }

    #[test]
    fn max_frames_limits_the_render() -> anyhow::Result<()> {
        let mut source = CountSource {
            total: 5_000,
            position: 1_000,
        };

        let mut bytes = Cursor::new(Vec::new());
        assert_eq!(write_wav(&mut source, &mut bytes, Some(4_500))?, 4_000);

        let mut source = CountSource {
            total: 10_000,
            position: 0,
        };
        let mut bytes = Cursor::new(Vec::new());
        assert_eq!(write_wav(&mut source, &mut bytes, Some(4_500))?, 4_500);
        Ok(())
    }

    #[test]
    fn writes_to_a_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.wav");

        let mut source = CountSource {
            total: 100,
            position: 0,
        };
        write_wav_file(&mut source, &path, None)?;

        let reader = hound::WavReader::open(&path)?;
        assert_eq!(reader.duration(), 100);
        Ok(())
    }
}
