//! Sample rate conversion for decoded packets.
//!
//! Decoder packets rarely line up with the resampler's fixed input size, so
//! input is buffered per channel and carried over to the next packet. The
//! output of a song is the same however its packets happen to be split.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::error::{Error, Result};

/// Input frames per resampler call.
const CHUNK_FRAMES: usize = 1024;
/// FFT sub-chunks per call.
const SUB_CHUNKS: usize = 2;

/// Streaming resampler for interleaved f32 samples.
pub struct Resampler {
    /// None when input and output rates match
    inner: Option<FftFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Leftover input, one buffer per channel
    pending: Vec<Vec<f32>>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::playback(format!(
                "cannot resample {} Hz x{} to {} Hz",
                input_rate, channels, output_rate
            )));
        }

        let inner = if input_rate == output_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_FRAMES,
                SUB_CHUNKS,
                channels,
            )
            .map_err(|e| Error::playback(format!("resampler setup failed: {}", e)))?;
            tracing::debug!(input_rate, output_rate, channels, "Resampling");
            Some(resampler)
        };

        Ok(Self {
            inner,
            input_rate,
            output_rate,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    pub fn needs_resampling(&self) -> bool {
        self.inner.is_some()
    }

    /// Output frames per input frame.
    pub fn ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }

    /// Resample one interleaved packet.
    ///
    /// Returns whatever full chunks are ready; the rest waits for the next
    /// packet or [`Self::flush`].
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.inner.as_mut() else {
            return input.to_vec();
        };

        for (i, sample) in input.iter().enumerate() {
            self.pending[i % self.channels].push(*sample);
        }

        let mut output = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|buf| buf.drain(..CHUNK_FRAMES).collect())
                .collect();
            match resampler.process(&chunk, None) {
                Ok(resampled) => interleave(&resampled, usize::MAX, &mut output),
                Err(e) => tracing::warn!(error = %e, "Resampling failed"),
            }
        }
        output
    }

    /// Resample the buffered tail at the end of a song.
    pub fn flush(&mut self) -> Vec<f32> {
        let ratio = self.ratio();
        let Some(resampler) = self.inner.as_mut() else {
            return Vec::new();
        };

        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Vec::new();
        }

        // Pad to a full chunk, keep only the frames the real input produced
        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|buf| {
                let mut frames = std::mem::take(buf);
                frames.resize(CHUNK_FRAMES, 0.0);
                frames
            })
            .collect();

        let mut output = Vec::new();
        match resampler.process(&chunk, None) {
            Ok(resampled) => {
                let frames = (remaining as f64 * ratio).ceil() as usize;
                interleave(&resampled, frames, &mut output);
            }
            Err(e) => tracing::warn!(error = %e, "Resampling flush failed"),
        }
        output
    }
}

/// Append up to `max_frames` frames of per-channel buffers as interleaved samples.
fn interleave(channels: &[Vec<f32>], max_frames: usize, out: &mut Vec<f32>) {
    let frames = channels.first().map_or(0, |c| c.len()).min(max_frames);
    out.reserve(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            out.push(channel[frame]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, channels: usize, rate: u32) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = (i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin();
                std::iter::repeat_n(v, channels)
            })
            .collect()
    }

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut resampler = Resampler::new(48_000, 48_000, 2).unwrap();
        assert!(!resampler.needs_resampling());

        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.process(&input), input);
        assert!(resampler.flush().is_empty());
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(Resampler::new(0, 48_000, 2).is_err());
        assert!(Resampler::new(44_100, 48_000, 0).is_err());
    }

    #[test]
    fn test_ratio() {
        let resampler = Resampler::new(44_100, 48_000, 2).unwrap();
        assert!(resampler.needs_resampling());
        assert!((resampler.ratio() - 48_000.0 / 44_100.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_packets_match_whole_buffer() {
        let input = sine(3000, 2, 24_000);

        let mut whole = Resampler::new(24_000, 48_000, 2).unwrap();
        let mut expected = whole.process(&input);
        expected.extend(whole.flush());

        // Uneven packet sizes, each a whole number of frames
        let mut split = Resampler::new(24_000, 48_000, 2).unwrap();
        let mut actual = Vec::new();
        for packet in [&input[..1152], &input[1152..1154], &input[1154..]] {
            actual.extend(split.process(packet));
        }
        actual.extend(split.flush());

        assert!(!expected.is_empty());
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_small_packets_are_buffered_until_a_chunk_is_full() {
        let mut resampler = Resampler::new(44_100, 48_000, 1).unwrap();

        assert!(resampler.process(&sine(CHUNK_FRAMES - 1, 1, 44_100)).is_empty());
        assert!(!resampler.process(&sine(1, 1, 44_100)).is_empty());
    }

    #[test]
    fn test_flush_emits_the_tail() {
        let mut resampler = Resampler::new(44_100, 48_000, 2).unwrap();
        assert!(resampler.process(&sine(100, 2, 44_100)).is_empty());

        let tail = resampler.flush();
        assert_eq!(tail.len() % 2, 0);
        assert!(!tail.is_empty());
        assert!(tail.len() / 2 <= (100.0 * resampler.ratio()).ceil() as usize);
        // Nothing left after a flush
        assert!(resampler.flush().is_empty());
    }
}
