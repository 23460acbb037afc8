//! Audio output using cpal.
//!
//! ```text
//!  open(path) ──► decoder thread ──chunks──► output callback ──► device
//!                (per song, tagged          (reads shared state,
//!                 with a generation)         drops stale chunks)
//! ```
//!
//! The cpal stream lives on its own thread for the lifetime of the engine.
//! Each opened song gets a decoder thread and a generation number. The
//! callback only plays chunks of the current generation, so switching songs
//! never mixes audio from the previous one.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use parking_lot::RwLock;

use super::backend::{MediaBackend, MediaHandle};
use super::decoder::AudioDecoder;
use super::resampler::Resampler;
use crate::error::{Error, Result};

/// Chunks buffered between decoder and callback.
const CHUNK_BUFFER: usize = 8;
/// How long a blocked decoder waits before re-checking cancellation.
const SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// Sample rate and channel count of the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// State shared between the engine, its tracks and the output callback.
#[derive(Debug, Default)]
struct OutputState {
    generation: u64,
    playing: bool,
    finished: bool,
    position: Duration,
}

struct AudioChunk {
    generation: u64,
    samples: Vec<f32>,
    timestamp: Duration,
    /// Marks the end of the song
    end: bool,
}

impl AudioChunk {
    fn end(generation: u64) -> Self {
        Self {
            generation,
            samples: Vec::new(),
            timestamp: Duration::ZERO,
            end: true,
        }
    }
}

/// Symphonia + cpal playback backend.
pub struct AudioEngine {
    state: Arc<RwLock<OutputState>>,
    chunk_tx: Sender<AudioChunk>,
    format: OutputFormat,
    /// Dropping this ends the output thread
    _shutdown: Sender<()>,
}

impl AudioEngine {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let state = Arc::new(RwLock::new(OutputState::default()));
        let (chunk_tx, chunk_rx) = bounded::<AudioChunk>(CHUNK_BUFFER);
        let (ready_tx, ready_rx) = bounded::<Result<OutputFormat>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let callback_state = Arc::clone(&state);
        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match open_output(chunk_rx, callback_state) {
                Ok((stream, format)) => {
                    let _ = ready_tx.send(Ok(format));
                    // Park until the engine is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("Audio output closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| Error::playback(e.to_string()))?;

        let format = ready_rx
            .recv()
            .map_err(|_| Error::playback("audio output thread exited"))??;

        Ok(Self {
            state,
            chunk_tx,
            format,
            _shutdown: shutdown_tx,
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl MediaBackend for AudioEngine {
    fn open(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>> {
        let decoder = AudioDecoder::open(path)?;

        let generation = {
            let mut s = self.state.write();
            s.generation += 1;
            s.playing = false;
            s.finished = false;
            s.position = Duration::ZERO;
            s.generation
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let chunks = self.chunk_tx.clone();
        let format = self.format;
        // Detached: a cancelled decoder exits on its own within SEND_TIMEOUT
        thread::Builder::new()
            .name("audio-decoder".to_string())
            .spawn(move || decode_loop(decoder, generation, format, chunks, thread_cancel))
            .map_err(|e| Error::playback(e.to_string()))?;

        tracing::debug!(path = %path.display(), generation, "Opened song");

        Ok(Box::new(EngineTrack {
            generation,
            state: Arc::clone(&self.state),
            cancel,
        }))
    }
}

/// A song opened on the [`AudioEngine`].
struct EngineTrack {
    generation: u64,
    state: Arc<RwLock<OutputState>>,
    cancel: Arc<AtomicBool>,
}

impl EngineTrack {
    fn set_playing(&self, playing: bool) {
        let mut s = self.state.write();
        if s.generation == self.generation {
            s.playing = playing;
        }
    }
}

impl MediaHandle for EngineTrack {
    fn start(&mut self) {
        self.set_playing(true);
    }

    fn pause(&mut self) {
        self.set_playing(false);
    }

    fn stop(&mut self) {
        self.set_playing(false);
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        let s = self.state.read();
        s.generation == self.generation && s.finished
    }

    fn position(&self) -> Duration {
        let s = self.state.read();
        if s.generation == self.generation {
            s.position
        } else {
            Duration::ZERO
        }
    }
}

impl Drop for EngineTrack {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn open_output(
    chunk_rx: Receiver<AudioChunk>,
    state: Arc<RwLock<OutputState>>,
) -> Result<(Stream, OutputFormat)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::playback("no output device found"))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let supported = device
        .default_output_config()
        .map_err(|e| Error::playback(e.to_string()))?;

    let format = OutputFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    tracing::info!(
        device = %device_name,
        sample_rate = format.sample_rate,
        channels = format.channels,
        "Audio output ready"
    );

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, chunk_rx, state),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, chunk_rx, state),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, chunk_rx, state),
        other => {
            return Err(Error::playback(format!(
                "unsupported sample format: {:?}",
                other
            )));
        }
    }
    .map_err(|e| Error::playback(e.to_string()))?;

    stream.play().map_err(|e| Error::playback(e.to_string()))?;
    Ok((stream, format))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    chunk_rx: Receiver<AudioChunk>,
    state: Arc<RwLock<OutputState>>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut pending: Option<(AudioChunk, usize)> = None;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let (generation, playing) = {
                let s = state.read();
                (s.generation, s.playing)
            };

            let mut written = 0;
            if playing {
                while written < data.len() {
                    if pending
                        .as_ref()
                        .is_some_and(|(chunk, _)| chunk.generation != generation)
                    {
                        pending = None;
                    }

                    if pending.is_none() {
                        let Ok(chunk) = chunk_rx.try_recv() else {
                            // Underrun
                            break;
                        };
                        if chunk.generation != generation {
                            continue;
                        }
                        if chunk.end {
                            state.write().finished = true;
                            break;
                        }
                        state.write().position = chunk.timestamp;
                        pending = Some((chunk, 0));
                    }

                    let drained = match pending.as_mut() {
                        Some((chunk, offset)) => {
                            let count = (chunk.samples.len() - *offset).min(data.len() - written);
                            for i in 0..count {
                                data[written + i] = T::from_sample(chunk.samples[*offset + i]);
                            }
                            *offset += count;
                            written += count;
                            *offset >= chunk.samples.len()
                        }
                        None => false,
                    };
                    if drained {
                        pending = None;
                    }
                }
            }

            for sample in &mut data[written..] {
                *sample = T::from_sample(0.0f32);
            }
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}

fn decode_loop(
    mut decoder: AudioDecoder,
    generation: u64,
    format: OutputFormat,
    chunks: Sender<AudioChunk>,
    cancel: Arc<AtomicBool>,
) {
    let in_channels = decoder.channels() as usize;
    let out_channels = format.channels as usize;

    let resampler = Resampler::new(decoder.sample_rate(), format.sample_rate, in_channels);
    let mut resampler = match resampler {
        Ok(resampler) => resampler,
        Err(e) => {
            tracing::warn!(generation, error = %e, "Cannot convert song to output format");
            send_until_cancelled(&chunks, AudioChunk::end(generation), &cancel);
            return;
        }
    };

    let mut timestamp = Duration::ZERO;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        let (samples, end) = match decoder.decode_next() {
            Ok(Some(packet)) => {
                timestamp = packet.timestamp;
                (resampler.process(&packet.samples), false)
            }
            Ok(None) => (resampler.flush(), true),
            Err(e) => {
                tracing::warn!(generation, error = %e, "Decode error, ending song");
                (resampler.flush(), true)
            }
        };

        if !samples.is_empty() {
            let chunk = AudioChunk {
                generation,
                samples: remix(&samples, in_channels, out_channels),
                timestamp,
                end: false,
            };
            if !send_until_cancelled(&chunks, chunk, &cancel) {
                return;
            }
        }

        if end {
            send_until_cancelled(&chunks, AudioChunk::end(generation), &cancel);
            return;
        }
    }
}

/// Blocking send that gives up once the song is cancelled.
fn send_until_cancelled(chunks: &Sender<AudioChunk>, chunk: AudioChunk, cancel: &AtomicBool) -> bool {
    let mut chunk = chunk;
    loop {
        match chunks.send_timeout(chunk, SEND_TIMEOUT) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if cancel.load(Ordering::Relaxed) {
                    return false;
                }
                chunk = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Map interleaved frames to the output channel count.
///
/// Channels are mapped round-robin: mono is duplicated, extra input channels
/// are dropped.
fn remix(samples: &[f32], in_channels: usize, out_channels: usize) -> Vec<f32> {
    if in_channels == out_channels {
        return samples.to_vec();
    }
    if in_channels == 0 || out_channels == 0 {
        return Vec::new();
    }
    samples
        .chunks_exact(in_channels)
        .flat_map(|frame| (0..out_channels).map(move |c| frame[c % in_channels]))
        .collect()
}
