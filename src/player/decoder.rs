//! Audio decoder using symphonia for multi-format support.
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use crate::error::{Error, Result};

/// Interleaved f32 samples from one packet.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    pub samples: Vec<f32>,
    /// Start of the packet within the song
    pub timestamp: Duration,
}

/// Audio decoder wrapper for symphonia.
pub struct AudioDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    time_base: Option<TimeBase>,
}

impl AudioDecoder {
    /// Open a file for decoding.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| Error::not_found(path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(&ext.to_string_lossy());
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| Error::playback(format!("unsupported format: {}", e)))?;
        let reader = probed.format;

        // First decodable audio track
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::playback("no audio track found"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::playback("unknown sample rate"))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::playback(e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            time_base: codec_params.time_base,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Decode the next packet of the selected track.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn decode_next(&mut self) -> Result<Option<DecodedPacket>> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::playback(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let timestamp = self
                .time_base
                .map(|tb| {
                    let time = tb.calc_time(packet.ts());
                    Duration::from_secs_f64(time.seconds as f64 + time.frac)
                })
                .unwrap_or_default();

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // Corrupt frame, skip it
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(Error::playback(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            return Ok(Some(DecodedPacket {
                samples: buffer.samples().to_vec(),
                timestamp,
            }));
        }
    }
}
