//! Audio file decoding using symphonia.

use std::fs::File;
use std::path::Path;

use segue_core::{Error, Frame, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

/// Stream parameters known before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Total frames, if the container reports it.
    pub frames: Option<u64>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SourceInfo {
    /// Decoded footprint before resampling: 4 bytes per sample, 2 channels.
    pub fn estimated_bytes(&self) -> Option<u64> {
        self.frames.map(|frames| frames.saturating_mul(4 * 2))
    }
}

/// A fully decoded source at its native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub frames: Vec<Frame>,
    pub sample_rate: u32,
}

/// Turns a path into stereo frames.
///
/// The player only talks to this trait, so tests and embedders can supply
/// their own sources.
pub trait Decode: Send + Sync {
    /// Read the stream header without decoding any audio.
    fn probe(&self, path: &Path) -> Result<SourceInfo>;

    /// Decode the whole file, mixing mono up to stereo.
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// Decoder backed by symphonia's default codec and format registries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl Decode for SymphoniaDecoder {
    fn probe(&self, path: &Path) -> Result<SourceInfo> {
        Ok(AudioFile::open(path)?.info)
    }

    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let mut file = AudioFile::open(path)?;
        let channels = usize::from(file.info.channels);
        let mut interleaved = Vec::with_capacity(
            file.info
                .frames
                .map_or(0, |f| f as usize * channels.max(1)),
        );

        while let Some(samples) = file.decode_next()? {
            interleaved.extend_from_slice(&samples);
        }

        let frames = to_stereo(&interleaved, channels);
        debug!(
            "Decoded {} frames at {} Hz from {}",
            frames.len(),
            file.info.sample_rate,
            path.display()
        );

        Ok(DecodedAudio {
            frames,
            sample_rate: file.info.sample_rate,
        })
    }
}

/// An opened, probed audio file.
struct AudioFile {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: SourceInfo,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioFile {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| {
                debug!("Probe failed for {}: {e}", path.display());
                Error::NotAudioFile(path.to_path_buf())
            })?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::NotAudioFile(path.to_path_buf()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::AudioDecode("Unknown sample rate".to_string()))?;
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);
        let frames = track.codec_params.n_frames;

        debug!(
            "Audio track: id={}, sample_rate={}, channels={}, frames={:?}",
            track_id, sample_rate, channels, frames
        );

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            info: SourceInfo {
                frames,
                sample_rate,
                channels,
            },
            sample_buf: None,
        })
    }

    /// Decode the next packet and return interleaved f32 samples.
    fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None); // End of stream
                }
                Err(symphonia::core::errors::Error::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Failed to read packet: {e}")));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let needed = decoded.capacity() * spec.channels.count();
                    let buf = match self.sample_buf.take() {
                        Some(buf) if buf.capacity() >= needed => buf,
                        _ => SampleBuffer::new(decoded.capacity() as u64, spec),
                    };
                    let buf = self.sample_buf.insert(buf);
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(buf.samples().to_vec()));
                }
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    // Log and skip corrupt frames
                    warn!("Decode error (skipping): {e}");
                }
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Decode failed: {e}")));
                }
            }
        }
    }
}

/// Fold interleaved samples of any channel count into stereo frames.
///
/// Mono is duplicated onto both sides; anything wider keeps its first two
/// channels.
pub fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<Frame> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.iter().map(|&s| [s, s]).collect(),
        n => interleaved
            .chunks_exact(n)
            .map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
