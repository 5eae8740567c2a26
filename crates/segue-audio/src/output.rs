//! Audio output using cpal.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig,
};
use segue_core::{Error, PlayerConfig, Result, CHANNELS};
use tracing::{debug, error, info, warn};

use crate::player::Renderer;

/// Audio output stream configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,
}

impl OutputConfig {
    pub fn from_player(config: &PlayerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: CHANNELS,
            buffer_size: config.block_size,
        }
    }

    fn stream_config(&self, fixed: bool) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: if fixed {
                BufferSize::Fixed(self.buffer_size)
            } else {
                BufferSize::Default
            },
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_player(&PlayerConfig::default())
    }
}

/// A running output stream pulling from a [`Renderer`].
///
/// Not `Send`: it has to stay on the thread that created it.
pub struct AudioOutput {
    stream: Stream,
    config: OutputConfig,
    device_name: String,
}

impl AudioOutput {
    /// Open the default device at the player's rate and block size.
    pub fn new(renderer: Renderer, config: &PlayerConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        Self::with_device(&device, renderer, OutputConfig::from_player(config))
    }

    /// Open a specific device.
    pub fn with_device(device: &Device, renderer: Renderer, config: OutputConfig) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let sample_format = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?
            .sample_format();

        debug!(
            "Output config: {}Hz, {} channels, {} frames, {:?}",
            config.sample_rate, config.channels, config.buffer_size, sample_format
        );

        let stream = match Self::build_any(device, &config, sample_format, &renderer, true) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Fixed buffer size rejected ({e}), using device default");
                Self::build_any(device, &config, sample_format, &renderer, false)?
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

        Ok(Self {
            stream,
            config,
            device_name,
        })
    }

    fn build_any(
        device: &Device,
        config: &OutputConfig,
        format: SampleFormat,
        renderer: &Renderer,
        fixed: bool,
    ) -> Result<Stream> {
        let stream_config = config.stream_config(fixed);
        let capacity = config.buffer_size as usize * usize::from(config.channels);
        match format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(device, &stream_config, renderer.clone(), capacity)
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(device, &stream_config, renderer.clone(), capacity)
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(device, &stream_config, renderer.clone(), capacity)
            }
            _ => Err(Error::AudioOutput(format!(
                "Unsupported sample format: {format:?}"
            ))),
        }
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &Device,
        config: &StreamConfig,
        renderer: Renderer,
        capacity: usize,
    ) -> Result<Stream> {
        let err_fn = |err| {
            error!("Audio stream error: {err}");
        };

        let mut scratch = vec![0.0f32; capacity];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Only grows if the host hands us a bigger block than asked for
                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    let block = &mut scratch[..data.len()];
                    renderer.render(block);
                    for (sample, &value) in data.iter_mut().zip(block.iter()) {
                        *sample = T::from_sample(value);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
    }

    /// Pause the stream before it is dropped.
    pub fn close(self) {
        if let Err(e) = self.stream.pause() {
            debug!("Failed to pause stream on close: {e}");
        }
    }

    pub const fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.config.channels
    }
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}
