//! Whole-track resampling using rubato.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use segue_core::{Error, Frame, Result};
use tracing::debug;

/// Input frames fed to the resampler per call.
const CHUNK_SIZE: usize = 4096;

/// Offline stereo resampler with a high quality sinc filter.
pub struct Resampler {
    #[allow(clippy::struct_field_names)]
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl Resampler {
    /// Create a new resampler.
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::InvalidArgument(format!(
                "Cannot resample {input_rate}Hz -> {output_rate}Hz"
            )));
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::new(
            f64::from(output_rate) / f64::from(input_rate),
            1.0,
            params,
            CHUNK_SIZE,
            2,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {e}")))?;

        debug!("Resampler created: {}Hz -> {}Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
        })
    }

    /// Check if resampling is needed.
    pub const fn needs_resampling(&self) -> bool {
        self.input_rate != self.output_rate
    }

    /// Get the input sample rate.
    pub const fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get the output sample rate.
    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Number of output frames a track of `frames` input frames maps to.
    pub fn output_len(&self, frames: usize) -> usize {
        (frames as f64 * f64::from(self.output_rate) / f64::from(self.input_rate)).round()
            as usize
    }

    /// Resample a complete track.
    ///
    /// The filter delay is trimmed, so the result lines up with the input
    /// and has exactly `output_len(input.len())` frames.
    pub fn process(&mut self, input: &[Frame]) -> Result<Vec<Frame>> {
        if !self.needs_resampling() {
            return Ok(input.to_vec());
        }

        let expected = self.output_len(input.len());
        let delay = self.resampler.output_delay();
        let mut left: Vec<f32> = Vec::with_capacity(expected + delay);
        let mut right: Vec<f32> = Vec::with_capacity(expected + delay);

        let mut chunks = input.chunks_exact(CHUNK_SIZE);
        for chunk in &mut chunks {
            let planar = deinterleave(chunk);
            let out = self
                .resampler
                .process(&planar[..], None)
                .map_err(|e| Error::Resample(format!("Resample failed: {e}")))?;
            left.extend_from_slice(&out[0]);
            right.extend_from_slice(&out[1]);
        }

        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let planar = deinterleave(remainder);
            let out = self
                .resampler
                .process_partial(Some(&planar[..]), None)
                .map_err(|e| Error::Resample(format!("Resample failed: {e}")))?;
            left.extend_from_slice(&out[0]);
            right.extend_from_slice(&out[1]);
        }

        // Flush the filter until the delayed tail is out
        while left.len() < expected + delay {
            let out = self
                .resampler
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| Error::Resample(format!("Resample failed: {e}")))?;
            if out[0].is_empty() {
                break;
            }
            left.extend_from_slice(&out[0]);
            right.extend_from_slice(&out[1]);
        }

        let output: Vec<Frame> = left
            .into_iter()
            .zip(right)
            .skip(delay)
            .take(expected)
            .map(|(l, r)| [l, r])
            .collect();

        debug!(
            "Resampled {} frames to {} ({}Hz -> {}Hz)",
            input.len(),
            output.len(),
            self.input_rate,
            self.output_rate
        );

        Ok(output)
    }
}

/// Resample a track from `from` Hz to `to` Hz, passing it through when equal.
pub fn resample(frames: Vec<Frame>, from: u32, to: u32) -> Result<Vec<Frame>> {
    if from == to {
        return Ok(frames);
    }
    Resampler::new(from, to)?.process(&frames)
}

fn deinterleave(frames: &[Frame]) -> [Vec<f32>; 2] {
    let mut left = Vec::with_capacity(frames.len());
    let mut right = Vec::with_capacity(frames.len());
    for [l, r] in frames {
        left.push(*l);
        right.push(*r);
    }
    [left, right]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_resampling() {
        let input = vec![[0.5f32, -0.5]; 2048];
        let output = resample(input.clone(), 44100, 44100).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_resampler_creation() {
        let resampler = Resampler::new(48000, 44100).unwrap();
        assert!(resampler.needs_resampling());
        assert_eq!(resampler.input_rate(), 48000);
        assert_eq!(resampler.output_rate(), 44100);
        assert_eq!(resampler.output_len(48000), 44100);
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(Resampler::new(0, 44100).is_err());
    }

    #[test]
    fn test_upsample_length_and_level() {
        // One second of a constant signal at 22050Hz
        let input = vec![[0.25f32, -0.25]; 22050];
        let output = resample(input, 22050, 44100).unwrap();
        assert_eq!(output.len(), 44100);

        // Away from the edges a DC signal keeps its level
        let [l, r] = output[22050];
        assert!((l - 0.25).abs() < 0.01, "left was {l}");
        assert!((r + 0.25).abs() < 0.01, "right was {r}");
    }

    #[test]
    fn test_downsample_short_input() {
        let input = vec![[0.1f32, 0.1]; 100];
        let output = resample(input, 48000, 44100).unwrap();
        assert_eq!(output.len(), 92);
    }
}
