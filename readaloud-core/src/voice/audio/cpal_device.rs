//! Audio output using cpal
//! Resamples from the synthesis rate to the native device rate if needed

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig,
};
use rubato::{FftFixedIn, Resampler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::device::{AudioContext, AudioDevice, AudioPlayer};
use super::AudioFormatSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The host's default output device, looked up again on every open so a
/// device change between playbacks is picked up
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalDevice;

impl CpalDevice {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDevice for CpalDevice {
    fn open(
        &self,
        format: AudioFormatSpec,
        buffer_size_hint: usize,
    ) -> Result<Box<dyn AudioContext>> {
        if format.bytes_per_sample != 2 || format.channel_count != 1 {
            anyhow::bail!("unsupported source format: {format:?}");
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no output device available")?;

        let supported_config = device
            .default_output_config()
            .context("failed to get default output config")?;

        tracing::debug!(
            device_name = ?device.name(),
            native_sample_rate = supported_config.sample_rate().0,
            native_channels = supported_config.channels(),
            native_format = ?supported_config.sample_format(),
            buffer_size_hint,
            "audio output opened"
        );

        Ok(Box::new(CpalContext {
            device,
            supported_config,
            format,
        }))
    }
}

struct CpalContext {
    device: Device,
    supported_config: SupportedStreamConfig,
    format: AudioFormatSpec,
}

impl AudioContext for CpalContext {
    fn new_player(&mut self) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(CpalPlayer {
            device: self.device.clone(),
            supported_config: self.supported_config.clone(),
            format: self.format,
            stream: None,
        }))
    }

    fn close(&mut self) -> Result<()> {
        tracing::debug!("audio output closed");
        Ok(())
    }
}

/// Plays one buffer per write. The stream stays alive until close (RAII)
struct CpalPlayer {
    device: Device,
    supported_config: SupportedStreamConfig,
    format: AudioFormatSpec,
    stream: Option<Stream>,
}

impl AudioPlayer for CpalPlayer {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let native_rate = self.supported_config.sample_rate().0;
        let native_channels = self.supported_config.channels() as usize;
        let sample_format = self.supported_config.sample_format();
        let config: StreamConfig = self.supported_config.clone().into();

        let input_samples = i16_bytes_to_f32(data);
        let consumed = input_samples.len() * self.format.bytes_per_sample as usize;
        if input_samples.is_empty() {
            return Ok(consumed);
        }

        let resampled = if self.format.sample_rate_hz == native_rate {
            input_samples
        } else {
            resample(&input_samples, self.format.sample_rate_hz, native_rate)?
        };

        let samples = if native_channels > 1 {
            expand_to_channels(&resampled, native_channels)
        } else {
            resampled
        };

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(
                &config,
                samples,
                position,
                finished.clone(),
                failed.clone(),
            )?,
            SampleFormat::I16 => self.build_stream::<i16>(
                &config,
                samples,
                position,
                finished.clone(),
                failed.clone(),
            )?,
            format => anyhow::bail!("unsupported sample format: {:?}", format),
        };

        stream.play().context("failed to start playback stream")?;
        self.stream = Some(stream);

        while !finished.load(Ordering::SeqCst) {
            if failed.load(Ordering::SeqCst) {
                anyhow::bail!("playback stream failed");
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        Ok(consumed)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.pause().context("failed to stop playback stream")?;
        }
        Ok(())
    }
}

impl CpalPlayer {
    fn build_stream<T>(
        &self,
        config: &StreamConfig,
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
        failed: Arc<AtomicBool>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32> + Default + Send + 'static,
    {
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let pos = position.load(Ordering::SeqCst);
                    let remaining = samples.len().saturating_sub(pos);

                    if remaining == 0 {
                        data.fill(T::default());
                        finished.store(true, Ordering::SeqCst);
                        return;
                    }

                    let to_copy = remaining.min(data.len());
                    for (i, &sample) in samples[pos..pos + to_copy].iter().enumerate() {
                        data[i] = T::from_sample(sample);
                    }

                    if to_copy < data.len() {
                        data[to_copy..].fill(T::default());
                    }

                    position.store(pos + to_copy, Ordering::SeqCst);
                },
                move |err| {
                    tracing::error!(error = ?err, "playback stream error");
                    failed.store(true, Ordering::SeqCst);
                },
                None,
            )
            .context("failed to build output stream")
    }
}

fn i16_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / 32768.0
        })
        .collect()
}

/// Resample mono audio. The result holds exactly
/// `ceil(len * target / source)` frames: the resampler's startup delay is
/// dropped from the front and the zero padding of the last chunk from the
/// back, so no extra silence is played.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;
    let mut resampler =
        FftFixedIn::<f32>::new(source_rate as usize, target_rate as usize, chunk_size, 2, 1)
            .context("failed to create resampler")?;

    let expected = (samples.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(delay + expected + chunk_size);
    let mut pos = 0;

    // Keep feeding (zeros once the input runs out) until the delayed tail
    // has been flushed
    while output.len() < delay + expected {
        let frames_needed = resampler.input_frames_next();
        let end = (pos + frames_needed).min(samples.len());

        let mut input_chunk = samples[pos..end].to_vec();
        input_chunk.resize(frames_needed, 0.0);

        let input = vec![input_chunk];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| anyhow::anyhow!("resampling failed: {e:?}"))?;
        if let Some(chunk) = resampled.into_iter().next() {
            output.extend(chunk);
        }

        pos = end;
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

fn expand_to_channels(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .iter()
        .flat_map(|&sample| std::iter::repeat(sample).take(channels))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_bytes_to_f32() {
        let bytes = [0x00, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x01];
        let samples = i16_bytes_to_f32(&bytes);

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < f32::EPSILON);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn test_expand_to_channels() {
        assert_eq!(
            expand_to_channels(&[0.5, -0.5], 2),
            vec![0.5, 0.5, -0.5, -0.5]
        );
    }

    #[test]
    fn test_resample_upsamples() {
        let samples = vec![0.0f32; 16_000];
        let output = resample(&samples, 16_000, 48_000).unwrap();

        assert_eq!(output.len(), 48_000);
    }

    #[test]
    fn test_resample_trims_padding_of_partial_chunk() {
        // 1000 frames do not fill a single 1024-frame chunk
        let samples = vec![0.25f32; 1_000];
        let output = resample(&samples, 16_000, 44_100).unwrap();

        assert_eq!(output.len(), 2_757);
    }

    #[test]
    fn test_resample_empty_input() {
        let output = resample(&[], 16_000, 48_000).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_rejects_stereo_source() {
        let format = AudioFormatSpec {
            channel_count: 2,
            ..AudioFormatSpec::PCM_16K_MONO
        };
        let err = CpalDevice::new().open(format, 0).err().unwrap();
        assert!(err.to_string().contains("unsupported source format"));
    }
}
