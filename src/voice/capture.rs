//! Audio capture from microphone

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// A fixed-size block of mono samples from the microphone
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized channel-0 samples
    pub samples: Vec<f32>,
    /// Capture sample rate
    pub sample_rate: u32,
}

/// Cuts an interleaved input stream into fixed-size channel-0 frames
///
/// Remainders are carried across callbacks, so frames come out in capture
/// order regardless of how the device sizes its buffers.
#[derive(Debug)]
pub struct FrameAssembler {
    block_size: usize,
    channels: usize,
    sample_rate: u32,
    pending: Vec<f32>,
}

impl FrameAssembler {
    /// Create an assembler emitting `block_size` samples per frame
    #[must_use]
    pub fn new(block_size: usize, channels: usize, sample_rate: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            channels: channels.max(1),
            sample_rate,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Feed interleaved samples; returns every frame completed by them
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        for sample in interleaved.iter().step_by(self.channels) {
            self.pending.push(*sample);
            if self.pending.len() == self.block_size {
                frames.push(AudioFrame {
                    samples: std::mem::replace(
                        &mut self.pending,
                        Vec::with_capacity(self.block_size),
                    ),
                    sample_rate: self.sample_rate,
                });
            }
        }
        frames
    }

    /// Samples waiting for a full block
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Input frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

/// Channel-0 extraction, resampling and framing for one input stream
pub struct CapturePipeline {
    channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    assembler: FrameAssembler,
}

impl CapturePipeline {
    /// Create a pipeline turning `device_rate` input into `target_rate` frames
    ///
    /// # Errors
    ///
    /// Returns `Error::Microphone` if the resampler cannot be built
    pub fn new(
        device_rate: u32,
        channels: usize,
        target_rate: u32,
        block_size: usize,
    ) -> Result<Self> {
        let resampler = if device_rate == target_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                device_rate as usize,
                target_rate as usize,
                RESAMPLE_CHUNK,
                2,
                1,
            )
            .map_err(|e| Error::Microphone(format!("resampler init failed: {e}")))?;
            Some(resampler)
        };

        Ok(Self {
            channels: channels.max(1),
            resampler,
            pending: Vec::with_capacity(RESAMPLE_CHUNK),
            assembler: FrameAssembler::new(block_size, 1, target_rate),
        })
    }

    /// Feed interleaved device samples; returns every frame completed by them
    ///
    /// # Errors
    ///
    /// Returns `Error::Microphone` if resampling fails
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<AudioFrame>> {
        let mono = interleaved.iter().step_by(self.channels).copied();

        let Some(resampler) = self.resampler.as_mut() else {
            let mono: Vec<f32> = mono.collect();
            return Ok(self.assembler.push(&mono));
        };

        self.pending.extend(mono);
        let mut frames = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| Error::Microphone(format!("resample failed: {e}")))?;
            frames.extend(self.assembler.push(&resampled[0]));
        }
        Ok(frames)
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    device_rate: u32,
    sample_rate: u32,
    block_size: usize,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// Prefers a mono configuration at `sample_rate`. Devices that cannot run
    /// at that rate are opened at their own rate and resampled; only channel 0
    /// is read.
    ///
    /// # Errors
    ///
    /// Returns `Error::Microphone` if no usable input device exists
    pub fn new(sample_rate: u32, block_size: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Microphone("no input device available".to_string()))?;

        let configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Microphone(e.to_string()))?
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .collect();

        let supports = |c: &&cpal::SupportedStreamConfigRange, rate: u32| {
            c.min_sample_rate() <= SampleRate(rate) && c.max_sample_rate() >= SampleRate(rate)
        };

        let at_target = configs
            .iter()
            .filter(|c| supports(c, sample_rate))
            .min_by_key(|c| c.channels());

        let (supported_config, device_rate) = match at_target {
            Some(c) => (c.clone(), sample_rate),
            None => {
                let c = configs
                    .iter()
                    .min_by_key(|c| c.channels())
                    .ok_or_else(|| {
                        Error::Microphone("no suitable audio config found".to_string())
                    })?;
                let rate = if supports(&c, 48_000) {
                    48_000
                } else {
                    c.max_sample_rate().0
                };
                (c.clone(), rate)
            }
        };

        let config = supported_config
            .with_sample_rate(SampleRate(device_rate))
            .config();

        tracing::debug!(
            device = %device.name().unwrap_or_default(),
            device_rate,
            sample_rate,
            channels = config.channels,
            block_size,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            device_rate,
            sample_rate,
            block_size,
            stream: None,
        })
    }

    /// Start capturing, handing each completed frame to `on_frame`
    ///
    /// `on_frame` runs on the audio thread and must not block.
    ///
    /// # Errors
    ///
    /// Returns `Error::Microphone` if the stream cannot be started
    pub fn start<F>(&mut self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut pipeline = CapturePipeline::new(
            self.device_rate,
            usize::from(self.config.channels),
            self.sample_rate,
            self.block_size,
        )?;

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| match pipeline.push(data) {
                    Ok(frames) => frames.into_iter().for_each(&mut on_frame),
                    Err(e) => tracing::warn!(error = %e, "dropping captured audio"),
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Microphone(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::Microphone(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Sample rate of the emitted frames
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Rate the device is actually running at
    #[must_use]
    pub const fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert f32 samples to WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(crate::voice::sample_to_i16(sample))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_emits_full_blocks_in_order() {
        let mut assembler = FrameAssembler::new(4, 1, 16_000);

        assert!(assembler.push(&[0.1, 0.2, 0.3]).is_empty());
        let frames = assembler.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(frames[1].samples, vec![0.5, 0.6, 0.7, 0.8]);
        assert_eq!(assembler.buffered(), 1);
    }

    #[test]
    fn assembler_reads_channel_zero() {
        let mut assembler = FrameAssembler::new(2, 2, 16_000);
        let frames = assembler.push(&[0.1, -0.1, 0.2, -0.2]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![0.1, 0.2]);
        assert_eq!(frames[0].sample_rate, 16_000);
    }

    #[test]
    fn pipeline_at_target_rate_passes_through() {
        let mut pipeline = CapturePipeline::new(16_000, 2, 16_000, 2).unwrap();
        let frames = pipeline.push(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![0.1, 0.2]);
    }

    #[test]
    fn wav_header_and_length() {
        let wav = samples_to_wav(&[0.0; 100], 16_000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 200);
    }
}
