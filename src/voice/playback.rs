//! Audio playback to speakers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::voice::{AudioBuffer, AudioSink, OUTPUT_SAMPLE_RATE, PlaybackHandle};
use crate::{Error, Result};

/// A buffer committed to the output at an absolute frame position
struct Voice {
    handle: PlaybackHandle,
    start_frame: u64,
    samples: Vec<f32>,
}

/// State shared between the output callback and schedulers
///
/// `frames_played` is the audio clock: it only advances inside the
/// output callback.
struct Mixer {
    sample_rate: u32,
    frames_played: AtomicU64,
    next_handle: AtomicU64,
    voices: Mutex<Vec<Voice>>,
}

impl Mixer {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames_played: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            voices: Mutex::new(Vec::new()),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn now(&self) -> f64 {
        self.frames_played.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn schedule(&self, buffer: &AudioBuffer, start: f64) -> PlaybackHandle {
        let handle = PlaybackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        if buffer.sample_rate() != self.sample_rate {
            tracing::warn!(
                buffer_rate = buffer.sample_rate(),
                output_rate = self.sample_rate,
                "sample rate mismatch, playing without resampling"
            );
        }

        let requested = (start.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let mut voices = self.voices.lock().unwrap_or_else(PoisonError::into_inner);
        // Starts already rendered past begin at the clock
        let start_frame = requested.max(self.frames_played.load(Ordering::Acquire));
        voices.push(Voice {
            handle,
            start_frame,
            samples: buffer.to_mono(),
        });
        handle
    }

    fn clear(&self) -> usize {
        let mut voices = self.voices.lock().unwrap_or_else(PoisonError::into_inner);
        let cancelled = voices.len();
        voices.clear();
        cancelled
    }

    fn pending(&self) -> usize {
        self.voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Fill one interleaved output block and advance the clock
    #[allow(clippy::cast_possible_truncation)]
    fn render(&self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = (data.len() / channels) as u64;

        data.fill(0.0);
        {
            let mut voices = self.voices.lock().unwrap_or_else(PoisonError::into_inner);
            let base = self.frames_played.load(Ordering::Acquire);
            for voice in voices.iter() {
                let end = voice.start_frame + voice.samples.len() as u64;
                if end <= base || voice.start_frame >= base + frames {
                    continue;
                }
                let from = voice.start_frame.max(base);
                let to = end.min(base + frames);
                for frame in from..to {
                    let sample = voice.samples[(frame - voice.start_frame) as usize];
                    let offset = (frame - base) as usize * channels;
                    for out in &mut data[offset..offset + channels] {
                        *out += sample;
                    }
                }
            }
            voices.retain(|v| v.start_frame + v.samples.len() as u64 > base + frames);
            self.frames_played.fetch_add(frames, Ordering::Release);
        }

        for out in data.iter_mut() {
            *out = out.clamp(-1.0, 1.0);
        }
    }
}

/// Cloneable handle onto a running output stream
///
/// Implements [`AudioSink`], so it can be driven by a
/// [`PlaybackScheduler`](crate::voice::PlaybackScheduler).
#[derive(Clone)]
pub struct OutputHandle {
    mixer: Arc<Mixer>,
}

impl OutputHandle {
    /// Number of buffers committed but not finished
    #[must_use]
    pub fn pending(&self) -> usize {
        self.mixer.pending()
    }
}

impl AudioSink for OutputHandle {
    fn now(&self) -> f64 {
        self.mixer.now()
    }

    fn play_at(&self, buffer: AudioBuffer, start: f64) -> PlaybackHandle {
        self.mixer.schedule(&buffer, start)
    }

    fn stop_all(&self) {
        let cancelled = self.mixer.clear();
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled scheduled playback");
        }
    }
}

/// Plays audio to the default output device
///
/// The stream runs continuously from construction until drop; silence is
/// rendered when nothing is scheduled.
pub struct AudioPlayback {
    stream: Stream,
    handle: OutputHandle,
}

impl AudioPlayback {
    /// Open the default output device at the speech output rate
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        Self::with_sample_rate(OUTPUT_SAMPLE_RATE)
    }

    /// Open the default output device at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn with_sample_rate(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();
        let channels = usize::from(config.channels);

        let mixer = Arc::new(Mixer::new(sample_rate));
        let render_mixer = Arc::clone(&mixer);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render_mixer.render(data, channels);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "audio playback initialized"
        );

        Ok(Self {
            stream,
            handle: OutputHandle { mixer },
        })
    }

    /// A sink handle for scheduling buffers on this output
    #[must_use]
    pub fn handle(&self) -> OutputHandle {
        self.handle.clone()
    }

    /// Play a buffer now and wait until it has finished
    ///
    /// # Errors
    ///
    /// Returns error if the output stream stalls
    pub async fn play(&self, buffer: AudioBuffer) -> Result<()> {
        if buffer.frame_count() == 0 {
            return Ok(());
        }

        let duration = buffer.duration();
        let start = self.handle.now();
        self.handle.play_at(buffer, start);
        self.wait_idle(Duration::from_secs_f64(duration) + Duration::from_millis(500))
            .await
    }

    /// Wait until every scheduled buffer has finished
    ///
    /// # Errors
    ///
    /// Returns error if playback does not drain within `timeout`
    pub async fn wait_idle(&self, timeout: Duration) -> Result<()> {
        let drained = tokio::time::timeout(timeout, async {
            while self.handle.pending() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        drained.map_err(|_| Error::Audio("playback did not finish in time".to_string()))
    }

    /// Pause the device stream
    ///
    /// # Errors
    ///
    /// Returns error if the device refuses
    pub fn pause(&self) -> Result<()> {
        self.stream.pause().map_err(|e| Error::Audio(e.to_string()))
    }
}
