//! Base64 and 16-bit PCM framing
//!
//! The live endpoint and the speech API both speak raw little-endian
//! signed 16-bit PCM wrapped in standard base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{Error, Result};

/// Sample rate of microphone frames sent to the live endpoint
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio returned by the live endpoint and speech API
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per capture callback block
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// Scale between the i16 and normalized f32 domains
const PCM_SCALE: f32 = 32768.0;

/// Decode standard padded base64
///
/// # Errors
///
/// Returns `Error::Decode` on malformed input
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(text)?)
}

/// Encode bytes as standard padded base64
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decoded, playable audio
///
/// Samples are normalized to `[-1.0, 1.0)` and stored per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a mono buffer from normalized samples
    #[must_use]
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Number of channels
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Samples per channel
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Sample rate metadata
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Downmix to a single channel by averaging
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.as_slice() {
            [] => Vec::new(),
            [only] => only.clone(),
            all => (0..self.frame_count())
                .map(|i| all.iter().map(|c| c[i]).sum::<f32>() / all.len() as f32)
                .collect(),
        }
    }
}

/// Interpret little-endian i16 samples, interleaved by channel
///
/// No resampling happens: `sample_rate` is attached as metadata. A trailing
/// odd byte or partial frame is ignored.
///
/// # Errors
///
/// Returns `Error::Decode` if `channels` is zero
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channels: usize) -> Result<AudioBuffer> {
    if channels == 0 {
        return Err(Error::Decode("channel count must be positive".to_string()));
    }

    if bytes.len() % 2 != 0 {
        tracing::debug!(len = bytes.len(), "ignoring trailing odd PCM byte");
    }

    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let frame_count = samples.len() / channels;
    if samples.len() % channels != 0 {
        tracing::debug!(
            samples = samples.len(),
            channels,
            "ignoring trailing partial PCM frame"
        );
    }

    let out = (0..channels)
        .map(|channel| {
            (0..frame_count)
                .map(|i| f32::from(samples[i * channels + channel]) / PCM_SCALE)
                .collect()
        })
        .collect();

    Ok(AudioBuffer {
        channels: out,
        sample_rate,
    })
}

/// Convert one normalized sample to i16, clamping out-of-range input
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample * PCM_SCALE).clamp(-PCM_SCALE, PCM_SCALE - 1.0) as i16
}

/// Encode normalized samples as little-endian i16 bytes
#[must_use]
pub fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| sample_to_i16(s).to_le_bytes())
        .collect()
}

/// A captured frame ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Base64 PCM payload
    pub data: String,
    /// MIME descriptor, e.g. `audio/pcm;rate=16000`
    pub mime_type: String,
}

impl EncodedFrame {
    /// Encode normalized samples captured at `sample_rate`
    #[must_use]
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: encode_base64(&encode_pcm(samples)),
            mime_type: pcm_mime_type(sample_rate),
        }
    }
}

/// MIME descriptor for raw PCM at a sample rate
#[must_use]
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_base64(&encode_base64(&bytes)).unwrap(), bytes);
        assert_eq!(encode_base64(&[]), "");
    }

    #[test]
    fn malformed_base64_is_decode_error() {
        assert!(matches!(decode_base64("not*base64!"), Err(Error::Decode(_))));
    }

    #[test]
    fn pcm_maps_extremes() {
        let bytes = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x00];
        let buffer = decode_pcm(&bytes, OUTPUT_SAMPLE_RATE, 1).unwrap();
        let ch = buffer.channel(0).unwrap();
        assert!((ch[0] + 1.0).abs() < f32::EPSILON);
        assert!((ch[1] - 32767.0 / 32768.0).abs() < f32::EPSILON);
        assert!(ch[2].abs() < f32::EPSILON);
    }

    #[test]
    fn pcm_deinterleaves_stereo() {
        // L=1, R=-1, L=2, R=-2
        let samples: [i16; 4] = [1, -1, 2, -2];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let buffer = decode_pcm(&bytes, 48_000, 2).unwrap();

        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[1.0 / 32768.0, 2.0 / 32768.0]);
        assert_eq!(buffer.channel(1).unwrap(), &[-1.0 / 32768.0, -2.0 / 32768.0]);
        assert_eq!(buffer.sample_rate(), 48_000);
    }

    #[test]
    fn pcm_ignores_odd_trailing_byte() {
        let buffer = decode_pcm(&[0x01, 0x00, 0x05], OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn zero_channels_rejected() {
        assert!(decode_pcm(&[0, 0], OUTPUT_SAMPLE_RATE, 0).is_err());
    }

    #[test]
    fn duration_follows_sample_rate() {
        let buffer = AudioBuffer::mono(vec![0.0; 12_000], OUTPUT_SAMPLE_RATE);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        assert_eq!(sample_to_i16(1.5), i16::MAX);
        assert_eq!(sample_to_i16(-1.5), i16::MIN);
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(-1.0), i16::MIN);
        assert_eq!(sample_to_i16(0.0), 0);
    }

    #[test]
    fn frame_carries_mime_type() {
        let frame = EncodedFrame::from_samples(&[0.0, 0.5], INPUT_SAMPLE_RATE);
        assert_eq!(frame.mime_type, "audio/pcm;rate=16000");
        assert_eq!(decode_base64(&frame.data).unwrap(), vec![0, 0, 0, 0x40]);
    }

    #[test]
    fn stereo_downmix_averages() {
        let samples: [i16; 2] = [16384, 0];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let buffer = decode_pcm(&bytes, OUTPUT_SAMPLE_RATE, 2).unwrap();
        assert_eq!(buffer.to_mono(), vec![0.25]);
    }
}
