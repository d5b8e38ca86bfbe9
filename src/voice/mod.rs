//! Voice processing module
//!
//! PCM framing, microphone capture, scheduled speaker playback.

mod capture;
mod codec;
mod playback;
mod scheduler;

pub use capture::{AudioCapture, AudioFrame, CapturePipeline, FrameAssembler, samples_to_wav};
pub use codec::{
    AudioBuffer, CAPTURE_BLOCK_SIZE, EncodedFrame, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE,
    decode_base64, decode_pcm, encode_base64, encode_pcm, pcm_mime_type, sample_to_i16,
};
pub use playback::{AudioPlayback, OutputHandle};
pub use scheduler::{AudioSink, PlaybackHandle, PlaybackScheduler};
