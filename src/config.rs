//! Configuration management for the classroom

pub mod file;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::gemini::RetryPolicy;
use crate::lesson::TeachingMode;
use crate::voice::CAPTURE_BLOCK_SIZE;
use crate::{Error, Result};

/// Default REST base URL for the generative-language API
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default live WebSocket endpoint
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Classroom configuration
#[derive(Debug)]
pub struct Config {
    /// Gemini API key
    pub api_key: Option<SecretString>,

    /// REST API base URL
    pub api_base_url: String,

    /// Live WebSocket URL
    pub live_url: String,

    /// Model selection
    pub models: ModelConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Retry policy for one-shot calls
    pub retry: RetryPolicy,

    /// Per-request timeout for one-shot calls
    pub request_timeout: Duration,

    /// Time allowed for a live session to open
    pub connect_timeout: Duration,

    /// Default teaching mode
    pub teaching_mode: TeachingMode,
}

/// Model identifiers
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Structured generation (scripts, summaries, exams)
    pub text: String,

    /// Speech synthesis
    pub tts: String,

    /// Live conversation
    pub live: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: "gemini-3-flash-preview".to_string(),
            tts: "gemini-2.5-flash-preview-tts".to_string(),
            live: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Prebuilt voice name
    pub voice_name: String,

    /// Samples per capture frame
    pub capture_block_size: usize,

    /// Cancel already-scheduled playback on interruption
    pub barge_in: bool,

    /// Outbound frame queue capacity for live sessions
    pub outbound_queue_capacity: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_name: "Kore".to_string(),
            capture_block_size: CAPTURE_BLOCK_SIZE,
            barge_in: true,
            outbound_queue_capacity: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            live_url: DEFAULT_LIVE_URL.to_string(),
            models: ModelConfig::default(),
            voice: VoiceConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            teaching_mode: TeachingMode::default(),
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    #[must_use]
    pub fn load() -> Self {
        Self::from_file(file::load_config_file())
    }

    /// Build configuration from a parsed file, applying env overrides
    #[must_use]
    pub fn from_file(fc: file::NourConfigFile) -> Self {
        let defaults = Self::default();
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let api_key = env("GEMINI_API_KEY")
            .or_else(|| env("API_KEY"))
            .or(fc.api_key)
            .map(SecretString::from);

        let teaching_mode = env("NOUR_TEACHING_MODE")
            .or(fc.teaching_mode)
            .and_then(|m| {
                m.parse::<TeachingMode>()
                    .inspect_err(|e| tracing::warn!(error = %e, "ignoring teaching mode"))
                    .ok()
            })
            .unwrap_or(defaults.teaching_mode);

        let models = ModelConfig {
            text: env("NOUR_TEXT_MODEL")
                .or(fc.models.text)
                .unwrap_or(defaults.models.text),
            tts: env("NOUR_TTS_MODEL")
                .or(fc.models.tts)
                .unwrap_or(defaults.models.tts),
            live: env("NOUR_LIVE_MODEL")
                .or(fc.models.live)
                .unwrap_or(defaults.models.live),
        };

        let voice = VoiceConfig {
            voice_name: env("NOUR_VOICE")
                .or(fc.voice.voice_name)
                .unwrap_or(defaults.voice.voice_name),
            capture_block_size: fc
                .voice
                .capture_block_size
                .filter(|n| *n > 0)
                .unwrap_or(defaults.voice.capture_block_size),
            barge_in: fc.voice.barge_in.unwrap_or(defaults.voice.barge_in),
            outbound_queue_capacity: fc
                .voice
                .outbound_queue_capacity
                .filter(|n| *n > 0)
                .unwrap_or(defaults.voice.outbound_queue_capacity),
        };

        let retry = RetryPolicy {
            max_retries: fc.network.max_retries.unwrap_or(defaults.retry.max_retries),
            base_delay: fc
                .network
                .base_delay_ms
                .map_or(defaults.retry.base_delay, Duration::from_millis),
        };

        Self {
            api_key,
            api_base_url: env("NOUR_API_BASE_URL")
                .or(fc.network.api_base_url)
                .unwrap_or(defaults.api_base_url),
            live_url: env("NOUR_LIVE_URL")
                .or(fc.network.live_url)
                .unwrap_or(defaults.live_url),
            models,
            voice,
            retry,
            request_timeout: fc
                .network
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            connect_timeout: fc
                .network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            teaching_mode,
        }
    }

    /// The API key, required by every network command
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no key is configured
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Gemini API key required (set GEMINI_API_KEY or api_key in config.toml)"
                        .to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.voice.voice_name, "Kore");
        assert_eq!(config.voice.capture_block_size, 4096);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(2000));
        assert_eq!(config.teaching_mode, TeachingMode::Arabic);
        assert!(config.voice.barge_in);
    }

    #[test]
    fn file_values_overlay_defaults() {
        let mut fc = file::NourConfigFile::default();
        fc.network.base_delay_ms = Some(10);
        fc.voice.capture_block_size = Some(0);
        fc.voice.barge_in = Some(false);

        let config = Config::from_file(fc);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.voice.capture_block_size, 4096);
        assert!(!config.voice.barge_in);
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = Config::default();
        assert!(matches!(config.require_api_key(), Err(Error::Config(_))));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = Config {
            api_key: Some(SecretString::from("super-secret".to_string())),
            ..Config::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
