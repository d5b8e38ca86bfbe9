//! TOML configuration file loading
//!
//! Supports `~/.config/nour/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct NourConfigFile {
    /// Gemini API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default teaching mode ("arabic" or "english")
    #[serde(default)]
    pub teaching_mode: Option<String>,

    /// Model selection
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkFileConfig,
}

/// Model identifiers
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// Structured text generation model
    pub text: Option<String>,

    /// Speech synthesis model
    pub tts: Option<String>,

    /// Live audio model
    pub live: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Prebuilt voice name (e.g. "Kore")
    pub voice_name: Option<String>,

    /// Samples per capture frame
    pub capture_block_size: Option<usize>,

    /// Cancel scheduled playback when the student interrupts
    pub barge_in: Option<bool>,

    /// Outbound frame queue capacity for live sessions
    pub outbound_queue_capacity: Option<usize>,
}

/// Network and retry configuration
#[derive(Debug, Default, Deserialize)]
pub struct NetworkFileConfig {
    /// REST API base URL
    pub api_base_url: Option<String>,

    /// Live WebSocket URL
    pub live_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Live session connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,

    /// Rate-limit retries per call
    pub max_retries: Option<u32>,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `NourConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> NourConfigFile {
    config_file_path().map_or_else(NourConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> NourConfigFile {
    if !path.exists() {
        return NourConfigFile::default();
    }

    match read_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            NourConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read and `Error::Toml` if it is
/// not valid config
pub fn read_config(path: &Path) -> Result<NourConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/nour/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("nour").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::Error;

    #[test]
    fn missing_file_is_default() {
        let fc = load_config_from(Path::new("/definitely/not/here.toml"));
        assert!(fc.api_key.is_none());
    }

    #[test]
    fn partial_file_overlays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "teaching_mode = \"english\"\n[voice]\nvoice_name = \"Puck\"\n[network]\nmax_retries = 5"
        )
        .unwrap();

        let fc = load_config_from(file.path());
        assert_eq!(fc.teaching_mode.as_deref(), Some("english"));
        assert_eq!(fc.voice.voice_name.as_deref(), Some("Puck"));
        assert_eq!(fc.network.max_retries, Some(5));
        assert!(fc.models.text.is_none());
    }

    #[test]
    fn invalid_file_is_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        assert!(load_config_from(file.path()).voice.barge_in.is_none());
        assert!(matches!(read_config(file.path()), Err(Error::Toml(_))));
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_config(dir.path()), Err(Error::Io(_))));
    }
}
