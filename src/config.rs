use crate::defaults;
use crate::error::{CognitaError, Result};
use crate::session::preset::SessionPreset;
use crate::session::protocol::{ResponseModality, SessionSetup};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const REDACTED: &str = "<redacted>";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub live: LiveConfig,
    pub audio: AudioConfig,
}

/// Remote live endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    pub endpoint: String,
    pub model: String,
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub response_modality: ResponseModality,
    pub preset: SessionPreset,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
}

/// Audio device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub block_size: usize,
    pub start_muted: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::LIVE_ENDPOINT.to_string(),
            model: defaults::LIVE_MODEL.to_string(),
            voice: Some(defaults::VOICE.to_string()),
            api_key: None,
            response_modality: ResponseModality::Audio,
            preset: SessionPreset::Lecture,
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            block_size: defaults::BLOCK_SIZE,
            start_muted: false,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl LiveConfig {
    /// Session setup for `instruction`, using the configured model, voice and
    /// modality.
    pub fn session_setup(&self, instruction: Option<String>) -> SessionSetup {
        let mut setup = SessionSetup::new(&self.model)
            .with_modality(self.response_modality)
            .with_transcription(self.transcribe_input, self.transcribe_output);
        if let Some(voice) = &self.voice {
            setup = setup.with_voice(voice);
        }
        if let Some(instruction) = instruction {
            setup = setup.with_system_instruction(instruction);
        }
        setup
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CognitaError::ConfigFileNotFound {
                path: path.display().to_string(),
            },
            _ => CognitaError::Io(e),
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only if the file is missing.
    ///
    /// # Errors
    /// Invalid TOML and unreadable files are still errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(CognitaError::ConfigFileNotFound { .. }) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - COGNITA_API_KEY (or GEMINI_API_KEY) → live.api_key
    /// - COGNITA_MODEL → live.model
    /// - COGNITA_VOICE → live.voice
    /// - COGNITA_AUDIO_DEVICE → audio.input_device
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_env(defaults::API_KEY_ENV)
            .or_else(|| non_empty_env(defaults::API_KEY_FALLBACK_ENV))
        {
            self.live.api_key = Some(key);
        }

        if let Some(model) = non_empty_env("COGNITA_MODEL") {
            self.live.model = model;
        }

        if let Some(voice) = non_empty_env("COGNITA_VOICE") {
            self.live.voice = Some(voice);
        }

        if let Some(device) = non_empty_env("COGNITA_AUDIO_DEVICE") {
            self.audio.input_device = Some(device);
        }

        self
    }

    /// # Errors
    /// `ConfigInvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| CognitaError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.live.endpoint.trim().is_empty() {
            return Err(invalid("live.endpoint", "must not be empty"));
        }
        if !self.live.endpoint.starts_with("ws://") && !self.live.endpoint.starts_with("wss://")
        {
            return Err(invalid("live.endpoint", "must be a ws:// or wss:// URL"));
        }
        if self.live.model.trim().is_empty() {
            return Err(invalid("live.model", "must not be empty"));
        }
        if self.audio.block_size == 0 {
            return Err(invalid("audio.block_size", "must be positive"));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.live.api_key.is_some() {
            copy.live.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CognitaError::Other(e.to_string()))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/cognita/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("cognita").join("config.toml"))
            .ok_or_else(|| CognitaError::Other("could not determine config directory".to_string()))
    }
}
