use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "DUGOUT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the analysis backend, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Initial buffer window and growth batch size.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Delay before a buffer growth lands.
    #[serde(default = "default_growth_delay_ms")]
    pub growth_delay_ms: u64,
    /// Controls are disabled for this long after startup.
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    #[serde(default = "default_rewind_secs")]
    pub rewind_secs: f64,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_recorder_enabled")]
    pub enabled: bool,
    /// Wall-clock capture window for requested segments.
    #[serde(default = "default_capture_secs")]
    pub capture_secs: u64,
}

/// External speech recognizer.  The command is run once per utterance and
/// must print the transcript on stdout.  An empty command disables voice input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_voice_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            growth_delay_ms: default_growth_delay_ms(),
            warmup_secs: default_warmup_secs(),
            rewind_secs: default_rewind_secs(),
            volume: default_volume(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: default_recorder_enabled(),
            capture_secs: default_capture_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_voice_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl PlaybackConfig {
    pub fn growth_delay(&self) -> Duration {
        Duration::from_millis(self.growth_delay_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

impl RecorderConfig {
    pub fn capture_window(&self) -> Duration {
        Duration::from_secs(self.capture_secs)
    }
}

impl VoiceConfig {
    pub fn is_configured(&self) -> bool {
        self.command.first().is_some_and(|c| !c.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_window_size() -> usize {
    5
}

fn default_growth_delay_ms() -> u64 {
    3000
}

fn default_warmup_secs() -> u64 {
    5
}

fn default_rewind_secs() -> f64 {
    10.0
}

fn default_volume() -> f32 {
    0.8
}

fn default_recorder_enabled() -> bool {
    true
}

fn default_capture_secs() -> u64 {
    20
}

fn default_voice_timeout_secs() -> u64 {
    15
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing defaults there first if it does not exist.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => platform::config_dir().join("config.toml"),
        }
    }
}
