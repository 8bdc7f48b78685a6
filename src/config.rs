use std::{path::{Path, PathBuf}, time::Duration};

use drawdesk_core::{DrawTiming, Resolution};
use serde::{Deserialize, Serialize};

/// Where draws are resolved, as written in the configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    #[default]
    Local,
    Remote,
}

impl From<ResolutionMode> for Resolution {
    fn from(mode: ResolutionMode) -> Self {
        match mode {
            ResolutionMode::Local => Resolution::Local,
            ResolutionMode::Remote => Resolution::Remote,
        }
    }
}

/// Configuration of the console
///
/// Read once at start from a JSON file. Every field is optional: without `api_url` the
/// console runs offline on its snapshot file only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Base url of the raffle service, e.g. `http://127.0.0.1:8000/api`
    #[serde(default)]
    pub api_url: Option<String>,
    /// Bearer token sent to the service
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub resolution: ResolutionMode,
    #[serde(default = "Config::default_animation_ms")]
    pub animation_ms: u64,
    #[serde(default = "Config::default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "Config::default_snapshot")]
    pub snapshot: PathBuf,
    #[serde(default = "Config::default_audit_log")]
    pub audit_log: PathBuf,
    #[serde(default = "Config::default_export_dir")]
    pub export_dir: PathBuf,
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "./config.json";

    fn default_animation_ms() -> u64 {
        2500
    }
    fn default_tick_ms() -> u64 {
        80
    }
    fn default_snapshot() -> PathBuf {
        PathBuf::from("data/raffle.json")
    }
    fn default_audit_log() -> PathBuf {
        PathBuf::from("data/draws.log")
    }
    fn default_export_dir() -> PathBuf {
        PathBuf::from(".")
    }

    pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, String> {
        let str_config = match std::fs::read_to_string(filepath.as_ref()) {
            Ok(v) => v,
            Err(e) => return Err(format!("Unable to read file {}: {}", filepath.as_ref().to_string_lossy(), e)),
        };
        Self::parse(&str_config)
            .map_err(|e| format!("Unable to parse {}: {}", filepath.as_ref().to_string_lossy(), e))
    }
    /// Like [`Config::load`], but a missing file means the defaults.
    pub fn load_or_default<P: AsRef<Path>>(filepath: P) -> Result<Self, String> {
        if filepath.as_ref().exists() {
            Self::load(filepath)
        } else {
            Ok(Self::default())
        }
    }
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Config = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if config.tick_ms == 0 {
            return Err("tick_ms must be greater than 0".to_string());
        }
        Ok(config)
    }

    pub fn timing(&self) -> DrawTiming {
        DrawTiming {
            animation: Duration::from_millis(self.animation_ms),
            tick: Duration::from_millis(self.tick_ms),
        }
    }
    pub fn is_offline(&self) -> bool {
        self.api_url.is_none()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            resolution: ResolutionMode::default(),
            animation_ms: Self::default_animation_ms(),
            tick_ms: Self::default_tick_ms(),
            snapshot: Self::default_snapshot(),
            audit_log: Self::default_audit_log(),
            export_dir: Self::default_export_dir(),
        }
    }
}
