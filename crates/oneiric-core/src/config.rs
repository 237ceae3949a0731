//! Configuration loading.
//!
//! Read from `$XDG_CONFIG_HOME/oneiric/config.toml`. Every section falls back to its
//! defaults, so a missing file (or a missing section) is never an error.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

const APP_DIR: &str = "oneiric";

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub capability: CapabilityConfig,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
    pub profile: ProfileConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    #[default]
    Simulated,
    Command,
}

impl CapabilityMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Command => "command",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CapabilityConfig {
    pub mode: CapabilityMode,
    /// Program invoked once per backend call in `command` mode.
    pub program: Option<String>,
    pub args: Vec<String>,
    /// Artificial delay for the simulated backend.
    pub latency_ms: u64,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            mode: CapabilityMode::Simulated,
            program: None,
            args: Vec::new(),
            latency_ms: 1_500,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AudioConfig {
    pub recorder_program: String,
    pub recorder_args: Vec<String>,
    pub player_program: String,
    pub player_args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let (player_program, player_args) = if cfg!(target_os = "macos") {
            ("afplay".to_string(), Vec::new())
        } else {
            ("aplay".to_string(), vec!["-q".to_string()])
        };
        Self {
            recorder_program: "arecord".to_string(),
            recorder_args: vec![
                "-q".to_string(),
                "-f".to_string(),
                "cd".to_string(),
                "-t".to_string(),
                "wav".to_string(),
            ],
            player_program,
            player_args,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProfileConfig {
    pub default_name: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_name: "造梦者".to_string(),
        }
    }
}

impl Config {
    /// Loads the config from the default location, or defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    pub fn config_dir() -> PathBuf {
        xdg_config_home().join(APP_DIR)
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("oneiric.log")
    }

    /// Directory holding the persisted documents and captured audio.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| xdg_data_home().join(APP_DIR))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tmpdir");
        let config = Config::load_from(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(config.capability.mode, CapabilityMode::Simulated);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.profile.default_name, "造梦者");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[capability]\nmode = \"command\"\nprogram = \"dream-backend\"\n\n[storage]\ndata_dir = \"/tmp/dreams\"\n",
        )
        .expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.capability.mode, CapabilityMode::Command);
        assert_eq!(config.capability.program.as_deref(), Some("dream-backend"));
        assert_eq!(config.capability.latency_ms, 1_500);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/dreams"));
        assert_eq!(config.audio.recorder_program, "arecord");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capability\nmode = 3").expect("write");
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
