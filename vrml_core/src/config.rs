use crate::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BROWSER_NAME: &str = "vrml";
pub const DEFAULT_FRAME_RATE: f64 = 60.0;
pub const DEFAULT_MAX_QUEUED_EVENTS: usize = 400;
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64;

/// Browser settings, read from TOML. Every key is optional.
///
/// ```toml
/// [browser]
/// name = "viewer"
/// frame_rate = 30.0
/// max_queued_events = 400
/// read_chunk_size = 64
///
/// [scripts]
/// discover = true
/// search_path = ["/usr/lib/vrml/script"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: BrowserSection,
    pub scripts: ScriptSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserSection {
    pub name: String,
    /// Frame rate reported before the first two updates.
    pub frame_rate: f64,
    /// Events queued with `queue_event` beyond this drop the oldest.
    pub max_queued_events: usize,
    /// Bytes handed to a stream listener per call.
    pub read_chunk_size: usize,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_BROWSER_NAME.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            max_queued_events: DEFAULT_MAX_QUEUED_EVENTS,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptSection {
    /// Probe the search path for script engine modules when the browser
    /// is built.
    pub discover: bool,
    /// Empty means the platform default, see `vrml_io::script_search_path`.
    pub search_path: Vec<PathBuf>,
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            discover: true,
            search_path: Vec::new(),
        }
    }
}

impl ScriptSection {
    pub fn effective_search_path(&self) -> Vec<PathBuf> {
        if self.search_path.is_empty() {
            vrml_io::script_search_path()
        } else {
            self.search_path.clone()
        }
    }
}

impl BrowserConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded browser config from {}", path.display());
        Ok(config)
    }
}
