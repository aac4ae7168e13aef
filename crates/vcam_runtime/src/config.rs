// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime configuration.
//!
//! Loaded from a RON file; any field left out takes its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "vcam.ron";

/// Where elapsed playback time comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockMode {
    /// Monotonic wall clock; playback keeps real-time pace when ticks lag
    #[default]
    Wall,
    /// Tick count times the tick period; deterministic
    Ticks,
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Format version
    pub version: u32,
    /// Length of one tick in milliseconds
    pub tick_period_ms: u64,
    /// Elapsed-time source
    pub clock: ClockMode,
    /// First proxy entity id is one below this
    pub proxy_id_seed: i32,
    /// Directory holding one file per preset
    pub preset_dir: PathBuf,
    /// Directory holding one file per sequence
    pub sequence_dir: PathBuf,
    /// Reload presets when their files change
    pub watch_presets: bool,
    /// Debounce window for file change events, in milliseconds
    pub watch_debounce_ms: u64,
    /// Default tracing filter directive, used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            tick_period_ms: 50,
            clock: ClockMode::Wall,
            proxy_id_seed: i32::MAX - 10_000,
            preset_dir: PathBuf::from("presets"),
            sequence_dir: PathBuf::from("sequences"),
            watch_presets: true,
            watch_debounce_ms: 250,
            log_filter: "vcam_runtime=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = ron::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Config version {} is newer than supported version {}",
                    config.version, CONFIG_FORMAT_VERSION
                ),
            ));
        }
        if config.tick_period_ms == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "tick_period_ms must be positive",
            ));
        }
        if config.proxy_id_seed <= 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "proxy_id_seed must be positive",
            ));
        }

        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> std::io::Result<Self> {
        match Self::load(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(path, content)
    }

    /// Tick period as a [`Duration`]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Debounce window as a [`Duration`]
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
