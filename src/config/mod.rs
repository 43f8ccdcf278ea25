pub mod path;

#[cfg(test)]
mod config_test;

use std::{io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::settings::{MappingMode, MappingSettings};

/// Represents all possible errors loading a [Config]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Daemon configuration. Every field is optional in the YAML file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    pub mapping_mode: MappingMode,
    pub accurate_drum_mappings: bool,
    /// Multiplier applied to the Riffmaster tilt in shadPS4 mode
    pub riffmaster_sensitivity: f64,
    /// Log every frame sent and received
    pub log_packets: bool,
    pub backends: BackendsConfig,
    pub targets: TargetsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapping_mode: MappingMode::default(),
            accurate_drum_mappings: false,
            riffmaster_sensitivity: 1.5,
            log_packets: false,
            backends: BackendsConfig::default(),
            targets: TargetsConfig::default(),
        }
    }
}

impl Config {
    /// Load a [Config] from the given YAML string
    pub fn from_yaml(content: &str) -> Result<Config, LoadError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a [Config] from the given YAML file
    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Config, LoadError> {
        let file = std::fs::File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the first config file found in the default locations, falling
    /// back to the defaults if there is none
    pub fn load() -> Result<Config, LoadError> {
        for path in path::get_config_paths() {
            if !path.is_file() {
                log::trace!("No config at {}", path.display());
                continue;
            }
            log::info!("Loading config from {}", path.display());
            return Config::from_yaml_path(&path);
        }
        log::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Both transports read the same devices, so at most one may be enabled
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.backends.usb.enabled && self.backends.hotplug.enabled {
            return Err(LoadError::InvalidConfig(
                "the usb and hotplug backends cannot both be enabled",
            ));
        }
        Ok(())
    }

    /// Live mapping settings initialised from this config
    pub fn settings(&self) -> MappingSettings {
        MappingSettings::new(
            self.mapping_mode,
            self.accurate_drum_mappings,
            self.riffmaster_sensitivity,
            self.log_packets,
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct BackendsConfig {
    pub usb: UsbConfig,
    pub hotplug: HotplugConfig,
}

/// Enumerated USB devices, one read thread each
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct UsbConfig {
    pub enabled: bool,
    pub read_timeout_ms: u64,
    pub map_guide_button: bool,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read_timeout_ms: 1000,
            map_guide_button: true,
        }
    }
}

impl UsbConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Devices discovered through hotplug notifications
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct HotplugConfig {
    pub enabled: bool,
    pub read_timeout_ms: u64,
    pub map_guide_button: bool,
    /// Map devices without a recognized interface by their report size
    pub fallback_mapping: bool,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            read_timeout_ms: 1000,
            map_guide_button: false,
            fallback_mapping: true,
        }
    }
}

impl HotplugConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Where virtual controllers are created
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetBackend {
    #[default]
    Uinput,
    /// Keep controller state in memory only, e.g. for dry runs
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct TargetsConfig {
    pub backend: TargetBackend,
    pub max_xbox360: usize,
    pub max_joysticks: usize,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            backend: TargetBackend::default(),
            max_xbox360: 4,
            max_joysticks: 16,
        }
    }
}
