use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, ScancamError};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ScancamConfig {
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusConfig {
    /// Multiplier applied to the touch indicator when computing the
    /// metering region, so it covers more context than the focus region
    #[serde(default = "default_metering_scale")]
    pub metering_scale: f32,

    /// Weight submitted with each focus/metering region (1..=1000)
    #[serde(default = "default_region_weight")]
    pub region_weight: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Dead-man timer for a hung one-shot autofocus request, in milliseconds
    #[serde(default = "default_focus_timeout_ms")]
    pub focus_timeout_ms: u64,

    /// Ask the surface to keep the display active while previewing
    #[serde(default = "default_keep_display_active")]
    pub keep_display_active: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            metering_scale: default_metering_scale(),
            region_weight: default_region_weight(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_timeout_ms: default_focus_timeout_ms(),
            keep_display_active: default_keep_display_active(),
        }
    }
}

impl ScancamConfig {
    /// Load configuration from default sources
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_file("scancam.toml")
    }

    /// Load configuration from a specific file path, falling back to
    /// defaults for anything the file does not set
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("focus.metering_scale", default_metering_scale() as f64)?
            .set_default("focus.region_weight", default_region_weight())?
            .set_default("session.focus_timeout_ms", default_focus_timeout_ms())?
            .set_default("session.keep_display_active", default_keep_display_active())?
            .add_source(File::with_name(&path_str).required(false))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.focus.metering_scale < 1.0 {
            return Err(ScancamError::system(format!(
                "focus.metering_scale must be >= 1.0, got {}",
                self.focus.metering_scale
            )));
        }

        if self.focus.region_weight == 0 || self.focus.region_weight > 1000 {
            return Err(ScancamError::system(format!(
                "focus.region_weight must be in 1..=1000, got {}",
                self.focus.region_weight
            )));
        }

        if self.session.focus_timeout_ms == 0 {
            return Err(ScancamError::system(
                "session.focus_timeout_ms must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Serialize the configuration to TOML (used by --print-config)
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_metering_scale() -> f32 {
    1.5
}

fn default_region_weight() -> u32 {
    1000
}

fn default_focus_timeout_ms() -> u64 {
    2000
}

fn default_keep_display_active() -> bool {
    true
}
