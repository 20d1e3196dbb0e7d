//! Settings schema, parsing and validation.
//!
//! # Example (TOML)
//!
//! ```toml
//! device_type = "lightpack"
//! gamma = 2.2
//! brightness = 80
//! keep_alive = true
//!
//! [hid]
//! vendor_id = 0x1d50
//! product_id = 0x6022
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::correction::{DEFAULT_BRIGHTNESS, DEFAULT_GAMMA};
use crate::device::DeviceType;
use crate::error::{LinkError, Result};

/// Supported settings file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml).
    Yaml,
    /// TOML format (.toml).
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        trace!(extension = %ext, "Detecting config format from extension");
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    fn for_path(path: &Path) -> Result<Self> {
        Self::from_extension(path).ok_or_else(|| {
            LinkError::ConfigParse(format!(
                "Unknown config format for '{}': expected .yaml, .yml, or .toml",
                path.display()
            ))
        })
    }
}

/// USB id overrides for the HID families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HidSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
}

/// Driver settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub device_type: DeviceType,
    pub gamma: f64,
    /// Percent, 0-100
    pub brightness: u8,
    /// Probe the device every second while the backlight is on
    pub keep_alive: bool,
    /// Backlight state at startup
    pub backlight: bool,
    pub refresh_delay: u32,
    pub color_depth: u32,
    pub smooth_slowdown: u32,
    pub color_sequence: String,
    pub hid: HidSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            gamma: DEFAULT_GAMMA,
            brightness: DEFAULT_BRIGHTNESS,
            keep_alive: true,
            backlight: true,
            refresh_delay: 100,
            color_depth: 128,
            smooth_slowdown: 100,
            color_sequence: "RGB".to_string(),
            hid: HidSettings::default(),
        }
    }
}

impl Settings {
    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        trace!("Validating settings");

        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(LinkError::InvalidGamma { value: self.gamma });
        }
        if self.brightness > 100 {
            return Err(LinkError::InvalidBrightness {
                value: self.brightness,
            });
        }

        let mut channels: Vec<char> = self.color_sequence.to_ascii_uppercase().chars().collect();
        channels.sort_unstable();
        if channels != ['B', 'G', 'R'] {
            return Err(LinkError::ConfigInvalid(format!(
                "color_sequence '{}' must be a permutation of RGB",
                self.color_sequence
            )));
        }

        debug!(device = %self.device_type, "Settings validated");
        Ok(())
    }

    /// Serialize in `format`.
    pub fn to_string_for(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| LinkError::ConfigParse(format!("TOML: {e}")))
            }
            ConfigFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| LinkError::ConfigParse(format!("YAML: {e}")))
            }
        }
    }

    /// Write the settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_string_for(ConfigFormat::for_path(path)?)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        debug!(path = %path.display(), "Saved settings");
        Ok(())
    }
}

/// Load settings from a TOML or YAML file.
///
/// # Errors
///
/// Returns an error if the file is missing, the extension is unknown, the
/// content fails to parse, or validation fails.
pub fn load_settings(path: &Path) -> Result<Settings> {
    debug!(path = %path.display(), "Loading settings");
    let format = ConfigFormat::for_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LinkError::ConfigNotFound {
                path: path.display().to_string(),
            }
        } else {
            LinkError::Io(e)
        }
    })?;

    load_settings_from_str(&content, format)
}

/// Parse and validate settings from a string.
pub fn load_settings_from_str(content: &str, format: ConfigFormat) -> Result<Settings> {
    let settings: Settings = match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| LinkError::ConfigParse(format!("YAML: {e}")))?
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| LinkError::ConfigParse(format!("TOML: {e}")))?
        }
    };
    settings.validate()?;
    Ok(settings)
}
