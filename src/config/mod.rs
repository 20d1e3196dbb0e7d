//! Persisted driver settings.
//!
//! Settings are read once at startup from TOML or YAML and seed the device
//! manager's saved configuration. The driver never writes them back except
//! through `ledlink config --init`.

mod path;
mod settings;

pub use path::{ENV_CONFIG, default_settings_path, home_dir, resolve_path};
pub use settings::{ConfigFormat, HidSettings, Settings, load_settings, load_settings_from_str};
