//! Error types for LED device operations.

use thiserror::Error;

/// Primary error type for ledlink operations.
#[derive(Error, Debug)]
pub enum LinkError {
    // Device errors
    #[error("No {device} device found (VID {vendor_id:04x}, PID {product_id:04x})")]
    DeviceNotFound {
        device: String,
        vendor_id: u16,
        product_id: u16,
    },

    #[error("Failed to open {device}: {reason}")]
    DeviceOpenFailed { device: String, reason: String },

    #[error("Device transport error: {0}")]
    Transport(String),

    #[error("Device is not open")]
    NotOpen,

    // Input errors
    #[error("Colour frame has {len} zones but the device supports at most {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Invalid gamma value {value}: must be a finite number greater than 0")]
    InvalidGamma { value: f64 },

    #[error("Invalid brightness value {value}: must be 0-100")]
    InvalidBrightness { value: u8 },

    #[error("Invalid colour '{value}': expected 6 hex digits (e.g. ff8800)")]
    InvalidColor { value: String },

    #[error("Unknown device type '{name}'")]
    UnknownDeviceType { name: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // Runtime errors
    #[error("Device worker has stopped")]
    WorkerStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl LinkError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::FrameTooLarge { .. }
                | Self::InvalidGamma { .. }
                | Self::InvalidBrightness { .. }
                | Self::InvalidColor { .. }
                | Self::UnknownDeviceType { .. }
                | Self::ConfigNotFound { .. }
                | Self::ConfigInvalid(_)
        )
    }

    /// Returns true for failures of the physical link rather than of the input.
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::DeviceOpenFailed { .. }
                | Self::Transport(_)
                | Self::NotOpen
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DeviceNotFound { .. } => {
                Some("Ensure the device is connected via USB, or set vendor_id/product_id")
            }
            Self::DeviceOpenFailed { .. } => {
                Some("Check udev rules / permissions for the HID device")
            }
            Self::FrameTooLarge { .. } => Some("Send no more colours than the device has zones"),
            Self::InvalidGamma { .. } => Some("Use a gamma such as 2.0"),
            Self::InvalidBrightness { .. } => Some("Use a value between 0 and 100"),
            Self::InvalidColor { .. } => Some("Use colours like ff0000 or #00ff00"),
            Self::UnknownDeviceType { .. } => Some("Use one of: paintpack, lightpack, virtual"),
            Self::ConfigNotFound { .. } => Some("Run: ledlink config --init"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| LinkError::Other(format!("{}: {e}", f().into())))
    }
}
