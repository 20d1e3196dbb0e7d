//! Commands that can be executed against a device link.

use serde::Serialize;

use crate::color::ColorFrame;

/// One device operation. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum Command {
    SetColors(ColorFrame),
    SwitchOff,
    SetRefreshDelay(u32),
    SetColorDepth(u32),
    SetSmoothSlowdown(u32),
    SetColorSequence(String),
    SetGamma(f64),
    SetBrightness(u8),
    RequestFirmwareVersion,
    UpdateDeviceSettings,
}

/// Payload-free discriminant of a [`Command`], used for coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SetColors,
    SwitchOff,
    SetRefreshDelay,
    SetColorDepth,
    SetSmoothSlowdown,
    SetColorSequence,
    SetGamma,
    SetBrightness,
    RequestFirmwareVersion,
    UpdateDeviceSettings,
}

impl Command {
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::SetColors(_) => CommandKind::SetColors,
            Self::SwitchOff => CommandKind::SwitchOff,
            Self::SetRefreshDelay(_) => CommandKind::SetRefreshDelay,
            Self::SetColorDepth(_) => CommandKind::SetColorDepth,
            Self::SetSmoothSlowdown(_) => CommandKind::SetSmoothSlowdown,
            Self::SetColorSequence(_) => CommandKind::SetColorSequence,
            Self::SetGamma(_) => CommandKind::SetGamma,
            Self::SetBrightness(_) => CommandKind::SetBrightness,
            Self::RequestFirmwareVersion => CommandKind::RequestFirmwareVersion,
            Self::UpdateDeviceSettings => CommandKind::UpdateDeviceSettings,
        }
    }

    /// Short name for log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl CommandKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SetColors => "set_colors",
            Self::SwitchOff => "switch_off",
            Self::SetRefreshDelay => "set_refresh_delay",
            Self::SetColorDepth => "set_color_depth",
            Self::SetSmoothSlowdown => "set_smooth_slowdown",
            Self::SetColorSequence => "set_color_sequence",
            Self::SetGamma => "set_gamma",
            Self::SetBrightness => "set_brightness",
            Self::RequestFirmwareVersion => "request_firmware_version",
            Self::UpdateDeviceSettings => "update_device_settings",
        }
    }
}
