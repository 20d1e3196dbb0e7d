//! Device family descriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::protocol;

/// Supported LED device families.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Paintpack DMX controller (8 zones, write-only)
    #[default]
    Paintpack,
    /// Lightpack (10 zones, reports firmware version)
    Lightpack,
    /// In-process device that publishes corrected frames as events
    Virtual,
}

impl DeviceType {
    pub const ALL: [Self; 3] = [Self::Paintpack, Self::Lightpack, Self::Virtual];

    /// Largest frame the family accepts.
    #[must_use]
    pub const fn max_zones(self) -> usize {
        match self {
            Self::Paintpack => 8,
            Self::Lightpack => 10,
            Self::Virtual => 255,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paintpack => "paintpack",
            Self::Lightpack => "lightpack",
            Self::Virtual => "virtual",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Paintpack => "Paintpack",
            Self::Lightpack => "Lightpack",
            Self::Virtual => "Virtual device",
        }
    }

    /// HID parameters, or `None` for families without a USB transport.
    #[must_use]
    pub const fn hid_profile(self) -> Option<HidProfile> {
        match self {
            Self::Paintpack => Some(HidProfile {
                device_type: self,
                vendor_id: 0x16C0,
                product_id: 0x05DF,
                color_offset: 3,
                firmware: FirmwareQuery::Constant("Paintpack DMX"),
            }),
            Self::Lightpack => Some(HidProfile {
                device_type: self,
                vendor_id: 0x1D50,
                product_id: 0x6022,
                color_offset: 2,
                firmware: FirmwareQuery::InputReport,
            }),
            Self::Virtual => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LinkError::UnknownDeviceType {
                name: s.to_string(),
            })
    }
}

/// How a family answers a firmware version request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareQuery {
    /// The device cannot report a version; use a fixed name.
    Constant(&'static str),
    /// Read an input report and decode `major.minor`.
    InputReport,
}

/// Wire parameters of a HID device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidProfile {
    pub device_type: DeviceType,
    pub vendor_id: u16,
    pub product_id: u16,
    /// First colour byte in the output report.
    pub color_offset: usize,
    pub firmware: FirmwareQuery,
}

impl HidProfile {
    #[must_use]
    pub const fn max_zones(&self) -> usize {
        self.device_type.max_zones()
    }

    /// Same family on a different VID/PID pair.
    #[must_use]
    pub fn with_ids(mut self, vendor_id: Option<u16>, product_id: Option<u16>) -> Self {
        if let Some(vid) = vendor_id {
            self.vendor_id = vid;
        }
        if let Some(pid) = product_id {
            self.product_id = pid;
        }
        self
    }

    /// True when `max_zones` colours fit in one output report.
    #[must_use]
    pub const fn fits_report(&self) -> bool {
        self.max_zones() <= protocol::zone_capacity(self.color_offset)
    }
}
