//! Raw HID transport.
//!
//! A [`Transport`] is a dumb handle: open, close, one write, one read. The
//! retry and reopen policy lives in the link on top of it.

use hidapi::{HidApi, HidDevice};
use serde::Serialize;
use tracing::{debug, trace};

use super::info::{DeviceType, HidProfile};
use crate::error::{LinkError, Result};

/// Single-handle byte transport.
pub trait Transport: Send {
    /// Acquire the handle. Closes any handle already held.
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Send one output report. Fails with [`LinkError::NotOpen`] when closed.
    fn write(&mut self, report: &[u8]) -> Result<usize>;

    /// Receive one input report, waiting at most `timeout_ms`.
    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// [`Transport`] backed by `hidapi`.
///
/// The `HidApi` context is created on first open and kept for the life of
/// the transport.
pub struct HidapiTransport {
    profile: HidProfile,
    api: Option<HidApi>,
    device: Option<HidDevice>,
}

impl HidapiTransport {
    #[must_use]
    pub fn new(profile: HidProfile) -> Self {
        Self {
            profile,
            api: None,
            device: None,
        }
    }

    fn api(&mut self) -> Result<&HidApi> {
        if self.api.is_none() {
            let api = HidApi::new().map_err(|e| LinkError::Transport(e.to_string()))?;
            self.api = Some(api);
        }
        self.api
            .as_ref()
            .ok_or_else(|| LinkError::Other("HID context unavailable".to_string()))
    }
}

impl Transport for HidapiTransport {
    fn open(&mut self) -> Result<()> {
        self.close();

        let HidProfile {
            device_type,
            vendor_id,
            product_id,
            ..
        } = self.profile;
        debug!(
            device = %device_type,
            vendor_id = format_args!("{vendor_id:04x}"),
            product_id = format_args!("{product_id:04x}"),
            "Opening HID device"
        );

        let device = self
            .api()?
            .open(vendor_id, product_id)
            .map_err(|_| LinkError::DeviceNotFound {
                device: device_type.display_name().to_string(),
                vendor_id,
                product_id,
            })?;
        device
            .set_blocking_mode(false)
            .map_err(|e| LinkError::DeviceOpenFailed {
                device: device_type.display_name().to_string(),
                reason: e.to_string(),
            })?;

        self.device = Some(device);
        Ok(())
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!(device = %self.profile.device_type, "Closed HID device");
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn write(&mut self, report: &[u8]) -> Result<usize> {
        let device = self.device.as_ref().ok_or(LinkError::NotOpen)?;
        trace!(bytes = %hex::encode(report), "HID write");
        device
            .write(report)
            .map_err(|e| LinkError::Transport(e.to_string()))
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let device = self.device.as_ref().ok_or(LinkError::NotOpen)?;
        let read = device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| LinkError::Transport(e.to_string()))?;
        trace!(bytes = %hex::encode(&buf[..read]), "HID read");
        Ok(read)
    }
}

/// A HID interface seen during enumeration.
#[derive(Debug, Clone, Serialize)]
pub struct HidDeviceSummary {
    /// Known family for this VID/PID pair, if any
    pub device_type: Option<DeviceType>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub serial: Option<String>,
    pub path: String,
}

/// Enumerate HID interfaces.
///
/// Only interfaces matching a known family are returned unless `all` is set.
pub fn list_devices(all: bool) -> Result<Vec<HidDeviceSummary>> {
    let api = HidApi::new().map_err(|e| LinkError::Transport(e.to_string()))?;

    let known = |vid: u16, pid: u16| {
        DeviceType::ALL.into_iter().find(|t| {
            t.hid_profile()
                .is_some_and(|p| p.vendor_id == vid && p.product_id == pid)
        })
    };

    let devices = api
        .device_list()
        .filter_map(|info| {
            let device_type = known(info.vendor_id(), info.product_id());
            if device_type.is_none() && !all {
                return None;
            }
            Some(HidDeviceSummary {
                device_type,
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                product: info.product_string().map(str::to_string),
                manufacturer: info.manufacturer_string().map(str::to_string),
                serial: info.serial_number().map(str::to_string),
                path: info.path().to_string_lossy().into_owned(),
            })
        })
        .collect();

    Ok(devices)
}
