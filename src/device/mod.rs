//! Device abstraction layer for LED controllers.
//!
//! A link is driven with fire-and-forget calls and reports every outcome
//! as a [`LinkEvent`] on the channel it was built with. That keeps the
//! trait usable for links that complete asynchronously, while the HID and
//! virtual links in this crate complete synchronously.

mod hid;
mod info;
pub mod mock;
mod transport;
mod virtual_link;

pub use hid::HidLink;
pub use info::{DeviceType, FirmwareQuery, HidProfile};
pub use transport::{HidDeviceSummary, HidapiTransport, Transport, list_devices};
pub use virtual_link::VirtualLink;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

use crate::color::{Color, ColorFrame};
use crate::command::Command;
use crate::config::HidSettings;
use crate::correction::ColorCorrector;

/// Outcome notifications raised by a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum LinkEvent {
    /// Result of an `open()` or keep-alive probe.
    OpenSucceeded(bool),
    /// Result of one transport write or read.
    IoSucceeded(bool),
    FirmwareVersion(String),
    /// The command passed to the link has finished.
    CommandCompleted(bool),
    /// Corrected frame published by the virtual device.
    ColorsUpdated(ColorFrame),
}

/// Sending half of a link's event channel.
pub type LinkEvents = mpsc::UnboundedSender<LinkEvent>;

/// Operations every device family supports.
///
/// Each command method ends in exactly one [`LinkEvent::CommandCompleted`].
/// `open`, `close`, `ping` and `set_backlight_enabled` are not commands and
/// never complete one.
pub trait LedDevice: Send {
    fn device_type(&self) -> DeviceType;

    fn max_zones(&self) -> usize {
        self.device_type().max_zones()
    }

    fn is_open(&self) -> bool;

    /// Publish an event on the link's channel.
    fn emit(&self, event: LinkEvent);

    fn open(&mut self);

    fn close(&mut self);

    fn set_colors(&mut self, frame: &[Color]);

    fn switch_off_leds(&mut self);

    fn set_gamma(&mut self, gamma: f64);

    fn set_brightness(&mut self, brightness: u8);

    fn request_firmware_version(&mut self);

    fn update_device_settings(&mut self) {
        self.unsupported("update_device_settings");
    }

    fn set_refresh_delay(&mut self, _value: u32) {
        self.unsupported("set_refresh_delay");
    }

    fn set_color_depth(&mut self, _value: u32) {
        self.unsupported("set_color_depth");
    }

    fn set_smooth_slowdown(&mut self, _value: u32) {
        self.unsupported("set_smooth_slowdown");
    }

    fn set_color_sequence(&mut self, _value: &str) {
        self.unsupported("set_color_sequence");
    }

    fn set_backlight_enabled(&mut self, enabled: bool);

    /// Install colour correction without sending anything. Links that do
    /// not correct frames ignore it.
    fn preset_correction(&mut self, _corrector: ColorCorrector) {}

    /// Keep-alive probe.
    fn ping(&mut self);

    /// Accept a command the family has no use for.
    fn unsupported(&mut self, command: &'static str) {
        trace!(device = %self.device_type(), command, "Command not supported, ignoring");
        self.emit(LinkEvent::CommandCompleted(true));
    }

    /// Dispatch a queued command to the matching method.
    fn execute(&mut self, command: &Command) {
        match command {
            Command::SetColors(frame) => self.set_colors(frame),
            Command::SwitchOff => self.switch_off_leds(),
            Command::SetRefreshDelay(v) => self.set_refresh_delay(*v),
            Command::SetColorDepth(v) => self.set_color_depth(*v),
            Command::SetSmoothSlowdown(v) => self.set_smooth_slowdown(*v),
            Command::SetColorSequence(v) => self.set_color_sequence(v),
            Command::SetGamma(v) => self.set_gamma(*v),
            Command::SetBrightness(v) => self.set_brightness(*v),
            Command::RequestFirmwareVersion => self.request_firmware_version(),
            Command::UpdateDeviceSettings => self.update_device_settings(),
        }
    }
}

/// Type alias for boxed trait object.
pub type BoxedLink = Box<dyn LedDevice>;

/// Build a link for `device_type` using the real HID backend.
#[must_use]
pub fn create_link(device_type: DeviceType, hid: &HidSettings, events: LinkEvents) -> BoxedLink {
    match device_type.hid_profile() {
        Some(profile) => {
            let profile = profile.with_ids(hid.vendor_id, hid.product_id);
            Box::new(HidLink::new(profile, HidapiTransport::new(profile), events))
        }
        None => Box::new(VirtualLink::new(events)),
    }
}
