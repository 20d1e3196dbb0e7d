//! Link to a USB HID LED controller.
//!
//! Writes escalate as: write, retry once, reopen, final write. Reads skip
//! the plain retry and reopen straight after the first failure. Both
//! sequences start with a reopen when the handle is already closed.

use tracing::{debug, info, trace, warn};

use super::info::{DeviceType, FirmwareQuery, HidProfile};
use super::transport::Transport;
use super::{LedDevice, LinkEvent, LinkEvents};
use crate::color::{Color, ColorFrame, black_frame};
use crate::correction::ColorCorrector;
use crate::protocol::{
    self, READ_BUFFER_SIZE, READ_TIMEOUT_MS, ReadBuffer, WRITE_BUFFER_SIZE, WriteBuffer,
};

/// Link to one HID device family over a [`Transport`].
pub struct HidLink<T: Transport> {
    profile: HidProfile,
    transport: T,
    events: LinkEvents,
    write_buffer: WriteBuffer,
    read_buffer: ReadBuffer,
    corrector: ColorCorrector,
    saved_colors: ColorFrame,
    backlight_enabled: bool,
}

impl<T: Transport> HidLink<T> {
    pub fn new(profile: HidProfile, transport: T, events: LinkEvents) -> Self {
        Self {
            profile,
            transport,
            events,
            write_buffer: [0; WRITE_BUFFER_SIZE],
            read_buffer: [0; READ_BUFFER_SIZE],
            corrector: ColorCorrector::default(),
            saved_colors: Vec::new(),
            backlight_enabled: true,
        }
    }

    pub fn profile(&self) -> &HidProfile {
        &self.profile
    }

    /// Last frame handed to the link, before correction.
    pub fn saved_colors(&self) -> &[Color] {
        &self.saved_colors
    }

    pub fn corrector(&self) -> &ColorCorrector {
        &self.corrector
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn try_reopen(&mut self) -> bool {
        self.open();
        self.transport.is_open()
    }

    fn write_once(&mut self) -> bool {
        let ok = match self.transport.write(&self.write_buffer) {
            Ok(_) => true,
            Err(err) => {
                debug!(device = %self.profile.device_type, error = %err, "Write failed");
                false
            }
        };
        self.emit(LinkEvent::IoSucceeded(ok));
        ok
    }

    fn read_once(&mut self) -> bool {
        let ok = match self.transport.read(&mut self.read_buffer, READ_TIMEOUT_MS) {
            Ok(_) => true,
            Err(err) => {
                debug!(device = %self.profile.device_type, error = %err, "Read failed");
                false
            }
        };
        self.emit(LinkEvent::IoSucceeded(ok));
        ok
    }

    fn write_with_check(&mut self) -> bool {
        if !self.transport.is_open() {
            return self.try_reopen() && self.write_once();
        }
        if self.write_once() {
            return true;
        }
        debug!(device = %self.profile.device_type, "Retrying write");
        if self.write_once() {
            return true;
        }
        warn!(device = %self.profile.device_type, "Write failed twice, reopening device");
        self.try_reopen() && self.write_once()
    }

    fn read_with_check(&mut self) -> bool {
        if !self.transport.is_open() {
            return self.try_reopen() && self.read_once();
        }
        if self.read_once() {
            return true;
        }
        warn!(device = %self.profile.device_type, "Read failed, reopening device");
        self.try_reopen() && self.read_once()
    }

    /// Correct and transmit the saved frame.
    fn send_saved_colors(&mut self) -> bool {
        let corrected = self.corrector.apply(&self.saved_colors);
        protocol::encode_colors(&mut self.write_buffer, self.profile.color_offset, &corrected);
        trace!(zones = corrected.len(), "Sending colour frame");
        self.write_with_check()
    }

    /// Resend the saved frame after a correction change.
    fn refresh(&mut self) {
        if self.backlight_enabled && !self.saved_colors.is_empty() {
            let ok = self.send_saved_colors();
            self.emit(LinkEvent::CommandCompleted(ok));
        } else {
            self.emit(LinkEvent::CommandCompleted(true));
        }
    }

    fn firmware_version(&mut self, probe: bool) -> Option<String> {
        match self.profile.firmware {
            FirmwareQuery::Constant(name) => Some(name.to_string()),
            FirmwareQuery::InputReport => {
                // The probe after open must not escalate: a reopen would
                // probe again.
                let ok = if probe {
                    self.read_once()
                } else {
                    self.read_with_check()
                };
                if ok {
                    protocol::parse_firmware_version(&self.read_buffer)
                } else {
                    None
                }
            }
        }
    }
}

impl<T: Transport> LedDevice for HidLink<T> {
    fn device_type(&self) -> DeviceType {
        self.profile.device_type
    }

    fn max_zones(&self) -> usize {
        self.profile.max_zones()
    }

    fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    fn emit(&self, event: LinkEvent) {
        trace!(?event, "Link event");
        // A dropped receiver means the owner is shutting down.
        let _ = self.events.send(event);
    }

    fn open(&mut self) {
        if self.transport.is_open() {
            self.close();
        }
        match self.transport.open() {
            Ok(()) => {
                info!(
                    device = %self.profile.device_type,
                    vendor_id = format_args!("{:04x}", self.profile.vendor_id),
                    product_id = format_args!("{:04x}", self.profile.product_id),
                    "Device opened"
                );
                self.emit(LinkEvent::OpenSucceeded(true));
                if let Some(version) = self.firmware_version(true) {
                    self.emit(LinkEvent::FirmwareVersion(version));
                }
            }
            Err(err) => {
                warn!(device = %self.profile.device_type, error = %err, "Failed to open device");
                self.emit(LinkEvent::OpenSucceeded(false));
            }
        }
    }

    fn close(&mut self) {
        if self.transport.is_open() {
            info!(device = %self.profile.device_type, "Closing device");
        }
        self.transport.close();
    }

    fn set_colors(&mut self, frame: &[Color]) {
        let max = self.profile.max_zones();
        if frame.len() > max {
            warn!(
                device = %self.profile.device_type,
                zones = frame.len(),
                max,
                "Rejecting oversized colour frame"
            );
            self.emit(LinkEvent::CommandCompleted(false));
            return;
        }

        self.saved_colors = frame.to_vec();
        let ok = self.send_saved_colors();
        self.emit(LinkEvent::CommandCompleted(ok));
    }

    fn switch_off_leds(&mut self) {
        let zones = if self.saved_colors.is_empty() {
            self.profile.max_zones()
        } else {
            self.saved_colors.len()
        };
        debug!(device = %self.profile.device_type, zones, "Switching LEDs off");
        self.set_colors(&black_frame(zones));
    }

    fn set_gamma(&mut self, gamma: f64) {
        self.corrector.set_gamma(gamma);
        self.refresh();
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.corrector.set_brightness(brightness);
        self.refresh();
    }

    fn request_firmware_version(&mut self) {
        match self.firmware_version(false) {
            Some(version) => self.emit(LinkEvent::FirmwareVersion(version)),
            None => warn!(device = %self.profile.device_type, "Could not read firmware version"),
        }
        self.emit(LinkEvent::CommandCompleted(true));
    }

    fn update_device_settings(&mut self) {
        protocol::encode_device_settings(&mut self.write_buffer);
        let ok = self.write_with_check();
        self.emit(LinkEvent::CommandCompleted(ok));
    }

    fn set_backlight_enabled(&mut self, enabled: bool) {
        self.backlight_enabled = enabled;
    }

    fn preset_correction(&mut self, corrector: ColorCorrector) {
        self.corrector = corrector;
    }

    fn ping(&mut self) {
        if !self.transport.is_open() {
            match self.transport.open() {
                Ok(()) => {
                    debug!(device = %self.profile.device_type, "Probe found device");
                    self.emit(LinkEvent::OpenSucceeded(true));
                    self.transport.close();
                }
                Err(err) => {
                    trace!(device = %self.profile.device_type, error = %err, "Probe found no device");
                    self.emit(LinkEvent::OpenSucceeded(false));
                }
            }
            return;
        }

        protocol::encode_ping(&mut self.write_buffer);
        match self.transport.write(&self.write_buffer) {
            Ok(_) => self.emit(LinkEvent::IoSucceeded(true)),
            Err(err) => {
                warn!(device = %self.profile.device_type, error = %err, "Ping failed, closing device");
                self.transport.close();
                self.emit(LinkEvent::IoSucceeded(false));
            }
        }
    }
}
