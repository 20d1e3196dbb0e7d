//! In-process device with no hardware behind it.
//!
//! Every frame is corrected exactly like a HID link would, then published
//! as [`LinkEvent::ColorsUpdated`] for previews and tests.

use tracing::{debug, info};

use super::{DeviceType, LedDevice, LinkEvent, LinkEvents};
use crate::color::{Color, ColorFrame, black_frame};
use crate::correction::ColorCorrector;

const FIRMWARE_NAME: &str = "virtual";

pub struct VirtualLink {
    events: LinkEvents,
    open: bool,
    corrector: ColorCorrector,
    saved_colors: ColorFrame,
    backlight_enabled: bool,
}

impl VirtualLink {
    #[must_use]
    pub fn new(events: LinkEvents) -> Self {
        Self {
            events,
            open: false,
            corrector: ColorCorrector::default(),
            saved_colors: Vec::new(),
            backlight_enabled: true,
        }
    }

    fn publish(&self) {
        self.emit(LinkEvent::ColorsUpdated(
            self.corrector.apply(&self.saved_colors),
        ));
    }

    fn refresh(&self) {
        if self.backlight_enabled && !self.saved_colors.is_empty() {
            self.publish();
        }
        self.emit(LinkEvent::CommandCompleted(true));
    }
}

impl LedDevice for VirtualLink {
    fn device_type(&self) -> DeviceType {
        DeviceType::Virtual
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    fn open(&mut self) {
        info!("Virtual device opened");
        self.open = true;
        self.emit(LinkEvent::OpenSucceeded(true));
        self.emit(LinkEvent::FirmwareVersion(FIRMWARE_NAME.to_string()));
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn set_colors(&mut self, frame: &[Color]) {
        if frame.len() > self.max_zones() {
            debug!(zones = frame.len(), "Rejecting oversized colour frame");
            self.emit(LinkEvent::CommandCompleted(false));
            return;
        }
        self.saved_colors = frame.to_vec();
        self.publish();
        self.emit(LinkEvent::CommandCompleted(true));
    }

    fn switch_off_leds(&mut self) {
        let zones = if self.saved_colors.is_empty() {
            self.max_zones()
        } else {
            self.saved_colors.len()
        };
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
        self.emit(LinkEvent::FirmwareVersion(FIRMWARE_NAME.to_string()));
        self.emit(LinkEvent::CommandCompleted(true));
    }

    fn set_backlight_enabled(&mut self, enabled: bool) {
        self.backlight_enabled = enabled;
    }

    fn preset_correction(&mut self, corrector: ColorCorrector) {
        self.corrector = corrector;
    }

    fn ping(&mut self) {
        // Always present: a closed virtual link answers like a probe that
        // found its device.
        if self.open {
            self.emit(LinkEvent::IoSucceeded(true));
        } else {
            self.emit(LinkEvent::OpenSucceeded(true));
        }
    }
}
