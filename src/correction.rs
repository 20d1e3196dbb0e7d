//! Gamma and brightness correction applied right before transmission.
//!
//! Both stages are pure integer/float maps over a borrowed frame, so the
//! corrector can run on the device worker or on the caller side.

use crate::color::{Color, ColorFrame};

/// Smallest gamma the corrector will use. Non-finite or non-positive gamma
/// values are clamped up to this.
pub const MIN_GAMMA: f64 = 0.01;

/// Gamma a freshly created link starts with.
pub const DEFAULT_GAMMA: f64 = 2.0;

/// Brightness a freshly created link starts with, in percent.
pub const DEFAULT_BRIGHTNESS: u8 = 100;

/// Current gamma/brightness pair of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCorrector {
    gamma: f64,
    brightness: u8,
}

impl Default for ColorCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA, DEFAULT_BRIGHTNESS)
    }
}

impl ColorCorrector {
    #[must_use]
    pub fn new(gamma: f64, brightness: u8) -> Self {
        Self {
            gamma: sanitize_gamma(gamma),
            brightness: brightness.min(100),
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_gamma(&mut self, gamma: f64) {
        self.gamma = sanitize_gamma(gamma);
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness.min(100);
    }

    #[must_use]
    pub fn apply(&self, frame: &[Color]) -> ColorFrame {
        correct(frame, self.gamma, self.brightness)
    }
}

/// Run gamma then brightness correction over `frame`.
#[must_use]
pub fn correct(frame: &[Color], gamma: f64, brightness_percent: u8) -> ColorFrame {
    let gamma = sanitize_gamma(gamma);
    let brightness = brightness_percent.min(100);
    let channel = |v: u8| scale_brightness(gamma_channel(v, gamma), brightness);

    frame
        .iter()
        .map(|c| Color::new(channel(c.r), channel(c.g), channel(c.b)))
        .collect()
}

fn sanitize_gamma(gamma: f64) -> f64 {
    if gamma.is_finite() && gamma > MIN_GAMMA {
        gamma
    } else {
        MIN_GAMMA
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=255
fn gamma_channel(v: u8, gamma: f64) -> u8 {
    if (gamma - 1.0).abs() < f64::EPSILON {
        return v;
    }
    let normalized = f64::from(v) / 255.0;
    (255.0 * normalized.powf(gamma)).round().clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_possible_truncation)] // at most 255 * 100 / 100
fn scale_brightness(v: u8, brightness: u8) -> u8 {
    ((u16::from(v) * u16::from(brightness) + 50) / 100).min(255) as u8
}
