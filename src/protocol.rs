//! HID report layout shared by the USB device families.
//!
//! Every output report is [`WRITE_BUFFER_SIZE`] bytes:
//!
//! | Byte | Meaning |
//! |------|---------|
//! | 0 | report id, always `0x00` |
//! | 1 | command |
//! | 2.. | reserved (zero) up to the family's colour offset |
//! | offset.. | `r g b` triplets, one per zone |

use crate::color::Color;

/// Output report size including the report id byte.
pub const WRITE_BUFFER_SIZE: usize = 33;
/// Input report size including the report id byte.
pub const READ_BUFFER_SIZE: usize = 33;

pub const INDEX_REPORT_ID: usize = 0;
pub const INDEX_COMMAND: usize = 1;

/// Firmware version bytes in an input report.
pub const INDEX_FW_VERSION_MAJOR: usize = 1;
pub const INDEX_FW_VERSION_MINOR: usize = 2;

pub const CMD_PING: u8 = 0x00;
pub const CMD_UPDATE_COLORS: u8 = 0x03;

/// Fixed configuration report sent by `update_device_settings`.
pub const DEVICE_SETTINGS_REPORT: [u8; 9] = [0x00, 0x0F, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

/// Timeout for a single input report read.
pub const READ_TIMEOUT_MS: i32 = 100;

pub type WriteBuffer = [u8; WRITE_BUFFER_SIZE];
pub type ReadBuffer = [u8; READ_BUFFER_SIZE];

/// How many zones fit after `color_offset`.
#[must_use]
pub const fn zone_capacity(color_offset: usize) -> usize {
    (WRITE_BUFFER_SIZE - color_offset) / 3
}

/// Write the report header, zeroing the reserved bytes before `data_offset`.
pub fn write_header(buf: &mut WriteBuffer, command: u8, data_offset: usize) {
    buf[INDEX_REPORT_ID] = 0x00;
    buf[INDEX_COMMAND] = command;
    let reserved_end = data_offset.clamp(INDEX_COMMAND + 1, WRITE_BUFFER_SIZE);
    buf[INDEX_COMMAND + 1..reserved_end].fill(0);
}

/// Encode an update-colours report.
///
/// Zones past the end of `frame` are zeroed so a shorter frame never leaves
/// stale colours behind. Zones that do not fit are silently cut; callers
/// check the length against the family limit first.
pub fn encode_colors(buf: &mut WriteBuffer, color_offset: usize, frame: &[Color]) {
    write_header(buf, CMD_UPDATE_COLORS, color_offset);
    let payload = &mut buf[color_offset..];
    payload.fill(0);
    for (chunk, color) in payload.chunks_exact_mut(3).zip(frame) {
        chunk.copy_from_slice(&[color.r, color.g, color.b]);
    }
}

/// Encode a keep-alive report: ping command, zero payload.
pub fn encode_ping(buf: &mut WriteBuffer) {
    buf.fill(0);
    buf[INDEX_COMMAND] = CMD_PING;
}

/// Encode the fixed device settings report.
pub fn encode_device_settings(buf: &mut WriteBuffer) {
    buf.fill(0);
    buf[..DEVICE_SETTINGS_REPORT.len()].copy_from_slice(&DEVICE_SETTINGS_REPORT);
}

/// `major.minor` from an input report.
#[must_use]
pub fn parse_firmware_version(report: &[u8]) -> Option<String> {
    let major = report.get(INDEX_FW_VERSION_MAJOR)?;
    let minor = report.get(INDEX_FW_VERSION_MINOR)?;
    Some(format!("{major}.{minor}"))
}
