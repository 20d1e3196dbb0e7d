//! Integration tests for the HID link: report bytes and escalation.

use tokio::sync::mpsc;

use ledlink::color::Color;
use ledlink::command::Command;
use ledlink::device::mock::{MockTransport, TransportOp};
use ledlink::device::{DeviceType, HidLink, LedDevice, LinkEvent};
use ledlink::protocol::{CMD_PING, CMD_UPDATE_COLORS, DEVICE_SETTINGS_REPORT, WRITE_BUFFER_SIZE};

use crate::common::init_test_logging;

fn open_link(
    device_type: DeviceType,
    mock: &MockTransport,
) -> (HidLink<MockTransport>, mpsc::UnboundedReceiver<LinkEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let profile = device_type.hid_profile().expect("HID family");
    let mut link = HidLink::new(profile, mock.clone(), tx);
    link.open();
    while rx.try_recv().is_ok() {}
    mock.clear_ops();
    (link, rx)
}

fn completions(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> Vec<bool> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            LinkEvent::CommandCompleted(ok) => Some(ok),
            _ => None,
        })
        .collect()
}

#[test]
fn test_lightpack_frame_layout() {
    init_test_logging();
    let mock = MockTransport::new().with_input_report(&[0, 5, 8]);
    let (mut link, mut rx) = open_link(DeviceType::Lightpack, &mock);

    link.execute(&Command::SetGamma(1.0));
    link.execute(&Command::SetColors(vec![
        Color::new(0x10, 0x20, 0x30),
        Color::new(0xFF, 0x00, 0x80),
    ]));

    let report = mock.last_write().unwrap();
    assert_eq!(report.len(), WRITE_BUFFER_SIZE);
    assert_eq!(report[..2], [0x00, CMD_UPDATE_COLORS]);
    assert_eq!(report[2..8], [0x10, 0x20, 0x30, 0xFF, 0x00, 0x80]);
    assert!(report[8..].iter().all(|&b| b == 0));
    assert_eq!(completions(&mut rx), vec![true, true]);
}

#[test]
fn test_paintpack_frame_layout_uses_offset_three() {
    let mock = MockTransport::new();
    let (mut link, _rx) = open_link(DeviceType::Paintpack, &mock);

    link.execute(&Command::SetGamma(1.0));
    link.execute(&Command::SetColors(vec![Color::new(1, 2, 3)]));

    let report = mock.last_write().unwrap();
    assert_eq!(report[..3], [0x00, CMD_UPDATE_COLORS, 0x00]);
    assert_eq!(report[3..6], [1, 2, 3]);
}

#[test]
fn test_brightness_scales_resent_frame() {
    let mock = MockTransport::new();
    let (mut link, _rx) = open_link(DeviceType::Paintpack, &mock);
    link.execute(&Command::SetGamma(1.0));
    link.execute(&Command::SetColors(vec![Color::new(200, 100, 0)]));
    let before = mock.write_count();

    link.execute(&Command::SetBrightness(0));

    assert_eq!(mock.write_count(), before + 1);
    assert_eq!(mock.last_write().unwrap()[3..6], [0, 0, 0]);
    assert_eq!(link.saved_colors(), &[Color::new(200, 100, 0)]);
}

#[test]
fn test_device_settings_report() {
    let mock = MockTransport::new();
    let (mut link, mut rx) = open_link(DeviceType::Lightpack, &mock);

    link.execute(&Command::UpdateDeviceSettings);

    let report = mock.last_write().unwrap();
    assert_eq!(report[..DEVICE_SETTINGS_REPORT.len()], DEVICE_SETTINGS_REPORT);
    assert_eq!(completions(&mut rx), vec![true]);
}

#[test]
fn test_write_escalation_recovers_after_reopen() {
    let mock = MockTransport::new();
    let (mut link, mut rx) = open_link(DeviceType::Paintpack, &mock);
    mock.fail_next_writes(2);

    link.set_colors(&[Color::new(255, 255, 255)]);

    let ops = mock.ops();
    assert_eq!(mock.write_count(), 3);
    assert_eq!(mock.open_count(), 1);
    assert!(matches!(ops[0], TransportOp::Write { ok: false, .. }));
    assert!(matches!(ops[1], TransportOp::Write { ok: false, .. }));
    assert_eq!(ops[2], TransportOp::Close);
    assert_eq!(ops[3], TransportOp::Open { ok: true });
    assert!(matches!(ops[4], TransportOp::Write { ok: true, .. }));
    assert_eq!(completions(&mut rx), vec![true]);
}

#[test]
fn test_write_escalation_gives_up_when_device_is_gone() {
    let mock = MockTransport::new();
    let (mut link, mut rx) = open_link(DeviceType::Paintpack, &mock);
    mock.unplug();

    link.set_colors(&[Color::new(1, 1, 1)]);

    assert_eq!(mock.write_count(), 2);
    assert!(mock.ops().contains(&TransportOp::Open { ok: false }));
    assert!(!link.is_open());
    assert_eq!(completions(&mut rx), vec![false]);
}

#[test]
fn test_ping_report_and_failure() {
    let mock = MockTransport::new();
    let (mut link, mut rx) = open_link(DeviceType::Lightpack, &mock);

    link.ping();
    let report = mock.last_write().unwrap();
    assert_eq!(report[1], CMD_PING);
    assert!(report[2..].iter().all(|&b| b == 0));
    assert_eq!(rx.try_recv().unwrap(), LinkEvent::IoSucceeded(true));

    mock.unplug();
    link.ping();
    assert!(!link.is_open());
    assert_eq!(rx.try_recv().unwrap(), LinkEvent::IoSucceeded(false));
}

#[test]
fn test_lightpack_firmware_read() {
    let mock = MockTransport::new().with_input_report(&[0, 7, 2]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut link = HidLink::new(DeviceType::Lightpack.hid_profile().unwrap(), mock.clone(), tx);

    link.open();
    link.request_firmware_version();

    let versions: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            LinkEvent::FirmwareVersion(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(versions, vec!["7.2".to_string(), "7.2".to_string()]);
    assert_eq!(mock.read_count(), 2);
}
