//! Integration tests for the device manager worker.
//!
//! The worker runs on its own thread, so these tests wait on `wait_idle`
//! or poll the mock handles instead of stepping the worker directly.

use std::time::Duration;

use ledlink::color::Color;
use ledlink::command::Command;
use ledlink::config::Settings;
use ledlink::device::mock::{DeviceOp, MockTransport, TransportOp};
use ledlink::device::{BoxedLink, DeviceType, HidLink, Transport};
use ledlink::error::LinkError;
use ledlink::manager::{DeviceConfig, DeviceEvent, DeviceEvents, DeviceManager, LinkFactory};
use ledlink::protocol::CMD_UPDATE_COLORS;

use crate::common::{init_test_logging, last, mock_factory, settings, wait_until};

const FAST_PING: Duration = Duration::from_millis(20);
const PATIENCE: Duration = Duration::from_secs(5);

fn drain(events: &mut DeviceEvents) -> Vec<DeviceEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn replay(settings: &Settings) -> Vec<Command> {
    DeviceConfig::from_settings(settings).replay_commands(true)
}

#[tokio::test]
async fn test_commands_follow_startup_replay() {
    init_test_logging();
    let (factory, handles) = mock_factory(true);
    let settings = settings();
    let (manager, mut events) = DeviceManager::builder(settings.clone())
        .link_factory(factory)
        .start()
        .unwrap();

    let frame = vec![Color::new(1, 2, 3); 5];
    manager.set_brightness(40).unwrap();
    manager.set_colors(frame.clone()).unwrap();
    manager.wait_idle().await.unwrap();

    let mut expected = replay(&settings);
    expected.push(Command::SetBrightness(40));
    expected.push(Command::SetColors(frame));
    last(&handles).assert_commands(&expected);

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&DeviceEvent::OpenSucceeded(true)));
    let completed = events
        .iter()
        .filter(|e| **e == DeviceEvent::CommandCompleted(true))
        .count();
    assert_eq!(completed, expected.len());
}

#[test]
fn test_invalid_input_is_rejected_before_the_worker() {
    let (factory, handles) = mock_factory(true);
    let (manager, _events) = DeviceManager::builder(settings())
        .link_factory(factory)
        .start()
        .unwrap();

    assert!(matches!(
        manager.set_colors(vec![Color::BLACK; 9]),
        Err(LinkError::FrameTooLarge { len: 9, max: 8 })
    ));
    assert!(matches!(
        manager.set_gamma(0.0),
        Err(LinkError::InvalidGamma { .. })
    ));
    assert!(matches!(
        manager.set_brightness(101),
        Err(LinkError::InvalidBrightness { value: 101 })
    ));

    manager.shutdown();
    let commands = last(&handles).commands();
    assert_eq!(commands, replay(&settings()));
}

#[test]
fn test_invalid_settings_fail_to_start() {
    let settings = Settings {
        gamma: -1.0,
        ..Settings::default()
    };
    assert!(matches!(
        DeviceManager::start(&settings),
        Err(LinkError::InvalidGamma { .. })
    ));
}

#[tokio::test]
async fn test_recreate_link_switches_family() {
    let (factory, handles) = mock_factory(true);
    let (mut manager, _events) = DeviceManager::builder(settings())
        .link_factory(factory)
        .start()
        .unwrap();
    let old = last(&handles);

    manager.recreate_link(DeviceType::Lightpack).unwrap();
    manager.set_colors(vec![Color::new(9, 9, 9); 10]).unwrap();
    manager.wait_idle().await.unwrap();

    let status = manager.status().await.unwrap();
    assert_eq!(status.device_type, DeviceType::Lightpack);
    assert_eq!(manager.device_type(), DeviceType::Lightpack);
    assert_eq!(handles.lock().unwrap().len(), 2);
    assert!(old.operations().contains(&DeviceOp::Close));
    assert_eq!(
        last(&handles).commands().last(),
        Some(&Command::SetColors(vec![Color::new(9, 9, 9); 10]))
    );
}

#[tokio::test]
async fn test_switch_off_holds_frames_until_switch_on() {
    let (factory, handles) = mock_factory(true);
    let (manager, _events) = DeviceManager::builder(settings())
        .link_factory(factory)
        .start()
        .unwrap();
    let device = last(&handles);

    manager.set_colors(vec![Color::new(50, 0, 0); 3]).unwrap();
    manager.switch_off_leds().unwrap();
    manager.wait_idle().await.unwrap();
    assert_eq!(device.commands().last(), Some(&Command::SwitchOff));
    device.clear_operations();

    let held = vec![Color::new(0, 60, 0); 3];
    manager.set_colors(held.clone()).unwrap();
    manager.wait_idle().await.unwrap();
    device.assert_no_commands();

    manager.switch_on_leds().unwrap();
    manager.wait_idle().await.unwrap();
    device.assert_commands(&[Command::SetColors(held.clone())]);

    let status = manager.status().await.unwrap();
    assert!(status.backlight_enabled);
    assert_eq!(status.config.colors, held);
}

#[tokio::test]
async fn test_keep_alive_pings_and_can_be_disabled() {
    let (factory, handles) = mock_factory(true);
    let (manager, _events) = DeviceManager::builder(settings())
        .link_factory(factory)
        .ping_interval(FAST_PING)
        .start()
        .unwrap();
    let device = last(&handles);

    assert!(wait_until(PATIENCE, || device.ping_count() >= 3));

    manager.set_keep_alive(false).unwrap();
    let status = manager.status().await.unwrap();
    assert!(!status.keep_alive_armed);

    let pings = device.ping_count();
    std::thread::sleep(FAST_PING * 5);
    assert_eq!(device.ping_count(), pings);
}

#[test]
fn test_missing_device_is_replayed_when_it_appears() {
    init_test_logging();
    let (factory, handles) = mock_factory(false);
    let settings = settings();
    let (manager, mut events) = DeviceManager::builder(settings.clone())
        .link_factory(factory)
        .ping_interval(FAST_PING)
        .start()
        .unwrap();
    let device = last(&handles);

    assert!(wait_until(PATIENCE, || device.ping_count() >= 2));
    device.assert_no_commands();
    assert!(!device.is_open());

    device.plug_in();
    assert!(wait_until(PATIENCE, || device.commands() == replay(&settings)));
    assert!(device.is_open());
    manager.shutdown();

    let opens: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            DeviceEvent::OpenSucceeded(ok) => Some(ok),
            _ => None,
        })
        .collect();
    assert_eq!(opens.first(), Some(&false));
    assert!(opens.contains(&true));
}

#[test]
fn test_shutdown_closes_device() {
    let (factory, handles) = mock_factory(true);
    let (manager, _events) = DeviceManager::builder(settings())
        .link_factory(factory)
        .start()
        .unwrap();
    manager.shutdown();

    assert_eq!(last(&handles).operations().last(), Some(&DeviceOp::Close));
}

/// True once a successful colour report carrying `payload` was written.
/// Keep-alive pings may follow it, so `last_write` is not enough.
fn wrote_frame(transport: &MockTransport, payload: &[u8]) -> bool {
    transport.ops().iter().any(|op| match op {
        TransportOp::Write { report, ok: true } => {
            report[1] == CMD_UPDATE_COLORS && report[3..3 + payload.len()] == *payload
        }
        _ => false,
    })
}

fn transport_factory(transport: &MockTransport) -> LinkFactory {
    let transport = transport.clone();
    Box::new(move |device_type, events| -> BoxedLink {
        let profile = device_type.hid_profile().expect("HID family");
        Box::new(HidLink::new(profile, transport.clone(), events))
    })
}

#[tokio::test]
async fn test_hid_link_reconnects_after_unplug() {
    init_test_logging();
    let transport = MockTransport::new();
    let settings = Settings {
        gamma: 1.0,
        ..Settings::default()
    };
    let (manager, mut events) = DeviceManager::builder(settings)
        .link_factory(transport_factory(&transport))
        .ping_interval(FAST_PING)
        .start()
        .unwrap();

    let payload = [10, 20, 30, 40, 50, 60];
    manager
        .set_colors(vec![Color::new(10, 20, 30), Color::new(40, 50, 60)])
        .unwrap();
    manager.wait_idle().await.unwrap();
    assert!(wrote_frame(&transport, &payload));

    transport.unplug();
    assert!(wait_until(PATIENCE, || !transport.is_open()));

    transport.clear_ops();
    transport.plug_in();
    assert!(wait_until(PATIENCE, || {
        transport.open_count() >= 1 && wrote_frame(&transport, &payload)
    }));
    manager.shutdown();

    let health: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            DeviceEvent::LinkHealthChanged(ok) => Some(ok),
            _ => None,
        })
        .collect();
    assert!(health.contains(&false));
    assert_eq!(health.last(), Some(&true));
}

/// Colour payloads of every successful colour report, in write order.
fn colour_writes(transport: &MockTransport, zones: usize) -> Vec<Vec<u8>> {
    transport
        .ops()
        .into_iter()
        .filter_map(|op| match op {
            TransportOp::Write { report, ok: true } if report[1] == CMD_UPDATE_COLORS => {
                Some(report[3..3 + zones * 3].to_vec())
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_command_reopening_device_gets_saved_configuration() {
    init_test_logging();
    let transport = MockTransport::new().unplugged();
    let settings = Settings {
        gamma: 1.0,
        brightness: 50,
        keep_alive: false,
        ..Settings::default()
    };
    let (manager, mut events) = DeviceManager::builder(settings)
        .link_factory(transport_factory(&transport))
        .start()
        .unwrap();
    assert!(!manager.status().await.unwrap().open);

    // No keep-alive probe runs; the frame's own write reopens the device.
    transport.plug_in();
    manager.set_colors(vec![Color::new(200, 200, 200)]).unwrap();
    manager.wait_idle().await.unwrap();

    let frames = colour_writes(&transport, 1);
    assert!(frames.len() >= 3, "saved configuration was not replayed: {frames:?}");
    assert!(frames.iter().all(|frame| frame == &[100, 100, 100]), "{frames:?}");

    let status = manager.status().await.unwrap();
    assert!(status.open);
    assert_eq!(status.config.brightness, 50);
    manager.shutdown();

    let opens: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            DeviceEvent::OpenSucceeded(ok) => Some(ok),
            _ => None,
        })
        .collect();
    assert_eq!(opens, vec![false, true]);
}

#[tokio::test]
async fn test_keep_alive_reenabled_while_unplugged_finds_device() {
    init_test_logging();
    let transport = MockTransport::new().unplugged();
    let (manager, _events) = DeviceManager::builder(settings())
        .link_factory(transport_factory(&transport))
        .ping_interval(FAST_PING)
        .start()
        .unwrap();

    manager.set_keep_alive(false).unwrap();
    assert!(!manager.status().await.unwrap().keep_alive_armed);
    manager.set_keep_alive(true).unwrap();
    assert!(manager.status().await.unwrap().keep_alive_armed);

    transport.plug_in();
    assert!(wait_until(PATIENCE, || transport.is_open()));
    assert!(manager.status().await.unwrap().open);
    manager.shutdown();
}
