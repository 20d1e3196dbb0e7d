//! Integration tests for command serialization and coalescing.

use ledlink::color::Color;
use ledlink::command::Command;
use ledlink::queue::DeviceCommandQueue;

fn frame(v: u8) -> Command {
    Command::SetColors(vec![Color::new(v, v, v); 4])
}

/// Drive the queue like a link that completes everything successfully,
/// returning the dispatch order.
fn drain(queue: &mut DeviceCommandQueue, first: Option<Command>) -> Vec<Command> {
    let mut dispatched: Vec<Command> = first.into_iter().collect();
    while let Some(next) = queue.complete(true) {
        dispatched.push(next);
    }
    dispatched
}

#[test]
fn test_frame_burst_keeps_only_latest_pending_frame() {
    let mut queue = DeviceCommandQueue::new();
    let first = queue.submit(frame(1));
    for v in 2..=20 {
        assert!(queue.submit(frame(v)).is_none());
    }
    assert_eq!(queue.len(), 1);

    assert_eq!(drain(&mut queue, first), vec![frame(1), frame(20)]);
    assert!(queue.is_idle());
}

#[test]
fn test_settings_interleaved_with_frames() {
    let mut queue = DeviceCommandQueue::new();
    let first = queue.submit(Command::SetGamma(2.2));
    queue.submit(frame(1));
    queue.submit(Command::SetBrightness(40));
    queue.submit(frame(2));
    queue.submit(Command::SetBrightness(60));
    queue.submit(Command::SetGamma(1.8));

    assert_eq!(
        drain(&mut queue, first),
        vec![
            Command::SetGamma(2.2),
            frame(2),
            Command::SetBrightness(60),
            Command::SetGamma(1.8),
        ]
    );
}

#[test]
fn test_switch_off_preempts_pending_frames_but_not_settings() {
    let mut queue = DeviceCommandQueue::new();
    let first = queue.submit(frame(9));
    queue.submit(Command::SetRefreshDelay(50));
    queue.submit(frame(10));
    queue.submit(Command::SwitchOff);

    assert_eq!(
        drain(&mut queue, first),
        vec![frame(9), Command::SetRefreshDelay(50), Command::SwitchOff]
    );
}

#[test]
fn test_failed_commands_do_not_stall_the_queue() {
    let mut queue = DeviceCommandQueue::new();
    queue.submit(Command::UpdateDeviceSettings);
    queue.submit(Command::RequestFirmwareVersion);
    queue.submit(frame(3));

    assert_eq!(queue.complete(false), Some(Command::RequestFirmwareVersion));
    assert_eq!(queue.complete(false), Some(frame(3)));
    assert_eq!(queue.complete(false), None);
    assert!(queue.is_idle());
    // Stray completion is ignored.
    assert_eq!(queue.complete(true), None);
    assert!(!queue.is_in_flight());
}

#[test]
fn test_clear_allows_immediate_dispatch() {
    let mut queue = DeviceCommandQueue::new();
    queue.submit(frame(1));
    queue.submit(frame(2));
    queue.clear();

    assert!(queue.is_idle());
    assert_eq!(queue.submit(frame(3)), Some(frame(3)));
}
