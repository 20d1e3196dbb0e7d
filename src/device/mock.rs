//! Mock transport and device for testing without hardware.
//!
//! [`MockTransport`] sits under a real [`HidLink`](super::HidLink) and
//! records every open, close, write and read, with scripted failures.
//! [`MockDevice`] replaces the whole link and records the commands a
//! manager dispatches to it.
//!
//! Both are cheap clones over shared state, so a test can keep a handle
//! after the mock has been boxed and moved into a worker.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledlink::device::mock::{MockTransport, TransportOp};
//!
//! let mock = MockTransport::new();
//! let mut link = HidLink::new(profile, mock.clone(), events);
//! mock.fail_next_writes(2);
//! link.set_colors(&frame);
//!
//! assert_eq!(mock.write_count(), 3);
//! assert_eq!(mock.open_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::transport::Transport;
use super::{DeviceType, LedDevice, LinkEvent, LinkEvents};
use crate::color::Color;
use crate::command::Command;
use crate::error::{LinkError, Result};

/// Recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    Open { ok: bool },
    Close,
    Write { report: Vec<u8>, ok: bool },
    Read { ok: bool },
}

#[derive(Debug)]
struct TransportState {
    present: bool,
    open: bool,
    fail_writes: usize,
    fail_reads: usize,
    input_report: Vec<u8>,
    ops: Vec<TransportOp>,
}

/// Scriptable in-memory [`Transport`].
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A plugged-in device that has not been opened yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                present: true,
                open: false,
                fail_writes: 0,
                fail_reads: 0,
                input_report: Vec::new(),
                ops: Vec::new(),
            })),
        }
    }

    /// Start with the device absent: every open fails.
    #[must_use]
    pub fn unplugged(self) -> Self {
        self.unplug();
        self
    }

    /// Bytes returned by every successful read.
    #[must_use]
    pub fn with_input_report(self, report: &[u8]) -> Self {
        self.state().input_report = report.to_vec();
        self
    }

    // === Scripting ===

    /// Remove the device. An open handle stays open but all I/O fails.
    pub fn unplug(&self) {
        debug!("Mock transport unplugged");
        self.state().present = false;
    }

    pub fn plug_in(&self) {
        debug!("Mock transport plugged in");
        self.state().present = true;
    }

    /// Fail the next `n` writes.
    pub fn fail_next_writes(&self, n: usize) {
        self.state().fail_writes = n;
    }

    /// Fail the next `n` reads.
    pub fn fail_next_reads(&self, n: usize) {
        self.state().fail_reads = n;
    }

    // === Assertions ===

    /// All recorded operations.
    #[must_use]
    pub fn ops(&self) -> Vec<TransportOp> {
        self.state().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    /// Write attempts, failed ones included.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.count(|op| matches!(op, TransportOp::Write { .. }))
    }

    /// Read attempts, failed ones included.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.count(|op| matches!(op, TransportOp::Read { .. }))
    }

    /// Successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.count(|op| matches!(op, TransportOp::Open { ok: true }))
    }

    /// Last report handed to `write`, failed or not.
    #[must_use]
    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.state().ops.iter().rev().find_map(|op| match op {
            TransportOp::Write { report, .. } => Some(report.clone()),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&TransportOp) -> bool) -> usize {
        self.state().ops.iter().filter(|op| pred(op)).count()
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        let ok = state.present;
        state.open = ok;
        state.ops.push(TransportOp::Open { ok });
        trace!(ok, "Mock transport open");
        if ok {
            Ok(())
        } else {
            Err(LinkError::DeviceNotFound {
                device: "mock".to_string(),
                vendor_id: 0,
                product_id: 0,
            })
        }
    }

    fn close(&mut self) {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.ops.push(TransportOp::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn write(&mut self, report: &[u8]) -> Result<usize> {
        let mut state = self.state();
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        let ok = if state.fail_writes > 0 {
            state.fail_writes -= 1;
            false
        } else {
            state.present
        };
        state.ops.push(TransportOp::Write {
            report: report.to_vec(),
            ok,
        });
        if ok {
            Ok(report.len())
        } else {
            Err(LinkError::Transport("mock write failure".to_string()))
        }
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
        let mut state = self.state();
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        let ok = if state.fail_reads > 0 {
            state.fail_reads -= 1;
            false
        } else {
            state.present
        };
        state.ops.push(TransportOp::Read { ok });
        if !ok {
            return Err(LinkError::Transport("mock read failure".to_string()));
        }
        let len = state.input_report.len().min(buf.len());
        buf[..len].copy_from_slice(&state.input_report[..len]);
        Ok(len)
    }
}

/// Recorded [`MockDevice`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOp {
    Open,
    Close,
    Execute(Command),
    Ping,
    Backlight(bool),
}

#[derive(Debug)]
struct DeviceState {
    present: bool,
    open: bool,
    manual_completion: bool,
    ops: Vec<DeviceOp>,
    outstanding: VecDeque<Command>,
}

/// Shared view of a [`MockDevice`] that stays with the test.
#[derive(Debug, Clone)]
pub struct MockDeviceHandle {
    device_type: DeviceType,
    state: Arc<Mutex<DeviceState>>,
    events: LinkEvents,
}

/// Link stand-in that records what it is asked to do.
///
/// By default every command completes immediately with success. In manual
/// mode commands stay outstanding until [`MockDeviceHandle::complete`].
pub struct MockDevice {
    handle: MockDeviceHandle,
}

impl MockDevice {
    #[must_use]
    pub fn new(device_type: DeviceType, events: LinkEvents) -> Self {
        debug!(device = %device_type, "Creating mock device");
        Self {
            handle: MockDeviceHandle {
                device_type,
                state: Arc::new(Mutex::new(DeviceState {
                    present: true,
                    open: false,
                    manual_completion: false,
                    ops: Vec::new(),
                    outstanding: VecDeque::new(),
                })),
                events,
            },
        }
    }

    #[must_use]
    pub fn handle(&self) -> MockDeviceHandle {
        self.handle.clone()
    }

    fn record(&self, op: DeviceOp) {
        trace!(?op, "Recording operation");
        self.handle.state().ops.push(op);
    }

    fn finish(&self, command: Command) {
        let manual = {
            let mut state = self.handle.state();
            state.ops.push(DeviceOp::Execute(command.clone()));
            if state.manual_completion {
                state.outstanding.push_back(command.clone());
            }
            state.manual_completion
        };
        if let Command::RequestFirmwareVersion = command {
            self.emit(LinkEvent::FirmwareVersion("mock".to_string()));
        }
        if !manual {
            self.emit(LinkEvent::CommandCompleted(true));
        }
    }
}

impl LedDevice for MockDevice {
    fn device_type(&self) -> DeviceType {
        self.handle.device_type
    }

    fn is_open(&self) -> bool {
        self.handle.state().open
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self.handle.events.send(event);
    }

    fn open(&mut self) {
        self.record(DeviceOp::Open);
        let ok = {
            let mut state = self.handle.state();
            state.open = state.present;
            state.open
        };
        self.emit(LinkEvent::OpenSucceeded(ok));
    }

    fn close(&mut self) {
        self.record(DeviceOp::Close);
        self.handle.state().open = false;
    }

    fn set_colors(&mut self, frame: &[Color]) {
        self.finish(Command::SetColors(frame.to_vec()));
    }

    fn switch_off_leds(&mut self) {
        self.finish(Command::SwitchOff);
    }

    fn set_gamma(&mut self, gamma: f64) {
        self.finish(Command::SetGamma(gamma));
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.finish(Command::SetBrightness(brightness));
    }

    fn request_firmware_version(&mut self) {
        self.finish(Command::RequestFirmwareVersion);
    }

    fn update_device_settings(&mut self) {
        self.finish(Command::UpdateDeviceSettings);
    }

    fn set_refresh_delay(&mut self, value: u32) {
        self.finish(Command::SetRefreshDelay(value));
    }

    fn set_color_depth(&mut self, value: u32) {
        self.finish(Command::SetColorDepth(value));
    }

    fn set_smooth_slowdown(&mut self, value: u32) {
        self.finish(Command::SetSmoothSlowdown(value));
    }

    fn set_color_sequence(&mut self, value: &str) {
        self.finish(Command::SetColorSequence(value.to_string()));
    }

    fn set_backlight_enabled(&mut self, enabled: bool) {
        self.record(DeviceOp::Backlight(enabled));
    }

    fn ping(&mut self) {
        self.record(DeviceOp::Ping);
        let (open, present) = {
            let state = self.handle.state();
            (state.open, state.present)
        };
        if open {
            if !present {
                self.handle.state().open = false;
            }
            self.emit(LinkEvent::IoSucceeded(present));
        } else {
            self.emit(LinkEvent::OpenSucceeded(present));
        }
    }
}

impl MockDeviceHandle {
    /// Hold every command until [`complete`](Self::complete) is called.
    pub fn set_manual_completion(&self, manual: bool) {
        self.state().manual_completion = manual;
    }

    /// Finish the oldest outstanding command.
    ///
    /// Returns false when nothing was outstanding.
    pub fn complete(&self, ok: bool) -> bool {
        if self.state().outstanding.pop_front().is_none() {
            return false;
        }
        let _ = self.events.send(LinkEvent::CommandCompleted(ok));
        true
    }

    /// Commands dispatched but not yet completed in manual mode.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state().outstanding.len()
    }

    /// Make the device disappear. An open link notices on the next ping.
    pub fn unplug(&self) {
        self.state().present = false;
    }

    pub fn plug_in(&self) {
        self.state().present = true;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().open
    }

    #[must_use]
    pub fn operations(&self) -> Vec<DeviceOp> {
        self.state().ops.clone()
    }

    /// Only the executed commands, in dispatch order.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.state()
            .ops
            .iter()
            .filter_map(|op| match op {
                DeviceOp::Execute(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn ping_count(&self) -> usize {
        self.state()
            .ops
            .iter()
            .filter(|op| matches!(op, DeviceOp::Ping))
            .count()
    }

    pub fn clear_operations(&self) {
        self.state().ops.clear();
    }

    /// Assert the exact command sequence.
    ///
    /// # Panics
    ///
    /// Panics if the commands don't match.
    pub fn assert_commands(&self, expected: &[Command]) {
        let actual = self.commands();
        assert_eq!(
            actual, expected,
            "Command mismatch.\nExpected: {expected:#?}\nActual: {actual:#?}",
        );
    }

    /// Assert no commands were executed.
    ///
    /// # Panics
    ///
    /// Panics if any command was recorded.
    pub fn assert_no_commands(&self) {
        let commands = self.commands();
        assert!(
            commands.is_empty(),
            "Expected no commands, but found: {commands:#?}",
        );
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
