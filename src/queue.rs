//! Serialization of commands against a single device link.
//!
//! At most one command is in flight. Anything submitted while a command is
//! in flight waits here until the link reports completion.
//!
//! Pending commands are coalesced:
//!
//! - a pending command of the same kind is replaced in place by a newer one
//!   (only the latest value of each setting matters, and distinct kinds keep
//!   their relative order);
//! - `SwitchOff` drops every pending `SetColors`, since the frame would be
//!   blanked right after it.
//!
//! The in-flight command is never touched.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::command::{Command, CommandKind};

/// FIFO of pending commands plus the in-flight flag.
#[derive(Debug, Default)]
pub struct DeviceCommandQueue {
    pending: VecDeque<Command>,
    in_flight: bool,
}

impl DeviceCommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a command to the queue.
    ///
    /// Returns the command back when it must be dispatched right away, in
    /// which case the queue is now in flight.
    pub fn submit(&mut self, command: Command) -> Option<Command> {
        if command.kind() == CommandKind::SwitchOff {
            let before = self.pending.len();
            self.pending
                .retain(|pending| pending.kind() != CommandKind::SetColors);
            let dropped = before - self.pending.len();
            if dropped > 0 {
                debug!(dropped, "Switch-off preempted pending colour updates");
            }
        }

        if !self.in_flight {
            self.in_flight = true;
            trace!(command = command.name(), "Dispatching immediately");
            return Some(command);
        }

        if let Some(slot) = self
            .pending
            .iter_mut()
            .find(|pending| pending.kind() == command.kind())
        {
            trace!(command = command.name(), "Coalesced with pending command");
            *slot = command;
        } else {
            trace!(
                command = command.name(),
                depth = self.pending.len() + 1,
                "Queued behind in-flight command"
            );
            self.pending.push_back(command);
        }
        None
    }

    /// Record completion of the in-flight command.
    ///
    /// Returns the next command to dispatch, if any. `ok` is informational:
    /// a failed command never stops the queue.
    pub fn complete(&mut self, ok: bool) -> Option<Command> {
        if !self.in_flight {
            trace!(ok, "Ignoring completion with no command in flight");
            return None;
        }
        if !ok {
            debug!("Command failed, continuing with next");
        }

        self.in_flight = false;
        let next = self.pending.pop_front()?;
        self.in_flight = true;
        Some(next)
    }

    /// Drop all pending commands and forget the in-flight one.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "Discarding pending commands");
        }
        self.pending.clear();
        self.in_flight = false;
    }

    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True when nothing is in flight and nothing is waiting.
    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Command> {
        self.pending.iter()
    }
}
