//! ledlink library - serialized command delivery to USB LED zone controllers.
//!
//! This library exposes the core of the `ledlink` CLI for use in tests and
//! by upstream frame producers such as screen grabbers.
//!
//! # Modules
//!
//! - `manager`: Per-device worker, command queue, config replay
//! - `device`: Device links (HID, virtual, mock) and the raw transport
//! - `correction`: Gamma and brightness correction
//! - `protocol`: HID report layout
//! - `config`: Settings file handling
//! - `error`: Error types with user-recoverable hints
#![forbid(unsafe_code)]

pub mod cli;
pub mod color;
pub mod command;
pub mod config;
pub mod correction;
pub mod device;
pub mod error;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod queue;
pub mod supervisor;

pub use color::{Color, ColorFrame};
pub use command::Command;
pub use device::DeviceType;
pub use error::{LinkError, Result};
pub use manager::{DeviceEvent, DeviceManager};
