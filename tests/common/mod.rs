//! Common test utilities for ledlink.
//!
//! - `init_test_logging`: route tracing output through the test harness
//! - `mock_factory`: a link factory that hands out recorded mock devices
//! - `wait_until`: poll a condition while a worker thread catches up
#![allow(dead_code)]

pub mod env;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ledlink::config::Settings;
use ledlink::device::mock::{MockDevice, MockDeviceHandle};
use ledlink::manager::LinkFactory;
use tracing_subscriber::EnvFilter;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every mock device the factory has built, oldest first.
pub type Handles = Arc<Mutex<Vec<MockDeviceHandle>>>;

/// Factory producing [`MockDevice`]s. `present` decides whether the devices
/// are plugged in when first opened.
pub fn mock_factory(present: bool) -> (LinkFactory, Handles) {
    let handles: Handles = Arc::default();
    let shared = Arc::clone(&handles);
    let factory: LinkFactory = Box::new(move |device_type, events| {
        let device = MockDevice::new(device_type, events);
        let handle = device.handle();
        if !present {
            handle.unplug();
        }
        shared.lock().unwrap().push(handle);
        Box::new(device)
    });
    (factory, handles)
}

/// Most recently built device.
pub fn last(handles: &Handles) -> MockDeviceHandle {
    handles
        .lock()
        .unwrap()
        .last()
        .cloned()
        .expect("factory has not built a device yet")
}

/// Settings with keep-alive on and defaults everywhere else.
pub fn settings() -> Settings {
    Settings::default()
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
