//! Device manager: one worker thread per device.
//!
//! [`DeviceManager`] is a thin handle. Every call becomes a [`Request`] on
//! an unbounded channel to a dedicated thread running a current-thread
//! tokio runtime. That thread owns the link, the command queue, the
//! keep-alive supervisor and the saved configuration, so none of it is
//! ever locked.
//!
//! Link outcomes come back as [`LinkEvent`]s. The worker uses them to
//! advance the queue and rearm the keep-alive, and republishes them to the
//! caller as [`DeviceEvent`]s.

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::color::ColorFrame;
use crate::command::Command;
use crate::config::{HidSettings, Settings};
use crate::correction::ColorCorrector;
use crate::device::{self, BoxedLink, DeviceType, LinkEvent, LinkEvents};
use crate::error::{LinkError, Result};
use crate::queue::DeviceCommandQueue;
use crate::supervisor::{LinkSupervisor, PING_INTERVAL};

/// Builds a link for a device family. Called on the worker thread.
pub type LinkFactory = Box<dyn FnMut(DeviceType, LinkEvents) -> BoxedLink + Send>;

/// Factory for the real HID and virtual links.
#[must_use]
pub fn hid_link_factory(hid: HidSettings) -> LinkFactory {
    Box::new(move |device_type, events| device::create_link(device_type, &hid, events))
}

/// Saved device state, replayed onto every newly opened link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceConfig {
    pub colors: ColorFrame,
    pub refresh_delay: u32,
    pub color_depth: u32,
    pub smooth_slowdown: u32,
    pub gamma: f64,
    pub brightness: u8,
    pub color_sequence: String,
}

impl DeviceConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            colors: Vec::new(),
            refresh_delay: settings.refresh_delay,
            color_depth: settings.color_depth,
            smooth_slowdown: settings.smooth_slowdown,
            gamma: settings.gamma,
            brightness: settings.brightness,
            color_sequence: settings.color_sequence.clone(),
        }
    }

    /// Record the value a setter command carries.
    fn apply(&mut self, command: &Command) {
        match command {
            Command::SetColors(frame) => self.colors.clone_from(frame),
            Command::SetRefreshDelay(v) => self.refresh_delay = *v,
            Command::SetColorDepth(v) => self.color_depth = *v,
            Command::SetSmoothSlowdown(v) => self.smooth_slowdown = *v,
            Command::SetColorSequence(v) => self.color_sequence.clone_from(v),
            Command::SetGamma(v) => self.gamma = *v,
            Command::SetBrightness(v) => self.brightness = *v,
            Command::SwitchOff | Command::RequestFirmwareVersion | Command::UpdateDeviceSettings => {}
        }
    }

    /// Commands that bring a fresh link up to this state, in order.
    #[must_use]
    pub fn replay_commands(&self, backlight_enabled: bool) -> Vec<Command> {
        let mut commands = vec![
            Command::SetGamma(self.gamma),
            Command::SetBrightness(self.brightness),
            Command::SetRefreshDelay(self.refresh_delay),
            Command::SetColorDepth(self.color_depth),
            Command::SetSmoothSlowdown(self.smooth_slowdown),
            Command::SetColorSequence(self.color_sequence.clone()),
        ];
        if !backlight_enabled {
            commands.push(Command::SwitchOff);
        } else if !self.colors.is_empty() {
            commands.push(Command::SetColors(self.colors.clone()));
        }
        commands
    }
}

/// Notifications published by the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum DeviceEvent {
    OpenSucceeded(bool),
    /// I/O health flipped between working and failing.
    LinkHealthChanged(bool),
    FirmwareVersion(String),
    CommandCompleted(bool),
    ColorsUpdated(ColorFrame),
}

/// Receiving half of the manager's event stream.
pub type DeviceEvents = mpsc::UnboundedReceiver<DeviceEvent>;

/// Point-in-time view of the worker.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_type: DeviceType,
    pub open: bool,
    pub backlight_enabled: bool,
    pub keep_alive_armed: bool,
    pub in_flight: bool,
    pub pending: usize,
    pub config: DeviceConfig,
}

#[derive(Debug)]
enum Request {
    SetColors(ColorFrame),
    Setting(Command),
    SwitchOn,
    SwitchOff,
    RecreateLink(DeviceType),
    SetKeepAlive(bool),
    Status(oneshot::Sender<DeviceStatus>),
    WaitIdle(oneshot::Sender<()>),
    Shutdown,
}

/// Configures and starts a [`DeviceManager`].
pub struct DeviceManagerBuilder {
    settings: Settings,
    factory: Option<LinkFactory>,
    ping_interval: Duration,
}

impl DeviceManagerBuilder {
    /// Replace the HID link factory, e.g. with mock links.
    #[must_use]
    pub fn link_factory(mut self, factory: LinkFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use]
    pub const fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Spawn the worker thread, open the configured device and replay the
    /// saved configuration onto it.
    pub fn start(self) -> Result<(DeviceManager, DeviceEvents)> {
        self.settings.validate()?;

        let Self {
            settings,
            factory,
            ping_interval,
        } = self;
        let factory = factory.unwrap_or_else(|| hid_link_factory(settings.hid));
        let device_type = settings.device_type;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name("ledlink-device".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!(error = %err, "Failed to start device worker runtime");
                        return;
                    }
                };
                let mut worker = Worker::new(&settings, factory, event_tx, ping_interval);
                runtime.block_on(worker.run(request_rx));
            })?;

        info!(device = %device_type, "Device manager started");
        Ok((
            DeviceManager {
                requests: request_tx,
                device_type,
                worker: Some(worker),
            },
            event_rx,
        ))
    }
}

/// Handle to a device worker.
///
/// Dropping the handle stops the worker and closes the device.
pub struct DeviceManager {
    requests: mpsc::UnboundedSender<Request>,
    device_type: DeviceType,
    worker: Option<thread::JoinHandle<()>>,
}

impl DeviceManager {
    #[must_use]
    pub fn builder(settings: Settings) -> DeviceManagerBuilder {
        DeviceManagerBuilder {
            settings,
            factory: None,
            ping_interval: PING_INTERVAL,
        }
    }

    /// Start with the real HID backend.
    pub fn start(settings: &Settings) -> Result<(Self, DeviceEvents)> {
        Self::builder(settings.clone()).start()
    }

    pub const fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Submit a frame.
    ///
    /// Frames longer than the device supports are rejected here and never
    /// reach the worker.
    pub fn set_colors(&self, frame: ColorFrame) -> Result<()> {
        let max = self.device_type.max_zones();
        if frame.len() > max {
            return Err(LinkError::FrameTooLarge {
                len: frame.len(),
                max,
            });
        }
        self.send(Request::SetColors(frame))
    }

    pub fn switch_on_leds(&self) -> Result<()> {
        self.send(Request::SwitchOn)
    }

    pub fn switch_off_leds(&self) -> Result<()> {
        self.send(Request::SwitchOff)
    }

    pub fn set_gamma(&self, gamma: f64) -> Result<()> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(LinkError::InvalidGamma { value: gamma });
        }
        self.send(Request::Setting(Command::SetGamma(gamma)))
    }

    pub fn set_brightness(&self, brightness: u8) -> Result<()> {
        if brightness > 100 {
            return Err(LinkError::InvalidBrightness { value: brightness });
        }
        self.send(Request::Setting(Command::SetBrightness(brightness)))
    }

    pub fn set_refresh_delay(&self, value: u32) -> Result<()> {
        self.send(Request::Setting(Command::SetRefreshDelay(value)))
    }

    pub fn set_color_depth(&self, value: u32) -> Result<()> {
        self.send(Request::Setting(Command::SetColorDepth(value)))
    }

    pub fn set_smooth_slowdown(&self, value: u32) -> Result<()> {
        self.send(Request::Setting(Command::SetSmoothSlowdown(value)))
    }

    pub fn set_color_sequence(&self, value: impl Into<String>) -> Result<()> {
        self.send(Request::Setting(Command::SetColorSequence(value.into())))
    }

    pub fn request_firmware_version(&self) -> Result<()> {
        self.send(Request::Setting(Command::RequestFirmwareVersion))
    }

    pub fn update_device_settings(&self) -> Result<()> {
        self.send(Request::Setting(Command::UpdateDeviceSettings))
    }

    pub fn set_keep_alive(&self, enabled: bool) -> Result<()> {
        self.send(Request::SetKeepAlive(enabled))
    }

    /// Replace the link with one for `device_type`.
    ///
    /// Pending commands for the old link are discarded; the saved
    /// configuration is replayed onto the new one.
    pub fn recreate_link(&mut self, device_type: DeviceType) -> Result<()> {
        self.send(Request::RecreateLink(device_type))?;
        self.device_type = device_type;
        Ok(())
    }

    pub async fn status(&self) -> Result<DeviceStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Status(tx))?;
        rx.await.map_err(|_| LinkError::WorkerStopped)
    }

    /// Resolve once every submitted command has completed.
    pub async fn wait_idle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::WaitIdle(tx))?;
        rx.await.map_err(|_| LinkError::WorkerStopped)
    }

    /// Stop the worker and close the device.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| LinkError::WorkerStopped)
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.requests.send(Request::Shutdown);
        if worker.join().is_err() {
            error!("Device worker panicked");
        }
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread.
struct Worker {
    factory: LinkFactory,
    link: BoxedLink,
    queue: DeviceCommandQueue,
    supervisor: LinkSupervisor,
    config: DeviceConfig,
    backlight_enabled: bool,
    /// The current handle has not received the saved configuration.
    needs_replay: bool,
    link_health: Option<bool>,
    link_tx: LinkEvents,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    events: mpsc::UnboundedSender<DeviceEvent>,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl Worker {
    fn new(
        settings: &Settings,
        mut factory: LinkFactory,
        events: mpsc::UnboundedSender<DeviceEvent>,
        ping_interval: Duration,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let link = factory(settings.device_type, link_tx.clone());
        let mut worker = Self {
            factory,
            link,
            queue: DeviceCommandQueue::new(),
            supervisor: LinkSupervisor::new(ping_interval, settings.keep_alive),
            config: DeviceConfig::from_settings(settings),
            backlight_enabled: settings.backlight,
            needs_replay: true,
            link_health: None,
            link_tx,
            link_rx,
            events,
            idle_waiters: Vec::new(),
        };
        worker.attach();
        worker.pump();
        worker
    }

    async fn run(&mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        debug!("Device worker running");
        loop {
            let deadline = self.supervisor.deadline();
            tokio::select! {
                biased;
                request = requests.recv() => match request {
                    None | Some(Request::Shutdown) => break,
                    Some(request) => self.handle_request(request),
                },
                Some(event) = self.link_rx.recv() => self.handle_link_event(event),
                () = sleep_until(deadline) => self.keep_alive_tick(Instant::now()),
            }
            self.pump();
        }
        self.link.close();
        info!(device = %self.link.device_type(), "Device worker stopped");
    }

    fn handle_request(&mut self, request: Request) {
        trace!(?request, "Handling request");
        match request {
            Request::SetColors(frame) => {
                let max = self.link.max_zones();
                if frame.len() > max {
                    warn!(zones = frame.len(), max, "Dropping frame too large for current device");
                    return;
                }
                let command = Command::SetColors(frame);
                self.config.apply(&command);
                if self.backlight_enabled {
                    self.submit(command);
                } else {
                    trace!("Backlight off, frame saved only");
                }
            }
            Request::Setting(command) => {
                self.config.apply(&command);
                self.submit(command);
            }
            Request::SwitchOn => {
                info!("Switching LEDs on");
                self.set_backlight(true);
                self.supervisor.restart(true, Instant::now());
                if !self.config.colors.is_empty() {
                    self.submit(Command::SetColors(self.config.colors.clone()));
                }
            }
            Request::SwitchOff => {
                info!("Switching LEDs off");
                self.set_backlight(false);
                self.supervisor.stop();
                self.submit(Command::SwitchOff);
            }
            Request::RecreateLink(device_type) => self.recreate_link(device_type),
            Request::SetKeepAlive(enabled) => {
                self.supervisor.set_keep_alive(enabled);
                self.supervisor.restart(self.backlight_enabled, Instant::now());
            }
            Request::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Request::WaitIdle(reply) => self.idle_waiters.push(reply),
            Request::Shutdown => {}
        }
    }

    fn set_backlight(&mut self, enabled: bool) {
        self.backlight_enabled = enabled;
        self.link.set_backlight_enabled(enabled);
    }

    fn submit(&mut self, command: Command) {
        if let Some(command) = self.queue.submit(command) {
            self.dispatch(&command);
        }
    }

    fn dispatch(&mut self, command: &Command) {
        debug!(command = command.name(), "Dispatching command");
        self.link.execute(command);
    }

    /// Handle every link event already queued, including those raised while
    /// handling earlier ones. Then answer idle waiters.
    fn pump(&mut self) {
        while let Ok(event) = self.link_rx.try_recv() {
            self.handle_link_event(event);
        }
        if self.queue.is_idle() && !self.idle_waiters.is_empty() {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        trace!(?event, "Link event");
        match event {
            LinkEvent::CommandCompleted(ok) => {
                self.publish(DeviceEvent::CommandCompleted(ok));
                if let Some(next) = self.queue.complete(ok) {
                    self.dispatch(&next);
                }
            }
            LinkEvent::OpenSucceeded(ok) => {
                self.publish(DeviceEvent::OpenSucceeded(ok));
                self.supervisor.restart(self.backlight_enabled, Instant::now());
                if !ok {
                    self.needs_replay = true;
                } else if !self.link.is_open() {
                    info!(device = %self.link.device_type(), "Device is back, reopening");
                    self.attach();
                } else if self.needs_replay {
                    // The link reopened itself while retrying a command.
                    info!(device = %self.link.device_type(), "Device reopened");
                    self.replay();
                }
            }
            LinkEvent::IoSucceeded(ok) => {
                if !ok && !self.link.is_open() {
                    self.needs_replay = true;
                }
                self.supervisor.restart(self.backlight_enabled, Instant::now());
                if self.link_health != Some(ok) {
                    self.link_health = Some(ok);
                    self.publish(DeviceEvent::LinkHealthChanged(ok));
                }
            }
            LinkEvent::FirmwareVersion(version) => {
                debug!(%version, "Firmware version");
                self.publish(DeviceEvent::FirmwareVersion(version));
            }
            LinkEvent::ColorsUpdated(frame) => self.publish(DeviceEvent::ColorsUpdated(frame)),
        }
    }

    fn keep_alive_tick(&mut self, now: Instant) {
        if !self.supervisor.fire(now) {
            return;
        }
        if self.queue.is_in_flight() {
            trace!("Command in flight, skipping keep-alive");
            return;
        }
        trace!("Keep-alive tick");
        self.link.ping();
    }

    /// Open the current link and replay the saved configuration onto it.
    fn attach(&mut self) {
        self.link.set_backlight_enabled(self.backlight_enabled);
        self.link
            .preset_correction(ColorCorrector::new(self.config.gamma, self.config.brightness));
        self.link.open();
        if self.link.is_open() {
            self.replay();
        } else {
            self.needs_replay = true;
            warn!(
                device = %self.link.device_type(),
                "Device not available; configuration will be replayed when it appears"
            );
        }
        self.supervisor.restart(self.backlight_enabled, Instant::now());
    }

    fn replay(&mut self) {
        let commands = self.config.replay_commands(self.backlight_enabled);
        debug!(commands = commands.len(), "Replaying saved configuration");
        self.needs_replay = false;
        for command in commands {
            self.submit(command);
        }
    }

    fn recreate_link(&mut self, device_type: DeviceType) {
        info!(from = %self.link.device_type(), to = %device_type, "Recreating device link");
        self.link.close();
        self.queue.clear();
        self.supervisor.stop();

        // Drop the old link before building the new one so the two never
        // hold the same device at once.
        let placeholder: BoxedLink = Box::new(device::VirtualLink::new(self.link_tx.clone()));
        drop(std::mem::replace(&mut self.link, placeholder));
        while self.link_rx.try_recv().is_ok() {}

        self.link = (self.factory)(device_type, self.link_tx.clone());
        self.link_health = None;
        self.attach();
    }

    fn status(&self) -> DeviceStatus {
        DeviceStatus {
            device_type: self.link.device_type(),
            open: self.link.is_open(),
            backlight_enabled: self.backlight_enabled,
            keep_alive_armed: self.supervisor.is_armed(),
            in_flight: self.queue.is_in_flight(),
            pending: self.queue.len(),
            config: self.config.clone(),
        }
    }

    fn publish(&self, event: DeviceEvent) {
        let _ = self.events.send(event);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
