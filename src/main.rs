//! ledlink - LED zone controller CLI.
//!
//! Each device command starts a [`DeviceManager`], submits its commands,
//! waits for the worker to go idle and reports what the device said.

use clap::Parser;
use console::style;
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal};

use ledlink::cli::{self, Cli, Commands};
use ledlink::color::{self, Color, ColorFrame};
use ledlink::config::{self, Settings};
use ledlink::device::{self, DeviceType};
use ledlink::error::{LinkError, Result, ResultExt};
use ledlink::logging;
use ledlink::manager::{DeviceEvent, DeviceEvents, DeviceManager};

/// Build metadata embedded by `build.rs`.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> bool {
        option_env!("VERGEN_GIT_DIRTY") == Some("true")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    logging::init_logging(cli.use_json(), cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::List(args)) => cmd_list(cli, args),
        Some(Commands::Firmware) => cmd_firmware(cli),
        Some(Commands::Set(args)) => cmd_set(cli, args),
        Some(Commands::Off) => cmd_off(cli),
        Some(Commands::Stream(args)) => cmd_stream(cli, args),
        Some(Commands::Config(args)) => cmd_config(cli, args),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(args),
    }
}

// === Quick Start ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "tool": "ledlink",
                "version": build_info::VERSION,
                "description": "Drive USB LED zone controllers (Paintpack, Lightpack)",
                "commands": {
                    "list_devices": "ledlink list --robot",
                    "set_frame": "ledlink set <HEX> [<HEX>...]",
                    "switch_off": "ledlink off",
                    "stream_frames": "ledlink stream < frames.txt",
                    "firmware": "ledlink firmware --robot",
                },
                "devices": DeviceType::ALL.map(DeviceType::as_str),
                "output_modes": {
                    "human": "--format=text (default)",
                    "robot": "--robot or --format=json",
                    "compact": "--format=json-compact",
                },
            }),
        );
    } else {
        println!(
            "{} {} - LED zone controller CLI\n",
            style("ledlink").bold().cyan(),
            build_info::VERSION
        );
        println!("{}", style("Usage:").bold());
        println!("  ledlink list                    List connected controllers");
        println!("  ledlink set ff0000 00ff00       Send one frame");
        println!("  ledlink off                     Switch LEDs off");
        println!("  ledlink stream < frames.txt     One frame per input line");
        println!("  ledlink firmware                Query firmware version");
        println!();
        println!("Use {} for machine-readable output.", style("--robot").green());
    }
    Ok(())
}

// === Settings ===

/// Effective settings: explicit file, else the default file if present,
/// else built-in defaults. `--device` wins over all of them.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => config::load_settings(&config::resolve_path(path)?)?,
        None => {
            let path = config::default_settings_path()?;
            if path.exists() {
                config::load_settings(&path)?
            } else {
                tracing::debug!("No settings file, using defaults");
                Settings::default()
            }
        }
    };
    if let Some(device_type) = cli.device {
        settings.device_type = device_type;
    }
    Ok(settings)
}

// === Device session ===

/// What the worker reported while a command ran.
#[derive(Debug, Default, Serialize)]
struct SessionReport {
    device: String,
    opened: bool,
    firmware: Option<String>,
    completed: usize,
    failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame: Option<Vec<String>>,
}

impl SessionReport {
    fn record(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::OpenSucceeded(ok) => self.opened |= ok,
            DeviceEvent::FirmwareVersion(version) => self.firmware = Some(version),
            DeviceEvent::CommandCompleted(true) => self.completed += 1,
            DeviceEvent::CommandCompleted(false) => self.failed += 1,
            DeviceEvent::ColorsUpdated(frame) => {
                self.last_frame = Some(frame.iter().map(|c| c.to_hex()).collect());
            }
            DeviceEvent::LinkHealthChanged(ok) => {
                tracing::debug!(ok, "Link health changed");
            }
        }
    }
}

struct Session {
    settings: Settings,
    manager: DeviceManager,
    events: DeviceEvents,
    runtime: tokio::runtime::Runtime,
}

impl Session {
    fn start(cli: &Cli) -> Result<Self> {
        let settings = load_settings(cli)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (manager, events) = DeviceManager::start(&settings)?;
        Ok(Self {
            settings,
            manager,
            events,
            runtime,
        })
    }

    fn apply_correction(&self, args: &cli::CorrectionArgs) -> Result<()> {
        if let Some(gamma) = args.gamma {
            self.manager.set_gamma(gamma)?;
        }
        if let Some(brightness) = args.brightness {
            self.manager.set_brightness(brightness)?;
        }
        Ok(())
    }

    /// Wait for every submitted command, then stop the worker.
    fn finish(mut self) -> Result<SessionReport> {
        self.runtime.block_on(self.manager.wait_idle())?;

        let mut report = SessionReport {
            device: self.settings.device_type.to_string(),
            ..SessionReport::default()
        };
        while let Ok(event) = self.events.try_recv() {
            report.record(event);
        }
        self.manager.shutdown();

        if !report.opened {
            let device_type = self.settings.device_type;
            return Err(match device_type.hid_profile() {
                Some(profile) => {
                    let profile =
                        profile.with_ids(self.settings.hid.vendor_id, self.settings.hid.product_id);
                    LinkError::DeviceNotFound {
                        device: device_type.display_name().to_string(),
                        vendor_id: profile.vendor_id,
                        product_id: profile.product_id,
                    }
                }
                None => LinkError::DeviceOpenFailed {
                    device: device_type.display_name().to_string(),
                    reason: "open failed".to_string(),
                },
            });
        }
        Ok(report)
    }
}

// === Commands ===

fn cmd_list(cli: &Cli, args: &cli::ListArgs) -> Result<()> {
    let devices = device::list_devices(args.all)?;

    if cli.use_json() {
        output_json(cli, &devices);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No LED controllers found.");
        return Ok(());
    }
    for dev in &devices {
        let family = dev
            .device_type
            .map_or_else(|| "unknown".to_string(), |t| t.display_name().to_string());
        println!(
            "{} {:04x}:{:04x}  {}",
            style(family).bold().cyan(),
            dev.vendor_id,
            dev.product_id,
            dev.product.as_deref().unwrap_or("-")
        );
        if let Some(serial) = &dev.serial {
            println!("  serial: {serial}");
        }
        println!("  path:   {}", style(&dev.path).dim());
    }
    Ok(())
}

fn cmd_firmware(cli: &Cli) -> Result<()> {
    let session = Session::start(cli)?;
    session.manager.request_firmware_version()?;
    let report = session.finish()?;

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "device": report.device,
                "firmware": report.firmware,
            }),
        );
    } else {
        println!(
            "{}: {}",
            report.device,
            report.firmware.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn cmd_set(cli: &Cli, args: &cli::SetArgs) -> Result<()> {
    let frame = args
        .colors
        .iter()
        .map(|c| Color::from_hex(c))
        .collect::<Result<ColorFrame>>()?;

    let session = Session::start(cli)?;
    session.apply_correction(&args.correction)?;
    session.manager.set_colors(frame.clone())?;
    let report = session.finish()?;
    check_failures(&report)?;

    if cli.use_json() {
        output_json(cli, &report);
    } else {
        println!(
            "{} {} zone(s) on {}",
            style("✓").green(),
            frame.len(),
            report.device
        );
    }
    Ok(())
}

fn cmd_off(cli: &Cli) -> Result<()> {
    let session = Session::start(cli)?;
    session.manager.switch_off_leds()?;
    let report = session.finish()?;
    check_failures(&report)?;

    if cli.use_json() {
        output_json(cli, &report);
    } else {
        println!("{} LEDs off on {}", style("✓").green(), report.device);
    }
    Ok(())
}

#[derive(Serialize)]
struct StreamSummary {
    frames: usize,
    rejected: usize,
    #[serde(flatten)]
    report: SessionReport,
}

fn cmd_stream(cli: &Cli, args: &cli::StreamArgs) -> Result<()> {
    let session = Session::start(cli)?;
    session.apply_correction(&args.correction)?;

    let mut frames = 0;
    let mut rejected = 0;
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of stdin", index + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let sent = color::parse_frame(line).and_then(|frame| session.manager.set_colors(frame));
        match sent {
            Ok(()) => frames += 1,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping frame");
                rejected += 1;
            }
        }
    }
    if args.off_at_end {
        session.manager.switch_off_leds()?;
    }

    let report = session.finish()?;
    if cli.use_json() {
        output_json(
            cli,
            &StreamSummary {
                frames,
                rejected,
                report,
            },
        );
    } else {
        println!(
            "{} frame(s) sent, {} rejected, {} command(s) failed",
            frames, rejected, report.failed
        );
    }
    Ok(())
}

fn cmd_config(cli: &Cli, args: &cli::ConfigArgs) -> Result<()> {
    let path = match &cli.config {
        Some(path) => config::resolve_path(path)?,
        None => config::default_settings_path()?,
    };

    if args.path {
        if cli.use_json() {
            output_json(
                cli,
                &serde_json::json!({ "path": path, "exists": path.exists() }),
            );
        } else {
            println!("{}", path.display());
        }
        return Ok(());
    }

    if args.init {
        if path.exists() && !args.force {
            return Err(LinkError::ConfigInvalid(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        let mut settings = Settings::default();
        if let Some(device_type) = cli.device {
            settings.device_type = device_type;
        }
        settings.save(&path)?;
        if cli.use_json() {
            output_json(cli, &serde_json::json!({ "created": path }));
        } else {
            println!("{} Wrote {}", style("✓").green(), path.display());
        }
        return Ok(());
    }

    let settings = load_settings(cli)?;
    if cli.use_json() {
        output_json(cli, &settings);
    } else {
        print!("{}", settings.to_string_for(config::ConfigFormat::Toml)?);
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty(),
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    } else {
        println!("ledlink {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() { " (dirty)" } else { "" }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "ledlink", &mut io::stdout());
    Ok(())
}

// === Utility Functions ===

fn check_failures(report: &SessionReport) -> Result<()> {
    if report.failed > 0 {
        return Err(LinkError::Transport(format!(
            "{} command(s) failed on {}",
            report.failed, report.device
        )));
    }
    Ok(())
}

fn output_json<T: Serialize>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn output_error(cli: &Cli, error: &LinkError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
            "connection": error.is_connection_error(),
        });
        eprintln!("{json:#}");
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
