//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::device::DeviceType;

/// ledlink - drive ambient-light LED controllers over USB HID.
///
/// Robot Mode: Use --robot or --json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "ledlink", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "LEDLINK_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Shorthand for --format=json
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Settings file (TOML or YAML)
    #[arg(long, short = 'c', global = true, env = "LEDLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device family, overriding the settings file
    #[arg(long, short = 'd', global = true, env = "LEDLINK_DEVICE")]
    pub device: Option<DeviceType>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON.
    pub const fn use_json(&self) -> bool {
        self.robot
            || self.json
            || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Discovery ===
    /// List connected LED controllers
    List(ListArgs),

    /// Query the firmware version of the configured device
    Firmware,

    // === Output ===
    /// Send one colour frame (one hex colour per zone)
    Set(SetArgs),

    /// Switch all LEDs off
    Off,

    /// Read frames from stdin, one line of hex colours per frame
    Stream(StreamArgs),

    // === Configuration ===
    /// Show effective settings
    Config(ConfigArgs),

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Include HID devices that are not known LED controllers
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Correction overrides applied before any frame is sent.
#[derive(Parser, Debug, Default)]
pub struct CorrectionArgs {
    /// Gamma exponent (> 0)
    #[arg(long, short = 'g')]
    pub gamma: Option<f64>,

    /// Brightness percent (0-100)
    #[arg(long, short = 'b')]
    pub brightness: Option<u8>,
}

#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Zone colours in hex (e.g. ff0000 00ff00 "#0000ff")
    #[arg(required = true)]
    pub colors: Vec<String>,

    #[command(flatten)]
    pub correction: CorrectionArgs,
}

#[derive(Parser, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub correction: CorrectionArgs,

    /// Switch LEDs off when input ends
    #[arg(long)]
    pub off_at_end: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show configuration file path
    #[arg(long)]
    pub path: bool,

    /// Write a settings file with the current values
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing settings file with --init
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
