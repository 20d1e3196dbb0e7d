//! Integration tests for settings files and CLI settings resolution.

use clap::Parser;
use tempfile::TempDir;

use ledlink::cli::{Cli, Commands};
use ledlink::config::{self, ConfigFormat, ENV_CONFIG, Settings};
use ledlink::device::DeviceType;
use ledlink::error::LinkError;

use crate::common::env::EnvGuard;

#[test]
fn test_save_then_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/settings.toml");
    let settings = Settings {
        device_type: DeviceType::Lightpack,
        brightness: 35,
        keep_alive: false,
        ..Settings::default()
    };

    settings.save(&path).unwrap();

    assert_eq!(config::load_settings(&path).unwrap(), settings);
}

#[test]
fn test_save_then_load_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.yaml");
    let settings = Settings {
        color_sequence: "BRG".to_string(),
        ..Settings::default()
    };

    settings.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("color_sequence: BRG"));
    assert_eq!(config::load_settings(&path).unwrap(), settings);
}

#[test]
fn test_missing_file_is_config_not_found() {
    let dir = TempDir::new().unwrap();
    let err = config::load_settings(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, LinkError::ConfigNotFound { .. }));
    assert!(err.is_user_recoverable());
    assert!(err.suggestion().is_some());
}

#[test]
fn test_unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{}").unwrap();
    assert!(matches!(
        config::load_settings(&path),
        Err(LinkError::ConfigParse(_))
    ));
}

#[test]
fn test_partial_yaml_takes_defaults() {
    let settings =
        config::load_settings_from_str("device_type: lightpack\nbrightness: 20\n", ConfigFormat::Yaml)
            .unwrap();
    assert_eq!(settings.device_type, DeviceType::Lightpack);
    assert_eq!(settings.brightness, 20);
    assert_eq!(settings.refresh_delay, Settings::default().refresh_delay);
    assert_eq!(settings.hid, Settings::default().hid);
}

#[test]
fn test_config_path_from_environment() {
    let _guard = EnvGuard::set(ENV_CONFIG, "/tmp/ledlink-test.yaml");
    let cli = Cli::parse_from(["ledlink", "config", "--path"]);
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/tmp/ledlink-test.yaml"))
    );
    assert!(matches!(cli.command, Some(Commands::Config(ref args)) if args.path));
}

#[test]
fn test_flag_wins_over_environment() {
    let _guard = EnvGuard::set(ENV_CONFIG, "/tmp/from-env.toml");
    let cli = Cli::parse_from(["ledlink", "--config", "/tmp/from-flag.toml", "off"]);
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/tmp/from-flag.toml"))
    );
}

#[test]
fn test_unknown_device_is_a_parse_error() {
    let _guard = EnvGuard::remove("LEDLINK_DEVICE");
    assert!(Cli::try_parse_from(["ledlink", "--device", "adalight", "off"]).is_err());
    let cli = Cli::parse_from(["ledlink", "--device", "virtual", "off"]);
    assert_eq!(cli.device, Some(DeviceType::Virtual));
}
