/*
 *  config.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Application configuration: YAML file layered with CLI overrides
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so files and CLI
/// flags can be layered; the accessors below supply the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Writable state: device.json, generated images, uploads
    pub data_dir: Option<PathBuf>,
    /// Static plugin resources served under /images/<plugin_id>/
    pub plugins_dir: Option<PathBuf>,
    /// Optional directory of <lang>.json string tables
    pub locales_dir: Option<PathBuf>,
    /// Start the background refresh task (disable for development)
    pub refresh_enabled: Option<bool>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotate_deg: Option<u16>,
    pub driver: Option<DriverKind>, // <- strongly-typed driver selection
    /// Output target: PNG path for `file`, device node for `framebuffer`
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Mock,
    File,
    Framebuffer,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "inkpanel", about = "inkpanel e-ink display control panel", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plugins_dir: Option<PathBuf>,
    /// run without the background refresh task
    #[arg(long, action = ArgAction::SetTrue)]
    pub dev: bool,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub display_driver: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn listen_addr(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or("0.0.0.0"),
            self.port.unwrap_or(8080)
        )
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from("./data"))
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir.clone().unwrap_or_else(|| PathBuf::from("./plugins"))
    }

    pub fn device_config_path(&self) -> PathBuf {
        self.data_dir().join("device.json")
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled.unwrap_or(true)
    }

    pub fn display(&self) -> DisplayConfig {
        self.display.clone().unwrap_or_default()
    }
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Resolve the effective config for an already parsed command line.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli)?;

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/inkpanel/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/inkpanel/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/inkpanel.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["inkpanel.yaml", "config.yaml", "config/inkpanel.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()       { dst.log_level = src.log_level; }
    if src.host.is_some()            { dst.host = src.host; }
    if src.port.is_some()            { dst.port = src.port; }
    if src.data_dir.is_some()        { dst.data_dir = src.data_dir; }
    if src.plugins_dir.is_some()     { dst.plugins_dir = src.plugins_dir; }
    if src.locales_dir.is_some()     { dst.locales_dir = src.locales_dir; }
    if src.refresh_enabled.is_some() { dst.refresh_enabled = src.refresh_enabled; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()       { dst.width = src.width; }
    if src.height.is_some()      { dst.height = src.height; }
    if src.rotate_deg.is_some()  { dst.rotate_deg = src.rotate_deg; }
    if src.driver.is_some()      { dst.driver = src.driver; }
    if src.output.is_some()      { dst.output = src.output; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) -> Result<(), ConfigError> {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.host.is_some()        { cfg.host = cli.host.clone(); }
    if cli.port.is_some()        { cfg.port = cli.port; }
    if cli.data_dir.is_some()    { cfg.data_dir = cli.data_dir.clone(); }
    if cli.plugins_dir.is_some() { cfg.plugins_dir = cli.plugins_dir.clone(); }
    if cli.dev                   { cfg.refresh_enabled = Some(false); }

    // --dev keeps real hardware out of the loop unless a driver is named
    let driver = match cli.display_driver.as_deref() {
        None if cli.dev => Some(DriverKind::Mock),
        None => None,
        Some(name) => Some(parse_driver(name)?),
    };
    let any_display = cli.display_width.is_some()
        || cli.display_height.is_some()
        || driver.is_some();

    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()  { display.width = cli.display_width; }
        if cli.display_height.is_some() { display.height = cli.display_height; }
        if driver.is_some()             { display.driver = driver; }
    }
    Ok(())
}

fn parse_driver(name: &str) -> Result<DriverKind, ConfigError> {
    match name.to_lowercase().as_str() {
        "mock" => Ok(DriverKind::Mock),
        "file" => Ok(DriverKind::File),
        "framebuffer" | "fb" => Ok(DriverKind::Framebuffer),
        other => Err(ConfigError::Validation(format!("unknown display driver: {other}"))),
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.port == Some(0) {
        return Err(ConfigError::Validation("port must be > 0".into()));
    }
    if let Some(display) = cfg.display.as_ref() {
        if display.width == Some(0) || display.height == Some(0) {
            return Err(ConfigError::Validation("display width/height must be > 0".into()));
        }
        if let Some(rot) = display.rotate_deg {
            match rot {
                0 | 90 | 180 | 270 => {},
                _ => return Err(ConfigError::Validation("display rotate_deg must be 0|90|180|270".into()))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_then_cli_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: 9000\nlog_level: debug\ndisplay:\n  width: 640\n  driver: file").unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            port: Some(9100),
            display_height: Some(384),
            ..Default::default()
        };
        let cfg = load_from(&cli).unwrap();

        assert_eq!(cfg.port, Some(9100));
        assert_eq!(cfg.log_level(), "debug");
        let display = cfg.display();
        assert_eq!(display.width, Some(640));
        assert_eq!(display.height, Some(384));
        assert_eq!(display.driver, Some(DriverKind::File));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/inkpanel.yaml")),
            ..Default::default()
        };
        assert!(matches!(load_from(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation() {
        let mut cfg = Config::default();
        cfg.display = Some(DisplayConfig { rotate_deg: Some(45), ..Default::default() });
        assert!(validate(&cfg).is_err());

        cfg.display = Some(DisplayConfig { width: Some(0), ..Default::default() });
        assert!(validate(&cfg).is_err());

        cfg.display = Some(DisplayConfig { rotate_deg: Some(180), ..Default::default() });
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_dev_flag_disables_refresh() {
        let mut cfg = Config::default();
        cfg.display = Some(DisplayConfig { driver: Some(DriverKind::File), ..Default::default() });
        let cli = Cli { dev: true, ..Default::default() };
        apply_cli_overrides(&mut cfg, &cli).unwrap();
        assert!(!cfg.refresh_enabled());
        assert_eq!(cfg.display().driver, Some(DriverKind::Mock));

        let cli = Cli { dev: true, display_driver: Some("fb".into()), ..Default::default() };
        apply_cli_overrides(&mut cfg, &cli).unwrap();
        assert_eq!(cfg.display().driver, Some(DriverKind::Framebuffer));
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.device_config_path(), PathBuf::from("./data/device.json"));
        assert!(cfg.refresh_enabled());
    }
}
