/*
 *  device_config.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Persisted device configuration: settings, playlists, last refresh
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

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locale::DEFAULT_LANGUAGE;
use crate::playlist::PlaylistManager;

#[derive(Debug, Error)]
pub enum DeviceConfigError {
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed device config {path}: {source}")]
    Json { path: String, source: serde_json::Error },
    #[error("unknown timezone '{0}'")]
    Timezone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "12h")]
    H12,
}

/// How a plugin's image is fitted to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageSetting {
    KeepWidth,
    KeepHeight,
    Fit,
}

/// Static description of an installed plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub image_settings: Vec<ImageSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshType {
    #[serde(rename = "Manual Update")]
    Manual,
    #[serde(rename = "Playlist")]
    Playlist,
}

/// What was last pushed to the display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshInfo {
    pub refresh_type: RefreshType,
    pub plugin_id: Option<String>,
    pub playlist: Option<String>,
    pub plugin_instance: Option<String>,
    pub refresh_time: Option<DateTime<Utc>>,
    pub image_hash: Option<String>,
}

/// Device settings a plugin needs while rendering, detached from the lock.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub timezone: Tz,
    pub time_format: TimeFormat,
    pub orientation: Orientation,
    pub resolution: (u32, u32),
    pub language: String,
}

impl DeviceContext {
    /// Canvas size plugins draw on; vertical panels are drawn portrait.
    pub fn dimensions(&self) -> (u32, u32) {
        let (w, h) = self.resolution;
        match self.orientation {
            Orientation::Horizontal => (w, h),
            Orientation::Vertical => (h, w),
        }
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            time_format: TimeFormat::H24,
            orientation: Orientation::Horizontal,
            resolution: (800, 480),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

fn default_name() -> String { "inkpanel".to_string() }
fn default_timezone() -> String { "America/New_York".to_string() }
fn default_time_format() -> TimeFormat { TimeFormat::H24 }
fn default_orientation() -> Orientation { Orientation::Horizontal }
fn default_resolution() -> [u32; 2] { [800, 480] }
fn default_cycle() -> u64 { 3600 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_time_format")]
    pub time_format: TimeFormat,
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub inverted_image: bool,
    #[serde(default = "default_cycle")]
    pub plugin_cycle_interval_seconds: u64,
    #[serde(default)]
    pub playlist_config: PlaylistManager,
    #[serde(default)]
    pub refresh_info: Option<RefreshInfo>,

    #[serde(skip)]
    config_file: PathBuf,
    #[serde(skip)]
    pub plugin_image_dir: PathBuf,
    #[serde(skip)]
    pub current_image_file: PathBuf,
    #[serde(skip)]
    pub upload_dir: PathBuf,
    #[serde(skip)]
    plugins: Vec<PluginConfig>,
}

impl DeviceConfig {
    /// Read `path`, or start from defaults when it does not exist yet.
    /// Generated images live under `data_dir`.
    pub fn load(path: &Path, data_dir: &Path, plugins: Vec<PluginConfig>) -> Result<Self, DeviceConfigError> {
        let mut cfg: DeviceConfig = if path.exists() {
            let s = fs::read_to_string(path).map_err(|source| DeviceConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&s).map_err(|source| DeviceConfigError::Json {
                path: path.display().to_string(),
                source,
            })?
        } else {
            info!("no device config at {}, starting from defaults", path.display());
            serde_json::from_str("{}").map_err(|source| DeviceConfigError::Json {
                path: path.display().to_string(),
                source,
            })?
        };

        if cfg.tz().is_err() {
            warn!("unknown timezone '{}', using {}", cfg.timezone, default_timezone());
            cfg.timezone = default_timezone();
        }

        cfg.config_file = path.to_path_buf();
        cfg.plugin_image_dir = data_dir.join("plugins");
        cfg.current_image_file = data_dir.join("current_image.png");
        cfg.upload_dir = data_dir.join("uploads");
        cfg.plugins = plugins;

        for dir in [&cfg.plugin_image_dir, &cfg.upload_dir] {
            fs::create_dir_all(dir).map_err(|source| DeviceConfigError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(cfg)
    }

    /// Persist to disk via write-then-rename so readers never see a torn file.
    pub async fn write_config(&self) -> Result<(), DeviceConfigError> {
        let io_err = |source| DeviceConfigError::Io {
            path: self.config_file.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|source| DeviceConfigError::Json {
            path: self.config_file.display().to_string(),
            source,
        })?;
        if let Some(parent) = self.config_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }
        let tmp = self.config_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.config_file).await.map_err(io_err)?;
        Ok(())
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// String view of a top-level setting, as the settings page shows it.
    pub fn get_config(&self, key: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        match value.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn tz(&self) -> Result<Tz, DeviceConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| DeviceConfigError::Timezone(self.timezone.clone()))
    }

    pub fn get_resolution(&self) -> (u32, u32) {
        (self.resolution[0], self.resolution[1])
    }

    pub fn get_plugin(&self, plugin_id: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|p| p.id == plugin_id)
    }

    pub fn plugins(&self) -> &[PluginConfig] {
        &self.plugins
    }

    pub fn get_playlist_manager(&self) -> &PlaylistManager {
        &self.playlist_config
    }

    pub fn get_playlist_manager_mut(&mut self) -> &mut PlaylistManager {
        &mut self.playlist_config
    }

    pub fn context(&self) -> DeviceContext {
        DeviceContext {
            timezone: self.tz().unwrap_or(chrono_tz::America::New_York),
            time_format: self.time_format,
            orientation: self.orientation,
            resolution: self.get_resolution(),
            language: self.language().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{PluginInstance, RefreshSchedule, Settings};

    fn plugins() -> Vec<PluginConfig> {
        vec![PluginConfig {
            id: "accommodation".into(),
            display_name: "Accommodation".into(),
            image_settings: vec![ImageSetting::KeepWidth],
        }]
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DeviceConfig::load(&dir.path().join("device.json"), dir.path(), plugins()).unwrap();

        assert_eq!(cfg.language(), "pl");
        assert_eq!(cfg.get_resolution(), (800, 480));
        assert_eq!(cfg.time_format, TimeFormat::H24);
        assert!(cfg.plugin_image_dir.is_dir());
        assert!(cfg.get_plugin("accommodation").is_some());
        assert!(cfg.get_plugin("nope").is_none());
    }

    #[tokio::test]
    async fn test_write_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        let mut cfg = DeviceConfig::load(&path, dir.path(), plugins()).unwrap();
        cfg.language = Some("en".into());
        cfg.get_playlist_manager_mut().add_playlist("Default", "00:00", "24:00").unwrap();
        cfg.get_playlist_manager_mut()
            .add_plugin_to_playlist(
                "Default",
                PluginInstance::new("accommodation", "Home", Settings::new(), RefreshSchedule::default()),
            )
            .unwrap();
        cfg.write_config().await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let again = DeviceConfig::load(&path, dir.path(), plugins()).unwrap();
        assert_eq!(again.language(), "en");
        assert!(again.get_playlist_manager().find_plugin("accommodation", "Home").is_some());
    }

    #[test]
    fn test_get_config_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(
            &path,
            r#"{"timezone": "Europe/Warsaw", "time_format": "12h", "orientation": "vertical", "resolution": [600, 448]}"#,
        )
        .unwrap();
        let cfg = DeviceConfig::load(&path, dir.path(), plugins()).unwrap();

        assert_eq!(cfg.get_config("timezone").as_deref(), Some("Europe/Warsaw"));
        assert_eq!(cfg.get_config("time_format").as_deref(), Some("12h"));
        assert_eq!(cfg.get_config("language"), None);

        let ctx = cfg.context();
        assert_eq!(ctx.timezone, chrono_tz::Europe::Warsaw);
        assert_eq!(ctx.dimensions(), (448, 600));
    }

    #[test]
    fn test_bad_timezone_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, r#"{"timezone": "Mars/Olympus"}"#).unwrap();
        let cfg = DeviceConfig::load(&path, dir.path(), plugins()).unwrap();
        assert_eq!(cfg.timezone, "America/New_York");
    }
}
