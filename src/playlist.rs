/*
 *  playlist.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Playlists of plugin instances, time windows and refresh schedules
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

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Plugin settings as submitted through the settings form.
/// Values are strings, or lists of strings for `name[]` fields.
pub type Settings = BTreeMap<String, Value>;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum PlaylistError {
    #[error("playlist '{0}' already exists")]
    PlaylistExists(String),
    #[error("playlist '{0}' not found")]
    PlaylistNotFound(String),
    #[error("plugin instance '{name}' already exists for plugin '{plugin_id}'")]
    InstanceExists { plugin_id: String, name: String },
    #[error("plugin instance '{name}' not found for plugin '{plugin_id}'")]
    InstanceNotFound { plugin_id: String, name: String },
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// When a plugin instance's cached image goes stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RefreshSchedule {
    Interval { seconds: u64 },
    Scheduled { time: String },
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        RefreshSchedule::Interval { seconds: 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstance {
    pub plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub refresh: RefreshSchedule,
    #[serde(default)]
    pub latest_refresh_time: Option<DateTime<Utc>>,
}

impl PluginInstance {
    pub fn new(plugin_id: &str, name: &str, settings: Settings, refresh: RefreshSchedule) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            settings,
            refresh,
            latest_refresh_time: None,
        }
    }

    /// File name of the generated image inside the plugin image directory.
    pub fn get_image_path(&self) -> String {
        format!("{}_{}.png", self.plugin_id, self.name.replace(' ', "_"))
    }

    /// Whether the cached image is stale at `now`.
    pub fn should_refresh(&self, now: DateTime<Utc>, tz: Tz) -> bool {
        let Some(latest) = self.latest_refresh_time else {
            return true;
        };
        match &self.refresh {
            RefreshSchedule::Interval { seconds } => {
                (now - latest).num_seconds() >= *seconds as i64
            }
            RefreshSchedule::Scheduled { time } => {
                let Ok(at) = parse_hhmm(time) else {
                    return false;
                };
                let local_now = now.with_timezone(&tz);
                let scheduled = local_now
                    .date_naive()
                    .and_time(at.time().unwrap_or(NaiveTime::MIN));
                let Some(scheduled) = tz.from_local_datetime(&scheduled).earliest() else {
                    return false;
                };
                let scheduled = scheduled.with_timezone(&Utc);
                now >= scheduled && latest < scheduled
            }
        }
    }
}

/// "HH:MM" parsed into minutes after midnight; "24:00" is end of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayMinute(u32);

impl DayMinute {
    pub fn of(time: NaiveTime) -> Self {
        DayMinute(time.hour() * 60 + time.minute())
    }

    fn time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.0 / 60, self.0 % 60, 0)
    }
}

pub fn parse_hhmm(s: &str) -> Result<DayMinute, PlaylistError> {
    if s == "24:00" {
        return Ok(DayMinute(MINUTES_PER_DAY));
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map(DayMinute::of)
        .map_err(|_| PlaylistError::InvalidTime(s.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub plugins: Vec<PluginInstance>,
    #[serde(default)]
    pub current_plugin_index: Option<usize>,
}

impl Playlist {
    pub fn new(name: &str, start_time: &str, end_time: &str) -> Result<Self, PlaylistError> {
        parse_hhmm(start_time)?;
        parse_hhmm(end_time)?;
        Ok(Self {
            name: name.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            plugins: Vec::new(),
            current_plugin_index: None,
        })
    }

    fn window(&self) -> Option<(DayMinute, DayMinute)> {
        Some((parse_hhmm(&self.start_time).ok()?, parse_hhmm(&self.end_time).ok()?))
    }

    /// True when `at` falls in [start, end). Windows with end < start wrap
    /// past midnight.
    pub fn is_active(&self, at: NaiveTime) -> bool {
        let Some((start, end)) = self.window() else {
            return false;
        };
        let t = DayMinute::of(at);
        if start <= end {
            start <= t && t < end
        } else {
            t >= start || t < end
        }
    }

    /// Window length in minutes; shorter windows are more specific and win.
    pub fn priority(&self) -> u32 {
        match self.window() {
            Some((start, end)) if start <= end => end.0 - start.0,
            Some((start, end)) => MINUTES_PER_DAY - start.0 + end.0,
            None => u32::MAX,
        }
    }

    pub fn find_plugin(&self, plugin_id: &str, name: &str) -> Option<&PluginInstance> {
        self.plugins
            .iter()
            .find(|p| p.plugin_id == plugin_id && p.name == name)
    }

    pub fn find_plugin_mut(&mut self, plugin_id: &str, name: &str) -> Option<&mut PluginInstance> {
        self.plugins
            .iter_mut()
            .find(|p| p.plugin_id == plugin_id && p.name == name)
    }

    pub fn add_plugin(&mut self, instance: PluginInstance) -> Result<(), PlaylistError> {
        if self.find_plugin(&instance.plugin_id, &instance.name).is_some() {
            return Err(PlaylistError::InstanceExists {
                plugin_id: instance.plugin_id,
                name: instance.name,
            });
        }
        self.plugins.push(instance);
        Ok(())
    }

    /// Returns false when no such instance exists.
    pub fn delete_plugin(&mut self, plugin_id: &str, name: &str) -> bool {
        let Some(idx) = self
            .plugins
            .iter()
            .position(|p| p.plugin_id == plugin_id && p.name == name)
        else {
            return false;
        };
        self.plugins.remove(idx);
        // keep the cursor pointing at the instance that was next in line
        self.current_plugin_index = match self.current_plugin_index {
            _ if self.plugins.is_empty() => None,
            Some(cur) if cur >= idx => cur.checked_sub(1),
            other => other,
        };
        true
    }

    pub fn update_plugin(&mut self, plugin_id: &str, name: &str, settings: Settings) -> Result<(), PlaylistError> {
        let instance = self
            .find_plugin_mut(plugin_id, name)
            .ok_or_else(|| PlaylistError::InstanceNotFound {
                plugin_id: plugin_id.to_string(),
                name: name.to_string(),
            })?;
        instance.settings = settings;
        Ok(())
    }

    /// Advance the round-robin cursor and return the instance it lands on.
    pub fn get_next_plugin(&mut self) -> Option<&PluginInstance> {
        if self.plugins.is_empty() {
            self.current_plugin_index = None;
            return None;
        }
        let next = match self.current_plugin_index {
            Some(i) if i + 1 < self.plugins.len() => i + 1,
            _ => 0,
        };
        self.current_plugin_index = Some(next);
        self.plugins.get(next)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistManager {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub active_playlist: Option<String>,
}

impl PlaylistManager {
    pub fn get_playlist(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn get_playlist_mut(&mut self, name: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.name == name)
    }

    pub fn get_playlist_names(&self) -> Vec<String> {
        self.playlists.iter().map(|p| p.name.clone()).collect()
    }

    pub fn add_playlist(&mut self, name: &str, start_time: &str, end_time: &str) -> Result<(), PlaylistError> {
        if self.get_playlist(name).is_some() {
            return Err(PlaylistError::PlaylistExists(name.to_string()));
        }
        self.playlists.push(Playlist::new(name, start_time, end_time)?);
        Ok(())
    }

    pub fn update_playlist(&mut self, old_name: &str, new_name: &str, start_time: &str, end_time: &str) -> Result<(), PlaylistError> {
        parse_hhmm(start_time)?;
        parse_hhmm(end_time)?;
        if old_name != new_name && self.get_playlist(new_name).is_some() {
            return Err(PlaylistError::PlaylistExists(new_name.to_string()));
        }
        let playlist = self
            .get_playlist_mut(old_name)
            .ok_or_else(|| PlaylistError::PlaylistNotFound(old_name.to_string()))?;
        playlist.name = new_name.to_string();
        playlist.start_time = start_time.to_string();
        playlist.end_time = end_time.to_string();
        if self.active_playlist.as_deref() == Some(old_name) {
            self.active_playlist = Some(new_name.to_string());
        }
        Ok(())
    }

    pub fn delete_playlist(&mut self, name: &str) -> Result<Playlist, PlaylistError> {
        let idx = self
            .playlists
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| PlaylistError::PlaylistNotFound(name.to_string()))?;
        if self.active_playlist.as_deref() == Some(name) {
            self.active_playlist = None;
        }
        Ok(self.playlists.remove(idx))
    }

    /// First instance with this plugin id and name across all playlists.
    pub fn find_plugin(&self, plugin_id: &str, name: &str) -> Option<&PluginInstance> {
        self.playlists
            .iter()
            .find_map(|p| p.find_plugin(plugin_id, name))
    }

    pub fn find_plugin_mut(&mut self, plugin_id: &str, name: &str) -> Option<&mut PluginInstance> {
        self.playlists
            .iter_mut()
            .find_map(|p| p.find_plugin_mut(plugin_id, name))
    }

    /// Adds an instance to a playlist. Instance names are unique per plugin
    /// id across the whole device.
    pub fn add_plugin_to_playlist(&mut self, playlist: &str, instance: PluginInstance) -> Result<(), PlaylistError> {
        if self.find_plugin(&instance.plugin_id, &instance.name).is_some() {
            return Err(PlaylistError::InstanceExists {
                plugin_id: instance.plugin_id,
                name: instance.name,
            });
        }
        self.get_playlist_mut(playlist)
            .ok_or_else(|| PlaylistError::PlaylistNotFound(playlist.to_string()))?
            .add_plugin(instance)
    }

    /// The most specific playlist whose window contains `at`.
    pub fn determine_active_playlist(&self, at: NaiveTime) -> Option<&Playlist> {
        self.playlists
            .iter()
            .filter(|p| p.is_active(at))
            .min_by_key(|p| p.priority())
    }
}
