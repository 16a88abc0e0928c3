/*
 *  plugins/mod.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Content plugins - each renders one kind of screen from its settings
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

pub mod accommodation;
pub mod image_upload;
pub mod registry;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tiny_skia::Pixmap;

use crate::device_config::DeviceContext;
use crate::playlist::Settings;
use crate::render::RenderError;

pub use registry::PluginRegistry;

/// Extra values handed to the settings page template
pub type TemplateParams = Map<String, Value>;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidSettings(String),
    /// Upstream data could not be fetched; details are logged, not returned
    #[error("{provider} request failure, please check logs.")]
    Request { provider: String },
    #[error("{0}")]
    Image(String),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the settings page draws one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Choice(&'static [&'static str]),
    /// PNG uploads. Stored paths are posted back under the same key, so
    /// the key should end in `[]`.
    Images,
}

/// A setting the plugin reads, declared for the settings page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl SettingField {
    pub const fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { key, label, kind }
    }
}

/// A content source the panel can show.
///
/// Implementations are shared between the HTTP handlers and the refresh
/// task, so they hold no per-request state behind `&mut self`.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    /// Parameters for the settings page. The default carries nothing
    /// beyond what the page itself adds (settings, instance, playlists).
    fn generate_settings_template(&self) -> TemplateParams {
        TemplateParams::new()
    }

    /// Settings the page offers when adding or editing an instance
    fn settings_fields(&self) -> &'static [SettingField] {
        &[]
    }

    /// Render the screen for `settings` at the device's canvas size.
    async fn generate_image(&self, settings: &Settings, device: &DeviceContext) -> Result<Pixmap, PluginError>;

    /// Release whatever the instance owns (uploaded files, caches).
    async fn cleanup(&self, _settings: &Settings) -> Result<(), PluginError> {
        Ok(())
    }
}

/// String value of a setting; lists yield their first element
pub fn setting_str<'a>(settings: &'a Settings, key: &str) -> Option<&'a str> {
    match settings.get(key)? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

/// All string values stored under a key, for list settings like `imageFiles[]`
pub fn setting_list(settings: &Settings, key: &str) -> Vec<String> {
    match settings.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
