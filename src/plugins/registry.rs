/*
 *  plugins/registry.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Plugin registry - maps plugin ids to their implementations
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

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::device_config::{ImageSetting, PluginConfig};
use crate::plugins::accommodation::AccommodationPlugin;
use crate::plugins::image_upload::ImageUploadPlugin;
use crate::plugins::{Plugin, PluginError};

/// Installed plugins, built once at start-up
#[derive(Clone, Default)]
pub struct PluginRegistry {
    configs: Vec<PluginConfig>,
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins shipped with the panel
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            PluginConfig {
                id: "accommodation".to_string(),
                display_name: "Accommodation".to_string(),
                image_settings: Vec::new(),
            },
            Arc::new(AccommodationPlugin::new()),
        );
        registry.register(
            PluginConfig {
                id: "image_upload".to_string(),
                display_name: "Image Upload".to_string(),
                image_settings: vec![ImageSetting::KeepWidth],
            },
            Arc::new(ImageUploadPlugin::new()),
        );
        registry
    }

    /// Add or replace a plugin under `config.id`
    pub fn register(&mut self, config: PluginConfig, plugin: Arc<dyn Plugin>) {
        debug!("registering plugin {}", config.id);
        self.configs.retain(|c| c.id != config.id);
        self.plugins.insert(config.id.clone(), plugin);
        self.configs.push(config);
    }

    pub fn configs(&self) -> &[PluginConfig] {
        &self.configs
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(plugin_id).cloned()
    }

    pub fn get_plugin_instance(&self, config: &PluginConfig) -> Result<Arc<dyn Plugin>, PluginError> {
        self.get(&config.id)
            .ok_or_else(|| PluginError::NotFound(config.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plugins() {
        let registry = PluginRegistry::builtin();
        let ids: Vec<_> = registry.configs().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["accommodation", "image_upload"]);

        let plugin = registry.get_plugin_instance(&registry.configs()[0]).unwrap();
        assert_eq!(plugin.id(), "accommodation");
    }

    #[test]
    fn test_unknown_plugin() {
        let registry = PluginRegistry::builtin();
        let config = PluginConfig {
            id: "clock".into(),
            display_name: "Clock".into(),
            image_settings: vec![],
        };
        assert!(matches!(registry.get_plugin_instance(&config), Err(PluginError::NotFound(id)) if id == "clock"));
    }
}
