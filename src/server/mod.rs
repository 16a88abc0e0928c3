/*
 *  server/mod.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  HTTP control panel - shared state and routing
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

pub mod error;
pub mod forms;
pub mod playlist_routes;
pub mod plugin_routes;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::device_config::DeviceConfig;
use crate::display::DisplayManager;
use crate::locale::Locales;
use crate::playlist::PluginInstance;
use crate::plugins::{PluginError, PluginRegistry};
use crate::refresh_task::RefreshTask;

pub use error::ApiError;

/// Uploaded images can be large phone photos
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub struct ServerState {
    pub config: Arc<RwLock<DeviceConfig>>,
    pub display: Arc<Mutex<DisplayManager>>,
    pub registry: PluginRegistry,
    pub refresh_task: Arc<RefreshTask>,
    pub locales: Locales,
    /// Static plugin resources served under /images
    pub plugins_dir: PathBuf,
}

impl ServerState {
    pub async fn language(&self) -> String {
        self.config.read().await.language().to_string()
    }

    pub fn t(&self, key: &str, lang: &str, args: &[(&str, &str)]) -> String {
        self.locales.t(key, lang, args)
    }

    /// Remove an instance's generated image and let its plugin release
    /// whatever else it owns. Failures are logged, never returned.
    pub async fn release_instance(&self, instance: &PluginInstance, image_dir: &Path, lang: &str) {
        let image_path = image_dir.join(instance.get_image_path());
        if image_path.exists() {
            let path = image_path.display().to_string();
            match tokio::fs::remove_file(&image_path).await {
                Ok(()) => info!("{}", self.t("deleted_plugin_instance_image", lang, &[("path", path.as_str())])),
                Err(e) => warn!(
                    "{}",
                    self.t("failed_to_delete_plugin_instance", lang, &[("path", path.as_str()), ("e", e.to_string().as_str())])
                ),
            }
        }

        let cleanup = match self.registry.get(&instance.plugin_id) {
            Some(plugin) => plugin.cleanup(&instance.settings).await,
            None => Err(PluginError::NotFound(instance.plugin_id.clone())),
        };
        if let Err(e) = cleanup {
            warn!(
                "{}",
                self.t(
                    "error_during_plugin_instance",
                    lang,
                    &[("plugin_id", instance.plugin_id.as_str()), ("e", e.to_string().as_str())]
                )
            );
        }
    }
}

pub type AppRouter = Router<Arc<ServerState>>;

pub fn get_router() -> AppRouter {
    Router::new()
        .route("/plugin/{plugin_id}", get(plugin_routes::plugin_page))
        .route("/images/{plugin_id}/{*filename}", get(plugin_routes::image))
        .route(
            "/plugin_instance_image/{playlist_name}/{plugin_id}/{instance_name}",
            get(plugin_routes::plugin_instance_image),
        )
        .route("/delete_plugin_instance", post(plugin_routes::delete_plugin_instance))
        .route("/update_plugin_instance/{instance_name}", put(plugin_routes::update_plugin_instance))
        .route("/display_plugin_instance", post(plugin_routes::display_plugin_instance))
        .route("/update_now", post(plugin_routes::update_now))
        .route("/add_plugin", post(playlist_routes::add_plugin))
        .route("/create_playlist", post(playlist_routes::create_playlist))
        .route("/update_playlist/{playlist_name}", put(playlist_routes::update_playlist))
        .route("/delete_playlist/{playlist_name}", delete(playlist_routes::delete_playlist))
        .route("/refresh_info", get(playlist_routes::refresh_info))
        .route("/display/current", get(plugin_routes::current_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
