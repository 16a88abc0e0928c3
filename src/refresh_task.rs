/*
 *  refresh_task.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Background refresh task - serializes every render onto the display
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

use chrono::Utc;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tiny_skia::Pixmap;
use tokio::select;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::device_config::{
    DeviceConfig, DeviceConfigError, DeviceContext, ImageSetting, PluginConfig, RefreshInfo, RefreshType,
};
use crate::display::{DisplayError, DisplayManager, DisplayOptions};
use crate::playlist::Settings;
use crate::plugins::{PluginError, PluginRegistry};

const REQUEST_QUEUE: usize = 8;

/// What to put on the display.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshAction {
    /// Render a plugin with ad-hoc settings
    ManualRefresh { plugin_id: String, settings: Settings },
    /// Render an instance from a playlist; without `force` a fresh
    /// cached image is reused
    PlaylistRefresh {
        playlist: String,
        plugin_id: String,
        instance: String,
        force: bool,
    },
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("refresh task is not running")]
    NotRunning,
    #[error("plugin '{0}' not found")]
    PluginNotFound(String),
    #[error("playlist '{0}' not found")]
    PlaylistNotFound(String),
    #[error("plugin instance '{instance}' not found for plugin '{plugin_id}'")]
    InstanceNotFound { plugin_id: String, instance: String },
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Config(#[from] DeviceConfigError),
    #[error("image error: {0}")]
    Image(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct Request {
    action: RefreshAction,
    reply: oneshot::Sender<Result<(), RefreshError>>,
}

/// Everything needed to render one action, copied out of the config lock
struct Job {
    plugin: PluginConfig,
    settings: Settings,
    device: DeviceContext,
    options: DisplayOptions,
    /// playlist instance image: reused when `use_cache`, written otherwise
    image_file: Option<PathBuf>,
    use_cache: bool,
    previous_hash: Option<String>,
    info: RefreshInfo,
}

/// State shared by the task loop and the handle
struct Shared {
    config: Arc<RwLock<DeviceConfig>>,
    display: Arc<Mutex<DisplayManager>>,
    registry: PluginRegistry,
}

struct Worker {
    requests: mpsc::Sender<Request>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct RefreshTask {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl RefreshTask {
    pub fn new(
        config: Arc<RwLock<DeviceConfig>>,
        display: Arc<Mutex<DisplayManager>>,
        registry: PluginRegistry,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                display,
                registry,
            }),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the refresh loop on `task_tracker`. A second start is a no-op.
    pub async fn start(&self, task_tracker: &TaskTracker) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("refresh task already running");
            return;
        }

        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);

        running.store(true, Ordering::SeqCst);
        let handle = task_tracker.spawn(async move {
            shared.run(requests_rx, shutdown_rx).await;
            running.store(false, Ordering::SeqCst);
        });
        info!("refresh task started");

        *worker = Some(Worker {
            requests: requests_tx,
            shutdown: shutdown_tx,
            handle,
        });
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue `action` and wait until it has been rendered (or failed).
    pub async fn manual_update(&self, action: RefreshAction) -> Result<(), RefreshError> {
        let requests = match self.worker.lock().await.as_ref() {
            Some(worker) if self.running() => worker.requests.clone(),
            _ => return Err(RefreshError::NotRunning),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        requests
            .send(Request {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RefreshError::NotRunning)?;
        reply_rx.await.map_err(|_| RefreshError::NotRunning)?
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        info!("stopping refresh task");
        let _ = worker.shutdown.send(());
        if let Err(e) = worker.handle.await {
            error!("refresh task ended abnormally: {}", e);
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    async fn run(&self, mut requests: mpsc::Receiver<Request>, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let interval = self.config.read().await.plugin_cycle_interval_seconds.max(1);
            select! {
                _ = &mut shutdown => {
                    info!("refresh task received shutdown signal, exiting...");
                    break;
                }
                request = requests.recv() => {
                    let Some(Request { action, reply }) = request else {
                        break;
                    };
                    info!("manual update requested: {:?}", action);
                    let result = self.execute(&action).await;
                    if let Err(e) = &result {
                        error!("manual update failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                    if let Err(e) = self.tick().await {
                        error!("exception during refresh: {}", e);
                    }
                }
            }
        }
    }

    /// Timer driven refresh: next instance of the active playlist
    async fn tick(&self) -> Result<(), RefreshError> {
        let action = {
            let mut cfg = self.config.write().await;
            let tz = cfg.context().timezone;
            let now = Utc::now().with_timezone(&tz);
            let manager = cfg.get_playlist_manager_mut();

            let Some(name) = manager
                .determine_active_playlist(now.time())
                .map(|p| p.name.clone())
            else {
                info!("no active playlist at {}", now.format("%H:%M"));
                manager.active_playlist = None;
                return Ok(());
            };
            manager.active_playlist = Some(name.clone());

            let Some(instance) = manager.get_playlist_mut(&name).and_then(|p| p.get_next_plugin()) else {
                info!("no plugin instances in playlist '{}'", name);
                return Ok(());
            };
            RefreshAction::PlaylistRefresh {
                playlist: name.clone(),
                plugin_id: instance.plugin_id.clone(),
                instance: instance.name.clone(),
                force: false,
            }
        };
        self.execute(&action).await
    }

    fn prepare(&self, cfg: &DeviceConfig, action: &RefreshAction) -> Result<Job, RefreshError> {
        let now = Utc::now();
        let device = cfg.context();
        let options = DisplayOptions {
            orientation: cfg.orientation,
            inverted: cfg.inverted_image,
        };
        let previous_hash = cfg.refresh_info.as_ref().and_then(|i| i.image_hash.clone());
        let plugin_config = |id: &str| {
            cfg.get_plugin(id)
                .cloned()
                .ok_or_else(|| RefreshError::PluginNotFound(id.to_string()))
        };

        match action {
            RefreshAction::ManualRefresh { plugin_id, settings } => Ok(Job {
                plugin: plugin_config(plugin_id)?,
                settings: settings.clone(),
                device,
                options,
                image_file: None,
                use_cache: false,
                previous_hash,
                info: RefreshInfo {
                    refresh_type: RefreshType::Manual,
                    plugin_id: Some(plugin_id.clone()),
                    playlist: None,
                    plugin_instance: None,
                    refresh_time: Some(now),
                    image_hash: None,
                },
            }),
            RefreshAction::PlaylistRefresh {
                playlist,
                plugin_id,
                instance,
                force,
            } => {
                let pl = cfg
                    .get_playlist_manager()
                    .get_playlist(playlist)
                    .ok_or_else(|| RefreshError::PlaylistNotFound(playlist.clone()))?;
                let inst = pl
                    .find_plugin(plugin_id, instance)
                    .ok_or_else(|| RefreshError::InstanceNotFound {
                        plugin_id: plugin_id.clone(),
                        instance: instance.clone(),
                    })?;
                let image_file = cfg.plugin_image_dir.join(inst.get_image_path());
                let use_cache = !force && image_file.exists() && !inst.should_refresh(now, device.timezone);

                Ok(Job {
                    plugin: plugin_config(plugin_id)?,
                    settings: inst.settings.clone(),
                    device,
                    options,
                    image_file: Some(image_file),
                    use_cache,
                    previous_hash,
                    info: RefreshInfo {
                        refresh_type: RefreshType::Playlist,
                        plugin_id: Some(plugin_id.clone()),
                        playlist: Some(playlist.clone()),
                        plugin_instance: Some(instance.clone()),
                        refresh_time: Some(now),
                        image_hash: None,
                    },
                })
            }
        }
    }

    async fn execute(&self, action: &RefreshAction) -> Result<(), RefreshError> {
        let mut job = {
            let cfg = self.config.read().await;
            self.prepare(&cfg, action)?
        };

        let image = match (&job.image_file, job.use_cache) {
            (Some(path), true) => {
                info!("using cached image {}", path.display());
                let bytes = tokio::fs::read(path).await?;
                Pixmap::decode_png(&bytes).map_err(|e| RefreshError::Image(e.to_string()))?
            }
            _ => {
                let plugin = self.registry.get_plugin_instance(&job.plugin)?;
                debug!("generating image for {}", job.plugin.id);
                plugin.generate_image(&job.settings, &job.device).await?
            }
        };

        let png = image.encode_png().map_err(|e| RefreshError::Image(e.to_string()))?;
        if let (Some(path), false) = (&job.image_file, job.use_cache) {
            tokio::fs::write(path, &png).await?;
        }

        let hash = frame_hash(&png, &job.options, &job.plugin.image_settings);
        if job.previous_hash.as_deref() == Some(hash.as_str()) {
            info!("image unchanged, skipping display update");
        } else {
            let mut display = self.display.lock().await;
            display.display_image(&image, &job.plugin.image_settings, job.options)?;
        }
        job.info.image_hash = Some(hash);

        let mut cfg = self.config.write().await;
        if let RefreshAction::PlaylistRefresh {
            plugin_id, instance, ..
        } = action
        {
            if !job.use_cache {
                if let Some(inst) = cfg.get_playlist_manager_mut().find_plugin_mut(plugin_id, instance) {
                    inst.latest_refresh_time = job.info.refresh_time;
                }
            }
        }
        cfg.refresh_info = Some(job.info);
        cfg.write_config().await?;
        Ok(())
    }
}

/// Identity of what lands on the panel: the image plus every option that
/// changes how it is drawn.
fn frame_hash(png: &[u8], options: &DisplayOptions, image_settings: &[ImageSetting]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(png);
    hasher.update(format!("{:?}/{}/{:?}", options.orientation, options.inverted, image_settings).as_bytes());
    format!("{:x}", hasher.finalize())
}
