/*
 *  main.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
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

use anyhow::Context;
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio_util::task::TaskTracker;

use inkpanel::config;
use inkpanel::device_config::DeviceConfig;
use inkpanel::display::DisplayManager;
use inkpanel::locale::Locales;
use inkpanel::plugins::PluginRegistry;
use inkpanel::refresh_task::RefreshTask;
use inkpanel::server::{get_router, ServerState};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP.
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("inkpanel v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let registry = PluginRegistry::builtin();
    let data_dir = cfg.data_dir();
    let mut device_config = DeviceConfig::load(&cfg.device_config_path(), &data_dir, registry.configs().to_vec())
        .context("loading device config")?;

    let display = DisplayManager::new(&cfg.display(), device_config.current_image_file.clone())
        .context("initializing display")?;
    let (width, height) = display.dimensions();
    if device_config.get_resolution() != (width, height) {
        info!("display reports {}x{}, updating device resolution", width, height);
        device_config.resolution = [width, height];
        device_config.write_config().await.context("saving device config")?;
    }

    let config = Arc::new(RwLock::new(device_config));
    let display = Arc::new(Mutex::new(display));
    let task_tracker = TaskTracker::new();

    let refresh_task = Arc::new(RefreshTask::new(config.clone(), display.clone(), registry.clone()));
    if cfg.refresh_enabled() {
        refresh_task.start(&task_tracker).await;
    } else {
        warn!("refresh task disabled, the display only changes on request");
    }

    let state = Arc::new(ServerState {
        config,
        display,
        registry,
        refresh_task: refresh_task.clone(),
        locales: Locales::new(cfg.locales_dir.clone()),
        plugins_dir: cfg.plugins_dir(),
    });

    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("serving control panel on http://{}", addr);

    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel::<()>();
    let app = get_router().with_state(state);
    task_tracker.spawn(async move {
        let shutdown = async {
            let _ = server_shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            error!("http server failed: {}", e);
        }
    });

    if let Err(e) = signal_handler().await {
        error!("cannot install signal handlers: {}", e);
    }

    refresh_task.stop().await;
    let _ = server_shutdown_tx.send(());
    task_tracker.close();
    task_tracker.wait().await;
    info!("inkpanel stopped");
    Ok(())
}
