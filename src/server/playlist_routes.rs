/*
 *  server/playlist_routes.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Playlist management and refresh status routes
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

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::forms::{discard_uploads, parse_form};
use super::{ApiError, ServerState};
use crate::playlist::{parse_hhmm, PlaylistError, PluginInstance, RefreshSchedule, Settings};

#[derive(Debug, Deserialize)]
pub struct CreatePlaylist {
    pub playlist_name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlaylist {
    pub new_name: String,
    pub start_time: String,
    pub end_time: String,
}

fn playlist_error(state: &ServerState, lang: &str, err: &PlaylistError, start: &str, end: &str) -> ApiError {
    let message = match err {
        PlaylistError::PlaylistExists(name) => state.t("playlist_exists", lang, &[("playlist_name", name.as_str())]),
        PlaylistError::PlaylistNotFound(name) => {
            state.t("playlist_not_found_name", lang, &[("playlist_name", name.as_str())])
        }
        PlaylistError::InstanceExists { name, .. } => {
            state.t("plugin_instance_exists", lang, &[("plugin_instance_name", name.as_str())])
        }
        PlaylistError::InstanceNotFound { name, .. } => {
            state.t("plugin_instance_not_found_name", lang, &[("plugin_instance_name", name.as_str())])
        }
        PlaylistError::InvalidTime(_) => {
            state.t("invalid_playlist_times", lang, &[("start_time", start), ("end_time", end)])
        }
    };
    ApiError::Message(message)
}

fn persist_error(state: &ServerState, lang: &str, e: impl std::fmt::Display) -> ApiError {
    error!("EXCEPTION CAUGHT: {}", e);
    ApiError::internal(state.t("error_occurred", lang, &[("e", e.to_string().as_str())]))
}

fn take_text(settings: &mut Settings, key: &str) -> Option<String> {
    settings
        .remove(key)
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `refresh_time` ("HH:MM") wins over `refresh_interval` (seconds)
fn refresh_schedule(settings: &mut Settings) -> Result<RefreshSchedule, PlaylistError> {
    let interval = take_text(settings, "refresh_interval");
    if let Some(time) = take_text(settings, "refresh_time") {
        parse_hhmm(&time)?;
        return Ok(RefreshSchedule::Scheduled { time });
    }
    Ok(match interval.and_then(|s| s.parse::<u64>().ok()) {
        Some(seconds) if seconds > 0 => RefreshSchedule::Interval { seconds },
        _ => RefreshSchedule::default(),
    })
}

pub async fn add_plugin(
    State(state): State<Arc<ServerState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (lang, upload_dir) = {
        let cfg = state.config.read().await;
        (cfg.language().to_string(), cfg.upload_dir.clone())
    };

    let form = parse_form(multipart, &upload_dir)
        .await
        .map_err(|e| persist_error(&state, &lang, e))?;
    let result = insert_instance(&state, &lang, form.settings).await;
    if result.is_err() {
        discard_uploads(&form.uploads).await;
    }
    result
}

async fn insert_instance(state: &ServerState, lang: &str, mut settings: Settings) -> Result<Json<Value>, ApiError> {
    let Some(plugin_id) = take_text(&mut settings, "plugin_id") else {
        return Err(ApiError::Message(state.t("plugin_id_required", lang, &[])));
    };
    let Some(instance_name) = take_text(&mut settings, "instance_name") else {
        return Err(ApiError::Message(state.t("instance_name_required", lang, &[])));
    };
    let playlist_name = take_text(&mut settings, "playlist").unwrap_or_default();
    let refresh = refresh_schedule(&mut settings).map_err(|e| playlist_error(state, lang, &e, "", ""))?;

    let mut cfg = state.config.write().await;
    if cfg.get_plugin(&plugin_id).is_none() {
        return Err(ApiError::Error(
            StatusCode::NOT_FOUND,
            state.t("plugin_not_found_id", lang, &[("plugin_id", plugin_id.as_str())]),
        ));
    }
    let instance = PluginInstance::new(&plugin_id, &instance_name, settings, refresh);
    cfg.get_playlist_manager_mut()
        .add_plugin_to_playlist(&playlist_name, instance)
        .map_err(|e| playlist_error(state, lang, &e, "", ""))?;
    cfg.write_config().await.map_err(|e| persist_error(state, lang, e))?;
    info!("added {} instance '{}' to playlist '{}'", plugin_id, instance_name, playlist_name);

    Ok(Json(json!({
        "success": true,
        "message": state.t(
            "added_plugin_instance",
            lang,
            &[("instance_name", instance_name.as_str()), ("playlist_name", playlist_name.as_str())],
        ),
    })))
}

pub async fn create_playlist(
    State(state): State<Arc<ServerState>>,
    Json(data): Json<CreatePlaylist>,
) -> Result<Json<Value>, ApiError> {
    let mut cfg = state.config.write().await;
    let lang = cfg.language().to_string();
    let name = data.playlist_name.trim();
    if name.is_empty() {
        return Err(ApiError::Message(state.t("playlist_name_required", &lang, &[])));
    }

    cfg.get_playlist_manager_mut()
        .add_playlist(name, &data.start_time, &data.end_time)
        .map_err(|e| playlist_error(&state, &lang, &e, &data.start_time, &data.end_time))?;
    cfg.write_config().await.map_err(|e| persist_error(&state, &lang, e))?;

    Ok(Json(json!({
        "success": true,
        "message": state.t("created_playlist", &lang, &[("playlist_name", name)]),
    })))
}

pub async fn update_playlist(
    State(state): State<Arc<ServerState>>,
    Path(playlist_name): Path<String>,
    Json(data): Json<UpdatePlaylist>,
) -> Result<Json<Value>, ApiError> {
    let mut cfg = state.config.write().await;
    let lang = cfg.language().to_string();
    let new_name = data.new_name.trim();
    let new_name = if new_name.is_empty() { playlist_name.as_str() } else { new_name };

    cfg.get_playlist_manager_mut()
        .update_playlist(&playlist_name, new_name, &data.start_time, &data.end_time)
        .map_err(|e| playlist_error(&state, &lang, &e, &data.start_time, &data.end_time))?;
    cfg.write_config().await.map_err(|e| persist_error(&state, &lang, e))?;

    Ok(Json(json!({
        "success": true,
        "message": state.t("updated_playlist", &lang, &[("playlist_name", new_name)]),
    })))
}

pub async fn delete_playlist(
    State(state): State<Arc<ServerState>>,
    Path(playlist_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (lang, removed, image_dir) = {
        let mut cfg = state.config.write().await;
        let lang = cfg.language().to_string();
        let removed = cfg
            .get_playlist_manager_mut()
            .delete_playlist(&playlist_name)
            .map_err(|e| playlist_error(&state, &lang, &e, "", ""))?;
        cfg.write_config().await.map_err(|e| persist_error(&state, &lang, e))?;
        (lang, removed, cfg.plugin_image_dir.clone())
    };

    for instance in &removed.plugins {
        state.release_instance(instance, &image_dir, &lang).await;
    }
    Ok(Json(json!({
        "success": true,
        "message": state.t("deleted_playlist", &lang, &[("playlist_name", playlist_name.as_str())]),
    })))
}

pub async fn refresh_info(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let cfg = state.config.read().await;
    Json(json!({
        "refresh_info": cfg.refresh_info,
        "active_playlist": cfg.get_playlist_manager().active_playlist,
        "running": state.refresh_task.running(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_schedule_from_form() {
        let mut s = Settings::new();
        s.insert("refresh_interval".into(), json!("600"));
        s.insert("units".into(), json!("metric"));
        assert_eq!(refresh_schedule(&mut s), Ok(RefreshSchedule::Interval { seconds: 600 }));
        assert!(!s.contains_key("refresh_interval"));
        assert!(s.contains_key("units"));

        let mut s = Settings::new();
        s.insert("refresh_interval".into(), json!("600"));
        s.insert("refresh_time".into(), json!("07:30"));
        assert_eq!(
            refresh_schedule(&mut s),
            Ok(RefreshSchedule::Scheduled { time: "07:30".into() })
        );
        assert!(s.is_empty());

        let mut s = Settings::new();
        s.insert("refresh_time".into(), json!("7h"));
        assert_eq!(refresh_schedule(&mut s), Err(PlaylistError::InvalidTime("7h".into())));

        assert_eq!(refresh_schedule(&mut Settings::new()), Ok(RefreshSchedule::default()));
    }
}
