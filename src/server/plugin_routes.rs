/*
 *  server/plugin_routes.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Plugin and plugin instance routes
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

use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use super::forms::{discard_uploads, parse_form, upload_paths};
use super::{ApiError, ServerState};
use crate::display::DisplayOptions;
use crate::playlist::Settings;
use crate::plugins::{FieldKind, SettingField};
use crate::refresh_task::RefreshAction;

#[derive(Template)]
#[template(path = "plugin.html")]
struct PluginPage<'a> {
    lang: &'a str,
    plugin_id: &'a str,
    display_name: &'a str,
    has_instance: bool,
    instance_name: String,
    fields: Vec<FieldView>,
    playlists: Vec<String>,
    api_key_required: bool,
    api_key_service: String,
    api_key_expected: String,
    style_settings: bool,
    params_json: String,
}

/// One form control on the settings page
#[derive(Debug)]
struct FieldView {
    key: String,
    label: String,
    /// "text", "number", "select" or "file"
    input: &'static str,
    /// One entry per input; list keys repeat the input per element
    values: Vec<String>,
    options: Vec<ChoiceView>,
}

#[derive(Debug)]
struct ChoiceView {
    value: String,
    selected: bool,
}

#[derive(Debug, Deserialize)]
pub struct PluginPageQuery {
    pub instance: Option<String>,
}

/// Body of the instance level JSON routes
#[derive(Debug, Default, Deserialize)]
pub struct InstanceRef {
    pub playlist_name: Option<String>,
    pub plugin_id: Option<String>,
    pub plugin_instance: Option<String>,
}

fn setting_values(value: Option<&Value>) -> Vec<String> {
    let text = |v: &Value| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(text).collect(),
        Some(other) => vec![text(other)],
    }
}

/// Form controls for the declared fields, followed by any other setting
/// the instance carries so a save posts it back unchanged.
fn field_views(declared: &[SettingField], settings: &Settings) -> Vec<FieldView> {
    let mut views: Vec<FieldView> = declared
        .iter()
        .map(|field| {
            let mut values = setting_values(settings.get(field.key));
            let (input, options) = match field.kind {
                FieldKind::Text | FieldKind::Number if values.is_empty() => {
                    values.push(String::new());
                    (if field.kind == FieldKind::Number { "number" } else { "text" }, Vec::new())
                }
                FieldKind::Text => ("text", Vec::new()),
                FieldKind::Number => ("number", Vec::new()),
                FieldKind::Choice(choices) => {
                    let current = values.first().cloned().unwrap_or_default();
                    let options = choices
                        .iter()
                        .map(|c| ChoiceView {
                            value: c.to_string(),
                            selected: *c == current,
                        })
                        .collect();
                    ("select", options)
                }
                FieldKind::Images => ("file", Vec::new()),
            };
            FieldView {
                key: field.key.to_string(),
                label: field.label.to_string(),
                input,
                values,
                options,
            }
        })
        .collect();

    for (key, value) in settings {
        if declared.iter().any(|f| f.key == key.as_str()) {
            continue;
        }
        views.push(FieldView {
            key: key.clone(),
            label: key.trim_end_matches("[]").to_string(),
            input: "text",
            values: setting_values(Some(value)),
            options: Vec::new(),
        });
    }
    views
}

pub async fn plugin_page(
    State(state): State<Arc<ServerState>>,
    Path(plugin_id): Path<String>,
    Query(query): Query<PluginPageQuery>,
) -> Result<Html<String>, ApiError> {
    let cfg = state.config.read().await;
    let lang = cfg.language().to_string();

    let Some(plugin_config) = cfg.get_plugin(&plugin_id) else {
        return Err(ApiError::NotFound(state.t("plugin_not_found", &lang, &[])));
    };
    let plugin = state.registry.get_plugin_instance(plugin_config).map_err(|e| {
        error!("EXCEPTION CAUGHT: {}", e);
        ApiError::internal(state.t("error_occurred", &lang, &[("e", e.to_string().as_str())]))
    })?;
    let mut params = plugin.generate_settings_template();

    let empty = Settings::new();
    let mut settings = &empty;
    let instance_name = query.instance.filter(|s| !s.is_empty());
    if let Some(name) = &instance_name {
        let Some(instance) = cfg.get_playlist_manager().find_plugin(&plugin_id, name) else {
            return Err(ApiError::internal(state.t(
                "plugin_instance_doesnt_exist",
                &lang,
                &[("plugin_instance_name", name.as_str())],
            )));
        };
        settings = &instance.settings;
        params.insert("plugin_settings".into(), Value::Object(instance.settings.clone().into_iter().collect()));
        params.insert("plugin_instance".into(), json!(name));
    }
    let playlists = cfg.get_playlist_manager().get_playlist_names();
    params.insert("playlists".into(), json!(playlists));

    let api_key = params.get("api_key");
    let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();
    let page = PluginPage {
        lang: &lang,
        plugin_id: &plugin_config.id,
        display_name: &plugin_config.display_name,
        has_instance: instance_name.is_some(),
        instance_name: instance_name.clone().unwrap_or_default(),
        fields: field_views(plugin.settings_fields(), settings),
        playlists,
        api_key_required: api_key.and_then(|k| k.get("required")).and_then(Value::as_bool).unwrap_or(false),
        api_key_service: text(api_key.and_then(|k| k.get("service"))),
        api_key_expected: text(api_key.and_then(|k| k.get("expected_key"))),
        style_settings: params.get("style_settings").and_then(Value::as_bool).unwrap_or(false),
        params_json: Value::Object(params.clone()).to_string().replace("</", "<\\/"),
    };

    page.render().map(Html).map_err(|e| {
        error!("template error: {}", e);
        ApiError::internal(state.t("error_occurred", &lang, &[("e", e.to_string().as_str())]))
    })
}

/// Join `rel` onto `base` lexically; `None` when it climbs out of `base`.
pub fn resolve_within(base: &FsPath, rel: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in FsPath::new(rel).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    let mut path = base.to_path_buf();
    path.extend(parts);
    Some(path)
}

fn content_type(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("html") => "text/html",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

async fn send_file(path: &FsPath, lang: &str, state: &ServerState) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!("cannot read {}: {}", path.display(), e);
        ApiError::NotFound(state.t("file_not_found", lang, &[]))
    })?;
    Ok(([(CONTENT_TYPE, content_type(path))], bytes).into_response())
}

pub async fn image(
    State(state): State<Arc<ServerState>>,
    Path((plugin_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let lang = state.language().await;

    let forbidden = || ApiError::Forbidden(state.t("invalid_path", &lang, &[]));
    let plugin_dir = resolve_within(&state.plugins_dir, &plugin_id)
        .filter(|dir| dir != &state.plugins_dir)
        .ok_or_else(forbidden)?;
    let file = resolve_within(&plugin_dir, &filename).ok_or_else(forbidden)?;

    if !plugin_dir.is_dir() {
        error!("Plugin directory not found: {}", plugin_dir.display());
        return Err(ApiError::NotFound(state.t("plugin_directory_not_found", &lang, &[])));
    }
    if !file.is_file() {
        error!("File not found: {}", file.display());
        return Err(ApiError::NotFound(state.t("file_not_found", &lang, &[])));
    }
    send_file(&file, &lang, &state).await
}

pub async fn plugin_instance_image(
    State(state): State<Arc<ServerState>>,
    Path((playlist_name, plugin_id, instance_name)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let (lang, image_path) = {
        let cfg = state.config.read().await;
        let lang = cfg.language().to_string();
        let Some(playlist) = cfg.get_playlist_manager().get_playlist(&playlist_name) else {
            return Err(ApiError::NotFound(state.t("playlist_not_found", &lang, &[])));
        };
        let Some(instance) = playlist.find_plugin(&plugin_id, &instance_name) else {
            return Err(ApiError::NotFound(state.t("plugin_instance_not_found", &lang, &[])));
        };
        let path = cfg.plugin_image_dir.join(instance.get_image_path());
        (lang, path)
    };

    if !image_path.exists() {
        return Err(ApiError::NotFound(state.t("image_not_generated", &lang, &[])));
    }
    send_file(&image_path, &lang, &state).await
}

pub async fn current_image(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    let lang = state.language().await;
    let path = state.display.lock().await.current_image_file().to_path_buf();
    if !path.is_file() {
        return Err(ApiError::NotFound(state.t("image_not_generated", &lang, &[])));
    }
    send_file(&path, &lang, &state).await
}

pub async fn delete_plugin_instance(
    State(state): State<Arc<ServerState>>,
    Json(data): Json<InstanceRef>,
) -> Result<Json<Value>, ApiError> {
    let playlist_name = data.playlist_name.unwrap_or_default();
    let plugin_id = data.plugin_id.unwrap_or_default();
    let instance_name = data.plugin_instance.unwrap_or_default();

    let (lang, removed, image_dir) = {
        let mut cfg = state.config.write().await;
        let lang = cfg.language().to_string();
        let Some(playlist) = cfg.get_playlist_manager_mut().get_playlist_mut(&playlist_name) else {
            return Err(ApiError::Message(state.t("playlist_not_found", &lang, &[])));
        };
        let Some(instance) = playlist.find_plugin(&plugin_id, &instance_name).cloned() else {
            return Err(ApiError::Message(state.t("plugin_instance_not_found", &lang, &[])));
        };
        if !playlist.delete_plugin(&plugin_id, &instance_name) {
            return Err(ApiError::Message(state.t("plugin_instance_not_found", &lang, &[])));
        }
        cfg.write_config().await.map_err(|e| {
            error!("EXCEPTION CAUGHT: {}", e);
            ApiError::internal(state.t("error_occurred", &lang, &[("e", e.to_string().as_str())]))
        })?;
        (lang, instance, cfg.plugin_image_dir.clone())
    };

    state.release_instance(&removed, &image_dir, &lang).await;
    Ok(Json(json!({
        "success": true,
        "message": state.t("deleted_plugin_instance", &lang, &[]),
    })))
}

pub async fn update_plugin_instance(
    State(state): State<Arc<ServerState>>,
    Path(instance_name): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (lang, upload_dir) = {
        let cfg = state.config.read().await;
        (cfg.language().to_string(), cfg.upload_dir.clone())
    };

    if instance_name.is_empty() {
        return Err(occurred(&state, &lang, &state.t("instance_name_required", &lang, &[])));
    }
    let form = parse_form(multipart, &upload_dir).await.map_err(|e| occurred(&state, &lang, &e))?;

    match replace_settings(&state, &lang, &instance_name, &upload_dir, form.settings).await {
        Ok(released) => {
            discard_uploads(&released).await;
            Ok(Json(json!({
                "success": true,
                "message": state.t("updated_plugin_instance", &lang, &[("instance_name", instance_name.as_str())]),
            })))
        }
        Err(e) => {
            discard_uploads(&form.uploads).await;
            Err(e)
        }
    }
}

fn occurred(state: &ServerState, lang: &str, e: &dyn std::fmt::Display) -> ApiError {
    ApiError::internal(state.t("error_occurred", lang, &[("e", e.to_string().as_str())]))
}

/// Swap in the new settings; returns the uploads the old settings held
/// that the new ones no longer reference.
async fn replace_settings(
    state: &ServerState,
    lang: &str,
    instance_name: &str,
    upload_dir: &FsPath,
    mut settings: Settings,
) -> Result<Vec<PathBuf>, ApiError> {
    let Some(plugin_id) = settings.remove("plugin_id").as_ref().and_then(Value::as_str).map(str::to_string) else {
        return Err(occurred(state, lang, &state.t("plugin_id_required", lang, &[])));
    };

    let mut cfg = state.config.write().await;
    let Some(instance) = cfg.get_playlist_manager_mut().find_plugin_mut(&plugin_id, instance_name) else {
        return Err(ApiError::internal(state.t(
            "plugin_instance_doesnt_exist",
            lang,
            &[("plugin_instance_name", instance_name)],
        )));
    };
    let kept = upload_paths(&settings, upload_dir);
    let released = upload_paths(&instance.settings, upload_dir)
        .into_iter()
        .filter(|p| !kept.contains(p))
        .collect();
    instance.settings = settings;
    cfg.write_config().await.map_err(|e| occurred(state, lang, &e))?;
    Ok(released)
}

pub async fn display_plugin_instance(
    State(state): State<Arc<ServerState>>,
    Json(data): Json<InstanceRef>,
) -> Result<Json<Value>, ApiError> {
    let playlist_name = data.playlist_name.unwrap_or_default();
    let plugin_id = data.plugin_id.unwrap_or_default();
    let instance_name = data.plugin_instance.unwrap_or_default();

    let lang = {
        let cfg = state.config.read().await;
        let lang = cfg.language().to_string();
        let Some(playlist) = cfg.get_playlist_manager().get_playlist(&playlist_name) else {
            return Err(ApiError::Message(state.t(
                "playlist_not_found_name",
                &lang,
                &[("playlist_name", playlist_name.as_str())],
            )));
        };
        if playlist.find_plugin(&plugin_id, &instance_name).is_none() {
            return Err(ApiError::Message(state.t(
                "plugin_instance_not_found_name",
                &lang,
                &[("plugin_instance_name", instance_name.as_str())],
            )));
        }
        lang
    };

    let action = RefreshAction::PlaylistRefresh {
        playlist: playlist_name,
        plugin_id,
        instance: instance_name,
        force: true,
    };
    state.refresh_task.manual_update(action).await.map_err(|e| {
        error!("display_plugin_instance failed: {}", e);
        ApiError::internal(state.t("error_occurred", &lang, &[("e", e.to_string().as_str())]))
    })?;

    Ok(Json(json!({ "success": true, "message": state.t("display_updated", "en", &[]) })))
}

/// Render once with the posted settings. Uploads in the form only live
/// for this render.
pub async fn update_now(
    State(state): State<Arc<ServerState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (lang, upload_dir) = {
        let cfg = state.config.read().await;
        (cfg.language().to_string(), cfg.upload_dir.clone())
    };

    let form = parse_form(multipart, &upload_dir)
        .await
        .map_err(|e| update_now_error(&state, &lang, &e))?;
    let result = render_now(&state, &lang, form.settings).await;
    discard_uploads(&form.uploads).await;
    result?;

    Ok(Json(json!({ "success": true, "message": state.t("display_updated", "en", &[]) })))
}

fn update_now_error(state: &ServerState, lang: &str, e: &dyn std::fmt::Display) -> ApiError {
    error!("{}", state.t("error_in_update_now", lang, &[("e", e.to_string().as_str())]));
    occurred(state, lang, e)
}

async fn render_now(state: &ServerState, lang: &str, mut settings: Settings) -> Result<(), ApiError> {
    let failed = |e: &dyn std::fmt::Display| update_now_error(state, lang, e);
    let Some(plugin_id) = settings.remove("plugin_id").as_ref().and_then(Value::as_str).map(str::to_string) else {
        return Err(failed(&state.t("plugin_id_required", lang, &[])));
    };

    if state.refresh_task.running() {
        return state
            .refresh_task
            .manual_update(RefreshAction::ManualRefresh { plugin_id, settings })
            .await
            .map_err(|e| failed(&e));
    }

    info!("Refresh task not running, updating display directly");
    let (plugin_config, device, options) = {
        let cfg = state.config.read().await;
        let Some(plugin_config) = cfg.get_plugin(&plugin_id).cloned() else {
            return Err(ApiError::Error(
                StatusCode::NOT_FOUND,
                state.t("plugin_not_found_id", lang, &[("plugin_id", plugin_id.as_str())]),
            ));
        };
        let options = DisplayOptions {
            orientation: cfg.orientation,
            inverted: cfg.inverted_image,
        };
        (plugin_config, cfg.context(), options)
    };

    let plugin = state.registry.get_plugin_instance(&plugin_config).map_err(|e| failed(&e))?;
    let image = plugin.generate_image(&settings, &device).await.map_err(|e| failed(&e))?;
    state
        .display
        .lock()
        .await
        .display_image(&image, &plugin_config.image_settings, options)
        .map_err(|e| failed(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_within() {
        let base = FsPath::new("/srv/plugins/accommodation");
        assert_eq!(resolve_within(base, "icon.svg"), Some(base.join("icon.svg")));
        assert_eq!(resolve_within(base, "a/../b/./c.png"), Some(base.join("b/c.png")));
        assert_eq!(resolve_within(base, "../weather/icon.svg"), None);
        assert_eq!(resolve_within(base, "/etc/passwd"), None);
    }

    #[test]
    fn test_field_views() {
        const FIELDS: &[SettingField] = &[
            SettingField::new("latitude", "Latitude", FieldKind::Number),
            SettingField::new("units", "Units", FieldKind::Choice(&["metric", "imperial"])),
            SettingField::new("imageFiles[]", "Images", FieldKind::Images),
        ];

        let fresh = field_views(FIELDS, &Settings::new());
        assert_eq!(fresh.len(), 3);
        assert_eq!((fresh[0].input, fresh[0].values.clone()), ("number", vec![String::new()]));
        assert_eq!(fresh[1].input, "select");
        assert!(fresh[1].options.iter().all(|o| !o.selected));
        assert_eq!(fresh[2].input, "file");
        assert!(fresh[2].values.is_empty());

        let mut settings = Settings::new();
        settings.insert("units".into(), json!("imperial"));
        settings.insert("imageFiles[]".into(), json!(["/u/a.png", "/u/b.png"]));
        settings.insert("tags[]".into(), json!(["x", "y"]));
        let edit = field_views(FIELDS, &settings);
        assert_eq!(edit.len(), 4);
        assert!(edit[1].options[1].selected);
        assert_eq!(edit[2].values, vec!["/u/a.png", "/u/b.png"]);
        assert_eq!((edit[3].key.as_str(), edit[3].label.as_str()), ("tags[]", "tags"));
        assert_eq!(edit[3].values, vec!["x", "y"]);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(FsPath::new("a/icon.SVG")), "image/svg+xml");
        assert_eq!(content_type(FsPath::new("frame.png")), "image/png");
        assert_eq!(content_type(FsPath::new("README")), "application/octet-stream");
    }
}
