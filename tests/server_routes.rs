/*
 *  tests/server_routes.rs
 *
 *  HTTP contract of the control panel, driven through the router
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 */

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tempfile::TempDir;
use tiny_skia::{Color, Pixmap};
use tokio::sync::{Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use inkpanel::device_config::DeviceConfig;
use inkpanel::display::drivers::mock::{MockDriver, MockDriverState};
use inkpanel::display::DisplayManager;
use inkpanel::locale::Locales;
use inkpanel::plugins::image_upload::IMAGE_FILES_KEY;
use inkpanel::plugins::PluginRegistry;
use inkpanel::refresh_task::RefreshTask;
use inkpanel::server::{get_router, ServerState};

const BOUNDARY: &str = "inkpanel-test-boundary";

struct Panel {
    dir: TempDir,
    state: Arc<ServerState>,
    mock: Arc<StdMutex<MockDriverState>>,
    tracker: TaskTracker,
}

impl Panel {
    async fn new(start_refresh: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = PluginRegistry::builtin();
        let mut device = DeviceConfig::load(
            &dir.path().join("device.json"),
            dir.path(),
            registry.configs().to_vec(),
        )
        .unwrap();
        device.language = Some("en".into());
        device.resolution = [64, 32];
        device
            .get_playlist_manager_mut()
            .add_playlist("Default", "00:00", "24:00")
            .unwrap();
        device.write_config().await.unwrap();

        let mock = MockDriver::new(64, 32);
        let mock_state = mock.state();
        let display =
            DisplayManager::new_with_driver(Box::new(mock), device.current_image_file.clone(), 0).unwrap();

        let plugins_dir = dir.path().join("static");
        std::fs::create_dir_all(plugins_dir.join("image_upload")).unwrap();
        std::fs::write(
            plugins_dir.join("image_upload").join("icon.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#,
        )
        .unwrap();

        let config = Arc::new(RwLock::new(device));
        let display = Arc::new(Mutex::new(display));
        let refresh_task = Arc::new(RefreshTask::new(config.clone(), display.clone(), registry.clone()));
        let tracker = TaskTracker::new();
        if start_refresh {
            refresh_task.start(&tracker).await;
        }

        let state = Arc::new(ServerState {
            config,
            display,
            registry,
            refresh_task,
            locales: Locales::builtin(),
            plugins_dir,
        });
        Self {
            dir,
            state,
            mock: mock_state,
            tracker,
        }
    }

    fn router(&self) -> Router {
        get_router().with_state(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn writes(&self) -> usize {
        self.mock.lock().unwrap().write_count
    }

    /// Adds an image_upload instance named `name` to the Default playlist
    async fn add_photos(&self, name: &str) -> (StatusCode, Value) {
        let png = black_png();
        let body = multipart(
            &[
                ("plugin_id", "image_upload"),
                ("playlist", "Default"),
                ("instance_name", name),
                ("refresh_interval", "600"),
            ],
            &[(IMAGE_FILES_KEY, "cat.png", png.as_slice())],
        );
        self.json(form(Method::POST, "/add_plugin", body)).await
    }

    /// Files currently in the upload directory
    fn uploads(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.dir.path().join("uploads")) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Stored image paths of an image_upload instance
    async fn images_of(&self, name: &str) -> Vec<String> {
        let cfg = self.state.config.read().await;
        let instance = cfg.get_playlist_manager().find_plugin("image_upload", name).unwrap();
        instance.settings[IMAGE_FILES_KEY]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    async fn shutdown(self) {
        self.state.refresh_task.stop().await;
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form(method: Method, uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Panel sized black PNG
fn black_png() -> Vec<u8> {
    let mut pixmap = Pixmap::new(64, 32).unwrap();
    pixmap.fill(Color::BLACK);
    pixmap.encode_png().unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn saved_device(dir: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(dir.join("device.json")).unwrap()).unwrap()
}

#[tokio::test]
async fn test_playlist_lifecycle() {
    let panel = Panel::new(false).await;

    let body = json!({"playlist_name": "Morning", "start_time": "06:00", "end_time": "09:00"});
    let (status, json) = panel.json(json_request(Method::POST, "/create_playlist", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["message"], json!("Created playlist 'Morning'."));

    let (status, json) = panel.json(json_request(Method::POST, "/create_playlist", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["message"], json!("Playlist 'Morning' already exists"));

    let bad = json!({"playlist_name": "Late", "start_time": "25:00", "end_time": "09:00"});
    let (status, _) = panel.json(json_request(Method::POST, "/create_playlist", bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty = json!({"playlist_name": "  ", "start_time": "06:00", "end_time": "09:00"});
    let (status, json) = panel.json(json_request(Method::POST, "/create_playlist", empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Playlist name is required"));

    let rename = json!({"new_name": "Breakfast", "start_time": "06:30", "end_time": "09:30"});
    let (status, json) = panel.json(json_request(Method::PUT, "/update_playlist/Morning", rename.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Updated playlist 'Breakfast'."));

    let (status, _) = panel.json(json_request(Method::PUT, "/update_playlist/Morning", rename)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let names: Vec<Value> = saved_device(panel.dir.path())["playlist_config"]["playlists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].clone())
        .collect();
    assert!(names.contains(&json!("Breakfast")));

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/delete_playlist/Breakfast")
        .body(Body::empty())
        .unwrap();
    let (status, json) = panel.json(delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Deleted playlist 'Breakfast'."));

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/delete_playlist/Breakfast")
        .body(Body::empty())
        .unwrap();
    let (status, _) = panel.json(delete).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_plugin_instance() {
    let panel = Panel::new(false).await;

    let (status, json) = panel.add_photos("Photos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Added plugin instance Photos to playlist Default."));

    let images = panel.images_of("Photos").await;
    assert_eq!(images.len(), 1);
    let uploaded = PathBuf::from(&images[0]);
    assert!(uploaded.is_file());
    assert_eq!(uploaded.parent(), Some(panel.dir.path().join("uploads").as_path()));
    assert!(images[0].ends_with("_cat.png"));
    {
        let cfg = panel.state.config.read().await;
        let instance = cfg.get_playlist_manager().find_plugin("image_upload", "Photos").unwrap();
        assert!(!instance.settings.contains_key("plugin_id"));
    }

    // names are unique per plugin id; the rejected upload is not kept
    let (status, json) = panel.add_photos("Photos").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Plugin instance: Photos already exists"));
    assert_eq!(panel.uploads(), vec![uploaded.clone()]);

    let png = black_png();
    let body = multipart(
        &[
            ("plugin_id", "image_upload"),
            ("playlist", "Default"),
            ("instance_name", "Late"),
            ("refresh_time", "7h"),
        ],
        &[(IMAGE_FILES_KEY, "late.png", png.as_slice())],
    );
    let (status, _) = panel.json(form(Method::POST, "/add_plugin", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(panel.uploads(), vec![uploaded]);

    let body = multipart(
        &[("plugin_id", "teletext"), ("playlist", "Default"), ("instance_name", "News")],
        &[],
    );
    let (status, _) = panel.json(form(Method::POST, "/add_plugin", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = multipart(&[("plugin_id", "image_upload"), ("playlist", "Default")], &[]);
    let (status, json) = panel.json(form(Method::POST, "/add_plugin", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Instance name is required"));
}

#[tokio::test]
async fn test_plugin_page() {
    let panel = Panel::new(false).await;
    panel.add_photos("Photos").await;

    let (status, body) = panel.send(get("/plugin/image_upload")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Image Upload"));
    assert!(html.contains("Default"));

    let (status, body) = panel.send(get("/plugin/image_upload?instance=Photos")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("Photos"));

    let (status, body) = panel.send(get("/plugin/accommodation")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    for name in ["latitude", "longitude", "units", "weatherProvider", "instance_name", "refresh_interval"] {
        assert!(html.contains(&format!("name=\"{name}\"")), "missing {name}");
    }
    assert!(html.contains("<option value=\"metric\""));

    let (status, body) = panel.send(get("/plugin/teletext")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Plugin not found");

    let (status, json) = panel.json(get("/plugin/image_upload?instance=Holiday")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], json!("Plugin instance: Holiday does not exist"));
}

#[tokio::test]
async fn test_static_plugin_images() {
    let panel = Panel::new(false).await;

    let response = panel.router().oneshot(get("/images/image_upload/icon.svg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/svg+xml");

    let (status, body) = panel.send(get("/images/image_upload/../../device.json")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, b"Invalid path");

    let (status, body) = panel.send(get("/images/teletext/icon.svg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Plugin directory not found");

    let (status, body) = panel.send(get("/images/image_upload/missing.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"File not found");
}

#[tokio::test]
async fn test_update_plugin_instance() {
    let panel = Panel::new(false).await;
    panel.add_photos("Photos").await;

    let body = multipart(&[("plugin_id", "image_upload"), ("caption", "holiday")], &[]);
    let (status, json) = panel.json(form(Method::PUT, "/update_plugin_instance/Photos", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Updated plugin instance Photos."));
    {
        let cfg = panel.state.config.read().await;
        let instance = cfg.get_playlist_manager().find_plugin("image_upload", "Photos").unwrap();
        assert_eq!(instance.settings.get("caption"), Some(&json!("holiday")));
        assert!(!instance.settings.contains_key(IMAGE_FILES_KEY));
    }
    // the image the old settings held is released
    assert!(panel.uploads().is_empty());

    let body = multipart(&[("plugin_id", "image_upload")], &[]);
    let (status, json) = panel.json(form(Method::PUT, "/update_plugin_instance/Holiday", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], json!("Plugin instance: Holiday does not exist"));
}

#[tokio::test]
async fn test_delete_plugin_instance_cleans_up() {
    let panel = Panel::new(false).await;
    panel.add_photos("Photos").await;
    let uploaded = PathBuf::from(&panel.images_of("Photos").await[0]);
    assert!(uploaded.is_file());

    let missing = json!({"playlist_name": "Nowhere", "plugin_id": "image_upload", "plugin_instance": "Photos"});
    let (status, json) = panel.json(json_request(Method::POST, "/delete_plugin_instance", missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Playlist not found"));

    let body = json!({"playlist_name": "Default", "plugin_id": "image_upload", "plugin_instance": "Photos"});
    let (status, json) = panel.json(json_request(Method::POST, "/delete_plugin_instance", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Deleted plugin instance."));
    assert!(!uploaded.exists());

    let (status, json) = panel.json(json_request(Method::POST, "/delete_plugin_instance", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Plugin instance not found"));
}

#[tokio::test]
async fn test_update_now_without_refresh_task() {
    let panel = Panel::new(false).await;

    let (status, body) = panel.send(get("/display/current")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Image not generated yet");

    let png = black_png();
    let body = multipart(&[("plugin_id", "image_upload")], &[(IMAGE_FILES_KEY, "direct.png", png.as_slice())]);
    let (status, json) = panel.json(form(Method::POST, "/update_now", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Display updated"));
    assert_eq!(panel.writes(), 1);

    let response = panel.router().oneshot(get("/display/current")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");

    let body = multipart(&[("plugin_id", "teletext")], &[]);
    let (status, json) = panel.json(form(Method::POST, "/update_now", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], json!("Plugin 'teletext' not found"));

    // nothing to show
    let body = multipart(&[("plugin_id", "image_upload")], &[]);
    let (status, _) = panel.json(form(Method::POST, "/update_now", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(panel.writes(), 1);

    // one-off uploads do not outlive the render, failed or not
    let body = multipart(&[("plugin_id", "teletext")], &[(IMAGE_FILES_KEY, "stray.png", png.as_slice())]);
    let (status, _) = panel.json(form(Method::POST, "/update_now", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(panel.uploads().is_empty());
}

#[tokio::test]
async fn test_same_upload_name_in_two_instances() {
    let panel = Panel::new(true).await;
    let (status, _) = panel.add_photos("Kitchen").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = panel.add_photos("Hall").await;
    assert_eq!(status, StatusCode::OK);

    let kitchen = panel.images_of("Kitchen").await;
    let hall = panel.images_of("Hall").await;
    assert_ne!(kitchen, hall);
    assert_eq!(panel.uploads().len(), 2);

    let body = json!({"playlist_name": "Default", "plugin_id": "image_upload", "plugin_instance": "Kitchen"});
    let (status, _) = panel.json(json_request(Method::POST, "/delete_plugin_instance", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!Path::new(&kitchen[0]).exists());
    assert!(Path::new(&hall[0]).is_file());

    let body = json!({"playlist_name": "Default", "plugin_id": "image_upload", "plugin_instance": "Hall"});
    let (status, json) = panel.json(json_request(Method::POST, "/display_plugin_instance", body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");

    panel.shutdown().await;
}

#[tokio::test]
async fn test_settings_page_round_trip() {
    let panel = Panel::new(false).await;

    let (_, body) = panel.send(get("/plugin/image_upload")).await;
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(r#"<input type="file" name="imageFiles[]""#));

    let png = black_png();
    let body = multipart(
        &[("plugin_id", "image_upload"), ("playlist", "Default"), ("instance_name", "Photos")],
        &[
            (IMAGE_FILES_KEY, "a.png", png.as_slice()),
            (IMAGE_FILES_KEY, "b.png", png.as_slice()),
        ],
    );
    let (status, _) = panel.json(form(Method::POST, "/add_plugin", body)).await;
    assert_eq!(status, StatusCode::OK);
    let images = panel.images_of("Photos").await;
    assert_eq!(images.len(), 2);

    // every stored image gets its own control under the list key
    let (_, body) = panel.send(get("/plugin/image_upload?instance=Photos")).await;
    let html = String::from_utf8(body).unwrap();
    assert_eq!(html.matches(r#"type="checkbox" name="imageFiles[]""#).count(), 2);
    for image in &images {
        let file_name = Path::new(image).file_name().unwrap().to_str().unwrap();
        assert!(html.contains(file_name));
    }

    // saving the page as rendered keeps both images
    let fields = [
        ("plugin_id", "image_upload"),
        (IMAGE_FILES_KEY, images[0].as_str()),
        (IMAGE_FILES_KEY, images[1].as_str()),
    ];
    let (status, _) = panel
        .json(form(Method::PUT, "/update_plugin_instance/Photos", multipart(&fields, &[])))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(panel.images_of("Photos").await, images);
    assert_eq!(panel.uploads().len(), 2);

    // unticking one releases it
    let fields = [("plugin_id", "image_upload"), (IMAGE_FILES_KEY, images[0].as_str())];
    let (status, _) = panel
        .json(form(Method::PUT, "/update_plugin_instance/Photos", multipart(&fields, &[])))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(panel.images_of("Photos").await, vec![images[0].clone()]);
    assert!(Path::new(&images[0]).is_file());
    assert!(!Path::new(&images[1]).exists());
}

#[tokio::test]
async fn test_display_instance_through_refresh_task() {
    let panel = Panel::new(true).await;
    panel.add_photos("Photos").await;

    let (status, json) = panel.json(get("/refresh_info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], json!(true));
    assert_eq!(json["refresh_info"], Value::Null);

    let (status, body) = panel.send(get("/plugin_instance_image/Default/image_upload/Photos")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Image not generated yet");

    let body = json!({"playlist_name": "Default", "plugin_id": "image_upload", "plugin_instance": "Photos"});
    let (status, json) = panel.json(json_request(Method::POST, "/display_plugin_instance", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], json!("Display updated"));
    assert_eq!(panel.writes(), 1);

    let response = panel
        .router()
        .oneshot(get("/plugin_instance_image/Default/image_upload/Photos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");

    let (_, json) = panel.json(get("/refresh_info")).await;
    assert_eq!(json["refresh_info"]["refresh_type"], json!("Playlist"));
    assert_eq!(json["refresh_info"]["plugin_instance"], json!("Photos"));
    assert!(json["refresh_info"]["image_hash"].is_string());

    let unknown = json!({"playlist_name": "Nowhere", "plugin_id": "image_upload", "plugin_instance": "Photos"});
    let (status, json) = panel.json(json_request(Method::POST, "/display_plugin_instance", unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], json!("Playlist 'Nowhere' not found"));

    let (status, _) = panel.send(get("/plugin_instance_image/Nowhere/image_upload/Photos")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = panel.send(get("/plugin_instance_image/Default/image_upload/Albums")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Plugin instance not found");

    // manual update goes through the queue as well
    let png = black_png();
    let body = multipart(&[("plugin_id", "image_upload")], &[(IMAGE_FILES_KEY, "manual.png", png.as_slice())]);
    let (status, _) = panel.json(form(Method::POST, "/update_now", body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = panel.json(get("/refresh_info")).await;
    assert_eq!(json["refresh_info"]["refresh_type"], json!("Manual Update"));

    panel.shutdown().await;
}

#[tokio::test]
async fn test_display_instance_needs_running_task() {
    let panel = Panel::new(false).await;
    panel.add_photos("Photos").await;

    let body = json!({"playlist_name": "Default", "plugin_id": "image_upload", "plugin_instance": "Photos"});
    let (status, json) = panel.json(json_request(Method::POST, "/display_plugin_instance", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().starts_with("An error occurred"));

    let (_, json) = panel.json(get("/refresh_info")).await;
    assert_eq!(json["running"], json!(false));
}
