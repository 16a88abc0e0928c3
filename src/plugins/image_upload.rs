/*
 *  plugins/image_upload.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shows user uploaded PNG images, one per refresh
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

use async_trait::async_trait;
use log::{info, warn};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use tiny_skia::Pixmap;

use crate::device_config::DeviceContext;
use crate::playlist::Settings;
use crate::plugins::{setting_list, FieldKind, Plugin, PluginError, SettingField};

pub const IMAGE_FILES_KEY: &str = "imageFiles[]";

const FIELDS: &[SettingField] = &[SettingField::new(IMAGE_FILES_KEY, "Images", FieldKind::Images)];

#[derive(Debug, Default)]
pub struct ImageUploadPlugin {
    next_index: AtomicUsize,
}

impl ImageUploadPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for ImageUploadPlugin {
    fn id(&self) -> &str {
        "image_upload"
    }

    fn settings_fields(&self) -> &'static [SettingField] {
        FIELDS
    }

    async fn generate_image(&self, settings: &Settings, _device: &DeviceContext) -> Result<Pixmap, PluginError> {
        let files = setting_list(settings, IMAGE_FILES_KEY);
        if files.is_empty() {
            return Err(PluginError::InvalidSettings("No images provided.".to_string()));
        }

        let index = self.next_index.fetch_add(1, Ordering::Relaxed) % files.len();
        let path = &files[index];
        info!("image_upload showing {} ({} of {})", path, index + 1, files.len());

        let bytes = tokio::fs::read(path).await?;
        Pixmap::decode_png(&bytes).map_err(|e| PluginError::Image(format!("{}: {}", path, e)))
    }

    async fn cleanup(&self, settings: &Settings) -> Result<(), PluginError> {
        for path in setting_list(settings, IMAGE_FILES_KEY) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("deleted uploaded image {}", path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("could not delete {}: {}", path, e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_png(path: &std::path::Path, w: u32, h: u32) {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(tiny_skia::Color::BLACK);
        p.save_png(path).unwrap();
    }

    #[tokio::test]
    async fn test_rotates_through_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_png(&a, 4, 4);
        write_png(&b, 8, 2);

        let mut settings = Settings::new();
        settings.insert(
            IMAGE_FILES_KEY.into(),
            json!([a.to_string_lossy(), b.to_string_lossy()]),
        );

        let plugin = ImageUploadPlugin::new();
        let ctx = DeviceContext::default();
        let first = plugin.generate_image(&settings, &ctx).await.unwrap();
        let second = plugin.generate_image(&settings, &ctx).await.unwrap();
        let third = plugin.generate_image(&settings, &ctx).await.unwrap();
        assert_eq!(first.width(), 4);
        assert_eq!(second.width(), 8);
        assert_eq!(third.width(), 4);
    }

    #[tokio::test]
    async fn test_empty_list_is_an_error() {
        let plugin = ImageUploadPlugin::new();
        let err = plugin.generate_image(&Settings::new(), &DeviceContext::default()).await;
        assert!(matches!(err, Err(PluginError::InvalidSettings(_))));
    }

    #[tokio::test]
    async fn test_cleanup_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 2, 2);
        let mut settings = Settings::new();
        settings.insert(
            IMAGE_FILES_KEY.into(),
            json!([a.to_string_lossy(), dir.path().join("gone.png").to_string_lossy()]),
        );

        ImageUploadPlugin::new().cleanup(&settings).await.unwrap();
        assert!(!a.exists());
    }
}
