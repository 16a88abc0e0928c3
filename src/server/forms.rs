/*
 *  server/forms.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Multipart form decoding and upload storage
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

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::playlist::Settings;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("malformed form: {0}")]
    Multipart(#[from] MultipartError),
    #[error("cannot store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Store a form value. Keys ending in `[]` collect every value into a
/// list (the key keeps its brackets); other keys keep the last value.
pub fn insert_value(settings: &mut Settings, key: &str, value: String) {
    if key.ends_with("[]") {
        match settings.get_mut(key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            _ => {
                settings.insert(key.to_string(), Value::Array(vec![Value::String(value)]));
            }
        }
    } else {
        settings.insert(key.to_string(), Value::String(value));
    }
}

/// Reduce a client supplied file name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// A decoded form and the files it wrote to the upload directory
#[derive(Debug, Default)]
pub struct ParsedForm {
    pub settings: Settings,
    pub uploads: Vec<PathBuf>,
}

static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stored name for an upload: a digest prefix keeps two instances that
/// both upload `cat.png` from sharing (and deleting) one file.
pub fn stored_name(file_name: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", &digest[..16], file_name)
}

/// Decode a multipart form into settings.
///
/// Text fields go through [`insert_value`]. File fields are written to
/// `upload_dir` under a unique name and their paths recorded under the
/// field name; empty file inputs are skipped. A form that fails half way
/// leaves nothing behind.
pub async fn parse_form(multipart: Multipart, upload_dir: &Path) -> Result<ParsedForm, FormError> {
    let mut form = ParsedForm::default();
    match read_fields(multipart, upload_dir, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            discard_uploads(&form.uploads).await;
            Err(e)
        }
    }
}

async fn read_fields(mut multipart: Multipart, upload_dir: &Path, form: &mut ParsedForm) -> Result<(), FormError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(sanitize_file_name) {
            Some(file_name) => {
                let data = field.bytes().await?;
                if file_name.is_empty() || data.is_empty() {
                    debug!("skipping empty upload in field {}", name);
                    continue;
                }
                tokio::fs::create_dir_all(upload_dir).await?;
                let path = upload_dir.join(stored_name(&file_name, &data));
                tokio::fs::write(&path, &data).await?;
                info!("stored upload {} ({} bytes)", path.display(), data.len());
                insert_value(&mut form.settings, &name, path.to_string_lossy().into_owned());
                form.uploads.push(path);
            }
            None => {
                let text = field.text().await?;
                insert_value(&mut form.settings, &name, text);
            }
        }
    }
    Ok(())
}

/// Remove stored uploads; missing files are not an error.
pub async fn discard_uploads(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("discarded upload {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("could not delete {}: {}", path.display(), e),
        }
    }
}

/// Setting values that name files inside `upload_dir`
pub fn upload_paths(settings: &Settings, upload_dir: &Path) -> Vec<PathBuf> {
    let text = settings.values().flat_map(|v| match v {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    });
    text.map(PathBuf::from)
        .filter(|p| p.parent() == Some(upload_dir))
        .collect()
}
