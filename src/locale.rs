/*
 *  locale.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Translated UI and log strings
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

use log::{debug, warn};
use mini_moka::sync::Cache;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

const BUILTIN_EN: &str = include_str!("../locales/en.json");
const BUILTIN_PL: &str = include_str!("../locales/pl.json");

pub const DEFAULT_LANGUAGE: &str = "pl";

type StringTable = Arc<HashMap<String, String>>;

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed string table {path}: {source}")]
    Json { path: String, source: serde_json::Error },
}

/// Lazily loaded string tables, one per language.
#[derive(Clone)]
pub struct Locales {
    dir: Option<PathBuf>,
    cache: Cache<String, StringTable>,
}

impl Locales {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: Cache::new(16),
        }
    }

    /// Tables compiled into the binary only.
    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// Look up `key` for `lang` and substitute `{name}` placeholders.
    /// Unknown keys come back verbatim.
    pub fn t(&self, key: &str, lang: &str, args: &[(&str, &str)]) -> String {
        let table = self.table(lang);
        let text = table.get(key).map(String::as_str).unwrap_or(key);
        format_placeholders(text, args)
    }

    fn table(&self, lang: &str) -> StringTable {
        if let Some(table) = self.cache.get(&lang.to_string()) {
            return table;
        }
        // file entries override built-in ones key by key
        let mut table = builtin_table(lang);
        match self.load_from_dir(lang) {
            Ok(Some(overrides)) => table.extend(overrides),
            Ok(None) => {}
            Err(e) => warn!("{e}, falling back to built-in strings"),
        }
        let table = Arc::new(table);
        self.cache.insert(lang.to_string(), table.clone());
        table
    }

    fn load_from_dir(&self, lang: &str) -> Result<Option<HashMap<String, String>>, LocaleError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(None);
        };
        let path = dir.join(format!("{lang}.json"));
        if !path.exists() {
            return Ok(None);
        }
        debug!("loading locale {}", path.display());
        let s = std::fs::read_to_string(&path).map_err(|source| LocaleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = serde_json::from_str(&s).map_err(|source| LocaleError::Json {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(table))
    }
}

fn builtin_table(lang: &str) -> HashMap<String, String> {
    let src = match lang {
        "en" => BUILTIN_EN,
        "pl" => BUILTIN_PL,
        _ => return HashMap::new(),
    };
    serde_json::from_str(src).unwrap_or_default()
}

/// Python-style `{name}` substitution; `{{` and `}}` are literal braces and
/// unknown placeholders are left in place.
pub fn format_placeholders(text: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                match args.iter().find(|(k, _)| *k == name) {
                    Some((_, v)) if closed => out.push_str(v),
                    _ => {
                        out.push('{');
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let locales = Locales::builtin();
        assert_eq!(locales.t("playlist_not_found", "en", &[]), "Playlist not found");
        assert_eq!(locales.t("playlist_not_found", "pl", &[]), "Nie znaleziono playlisty");
    }

    #[test]
    fn test_missing_key_returns_key() {
        let locales = Locales::builtin();
        assert_eq!(locales.t("no_such_key", "en", &[]), "no_such_key");
        assert_eq!(locales.t("display_updated", "xx", &[]), "display_updated");
    }

    #[test]
    fn test_placeholders() {
        let locales = Locales::builtin();
        let msg = locales.t("updated_plugin_instance", "en", &[("instance_name", "Kitchen")]);
        assert_eq!(msg, "Updated plugin instance Kitchen.");

        assert_eq!(format_placeholders("{{literal}} {a}", &[("a", "x")]), "{literal} x");
        assert_eq!(format_placeholders("keep {missing}", &[]), "keep {missing}");
        assert_eq!(format_placeholders("open {tail", &[]), "open {tail");
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{"display_updated": "Refreshed"}"#).unwrap();
        std::fs::write(dir.path().join("de.json"), "not json").unwrap();

        let locales = Locales::new(Some(dir.path().to_path_buf()));
        assert_eq!(locales.t("display_updated", "en", &[]), "Refreshed");
        // keys the file leaves out still come from the built-in table
        assert_eq!(locales.t("playlist_not_found", "en", &[]), "Playlist not found");
        // malformed file falls back to built-ins (none for "de")
        assert_eq!(locales.t("display_updated", "de", &[]), "display_updated");
        // built-in table still used for languages without a file
        assert_eq!(locales.t("display_updated", "pl", &[]), "Wyświetlacz zaktualizowany");
    }
}
