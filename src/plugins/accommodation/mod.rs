/*
 *  plugins/accommodation/mod.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Accommodation plugin - current weather, forecast, air quality and moon
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

pub mod icons;
pub mod layout;
pub mod open_meteo;
pub mod parse;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use serde_json::json;
use std::str::FromStr;
use tiny_skia::Pixmap;
use tokio::sync::OnceCell;

use crate::device_config::DeviceContext;
use crate::locale::Locales;
use crate::playlist::Settings;
use crate::plugins::{setting_str, FieldKind, Plugin, PluginError, SettingField, TemplateParams};

use open_meteo::OpenMeteoClient;

pub const FORECAST_DAYS: u32 = 8;
pub const DEFAULT_PROVIDER: &str = "OpenMeteo";

const FIELDS: &[SettingField] = &[
    SettingField::new("latitude", "Latitude", FieldKind::Number),
    SettingField::new("longitude", "Longitude", FieldKind::Number),
    SettingField::new("units", "Units", FieldKind::Choice(&["metric", "imperial", "standard"])),
    SettingField::new("weatherProvider", "Weather provider", FieldKind::Choice(&[DEFAULT_PROVIDER])),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Standard,
    Metric,
    Imperial,
}

impl FromStr for Units {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Units::Standard),
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(PluginError::InvalidSettings("Units are required.".to_string())),
        }
    }
}

/// Validated accommodation settings
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    pub provider: String,
}

impl WeatherSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, PluginError> {
        let coord = |key| {
            setting_str(settings, key)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| *v != 0.0)
        };
        let (Some(latitude), Some(longitude)) = (coord("latitude"), coord("longitude")) else {
            return Err(PluginError::InvalidSettings("Latitude and Longitude are required.".to_string()));
        };

        let units = setting_str(settings, "units").unwrap_or_default().parse::<Units>()?;
        let provider = setting_str(settings, "weatherProvider")
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string();

        Ok(Self {
            latitude,
            longitude,
            units,
            provider,
        })
    }
}

pub struct AccommodationPlugin {
    client: OnceCell<OpenMeteoClient>,
    locales: Locales,
}

impl AccommodationPlugin {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
            locales: Locales::builtin(),
        }
    }

    /// Use a prepared client, e.g. one pointed at a local mirror
    pub fn with_client(client: OpenMeteoClient) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
            locales: Locales::builtin(),
        }
    }

    async fn client(&self, provider: &str) -> Result<&OpenMeteoClient, PluginError> {
        self.client
            .get_or_try_init(|| async { OpenMeteoClient::new() })
            .await
            .map_err(|e| {
                error!("cannot build {} client: {}", provider, e);
                PluginError::Request {
                    provider: provider.to_string(),
                }
            })
    }
}

impl Default for AccommodationPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for AccommodationPlugin {
    fn id(&self) -> &str {
        "accommodation"
    }

    fn settings_fields(&self) -> &'static [SettingField] {
        FIELDS
    }

    fn generate_settings_template(&self) -> TemplateParams {
        let mut params = TemplateParams::new();
        params.insert(
            "api_key".into(),
            json!({
                "required": true,
                "service": "OpenWeatherMap",
                "expected_key": "OPEN_WEATHER_MAP_SECRET"
            }),
        );
        params.insert("style_settings".into(), json!(true));
        params
    }

    async fn generate_image(&self, settings: &Settings, device: &DeviceContext) -> Result<Pixmap, PluginError> {
        let ws = WeatherSettings::from_settings(settings)?;
        if ws.provider != DEFAULT_PROVIDER {
            return Err(PluginError::InvalidSettings(format!("Unknown weather provider: {}", ws.provider)));
        }

        let client = self.client(&ws.provider).await?;
        let request_failure = |e: open_meteo::OpenMeteoError| {
            error!("{} request failed: {}", ws.provider, e);
            PluginError::Request {
                provider: ws.provider.clone(),
            }
        };
        let forecast = client
            .forecast(ws.latitude, ws.longitude, ws.units, FORECAST_DAYS)
            .await
            .map_err(request_failure)?;
        let air_quality = client
            .air_quality(ws.latitude, ws.longitude)
            .await
            .map_err(request_failure)?;

        let now = Utc::now().with_timezone(&device.timezone);
        let view = parse::parse_open_meteo_data(
            &forecast,
            &air_quality,
            now,
            ws.units,
            device.time_format,
            ws.latitude,
        );
        info!("accommodation: {} {}{}", view.current_date, view.current_temperature, view.temperature_unit);

        let (width, height) = device.dimensions();
        let canvas = layout::render(&view, width, height, &self.locales, &device.language)?;
        Ok(canvas.into_pixmap())
    }
}
