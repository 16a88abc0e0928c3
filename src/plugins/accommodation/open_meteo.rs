/*
 *  plugins/accommodation/open_meteo.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Open-Meteo forecast and air quality client
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

use log::{debug, error, warn};
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::Units;

const VERSION: &str = concat!("inkpanel/", env!("CARGO_PKG_VERSION"));

pub const FORECAST_BASE: &str = "https://api.open-meteo.com/v1/forecast";
pub const AIR_QUALITY_BASE: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

const MAX_RETRIES: u8 = 3;

#[derive(Error, Debug)]
pub enum OpenMeteoError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{what} request returned {status}: {body}")]
    Status {
        what: &'static str,
        status: u16,
        body: String,
    },
    #[error("unparseable {what} response: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentWeather {
    pub time: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    pub apparent_temperature: Option<f64>,
    #[serde(default)]
    pub weathercode: i64,
    #[serde(default = "default_is_day")]
    pub is_day: i64,
    #[serde(default)]
    pub windspeed: f64,
    #[serde(default)]
    pub winddirection: f64,
}

fn default_is_day() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Daily {
    pub time: Vec<String>,
    pub weathercode: Vec<Option<i64>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub sunrise: Vec<String>,
    pub sunset: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Hourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub relative_humidity_2m: Vec<Option<f64>>,
    pub surface_pressure: Vec<Option<f64>>,
    pub visibility: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Forecast {
    pub current_weather: Option<CurrentWeather>,
    pub daily: Daily,
    pub hourly: Hourly,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AirQualityHourly {
    pub time: Vec<String>,
    pub european_aqi: Vec<Option<f64>>,
    pub uv_index: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AirQuality {
    pub hourly: AirQualityHourly,
}

impl Units {
    fn open_meteo_params(self) -> &'static str {
        match self {
            Units::Standard => "temperature_unit=kelvin&wind_speed_unit=ms&precipitation_unit=mm",
            Units::Metric => "temperature_unit=celsius&wind_speed_unit=ms&precipitation_unit=mm",
            Units::Imperial => "temperature_unit=fahrenheit&wind_speed_unit=mph&precipitation_unit=inch",
        }
    }
}

pub fn forecast_url(base: &str, lat: f64, long: f64, units: Units, forecast_days: u32) -> String {
    format!(
        "{base}?latitude={lat}&longitude={long}\
         &hourly=temperature_2m,precipitation,precipitation_probability,relative_humidity_2m,surface_pressure,visibility\
         &daily=weathercode,temperature_2m_max,temperature_2m_min,sunrise,sunset\
         &current_weather=true&timezone=auto&models=best_match&forecast_days={forecast_days}&{}",
        units.open_meteo_params()
    )
}

pub fn air_quality_url(base: &str, lat: f64, long: f64) -> String {
    format!("{base}?latitude={lat}&longitude={long}&hourly=european_aqi,uv_index,uv_index_clear_sky&timezone=auto")
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    forecast_base: String,
    air_quality_base: String,
}

impl OpenMeteoClient {
    pub fn new() -> Result<Self, OpenMeteoError> {
        Self::with_base_urls(FORECAST_BASE, AIR_QUALITY_BASE)
    }

    /// Point the client at other endpoints, e.g. a local mirror
    pub fn with_base_urls(forecast_base: &str, air_quality_base: &str) -> Result<Self, OpenMeteoError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            forecast_base: forecast_base.trim_end_matches('/').to_string(),
            air_quality_base: air_quality_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn forecast(&self, lat: f64, long: f64, units: Units, forecast_days: u32) -> Result<Forecast, OpenMeteoError> {
        let url = forecast_url(&self.forecast_base, lat, long, units, forecast_days);
        let what = "Open-Meteo weather";
        let body = self.get_with_retries(what, &url).await?;
        serde_json::from_str(&body).map_err(|source| OpenMeteoError::Decode { what, source })
    }

    pub async fn air_quality(&self, lat: f64, long: f64) -> Result<AirQuality, OpenMeteoError> {
        let url = air_quality_url(&self.air_quality_base, lat, long);
        let what = "Open-Meteo air quality";
        let body = self.get_with_retries(what, &url).await?;
        serde_json::from_str(&body).map_err(|source| OpenMeteoError::Decode { what, source })
    }

    async fn get_with_retries(&self, what: &'static str, url: &str) -> Result<String, OpenMeteoError> {
        let mut retries = 0;
        loop {
            debug!("GET {}", url);
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await?;
                    if !status.is_success() {
                        error!("Failed to retrieve {} data: {}", what, body);
                        return Err(OpenMeteoError::Status {
                            what,
                            status: status.as_u16(),
                            body,
                        });
                    }
                    return Ok(body);
                }
                Err(e) => {
                    retries += 1;
                    if retries >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!("{} request failed ({}), retrying", what, e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_url() {
        let url = forecast_url(FORECAST_BASE, 52.2297, 21.0122, Units::Metric, 8);
        assert!(url.starts_with("https://api.open-meteo.com/v1/forecast?latitude=52.2297&longitude=21.0122&hourly="));
        assert!(url.contains("&forecast_days=8&temperature_unit=celsius&wind_speed_unit=ms&precipitation_unit=mm"));
        assert!(url.contains("&current_weather=true&timezone=auto&models=best_match"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_imperial_params() {
        let url = forecast_url(FORECAST_BASE, 40.7, -74.0, Units::Imperial, 8);
        assert!(url.ends_with("temperature_unit=fahrenheit&wind_speed_unit=mph&precipitation_unit=inch"));
    }

    #[test]
    fn test_air_quality_url() {
        assert_eq!(
            air_quality_url(AIR_QUALITY_BASE, 1.5, 2.0),
            "https://air-quality-api.open-meteo.com/v1/air-quality?latitude=1.5&longitude=2&hourly=european_aqi,uv_index,uv_index_clear_sky&timezone=auto"
        );
    }

    #[test]
    fn test_decode_with_nulls() {
        let f: Forecast = serde_json::from_str(
            r#"{"current_weather": {"temperature": 12.4, "weathercode": 3, "is_day": 0},
                "hourly": {"time": ["2025-01-01T00:00"], "visibility": [null]}}"#,
        )
        .unwrap();
        let cw = f.current_weather.unwrap();
        assert_eq!(cw.weathercode, 3);
        assert_eq!(cw.is_day, 0);
        assert_eq!(f.hourly.visibility, vec![None]);
        assert!(f.daily.time.is_empty());
    }
}
