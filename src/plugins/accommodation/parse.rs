/*
 *  plugins/accommodation/parse.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Open-Meteo responses to the values the weather screen shows
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

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use log::{error, warn};

use super::open_meteo::{AirQuality, Forecast};
use super::Units;
use crate::astral::MoonData;
use crate::device_config::TimeFormat;

pub const NOT_AVAILABLE: &str = "N/A";

const AQI_SCALE: [&str; 6] = ["Good", "Fair", "Moderate", "Poor", "Very Poor", "Ext Poor"];

/// Everything the weather layout draws
#[derive(Debug, Clone)]
pub struct WeatherView {
    pub current_date: String,
    pub current_icon: &'static str,
    pub current_temperature: String,
    pub feels_like: String,
    pub temperature_unit: &'static str,
    pub units: Units,
    pub time_format: TimeFormat,
    pub forecast: Vec<ForecastDay>,
    pub data_points: Vec<DataPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub day: String,
    pub high: i64,
    pub low: i64,
    pub icon: &'static str,
    pub moon_phase_pct: String,
    pub moon_phase_icon: &'static str,
}

/// One tile in the data point grid.
/// `label` is a locale key, translated when drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub label: &'static str,
    pub measurement: String,
    pub unit: String,
    pub icon: &'static str,
    pub arrow: Option<&'static str>,
}

impl Units {
    pub fn temperature(self) -> &'static str {
        match self {
            Units::Standard => "K",
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed(self) -> &'static str {
        match self {
            Units::Standard | Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

/// Open-Meteo WMO weather code to icon name
pub fn map_weather_code_to_icon(weather_code: i64, is_day: i64) -> &'static str {
    let icon = match weather_code {
        0 => "01d",              // clear sky
        1 => "022d",             // mainly clear
        2 => "02d",              // partly cloudy
        3 => "04d",              // overcast
        51 | 61 | 80 => "51d",   // drizzle, rain, showers: light
        53 | 63 | 81 => "53d",   // moderate
        55 | 65 | 82 => "09d",   // heavy
        45 => "50d",             // fog
        48 => "48d",             // rime fog
        56 | 66 => "56d",        // light freezing drizzle / rain
        57 | 67 => "57d",        // freezing drizzle / rain
        71 | 85 => "71d",        // snow: slight
        73 => "73d",             // snow: moderate
        75 | 86 => "13d",        // snow: heavy
        77 => "77d",             // snow grains
        95 | 96 | 99 => "11d",   // thunderstorm
        _ => "01d",
    };

    if is_day == 0 {
        match icon {
            "01d" => return "01n",
            "022d" => return "022n",
            "02d" => return "02n",
            "10d" => return "10n",
            _ => {}
        }
    }
    icon
}

/// Arrow pointing the way the wind blows, from the direction it comes from
pub fn get_wind_arrow(wind_deg: f64) -> &'static str {
    const DIRECTIONS: [(&str, f64); 9] = [
        ("↓", 22.5),  // N
        ("↙", 67.5),  // NE
        ("←", 112.5), // E
        ("↖", 157.5), // SE
        ("↑", 202.5), // S
        ("↗", 247.5), // SW
        ("→", 292.5), // W
        ("↘", 337.5), // NW
        ("↓", 360.0),
    ];
    let deg = wind_deg.rem_euclid(360.0);
    DIRECTIONS
        .iter()
        .find(|(_, upper)| deg < *upper)
        .map(|(arrow, _)| *arrow)
        .unwrap_or("↑")
}

pub fn format_time(t: NaiveTime, time_format: TimeFormat, hour_only: bool, include_am_pm: bool) -> String {
    let fmt = match (time_format, hour_only, include_am_pm) {
        (TimeFormat::H24, true, _) => return t.format("%H:00").to_string(),
        (TimeFormat::H24, false, _) => return t.format("%H:%M").to_string(),
        (TimeFormat::H12, true, true) => "%I %p",
        (TimeFormat::H12, false, true) => "%I:%M %p",
        (TimeFormat::H12, true, false) => "%I",
        (TimeFormat::H12, false, false) => "%I:%M",
    };
    t.format(fmt).to_string().trim_start_matches('0').to_string()
}

/// Visibility for display: feet for imperial, km otherwise, capped with ">"
pub fn format_visibility(raw: f64, units: Units) -> (String, &'static str) {
    if units == Units::Imperial {
        let ft = raw.round_ties_even() as i64;
        let text = if ft >= 32808 { format!(">{}", ft) } else { ft.to_string() };
        (text, "ft")
    } else {
        let km = (raw / 1000.0 * 10.0).round_ties_even() / 10.0;
        let text = if km >= 10.0 { format!(">{:.1}", km) } else { format!("{:.1}", km) };
        (text, "km")
    }
}

/// Label for a European AQI value; empty for missing or zero
pub fn aqi_scale(aqi: Option<f64>) -> &'static str {
    match aqi {
        Some(v) if v != 0.0 => {
            let idx = ((v / 20.0).floor().max(0.0) as usize).min(AQI_SCALE.len() - 1);
            AQI_SCALE[idx]
        }
        _ => "",
    }
}

/// Open-Meteo local time ("2025-01-01T07:45") or plain date
fn parse_local(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Value of an hourly series at the current hour of day
fn at_current_hour(times: &[String], values: &[Option<f64>], hour: u32, what: &str) -> Option<f64> {
    for (i, time_str) in times.iter().enumerate() {
        match parse_local(time_str) {
            Some(t) if t.hour() == hour => return values.get(i).copied().flatten(),
            Some(_) => {}
            None => warn!("Could not parse time string {} for {}.", time_str, what),
        }
    }
    None
}

fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 { format!("{:.1}", v) } else { format!("{}", v) }
}

pub fn parse_open_meteo_data(
    weather: &Forecast,
    aqi: &AirQuality,
    now: DateTime<Tz>,
    units: Units,
    time_format: TimeFormat,
    lat: f64,
) -> WeatherView {
    let current = weather.current_weather.clone().unwrap_or_default();
    let current_date = current
        .time
        .as_deref()
        .and_then(parse_local)
        .map(|dt| dt.format("%A, %B %d").to_string())
        .unwrap_or_else(|| now.format("%A, %B %d").to_string());

    WeatherView {
        current_date,
        current_icon: map_weather_code_to_icon(current.weathercode, current.is_day),
        current_temperature: format!("{}", current.temperature.round_ties_even() as i64),
        feels_like: format!(
            "{}",
            current.apparent_temperature.unwrap_or(current.temperature).round_ties_even() as i64
        ),
        temperature_unit: units.temperature(),
        units,
        time_format,
        forecast: parse_forecast(weather, current.is_day, lat),
        data_points: parse_data_points(weather, aqi, now, units, time_format),
    }
}

pub fn parse_forecast(weather: &Forecast, is_day: i64, lat: f64) -> Vec<ForecastDay> {
    let daily = &weather.daily;
    let mut forecast = Vec::with_capacity(daily.time.len());

    for (i, time) in daily.time.iter().enumerate() {
        let Some(date) = parse_local(time).map(|dt| dt.date()) else {
            warn!("Could not parse forecast date {}", time);
            continue;
        };
        let code = daily.weathercode.get(i).copied().flatten().unwrap_or(0);
        let moon = MoonData::for_date(date + Duration::days(1));

        forecast.push(ForecastDay {
            day: date.format("%a").to_string(),
            high: daily.temperature_2m_max.get(i).copied().flatten().unwrap_or(0.0) as i64,
            low: daily.temperature_2m_min.get(i).copied().flatten().unwrap_or(0.0) as i64,
            icon: map_weather_code_to_icon(code, is_day),
            moon_phase_pct: format!("{:.0}", moon.illumination_pct),
            moon_phase_icon: moon.icon_name(lat),
        });
    }
    forecast
}

pub fn parse_data_points(
    weather: &Forecast,
    aqi: &AirQuality,
    now: DateTime<Tz>,
    units: Units,
    time_format: TimeFormat,
) -> Vec<DataPoint> {
    let mut data_points = Vec::new();
    let current = weather.current_weather.clone().unwrap_or_default();
    let hourly = &weather.hourly;
    let hour = now.hour();
    let na = || NOT_AVAILABLE.to_string();

    let ampm = |t: NaiveTime| match time_format {
        TimeFormat::H24 => String::new(),
        TimeFormat::H12 => t.format("%p").to_string(),
    };

    match weather.daily.sunrise.first().and_then(|s| parse_local(s)) {
        Some(sunrise) => data_points.push(DataPoint {
            label: "sunrise",
            measurement: format_time(sunrise.time(), time_format, false, false),
            unit: ampm(sunrise.time()),
            icon: "sunrise",
            arrow: None,
        }),
        None => error!("Sunrise not found in Open-Meteo response, this is expected for polar areas in midnight sun and polar night periods."),
    }

    match weather.daily.sunset.first().and_then(|s| parse_local(s)) {
        Some(sunset) => data_points.push(DataPoint {
            label: "sunset",
            measurement: format_time(sunset.time(), time_format, false, false),
            unit: ampm(sunset.time()),
            icon: "sunset",
            arrow: None,
        }),
        None => error!("Sunset not found in Open-Meteo response, this is expected for polar areas in midnight sun and polar night periods."),
    }

    data_points.push(DataPoint {
        label: "wind",
        measurement: trim_float(current.windspeed),
        unit: units.speed().to_string(),
        icon: "wind",
        arrow: Some(get_wind_arrow(current.winddirection)),
    });

    let humidity = at_current_hour(&hourly.time, &hourly.relative_humidity_2m, hour, "humidity");
    data_points.push(DataPoint {
        label: "humidity",
        measurement: humidity.map(|v| (v as i64).to_string()).unwrap_or_else(na),
        unit: "%".to_string(),
        icon: "humidity",
        arrow: None,
    });

    let pressure = at_current_hour(&hourly.time, &hourly.surface_pressure, hour, "pressure");
    data_points.push(DataPoint {
        label: "pressure",
        measurement: pressure.map(|v| (v as i64).to_string()).unwrap_or_else(na),
        unit: "hPa".to_string(),
        icon: "pressure",
        arrow: None,
    });

    let uv = at_current_hour(&aqi.hourly.time, &aqi.hourly.uv_index, hour, "UV Index");
    data_points.push(DataPoint {
        label: "uv_index",
        measurement: uv.map(trim_float).unwrap_or_else(na),
        unit: String::new(),
        icon: "uvi",
        arrow: None,
    });

    let visibility = at_current_hour(&hourly.time, &hourly.visibility, hour, "visibility");
    let (vis_text, vis_unit) = match visibility {
        Some(v) => format_visibility(v, units),
        None => (na(), if units == Units::Imperial { "ft" } else { "km" }),
    };
    data_points.push(DataPoint {
        label: "visibility",
        measurement: vis_text,
        unit: vis_unit.to_string(),
        icon: "visibility",
        arrow: None,
    });

    let current_aqi = at_current_hour(&aqi.hourly.time, &aqi.hourly.european_aqi, hour, "AQI")
        .map(|v| (v * 10.0).round_ties_even() / 10.0);
    data_points.push(DataPoint {
        label: "air_quality",
        measurement: current_aqi.map(trim_float).unwrap_or_else(na),
        unit: aqi_scale(current_aqi).to_string(),
        icon: "aqi",
        arrow: None,
    });

    data_points
}
