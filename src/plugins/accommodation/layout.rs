/*
 *  plugins/accommodation/layout.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather screen layout
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

use embedded_graphics::{
    mono_font::{
        iso_8859_2::{FONT_10X20, FONT_6X10, FONT_7X13, FONT_7X13_BOLD, FONT_9X15, FONT_9X15_BOLD},
        MonoFont,
    },
    prelude::*,
    primitives::Rectangle,
    text::Alignment,
};

use super::icons;
use super::parse::{DataPoint, ForecastDay, WeatherView};
use crate::locale::Locales;
use crate::render::{text_width, Canvas, HorizontalAlignment, RenderError, VerticalAlignment, BLACK};

const GRID_COLUMNS: usize = 2;

fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle {
    Rectangle::new(Point::new(x, y), Size::new(w.max(0) as u32, h.max(0) as u32))
}

/// Icons shrink with the panel; a box that collapsed to nothing is skipped
fn place(canvas: &mut Canvas, svg: &str, area: Rectangle) -> Result<(), RenderError> {
    if area.size.width == 0 || area.size.height == 0 {
        return Ok(());
    }
    canvas.draw_svg(svg, area)
}

fn font_height(font: &MonoFont) -> i32 {
    font.character_size.height as i32
}

/// Draw the weather screen at `width` x `height`.
///
/// Landscape puts the current conditions beside the data point grid,
/// portrait stacks them. The forecast strip always runs along the bottom.
pub fn render(
    view: &WeatherView,
    width: u32,
    height: u32,
    locales: &Locales,
    lang: &str,
) -> Result<Canvas, RenderError> {
    let mut canvas = Canvas::new(width, height)?;
    let (w, h) = (width as i32, height as i32);
    let margin = (w.min(h) / 30).max(4);
    let header_scale = if w.min(h) >= 400 { 2 } else { 1 };

    canvas.text_scaled(
        &view.current_date,
        Point::new(margin, margin),
        &FONT_10X20,
        header_scale,
        BLACK,
        Alignment::Left,
    );
    let header_bottom = margin + font_height(&FONT_10X20) * header_scale as i32 + margin / 2;
    canvas.line(Point::new(margin, header_bottom), Point::new(w - margin, header_bottom), BLACK, 2);

    let forecast_h = h * 28 / 100;
    let body_top = header_bottom + margin / 2;
    let body_bottom = h - forecast_h - margin / 2;
    let body_h = body_bottom - body_top;
    let body_w = w - 2 * margin;

    let (current_area, grid_area) = if w >= h {
        let split = body_w * 45 / 100;
        (
            rect(margin, body_top, split, body_h),
            rect(margin + split, body_top, body_w - split, body_h),
        )
    } else {
        let split = body_h * 40 / 100;
        (
            rect(margin, body_top, body_w, split),
            rect(margin, body_top + split, body_w, body_h - split),
        )
    };

    draw_current(&mut canvas, view, current_area, locales, lang)?;
    draw_data_points(&mut canvas, &view.data_points, grid_area, GRID_COLUMNS, locales, lang)?;

    canvas.line(Point::new(margin, body_bottom), Point::new(w - margin, body_bottom), BLACK, 2);
    draw_forecast(
        &mut canvas,
        &view.forecast,
        rect(margin, body_bottom + margin / 2, body_w, forecast_h - margin),
    )?;

    Ok(canvas)
}

fn draw_current(
    canvas: &mut Canvas,
    view: &WeatherView,
    area: Rectangle,
    locales: &Locales,
    lang: &str,
) -> Result<(), RenderError> {
    let (x, y) = (area.top_left.x, area.top_left.y);
    let (aw, ah) = (area.size.width as i32, area.size.height as i32);
    let icon = (ah * 80 / 100).min(aw * 45 / 100);
    place(canvas, &icons::weather_icon(view.current_icon), rect(x, y + (ah - icon) / 2, icon, icon))?;

    let text_x = x + icon + icon / 10;
    let room = (aw - (text_x - x)).max(1) as u32;
    let temperature = format!("{}{}", view.current_temperature, view.temperature_unit);
    let natural = text_width(&temperature, &FONT_10X20, 1).max(1);
    let scale = (room / natural).clamp(1, (icon / font_height(&FONT_10X20)).max(1) as u32);
    let temp_h = font_height(&FONT_10X20) * scale as i32;

    let feels = format!(
        "{} {}{}",
        locales.t("feels_like", lang, &[]),
        view.feels_like,
        view.temperature_unit
    );
    let block = temp_h + 6 + font_height(&FONT_9X15);
    let top = y + (ah - block) / 2;

    canvas.text_scaled(&temperature, Point::new(text_x, top), &FONT_10X20, scale, BLACK, Alignment::Left);
    canvas.text(&feels, Point::new(text_x, top + temp_h + 6), &FONT_9X15, BLACK, Alignment::Left);
    Ok(())
}

fn draw_data_points(
    canvas: &mut Canvas,
    points: &[DataPoint],
    area: Rectangle,
    columns: usize,
    locales: &Locales,
    lang: &str,
) -> Result<(), RenderError> {
    if points.is_empty() {
        return Ok(());
    }
    let rows = points.len().div_ceil(columns);
    let tile_w = area.size.width as i32 / columns as i32;
    let tile_h = area.size.height as i32 / rows as i32;
    let icon = (tile_h - 4).min(tile_w / 4).max(0);

    for (i, point) in points.iter().enumerate() {
        let x = area.top_left.x + (i % columns) as i32 * tile_w;
        let y = area.top_left.y + (i / columns) as i32 * tile_h;

        place(canvas, &icons::data_point_icon(point.icon), rect(x, y + (tile_h - icon) / 2, icon, icon))?;

        let text_x = x + icon + 6;
        // long translated labels wrap upwards into the top half of the tile
        canvas.text_box(
            &locales.t(point.label, lang, &[]),
            rect(text_x, y, tile_w - icon - 6, tile_h / 2 - 1),
            &FONT_6X10,
            BLACK,
            HorizontalAlignment::Left,
            VerticalAlignment::Bottom,
        );

        let value = if point.unit.is_empty() {
            point.measurement.clone()
        } else {
            format!("{} {}", point.measurement, point.unit)
        };
        let value_y = y + tile_h / 2 + 1;
        let drawn = canvas.text(&value, Point::new(text_x, value_y), &FONT_9X15_BOLD, BLACK, Alignment::Left);

        if let Some(arrow) = point.arrow {
            let size = font_height(&FONT_9X15_BOLD);
            place(canvas, &icons::wind_arrow_icon(arrow), rect(text_x + drawn as i32 + 4, value_y, size, size))?;
        }
    }
    Ok(())
}

fn draw_forecast(canvas: &mut Canvas, days: &[ForecastDay], area: Rectangle) -> Result<(), RenderError> {
    if days.is_empty() {
        return Ok(());
    }
    let col_w = area.size.width as i32 / days.len() as i32;
    let ah = area.size.height as i32;
    let label_h = font_height(&FONT_7X13_BOLD);
    let moon = (ah / 5).min(col_w / 3).max(0);
    let icon = (ah - 2 * label_h - moon - 8).min(col_w - 8).max(0);

    for (i, day) in days.iter().enumerate() {
        let x = area.top_left.x + i as i32 * col_w;
        let cx = x + col_w / 2;
        let mut y = area.top_left.y;

        canvas.text(&day.day, Point::new(cx, y), &FONT_7X13_BOLD, BLACK, Alignment::Center);
        y += label_h + 2;

        place(canvas, &icons::weather_icon(day.icon), rect(cx - icon / 2, y, icon, icon))?;
        y += icon + 2;

        let temps = format!("{}° / {}°", day.high, day.low);
        canvas.text(&temps, Point::new(cx, y), &FONT_7X13, BLACK, Alignment::Center);
        y += label_h + 2;

        let pct = format!("{}%", day.moon_phase_pct);
        let pct_w = text_width(&pct, &FONT_6X10, 1) as i32;
        let row_w = moon + 3 + pct_w;
        let left = cx - row_w / 2;
        place(canvas, &icons::moon_icon(day.moon_phase_icon), rect(left, y, moon, moon))?;
        canvas.text(
            &pct,
            Point::new(left + moon + 3, y + (moon - font_height(&FONT_6X10)) / 2),
            &FONT_6X10,
            BLACK,
            Alignment::Left,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_config::TimeFormat;
    use crate::plugins::accommodation::Units;

    fn view() -> WeatherView {
        let point = |label: &'static str, icon: &'static str| DataPoint {
            label,
            measurement: "12".into(),
            unit: "%".into(),
            icon,
            arrow: if label == "wind" { Some("↙") } else { None },
        };
        WeatherView {
            current_date: "Monday, April 22".into(),
            current_icon: "02d",
            current_temperature: "12".into(),
            feels_like: "10".into(),
            temperature_unit: "°C",
            units: Units::Metric,
            time_format: TimeFormat::H24,
            forecast: (0..7)
                .map(|i| ForecastDay {
                    day: format!("D{}", i),
                    high: 15,
                    low: -2,
                    icon: "51d",
                    moon_phase_pct: "98".into(),
                    moon_phase_icon: "waninggibbous",
                })
                .collect(),
            data_points: vec![
                point("sunrise", "sunrise"),
                point("sunset", "sunset"),
                point("wind", "wind"),
                point("humidity", "humidity"),
                point("pressure", "pressure"),
                point("uv_index", "uvi"),
                point("visibility", "visibility"),
                point("air_quality", "aqi"),
            ],
        }
    }

    fn dark_pixels(canvas: &Canvas) -> usize {
        canvas.pixmap().pixels().iter().filter(|p| p.red() < 128).count()
    }

    #[test]
    fn test_landscape_render() {
        let canvas = render(&view(), 800, 480, &Locales::builtin(), "en").unwrap();
        assert_eq!((canvas.width(), canvas.height()), (800, 480));
        assert!(dark_pixels(&canvas) > 2000);
    }

    #[test]
    fn test_portrait_render() {
        let canvas = render(&view(), 480, 800, &Locales::builtin(), "pl").unwrap();
        assert_eq!((canvas.width(), canvas.height()), (480, 800));
        assert!(dark_pixels(&canvas) > 2000);
    }

    #[test]
    fn test_empty_view_draws_header_only() {
        let mut v = view();
        v.forecast.clear();
        v.data_points.clear();
        let canvas = render(&v, 400, 300, &Locales::builtin(), "en").unwrap();
        assert!(dark_pixels(&canvas) > 0);
    }
}
