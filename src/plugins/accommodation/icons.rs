/*
 *  plugins/accommodation/icons.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather, moon and data point glyphs as monochrome SVG documents
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

//! All icons share a 64x64 view box, black strokes on transparent, so
//! they dither cleanly and scale to any tile the layout hands out.

use std::fmt::Write;

const SIZE: f32 = 64.0;
const STROKE: &str = r#"fill="none" stroke="black" stroke-width="4" stroke-linecap="round" stroke-linejoin="round""#;

fn document(body: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64">{}</svg>"#,
        body
    )
}

fn sun(cx: f32, cy: f32, r: f32) -> String {
    let mut s = format!(r#"<circle cx="{cx}" cy="{cy}" r="{r}" {STROKE}/>"#);
    for i in 0..8 {
        let a = i as f32 * std::f32::consts::FRAC_PI_4;
        let (sin, cos) = a.sin_cos();
        let (r1, r2) = (r + 4.0, r + 10.0);
        let _ = write!(
            s,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" {STROKE}/>"#,
            cx + cos * r1,
            cy + sin * r1,
            cx + cos * r2,
            cy + sin * r2
        );
    }
    s
}

fn crescent(cx: f32, cy: f32, r: f32) -> String {
    // outer arc then the inner bite
    format!(
        r#"<path d="M {x0} {y0} A {r} {r} 0 1 0 {x1} {y1} A {ri} {ri} 0 1 1 {x0} {y0} Z" {STROKE}/>"#,
        x0 = cx + r * 0.3,
        y0 = cy - r * 0.95,
        x1 = cx + r * 0.95,
        y1 = cy + r * 0.3,
        ri = r * 0.75,
    )
}

fn cloud(dx: f32, dy: f32, filled: bool) -> String {
    let fill = if filled { "black" } else { "white" };
    format!(
        r#"<path transform="translate({dx} {dy})" d="M 14 44 A 9 9 0 0 1 16 26 A 12 12 0 0 1 38 22 A 10 10 0 0 1 52 32 A 6 6 0 0 1 50 44 Z" fill="{fill}" stroke="black" stroke-width="4" stroke-linejoin="round"/>"#
    )
}

fn drops(count: usize, y: f32) -> String {
    let mut s = String::new();
    for i in 0..count {
        let x = 22.0 + i as f32 * 10.0;
        let _ = write!(s, r#"<line x1="{x}" y1="{y}" x2="{:.1}" y2="{:.1}" {STROKE}/>"#, x - 3.0, y + 8.0);
    }
    s
}

fn flakes(count: usize, y: f32) -> String {
    let mut s = String::new();
    for i in 0..count {
        let x = 22.0 + i as f32 * 10.0;
        let _ = write!(
            s,
            r#"<line x1="{}" y1="{y}" x2="{}" y2="{}" {STROKE}/><line x1="{}" y1="{}" x2="{}" y2="{y}" {STROKE}/>"#,
            x - 3.0,
            x + 3.0,
            y + 6.0,
            x - 3.0,
            y + 6.0,
            x + 3.0
        );
    }
    s
}

fn ice_bar(y: f32) -> String {
    format!(r#"<line x1="18" y1="{y}" x2="46" y2="{y}" {STROKE}/>"#)
}

fn fog_lines(from: f32) -> String {
    let mut s = String::new();
    for i in 0..3 {
        let y = from + i as f32 * 8.0;
        let _ = write!(s, r#"<line x1="12" y1="{y}" x2="52" y2="{y}" {STROKE}/>"#);
    }
    s
}

fn bolt() -> String {
    r#"<path d="M 34 40 L 26 52 L 33 52 L 28 62 L 40 48 L 33 48 L 38 40 Z" fill="black"/>"#.to_string()
}

/// Weather icon by name (see `map_weather_code_to_icon`)
pub fn weather_icon(name: &str) -> String {
    let body = match name {
        "01d" => sun(32.0, 32.0, 12.0),
        "01n" => crescent(32.0, 32.0, 20.0),
        "022d" => format!("{}{}", sun(26.0, 26.0, 10.0), cloud(10.0, 14.0, false)),
        "022n" => format!("{}{}", crescent(24.0, 24.0, 14.0), cloud(10.0, 14.0, false)),
        "02d" => format!("{}{}", sun(22.0, 22.0, 9.0), cloud(4.0, 8.0, false)),
        "02n" => format!("{}{}", crescent(22.0, 22.0, 12.0), cloud(4.0, 8.0, false)),
        "04d" => format!("{}{}", cloud(6.0, -6.0, true), cloud(-2.0, 4.0, false)),
        "51d" => format!("{}{}", cloud(0.0, -6.0, false), drops(2, 44.0)),
        "53d" => format!("{}{}", cloud(0.0, -6.0, false), drops(3, 44.0)),
        "09d" => format!("{}{}{}", cloud(0.0, -8.0, true), drops(3, 42.0), drops(3, 52.0)),
        "10n" => format!("{}{}{}", crescent(20.0, 18.0, 10.0), cloud(4.0, -2.0, false), drops(3, 48.0)),
        "50d" => format!("{}{}", cloud(0.0, -12.0, false), fog_lines(42.0)),
        "48d" => format!("{}{}{}", cloud(0.0, -12.0, false), fog_lines(42.0), flakes(1, 56.0)),
        "56d" => format!("{}{}{}", cloud(0.0, -8.0, false), drops(2, 40.0), ice_bar(56.0)),
        "57d" => format!("{}{}{}", cloud(0.0, -8.0, true), drops(3, 40.0), ice_bar(56.0)),
        "71d" => format!("{}{}", cloud(0.0, -6.0, false), flakes(2, 46.0)),
        "73d" => format!("{}{}", cloud(0.0, -6.0, false), flakes(3, 46.0)),
        "13d" => format!("{}{}{}", cloud(0.0, -10.0, true), flakes(3, 40.0), flakes(3, 52.0)),
        "77d" => {
            let mut s = cloud(0.0, -6.0, false);
            for x in [22, 32, 42] {
                let _ = write!(s, r#"<circle cx="{x}" cy="50" r="2.5" fill="black"/>"#);
            }
            s
        }
        "11d" => format!("{}{}", cloud(0.0, -10.0, true), bolt()),
        _ => sun(32.0, 32.0, 12.0),
    };
    document(&body)
}

/// Moon phase disc; black is the unlit part
pub fn moon_icon(phase: &str) -> String {
    let (lit, waning) = match phase {
        "newmoon" => (0.0, false),
        "waxingcrescent" => (0.25, false),
        "firstquarter" => (0.5, false),
        "waxinggibbous" => (0.75, false),
        "fullmoon" => (1.0, false),
        "waninggibbous" => (0.75, true),
        "lastquarter" => (0.5, true),
        "waningcrescent" => (0.25, true),
        _ => (0.0, false),
    };
    let (c, r) = (SIZE / 2.0, 26.0_f32);
    let mut body = format!(r#"<circle cx="{c}" cy="{c}" r="{r}" fill="black" stroke="black" stroke-width="3"/>"#);

    if lit >= 1.0 {
        let _ = write!(body, r#"<circle cx="{c}" cy="{c}" r="{r}" fill="white" stroke="black" stroke-width="3"/>"#);
    } else if lit > 0.0 {
        // lit limb on the right, terminator as an elliptical arc
        let rx = r * (2.0 * lit - 1.0_f32).abs();
        let sweep = if lit > 0.5 { 1 } else { 0 };
        let mirror = if waning { format!(r#" transform="translate({SIZE} 0) scale(-1 1)""#) } else { String::new() };
        let _ = write!(
            body,
            r#"<path{mirror} d="M {c} {top} A {r} {r} 0 0 1 {c} {bottom} A {rx:.2} {r} 0 0 {sweep} {c} {top} Z" fill="white"/>"#,
            top = c - r,
            bottom = c + r,
        );
    }
    document(&body)
}

/// Data point glyphs
pub fn data_point_icon(name: &str) -> String {
    let body = match name {
        "sunrise" | "sunset" => {
            let arrow = if name == "sunrise" {
                r#"<path d="M 32 4 L 32 18 M 26 10 L 32 4 L 38 10" fill="none" stroke="black" stroke-width="4" stroke-linecap="round" stroke-linejoin="round"/>"#
            } else {
                r#"<path d="M 32 4 L 32 18 M 26 12 L 32 18 L 38 12" fill="none" stroke="black" stroke-width="4" stroke-linecap="round" stroke-linejoin="round"/>"#
            };
            format!(
                r#"{arrow}<path d="M 16 48 A 16 16 0 0 1 48 48" {STROKE}/><line x1="6" y1="48" x2="58" y2="48" {STROKE}/><line x1="14" y1="56" x2="50" y2="56" {STROKE}/>"#
            )
        }
        "wind" => format!(
            r#"<path d="M 6 24 L 40 24 A 8 8 0 1 0 32 16" {STROKE}/><path d="M 6 36 L 50 36 A 8 8 0 1 1 42 44" {STROKE}/><line x1="6" y1="48" x2="28" y2="48" {STROKE}/>"#
        ),
        "humidity" => format!(r#"<path d="M 32 6 C 32 6 14 28 14 40 A 18 18 0 0 0 50 40 C 50 28 32 6 32 6 Z" {STROKE}/>"#),
        "pressure" => format!(
            r#"<circle cx="32" cy="34" r="24" {STROKE}/><line x1="32" y1="34" x2="44" y2="22" {STROKE}/><circle cx="32" cy="34" r="3" fill="black"/>"#
        ),
        "uvi" => format!("{}{}", sun(32.0, 32.0, 10.0), r#"<circle cx="32" cy="32" r="5" fill="black"/>"#),
        "visibility" => format!(
            r#"<path d="M 4 32 Q 32 6 60 32 Q 32 58 4 32 Z" {STROKE}/><circle cx="32" cy="32" r="8" fill="black"/>"#
        ),
        "aqi" => format!(
            r#"<path d="M 6 20 Q 16 12 26 20 T 46 20 T 60 18" {STROKE}/><path d="M 6 34 Q 16 26 26 34 T 46 34 T 60 32" {STROKE}/><path d="M 6 48 Q 16 40 26 48 T 46 48 T 60 46" {STROKE}/>"#
        ),
        _ => String::new(),
    };
    document(&body)
}

/// Arrow glyph for a wind direction arrow character
pub fn wind_arrow_icon(arrow: &str) -> String {
    let angle = match arrow {
        "↑" => 0,
        "↗" => 45,
        "→" => 90,
        "↘" => 135,
        "↓" => 180,
        "↙" => 225,
        "←" => 270,
        "↖" => 315,
        _ => 0,
    };
    document(&format!(
        r#"<g transform="rotate({angle} 32 32)"><line x1="32" y1="56" x2="32" y2="10" {STROKE}/><path d="M 20 22 L 32 8 L 44 22 Z" fill="black"/></g>"#
    ))
}
