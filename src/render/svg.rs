/*
 *  render/svg.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  SVG icon rendering via resvg
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

//! Rendering SVG documents onto a canvas pixmap.
//!
//! This module uses `usvg` (through resvg's re-export) for parsing and
//! `resvg` for rendering. Weather icons are small SVG documents, scaled
//! into the box the layout reserves for them.

use embedded_graphics::primitives::Rectangle;
use log::debug;
use resvg::{
    render,
    usvg::{Options as ResvgUsvgOptions, Transform, Tree as ResvgTree},
};
use std::error::Error;
use std::fmt;
use tiny_skia::Pixmap;

/// Custom error type for SVG rendering operations.
#[derive(Debug)]
pub enum SvgImageError {
    /// Error parsing the SVG data.
    SvgParseError(String),
    /// Target box or document has no area.
    EmptyArea,
}

impl fmt::Display for SvgImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgImageError::SvgParseError(msg) => write!(f, "SVG parse error: {}", msg),
            SvgImageError::EmptyArea => write!(f, "SVG target area is empty"),
        }
    }
}

impl Error for SvgImageError {}

pub fn parse(svg_data: &str) -> Result<ResvgTree, SvgImageError> {
    let usvg_options = ResvgUsvgOptions::default();
    ResvgTree::from_str(svg_data, &usvg_options)
        .map_err(|e| SvgImageError::SvgParseError(format!("Failed to parse SVG: {:?}", e)))
}

/// Render `svg_data` into `area` of `pixmap`.
///
/// The document keeps its aspect ratio and is centred in the box.
pub fn render_into(pixmap: &mut Pixmap, svg_data: &str, area: Rectangle) -> Result<(), SvgImageError> {
    let tree = parse(svg_data)?;
    let svg_size = tree.size();
    if area.size.width == 0 || area.size.height == 0 || svg_size.width() <= 0.0 || svg_size.height() <= 0.0 {
        return Err(SvgImageError::EmptyArea);
    }

    let scale = (area.size.width as f32 / svg_size.width()).min(area.size.height as f32 / svg_size.height());
    let dx = area.top_left.x as f32 + (area.size.width as f32 - svg_size.width() * scale) / 2.0;
    let dy = area.top_left.y as f32 + (area.size.height as f32 - svg_size.height() * scale) / 2.0;
    let transform = Transform::from_row(scale, 0.0, 0.0, scale, dx, dy);

    debug!("svg {}x{} -> {:?} (scale {:.2})", svg_size.width(), svg_size.height(), area, scale);
    render(&tree, transform, &mut pixmap.as_mut());
    Ok(())
}
