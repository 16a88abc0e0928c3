/*
 *  display/traits.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for display driver abstraction
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

use crate::display::error::DisplayError;

/// Color depth capabilities of different display drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    /// Monochrome panels (1-bit per pixel), typical e-ink
    Monochrome,

    /// 4-bit grayscale (16 levels)
    Gray4,

    /// 24-bit RGB, used by the file and framebuffer outputs
    Rgb,
}

impl ColorDepth {
    /// Size in bytes of a packed frame of `width` x `height` pixels
    pub fn packed_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            ColorDepth::Monochrome => (pixels + 7) / 8,
            ColorDepth::Gray4 => (pixels + 1) / 2,
            ColorDepth::Rgb => pixels * 3,
        }
    }
}

/// Display capabilities and metadata
#[derive(Debug, Clone)]
pub struct DisplayCapabilities {
    /// Display width in pixels
    pub width: u32,

    /// Display height in pixels
    pub height: u32,

    /// Color depth of the panel
    pub color_depth: ColorDepth,

    /// Panel controller can rotate frames itself
    pub supports_rotation: bool,

    /// Panel controller can invert frames itself
    pub supports_invert: bool,
}

/// Minimal hardware abstraction - all display drivers must implement this trait
///
/// Drivers receive fully processed frames: already sized to the panel, rotated
/// and quantized to the panel's color depth. They only move bytes.
pub trait DisplayDriver: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Returns the display dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Initialize the display hardware
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Clear the display to blank (white) state
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Write a packed frame to the display
    ///
    /// The layout follows `capabilities().color_depth`:
    /// - Monochrome: 8 pixels per byte, LSB first, set bit = white
    /// - Gray4: 2 pixels per byte, high nibble first
    /// - Rgb: 3 bytes per pixel, row-major
    fn write_buffer(&mut self, buffer: &[u8]) -> Result<(), DisplayError>;

    /// Set display inversion (if supported)
    fn set_invert(&mut self, _inverted: bool) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }

    /// Set display rotation (if supported)
    ///
    /// Rotation angle should be 0, 90, 180, or 270 degrees.
    fn set_rotation(&mut self, _degrees: u16) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }
}
