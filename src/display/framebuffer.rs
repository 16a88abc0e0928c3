/*
 *  display/framebuffer.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Framebuffer abstraction with enum dispatch for different color types
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

use embedded_graphics::pixelcolor::{BinaryColor, Gray4, Rgb888};
use embedded_graphics::prelude::*;
use tiny_skia::Pixmap;

use crate::display::traits::ColorDepth;
use crate::vframebuf::VarFrameBuf;

/// Grayscale threshold for 1-bit output
const MONO_THRESHOLD: f32 = 127.0;

/// Enum dispatch over the panel color depths
///
/// The correct variant is selected from the driver capabilities, the
/// manager never needs to know which one it is holding.
pub enum FrameBuffer {
    /// Monochrome framebuffer (1-bit per pixel), `On` is white
    Mono(VarFrameBuf<BinaryColor>),

    /// 4-bit grayscale framebuffer (16 levels), 15 is white
    Gray4(VarFrameBuf<Gray4>),

    /// Full color framebuffer
    Rgb(VarFrameBuf<Rgb888>),
}

impl FrameBuffer {
    /// Quantize a rendered image to the requested color depth.
    ///
    /// Monochrome output is Floyd-Steinberg dithered, grayscale is
    /// rounded to the nearest of 16 levels. Transparent areas are
    /// composited over white, the e-ink background.
    pub fn from_pixmap(pixmap: &Pixmap, depth: ColorDepth) -> Self {
        let (w, h) = (pixmap.width(), pixmap.height());
        match depth {
            ColorDepth::Monochrome => {
                let mut fb = VarFrameBuf::new(w, h, BinaryColor::On);
                let mut luma = luma_plane(pixmap);
                dither_floyd_steinberg(&mut luma, w as usize, h as usize);
                for (dst, &l) in fb.as_mut_slice().iter_mut().zip(luma.iter()) {
                    *dst = if l > MONO_THRESHOLD { BinaryColor::On } else { BinaryColor::Off };
                }
                FrameBuffer::Mono(fb)
            }
            ColorDepth::Gray4 => {
                let mut fb = VarFrameBuf::new(w, h, Gray4::WHITE);
                for (dst, l) in fb.as_mut_slice().iter_mut().zip(luma_plane(pixmap)) {
                    *dst = Gray4::new((l / 17.0).round().clamp(0.0, 15.0) as u8);
                }
                FrameBuffer::Gray4(fb)
            }
            ColorDepth::Rgb => {
                let mut fb = VarFrameBuf::new(w, h, Rgb888::WHITE);
                for (dst, p) in fb.as_mut_slice().iter_mut().zip(pixmap.pixels()) {
                    let (r, g, b) = over_white(p);
                    *dst = Rgb888::new(r, g, b);
                }
                FrameBuffer::Rgb(fb)
            }
        }
    }

    /// Get dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FrameBuffer::Mono(fb) => (fb.width() as u32, fb.height() as u32),
            FrameBuffer::Gray4(fb) => (fb.width() as u32, fb.height() as u32),
            FrameBuffer::Rgb(fb) => (fb.width() as u32, fb.height() as u32),
        }
    }

    pub fn color_depth(&self) -> ColorDepth {
        match self {
            FrameBuffer::Mono(_) => ColorDepth::Monochrome,
            FrameBuffer::Gray4(_) => ColorDepth::Gray4,
            FrameBuffer::Rgb(_) => ColorDepth::Rgb,
        }
    }

    /// Convert framebuffer to packed byte array for write_buffer()
    ///
    /// Returns a Vec<u8> with pixels packed according to color depth:
    /// - Monochrome: 8 pixels per byte (LSB first)
    /// - Gray4: 2 pixels per byte (high nibble first)
    /// - Rgb: 3 bytes per pixel
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        match self {
            FrameBuffer::Mono(fb) => {
                let pixels = fb.as_slice();
                let mut bytes = vec![0u8; (pixels.len() + 7) / 8];
                for (i, &pixel) in pixels.iter().enumerate() {
                    if pixel.is_on() {
                        bytes[i / 8] |= 1 << (i % 8);
                    }
                }
                bytes
            }
            FrameBuffer::Gray4(fb) => {
                let pixels = fb.as_slice();
                let mut bytes = vec![0u8; (pixels.len() + 1) / 2];
                for (i, &pixel) in pixels.iter().enumerate() {
                    let value = pixel.luma() & 0x0F;
                    if i % 2 == 0 {
                        bytes[i / 2] |= value << 4;
                    } else {
                        bytes[i / 2] |= value;
                    }
                }
                bytes
            }
            FrameBuffer::Rgb(fb) => fb
                .as_slice()
                .iter()
                .flat_map(|c| [c.r(), c.g(), c.b()])
                .collect(),
        }
    }
}

/// Composite a premultiplied pixel over white
fn over_white(p: &tiny_skia::PremultipliedColorU8) -> (u8, u8, u8) {
    let bg = 255 - p.alpha();
    (
        p.red().saturating_add(bg),
        p.green().saturating_add(bg),
        p.blue().saturating_add(bg),
    )
}

fn luma_plane(pixmap: &Pixmap) -> Vec<f32> {
    pixmap
        .pixels()
        .iter()
        .map(|p| {
            let (r, g, b) = over_white(p);
            0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
        })
        .collect()
}

/// Floyd-Steinberg error diffusion on a grayscale plane, in place.
/// After the pass every sample is either 0.0 or 255.0.
pub fn dither_floyd_steinberg(plane: &mut [f32], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = plane[idx];
            let new = if old > MONO_THRESHOLD { 255.0 } else { 0.0 };
            plane[idx] = new;
            let error = old - new;

            let mut spread = |nx: usize, ny: usize, weight: f32| {
                let n = ny * width + nx;
                plane[n] = (plane[n] + error * weight / 16.0).clamp(0.0, 255.0);
            };
            if x + 1 < width {
                spread(x + 1, y, 7.0);
            }
            if y + 1 < height {
                if x > 0 {
                    spread(x - 1, y + 1, 3.0);
                }
                spread(x, y + 1, 5.0);
                if x + 1 < width {
                    spread(x + 1, y + 1, 1.0);
                }
            }
        }
    }
}
