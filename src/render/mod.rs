/*
 *  render/mod.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Drawing surface for plugins - embedded-graphics on top of a tiny-skia pixmap
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

pub mod svg;

use core::convert::Infallible;
use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::{BinaryColor, Rgb888},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use embedded_text::{style::TextBoxStyleBuilder, TextBox};
use thiserror::Error;
use tiny_skia::{ColorU8, Pixmap};

use crate::vframebuf::VarFrameBuf;

pub use embedded_text::alignment::{HorizontalAlignment, VerticalAlignment};
pub use svg::SvgImageError;

pub const BLACK: Rgb888 = Rgb888::BLACK;
pub const WHITE: Rgb888 = Rgb888::WHITE;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot allocate a {0}x{1} canvas")]
    Allocation(u32, u32),
    #[error(transparent)]
    Svg(#[from] SvgImageError),
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// An RGB drawing surface, white on creation.
///
/// Implements `DrawTarget<Color = Rgb888>` so every embedded-graphics
/// primitive and font works on it directly, while SVG icons go through
/// resvg onto the same pixmap.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation(width, height))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        self.pixmap.encode_png().map_err(|e| RenderError::Encode(e.to_string()))
    }

    pub fn fill_rect(&mut self, area: Rectangle, color: Rgb888) {
        let _ = area.into_styled(PrimitiveStyle::with_fill(color)).draw(self);
    }

    pub fn line(&mut self, from: Point, to: Point, color: Rgb888, width: u32) {
        let _ = Line::new(from, to)
            .into_styled(PrimitiveStyle::with_stroke(color, width))
            .draw(self);
    }

    /// Draw one line of text; `pos` is the top of the line at the
    /// alignment anchor. Returns the drawn width in pixels.
    pub fn text(&mut self, text: &str, pos: Point, font: &MonoFont, color: Rgb888, align: Alignment) -> u32 {
        let style = MonoTextStyle::new(font, color);
        let text_style = TextStyleBuilder::new().alignment(align).baseline(Baseline::Top).build();
        let _ = Text::with_text_style(text, pos, style, text_style).draw(self);
        text_width(text, font, 1)
    }

    /// Draw text blown up `scale` times, nearest neighbour.
    ///
    /// The mono fonts top out at 10x20; headline figures on a 800x480
    /// panel need more, so glyphs are rasterized off-screen and each
    /// lit pixel becomes a `scale` x `scale` block.
    pub fn text_scaled(
        &mut self,
        text: &str,
        pos: Point,
        font: &MonoFont,
        scale: u32,
        color: Rgb888,
        align: Alignment,
    ) -> u32 {
        let scale = scale.max(1);
        let w = text_width(text, font, 1);
        let h = font.character_size.height;
        if w == 0 {
            return 0;
        }

        let mut plane = VarFrameBuf::new(w, h, BinaryColor::Off);
        let style = MonoTextStyle::new(font, BinaryColor::On);
        let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut plane);

        let full = (w * scale) as i32;
        let x0 = match align {
            Alignment::Left => pos.x,
            Alignment::Center => pos.x - full / 2,
            Alignment::Right => pos.x - full,
        };
        let block = Size::new(scale, scale);
        for (y, row) in plane.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                if px.is_on() {
                    let tl = Point::new(x0 + x as i32 * scale as i32, pos.y + y as i32 * scale as i32);
                    self.fill_rect(Rectangle::new(tl, block), color);
                }
            }
        }
        w * scale
    }

    /// Text word-wrapped inside `bounds`; lines that do not fit are dropped
    pub fn text_box(
        &mut self,
        text: &str,
        bounds: Rectangle,
        font: &MonoFont,
        color: Rgb888,
        align: HorizontalAlignment,
        valign: VerticalAlignment,
    ) {
        let style = MonoTextStyle::new(font, color);
        let textbox_style = TextBoxStyleBuilder::new()
            .alignment(align)
            .vertical_alignment(valign)
            .build();
        let _ = TextBox::with_textbox_style(text, bounds, style, textbox_style).draw(self);
    }

    /// Render an SVG document into the given box, aspect preserved and centred
    pub fn draw_svg(&mut self, data: &str, area: Rectangle) -> Result<(), RenderError> {
        svg::render_into(&mut self.pixmap, data, area)?;
        Ok(())
    }
}

/// Width in pixels of `text` in a mono font at the given scale
pub fn text_width(text: &str, font: &MonoFont, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    let advance = font.character_size.width + font.character_spacing;
    (n * advance - font.character_spacing) * scale
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.pixmap.width(), self.pixmap.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        let data = self.pixmap.pixels_mut();
        for Pixel(p, c) in pixels {
            if p.x >= 0 && p.y >= 0 && p.x < w && p.y < h {
                data[(p.y * w + p.x) as usize] = ColorU8::from_rgba(c.r(), c.g(), c.b(), 255).premultiply();
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        if clipped.size.width == 0 || clipped.size.height == 0 {
            return Ok(());
        }
        if let Some(rect) = tiny_skia::Rect::from_xywh(
            clipped.top_left.x as f32,
            clipped.top_left.y as f32,
            clipped.size.width as f32,
            clipped.size.height as f32,
        ) {
            let mut paint = tiny_skia::Paint::default();
            paint.set_color_rgba8(color.r(), color.g(), color.b(), 255);
            paint.anti_alias = false;
            self.pixmap.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);
        }
        Ok(())
    }
}
