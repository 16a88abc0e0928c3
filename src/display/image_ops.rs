/*
 *  display/image_ops.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Pixmap post-processing ahead of quantization: resize, rotate, invert
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

use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::device_config::ImageSetting;
use crate::display::error::DisplayError;

fn blank(width: u32, height: u32) -> Result<Pixmap, DisplayError> {
    let mut p = Pixmap::new(width, height).ok_or_else(|| {
        DisplayError::ImageError(format!("cannot allocate {}x{} pixmap", width, height))
    })?;
    p.fill(Color::WHITE);
    Ok(p)
}

/// Scale `src` onto a white `width` x `height` canvas.
///
/// `KeepWidth` and `KeepHeight` preserve the aspect ratio and centre the
/// other axis, cropping or padding as needed. `Fit` stretches both axes.
/// When several settings are given the first keep-* wins.
pub fn resize(
    src: &Pixmap,
    width: u32,
    height: u32,
    settings: &[ImageSetting],
) -> Result<Pixmap, DisplayError> {
    if src.width() == width && src.height() == height {
        return Ok(src.clone());
    }
    let sx = width as f32 / src.width() as f32;
    let sy = height as f32 / src.height() as f32;

    let mode = settings
        .iter()
        .copied()
        .find(|s| *s != ImageSetting::Fit)
        .unwrap_or(ImageSetting::Fit);

    let transform = match mode {
        ImageSetting::KeepWidth => {
            let dy = (height as f32 - src.height() as f32 * sx) / 2.0;
            Transform::from_row(sx, 0.0, 0.0, sx, 0.0, dy)
        }
        ImageSetting::KeepHeight => {
            let dx = (width as f32 - src.width() as f32 * sy) / 2.0;
            Transform::from_row(sy, 0.0, 0.0, sy, dx, 0.0)
        }
        ImageSetting::Fit => Transform::from_scale(sx, sy),
    };

    let mut out = blank(width, height)?;
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
    Ok(out)
}

/// Rotate clockwise by a multiple of 90 degrees, pixel exact.
pub fn rotate(src: &Pixmap, degrees: u16) -> Result<Pixmap, DisplayError> {
    let (w, h) = (src.width(), src.height());
    let (ow, oh) = match degrees % 360 {
        0 => return Ok(src.clone()),
        90 | 270 => (h, w),
        180 => (w, h),
        other => return Err(DisplayError::InvalidRotation(other)),
    };

    let mut out = blank(ow, oh)?;
    let src_px = src.pixels();
    let out_px = out.pixels_mut();
    for y in 0..h {
        for x in 0..w {
            let (nx, ny) = match degrees % 360 {
                90 => (h - 1 - y, x),
                180 => (w - 1 - x, h - 1 - y),
                _ => (y, w - 1 - x),
            };
            out_px[(ny * ow + nx) as usize] = src_px[(y * w + x) as usize];
        }
    }
    Ok(out)
}

/// Invert colors in place, alpha untouched.
pub fn invert(pixmap: &mut Pixmap) {
    // premultiplied: inverse channel is a - c
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let a = px[3];
        px[0] = a - px[0].min(a);
        px[1] = a - px[1].min(a);
        px[2] = a - px[2].min(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Pixmap {
        let mut p = Pixmap::new(w, h).unwrap();
        for (i, px) in p.data_mut().chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&[i as u8, 0, 0, 255]);
        }
        p
    }

    fn red_at(p: &Pixmap, x: u32, y: u32) -> u8 {
        p.pixel(x, y).unwrap().red()
    }

    #[test]
    fn test_rotate_90_moves_corners() {
        let src = gradient(3, 2);
        let out = rotate(&src, 90).unwrap();
        assert_eq!((out.width(), out.height()), (2, 3));
        // top-left goes to top-right
        assert_eq!(red_at(&out, 1, 0), red_at(&src, 0, 0));
        // bottom-left goes to top-left
        assert_eq!(red_at(&out, 0, 0), red_at(&src, 0, 1));
    }

    #[test]
    fn test_rotate_full_turn_is_identity() {
        let src = gradient(4, 3);
        let mut img = src.clone();
        for _ in 0..4 {
            img = rotate(&img, 90).unwrap();
        }
        assert_eq!(img.data(), src.data());
        assert!(rotate(&src, 45).is_err());
    }

    #[test]
    fn test_invert() {
        let mut p = Pixmap::new(1, 1).unwrap();
        p.fill(Color::WHITE);
        invert(&mut p);
        let px = p.pixel(0, 0).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (0, 0, 0, 255));
    }

    #[test]
    fn test_resize_keep_width_pads_vertically() {
        let mut src = Pixmap::new(10, 10).unwrap();
        src.fill(Color::BLACK);
        let out = resize(&src, 20, 40, &[ImageSetting::KeepWidth]).unwrap();
        assert_eq!((out.width(), out.height()), (20, 40));
        // scaled square is 20x20, centred: rows 0..10 stay white
        assert_eq!(red_at(&out, 10, 2), 255);
        assert_eq!(red_at(&out, 10, 20), 0);
    }

    #[test]
    fn test_resize_fit_stretches() {
        let mut src = Pixmap::new(10, 10).unwrap();
        src.fill(Color::BLACK);
        let out = resize(&src, 20, 40, &[]).unwrap();
        assert_eq!(red_at(&out, 10, 2), 0);
        assert_eq!(red_at(&out, 10, 38), 0);
    }
}
