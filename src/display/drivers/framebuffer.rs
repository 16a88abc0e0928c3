/*
 *  display/drivers/framebuffer.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Linux framebuffer output (/dev/fbN), 16bpp RGB565 little endian
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

use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::display::error::DisplayError;
use crate::display::traits::{ColorDepth, DisplayCapabilities, DisplayDriver};

pub const DEFAULT_FB_PATH: &str = "/dev/fb0";

#[derive(Debug)]
pub struct FramebufferDriver {
    capabilities: DisplayCapabilities,
    device: PathBuf,
}

impl FramebufferDriver {
    pub fn new(width: u32, height: u32, device: Option<PathBuf>) -> Self {
        Self {
            capabilities: DisplayCapabilities {
                width,
                height,
                supports_rotation: false,
                supports_invert: false,
                color_depth: ColorDepth::Rgb,
            },
            device: device.unwrap_or_else(|| PathBuf::from(DEFAULT_FB_PATH)),
        }
    }

    fn push(&self, raw: &[u8]) -> Result<(), DisplayError> {
        let mut fb = OpenOptions::new().write(true).open(&self.device)?;
        fb.write_all(raw)?;
        Ok(())
    }
}

/// Pack RGB888 triplets into RGB565, little endian
pub fn to_rgb565_le(rgb: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(rgb.len() / 3 * 2);
    for px in rgb.chunks_exact(3) {
        let (r, g, b) = (px[0], px[1], px[2]);
        let mut rgb565: u16 = (r as u16 & 0b11111000) << 8;
        rgb565 |= (g as u16 & 0b11111100) << 3;
        rgb565 |= (b as u16) >> 3;
        raw.extend(rgb565.to_le_bytes());
    }
    raw
}

impl DisplayDriver for FramebufferDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|e| DisplayError::InitializationFailed(format!("{}: {}", self.device.display(), e)))?;
        info!(
            "framebuffer {} opened, {}x{}",
            self.device.display(),
            self.capabilities.width,
            self.capabilities.height
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let len = self.capabilities.width as usize * self.capabilities.height as usize * 2;
        self.push(&vec![0xFF; len])
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<(), DisplayError> {
        let expected = self
            .capabilities
            .color_depth
            .packed_len(self.capabilities.width, self.capabilities.height);
        if buffer.len() != expected {
            return Err(DisplayError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }
        self.push(&to_rgb565_le(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_packing() {
        assert_eq!(to_rgb565_le(&[255, 255, 255]), vec![0xFF, 0xFF]);
        assert_eq!(to_rgb565_le(&[255, 0, 0]), vec![0x00, 0xF8]);
        assert_eq!(to_rgb565_le(&[0, 0, 255]), vec![0x1F, 0x00]);
    }

    #[test]
    fn test_writes_to_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("fb0");
        std::fs::write(&dev, b"").unwrap();

        let mut driver = FramebufferDriver::new(2, 1, Some(dev.clone()));
        driver.init().unwrap();
        driver.write_buffer(&[0, 0, 0, 255, 255, 255]).unwrap();
        assert_eq!(std::fs::read(&dev).unwrap(), vec![0x00, 0x00, 0xFF, 0xFF]);
    }
}
