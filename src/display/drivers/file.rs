/*
 *  display/drivers/file.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  PNG file output - shows exactly what a monochrome panel would get
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

use log::{debug, info};
use std::path::{Path, PathBuf};
use tiny_skia::{ColorU8, Pixmap};

use crate::display::error::DisplayError;
use crate::display::traits::{ColorDepth, DisplayCapabilities, DisplayDriver};

/// Writes every frame to a PNG file, replacing the previous one
#[derive(Debug)]
pub struct FileDriver {
    capabilities: DisplayCapabilities,
    path: PathBuf,
}

impl FileDriver {
    pub fn new(width: u32, height: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            capabilities: DisplayCapabilities {
                width,
                height,
                supports_rotation: false,
                supports_invert: false,
                color_depth: ColorDepth::Monochrome,
            },
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unpack(&self, buffer: &[u8]) -> Result<Pixmap, DisplayError> {
        let (w, h) = (self.capabilities.width, self.capabilities.height);
        let mut pixmap = Pixmap::new(w, h)
            .ok_or_else(|| DisplayError::ImageError(format!("cannot allocate {}x{} pixmap", w, h)))?;
        for (i, px) in pixmap.pixels_mut().iter_mut().enumerate() {
            let lit = buffer[i / 8] & (1 << (i % 8)) != 0;
            let v = if lit { 255 } else { 0 };
            *px = ColorU8::from_rgba(v, v, v, 255).premultiply();
        }
        Ok(pixmap)
    }

    fn save(&self, pixmap: &Pixmap) -> Result<(), DisplayError> {
        let png = pixmap
            .encode_png()
            .map_err(|e| DisplayError::ImageError(e.to_string()))?;
        // replace atomically so a viewer never sees half a file
        let tmp = self.path.with_extension("png.tmp");
        std::fs::write(&tmp, png)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("frame written to {}", self.path.display());
        Ok(())
    }
}

impl DisplayDriver for FileDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DisplayError::InitializationFailed(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        info!(
            "file display {}x{} -> {}",
            self.capabilities.width,
            self.capabilities.height,
            self.path.display()
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let len = self
            .capabilities
            .color_depth
            .packed_len(self.capabilities.width, self.capabilities.height);
        self.write_buffer(&vec![0xFF; len])
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
        let pixmap = self.unpack(buffer)?;
        self.save(&pixmap)
    }
}
