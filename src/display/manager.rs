/*
 *  display/manager.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display manager - takes rendered plugin images to the panel
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

use crate::config::DisplayConfig;
use crate::device_config::{ImageSetting, Orientation};
use crate::display::image_ops;
use crate::display::{
    BoxedDriver,
    DisplayCapabilities,
    DisplayDriverFactory,
    DisplayError,
    FrameBuffer,
};

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tiny_skia::Pixmap;

/// Per-call presentation options, taken from the device configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    pub orientation: Orientation,
    pub inverted: bool,
}

/// Display manager that orchestrates all display operations
///
/// The manager owns the driver and runs the image pipeline:
///
/// - **Snapshot**: the unprocessed image is kept as `current_image_file`
/// - **Geometry**: resize to the panel, then rotate for orientation and mounting
/// - **Tone**: optional inversion, then quantization to the panel color depth
/// - **Transfer**: packed bytes go to `DisplayDriver::write_buffer`
pub struct DisplayManager {
    driver: BoxedDriver,
    current_image_file: PathBuf,
    /// Extra clockwise rotation for how the panel is mounted
    rotate_deg: u16,
    /// Mount rotation is done by the panel controller
    hw_rotation: bool,
    /// Inversion last sent to the panel controller
    hw_inverted: Option<bool>,
    frame_count: u64,
}

impl DisplayManager {
    /// Create a new display manager from configuration
    pub fn new(config: &DisplayConfig, current_image_file: impl Into<PathBuf>) -> Result<Self, DisplayError> {
        info!("Initializing DisplayManager");
        let driver = DisplayDriverFactory::create_from_config(config).map_err(|e| match e {
            crate::display::DisplayFactoryError::DriverInitFailed(err) => err,
            other => DisplayError::InvalidConfiguration(other.to_string()),
        })?;
        Self::new_with_driver(driver, current_image_file, config.rotate_deg.unwrap_or(0))
    }

    /// Create a new display manager with an existing driver
    ///
    /// The driver is initialized here; a failing `init` fails construction.
    pub fn new_with_driver(
        mut driver: BoxedDriver,
        current_image_file: impl Into<PathBuf>,
        rotate_deg: u16,
    ) -> Result<Self, DisplayError> {
        if rotate_deg % 90 != 0 {
            return Err(DisplayError::InvalidRotation(rotate_deg));
        }
        driver.init()?;
        let rotate_deg = rotate_deg % 360;
        let hw_rotation = rotate_deg != 0 && driver.capabilities().supports_rotation;
        if hw_rotation {
            driver.set_rotation(rotate_deg)?;
        }
        let caps = driver.capabilities();
        info!(
            "display ready: {}x{} {:?}, mount rotation {}°{}",
            caps.width,
            caps.height,
            caps.color_depth,
            rotate_deg,
            if hw_rotation { " (panel)" } else { "" }
        );
        Ok(Self {
            driver,
            current_image_file: current_image_file.into(),
            rotate_deg,
            hw_rotation,
            hw_inverted: None,
            frame_count: 0,
        })
    }

    pub fn capabilities(&self) -> &DisplayCapabilities {
        self.driver.capabilities()
    }

    /// Panel size as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.driver.dimensions()
    }

    pub fn current_image_file(&self) -> &Path {
        &self.current_image_file
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn total_rotation(&self, orientation: Orientation) -> u16 {
        let base = match orientation {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 90,
        };
        let mount = if self.hw_rotation { 0 } else { self.rotate_deg };
        (base + mount) % 360
    }

    /// Show a rendered image on the panel
    ///
    /// # Arguments
    ///
    /// * `image` - rendered plugin output, any size
    /// * `settings` - the plugin's image settings (resize mode)
    /// * `options` - orientation and inversion from the device config
    pub fn display_image(
        &mut self,
        image: &Pixmap,
        settings: &[ImageSetting],
        options: DisplayOptions,
    ) -> Result<(), DisplayError> {
        let frame_start = Instant::now();

        if let Err(e) = self.save_current_image(image) {
            // the panel update still goes ahead
            warn!("could not save {}: {}", self.current_image_file.display(), e);
        }

        let (pw, ph) = self.driver.dimensions();
        let rotation = self.total_rotation(options.orientation);
        let (cw, ch) = if rotation % 180 == 90 { (ph, pw) } else { (pw, ph) };

        let resized = image_ops::resize(image, cw, ch, settings)?;
        let mut frame = image_ops::rotate(&resized, rotation)?;
        if self.driver.capabilities().supports_invert {
            if self.hw_inverted != Some(options.inverted) {
                self.driver.set_invert(options.inverted)?;
                self.hw_inverted = Some(options.inverted);
            }
        } else if options.inverted {
            image_ops::invert(&mut frame);
        }

        let fb = FrameBuffer::from_pixmap(&frame, self.driver.capabilities().color_depth);
        let buffer_data = fb.to_packed_bytes();
        let render_time = frame_start.elapsed().as_micros() as u64;

        let transfer_start = Instant::now();
        self.driver.write_buffer(&buffer_data)?;
        let transfer_time = transfer_start.elapsed().as_micros() as u64;

        self.frame_count += 1;
        debug!(
            "frame {} ({} bytes) render: {}μs, transfer: {}μs",
            self.frame_count,
            buffer_data.len(),
            render_time,
            transfer_time
        );
        Ok(())
    }

    fn save_current_image(&self, image: &Pixmap) -> Result<(), DisplayError> {
        let png = image
            .encode_png()
            .map_err(|e| DisplayError::ImageError(e.to_string()))?;
        if let Some(parent) = self.current_image_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.current_image_file.with_extension("png.tmp");
        std::fs::write(&tmp, png)?;
        std::fs::rename(&tmp, &self.current_image_file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::MockDriver;
    use crate::display::traits::ColorDepth;
    use tiny_skia::Color;

    fn manager(width: u32, height: u32, dir: &Path) -> (DisplayManager, MockDriver) {
        let mock = MockDriver::new(width, height);
        let mgr = DisplayManager::new_with_driver(
            Box::new(mock.clone()),
            dir.join("current_image.png"),
            0,
        )
        .unwrap();
        (mgr, mock)
    }

    #[test]
    fn test_init_called_on_construction() {
        let dir = tempfile::tempdir().unwrap();
        let (_mgr, mock) = manager(16, 8, dir.path());
        assert_eq!(mock.state().lock().unwrap().init_count, 1);
    }

    #[test]
    fn test_display_saves_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut mgr, mock) = manager(16, 8, dir.path());

        let mut img = Pixmap::new(32, 16).unwrap();
        img.fill(Color::WHITE);
        mgr.display_image(&img, &[ImageSetting::Fit], DisplayOptions::default()).unwrap();

        let saved = Pixmap::load_png(dir.path().join("current_image.png")).unwrap();
        assert_eq!((saved.width(), saved.height()), (32, 16));

        let state = mock.state();
        let state = state.lock().unwrap();
        assert_eq!(state.write_count, 1);
        assert_eq!(state.last_buffer, vec![0xFF; 16]);
        assert_eq!(mgr.frame_count(), 1);
    }

    #[test]
    fn test_inverted_on_panel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut mgr, mock) = manager(16, 8, dir.path());

        let mut img = Pixmap::new(16, 8).unwrap();
        img.fill(Color::WHITE);
        let opts = DisplayOptions { inverted: true, ..Default::default() };
        mgr.display_image(&img, &[], opts).unwrap();
        mgr.display_image(&img, &[], opts).unwrap();

        // the mock panel inverts in hardware, the frame itself stays white
        assert_eq!(mock.count_on_pixels(), 16 * 8);
        assert_eq!(mock.state().lock().unwrap().last_invert, Some(true));
    }

    #[test]
    fn test_mount_rotation_sent_to_panel() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockDriver::new(16, 8);
        let _mgr = DisplayManager::new_with_driver(Box::new(mock.clone()), dir.path().join("c.png"), 270).unwrap();
        assert_eq!(mock.state().lock().unwrap().last_rotation, Some(270));
    }

    #[test]
    fn test_vertical_canvas_rotated_to_panel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut mgr, mock) = manager(16, 8, dir.path());

        // portrait canvas: left half black, right half white
        let mut img = Pixmap::new(8, 16).unwrap();
        img.fill(Color::WHITE);
        let rect = tiny_skia::Rect::from_xywh(0.0, 0.0, 4.0, 16.0).unwrap();
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(Color::BLACK);
        img.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);

        let opts = DisplayOptions { orientation: Orientation::Vertical, ..Default::default() };
        mgr.display_image(&img, &[], opts).unwrap();

        // after 90° clockwise the black half is the top half of the panel
        let state = mock.state();
        let buf = state.lock().unwrap().last_buffer.clone();
        assert_eq!(&buf[..8], &[0x00; 8]);
        assert_eq!(&buf[8..], &[0xFF; 8]);
    }

    #[test]
    fn test_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockDriver::with_depth(4, 4, ColorDepth::Gray4);
        mock.state().lock().unwrap().simulate_write_failure = true;
        let mut mgr =
            DisplayManager::new_with_driver(Box::new(mock), dir.path().join("c.png"), 0).unwrap();
        let img = Pixmap::new(4, 4).unwrap();
        assert!(mgr.display_image(&img, &[], DisplayOptions::default()).is_err());
    }

    #[test]
    fn test_rejects_odd_mount_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockDriver::new(8, 8);
        assert!(DisplayManager::new_with_driver(Box::new(mock), dir.path().join("c.png"), 45).is_err());
    }
}
