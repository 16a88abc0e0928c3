/*
 *  display/factory.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display driver factory - builds the configured output
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

use crate::config::{DisplayConfig, DriverKind};
use crate::display::drivers::file::FileDriver;
use crate::display::drivers::mock::MockDriver;
use crate::display::error::DisplayFactoryError;
use crate::display::traits::DisplayDriver;
use log::{debug, info};

#[cfg(feature = "driver-framebuffer")]
use crate::display::drivers::framebuffer::FramebufferDriver;

/// Panel size used when the configuration does not give one
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Type alias for boxed display driver trait objects
pub type BoxedDriver = Box<dyn DisplayDriver>;

/// Factory for creating display drivers from configuration
pub struct DisplayDriverFactory;

impl DisplayDriverFactory {
    /// Create a display driver from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Display configuration: driver kind, size and output target
    ///
    /// # Returns
    ///
    /// A boxed trait object implementing DisplayDriver, or an error if the
    /// driver needs a setting that is missing or was compiled out.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = DisplayConfig {
    ///     driver: Some(DriverKind::File),
    ///     output: Some("/tmp/panel.png".into()),
    ///     ..Default::default()
    /// };
    ///
    /// let driver = DisplayDriverFactory::create_from_config(&config)?;
    /// ```
    pub fn create_from_config(config: &DisplayConfig) -> Result<BoxedDriver, DisplayFactoryError> {
        let width = config.width.unwrap_or(DEFAULT_WIDTH);
        let height = config.height.unwrap_or(DEFAULT_HEIGHT);
        let kind = config.driver.unwrap_or_else(|| {
            info!("No display driver configured - using mock display");
            DriverKind::Mock
        });
        debug!("creating {:?} driver {}x{}", kind, width, height);

        match kind {
            DriverKind::Mock => Ok(Box::new(MockDriver::new(width, height))),

            DriverKind::File => {
                let output = config
                    .output
                    .clone()
                    .ok_or(DisplayFactoryError::MissingSetting("output"))?;
                Ok(Box::new(FileDriver::new(width, height, output)))
            }

            #[cfg(feature = "driver-framebuffer")]
            DriverKind::Framebuffer => Ok(Box::new(FramebufferDriver::new(
                width,
                height,
                config.output.clone(),
            ))),

            #[cfg(not(feature = "driver-framebuffer"))]
            DriverKind::Framebuffer => Err(DisplayFactoryError::DriverNotAvailable(
                "framebuffer (enable with --features driver-framebuffer)".to_string(),
            )),
        }
    }
}
