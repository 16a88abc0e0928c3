/*
 *  display/mod.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - image pipeline and pluggable drivers
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod framebuffer;
pub mod factory;
pub mod image_ops;

// Display drivers
pub mod drivers;

// Display manager
pub mod manager;

// Re-exports for convenience
pub use traits::{DisplayDriver, DisplayCapabilities, ColorDepth};
pub use error::{DisplayError, DisplayFactoryError};
pub use framebuffer::FrameBuffer;
pub use factory::{DisplayDriverFactory, BoxedDriver};
pub use manager::{DisplayManager, DisplayOptions};
