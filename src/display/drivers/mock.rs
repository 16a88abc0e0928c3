/*
 *  display/drivers/mock.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock display driver for testing without hardware
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
use crate::display::traits::{ColorDepth, DisplayCapabilities, DisplayDriver};

use std::sync::{Arc, Mutex, MutexGuard};

/// Mock display driver
///
/// This driver simulates a panel without requiring hardware. It backs the
/// `--dev` mode and every test that exercises the display pipeline.
///
/// The mock driver records all operations and keeps the last frame so
/// tests can inspect what would have been shown.
#[derive(Debug, Clone)]
pub struct MockDriver {
    /// Display capabilities
    capabilities: DisplayCapabilities,

    /// Shared state for testing
    state: Arc<Mutex<MockDriverState>>,
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Number of times init() was called
    pub init_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Number of successful write_buffer() calls
    pub write_count: usize,

    /// Whether the driver is initialized
    pub is_initialized: bool,

    /// Last rotation set
    pub last_rotation: Option<u16>,

    /// Last invert state set
    pub last_invert: Option<bool>,

    /// Total bytes written via write_buffer
    pub bytes_written: usize,

    /// Copy of the most recent frame
    pub last_buffer: Vec<u8>,

    /// Simulate failures (for error testing)
    pub simulate_write_failure: bool,
    pub simulate_init_failure: bool,
}

impl MockDriver {
    /// Create a new monochrome mock driver
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_depth(width, height, ColorDepth::Monochrome)
    }

    /// Create a mock driver with a specific color depth
    pub fn with_depth(width: u32, height: u32, color_depth: ColorDepth) -> Self {
        let capabilities = DisplayCapabilities {
            width,
            height,
            color_depth,
            supports_rotation: true,
            supports_invert: true,
        };

        Self {
            capabilities,
            state: Arc::new(Mutex::new(MockDriverState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockDriverState> {
        // a poisoned lock only means a test panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count pixels lit (white) in the last monochrome frame
    pub fn count_on_pixels(&self) -> usize {
        self.lock()
            .last_buffer
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }
}

impl DisplayDriver for MockDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();

        if state.simulate_init_failure {
            return Err(DisplayError::InitializationFailed("Simulated init failure".to_string()));
        }

        state.init_count += 1;
        state.is_initialized = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let len = self
            .capabilities
            .color_depth
            .packed_len(self.capabilities.width, self.capabilities.height);
        let mut state = self.lock();
        state.clear_count += 1;
        state.last_buffer = vec![0xFF; len];
        Ok(())
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

        let mut state = self.lock();
        if state.simulate_write_failure {
            return Err(DisplayError::Other("Simulated write failure".to_string()));
        }
        state.write_count += 1;
        state.bytes_written += buffer.len();
        state.last_buffer = buffer.to_vec();
        Ok(())
    }

    fn set_invert(&mut self, inverted: bool) -> Result<(), DisplayError> {
        self.lock().last_invert = Some(inverted);
        Ok(())
    }

    fn set_rotation(&mut self, degrees: u16) -> Result<(), DisplayError> {
        if degrees % 90 != 0 || degrees >= 360 {
            return Err(DisplayError::InvalidRotation(degrees));
        }
        self.lock().last_rotation = Some(degrees);
        Ok(())
    }
}
