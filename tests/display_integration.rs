/*
 *  tests/display_integration.rs
 *
 *  Integration tests for the display pipeline
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 */

use inkpanel::config::{DisplayConfig, DriverKind};
use inkpanel::device_config::Orientation;
use inkpanel::display::drivers::mock::MockDriver;
use inkpanel::display::{ColorDepth, DisplayManager, DisplayOptions};
use std::path::Path;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

fn file_display(dir: &Path, width: u32, height: u32) -> DisplayManager {
    let config = DisplayConfig {
        driver: Some(DriverKind::File),
        width: Some(width),
        height: Some(height),
        output: Some(dir.join("panel.png")),
        ..Default::default()
    };
    DisplayManager::new(&config, dir.join("current_image.png")).unwrap()
}

/// White image with the left `black_cols` columns painted black
fn split_image(width: u32, height: u32, black_cols: u32) -> Pixmap {
    let mut pixmap = Pixmap::new(width, height).unwrap();
    pixmap.fill(Color::WHITE);
    let mut paint = Paint::default();
    paint.set_color(Color::BLACK);
    let rect = Rect::from_xywh(0.0, 0.0, black_cols as f32, height as f32).unwrap();
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    pixmap
}

fn dark_pixels(pixmap: &Pixmap) -> usize {
    pixmap.pixels().iter().filter(|p| p.red() < 128).count()
}

fn read_panel(dir: &Path) -> Pixmap {
    Pixmap::load_png(dir.join("panel.png")).unwrap()
}

#[test]
fn test_file_panel_scales_to_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let mut display = file_display(dir.path(), 40, 20);
    assert_eq!(display.dimensions(), (40, 20));

    let image = split_image(80, 40, 40);
    display.display_image(&image, &[], DisplayOptions::default()).unwrap();

    let panel = read_panel(dir.path());
    assert_eq!((panel.width(), panel.height()), (40, 20));
    assert!(panel.pixel(5, 10).unwrap().red() < 128);
    assert!(panel.pixel(35, 10).unwrap().red() > 128);

    // the unprocessed image is kept for the web UI
    let current = Pixmap::load_png(dir.path().join("current_image.png")).unwrap();
    assert_eq!((current.width(), current.height()), (80, 40));
    assert_eq!(display.frame_count(), 1);
}

#[test]
fn test_vertical_orientation_rotates_portrait_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut display = file_display(dir.path(), 40, 20);

    // portrait canvas for a landscape panel
    let image = split_image(20, 40, 10);
    let options = DisplayOptions {
        orientation: Orientation::Vertical,
        inverted: false,
    };
    display.display_image(&image, &[], options).unwrap();

    let panel = read_panel(dir.path());
    assert_eq!((panel.width(), panel.height()), (40, 20));
    let dark = dark_pixels(&panel);
    assert!((380..=420).contains(&dark), "dark pixels: {dark}");
}

#[test]
fn test_inverted_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut display = file_display(dir.path(), 16, 8);

    let image = split_image(16, 8, 0);
    let options = DisplayOptions {
        inverted: true,
        ..Default::default()
    };
    display.display_image(&image, &[], options).unwrap();
    assert_eq!(dark_pixels(&read_panel(dir.path())), 16 * 8);
}

#[test]
fn test_mock_panel_receives_packed_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockDriver::new(16, 8);
    let state = mock.state();
    let mut display =
        DisplayManager::new_with_driver(Box::new(mock), dir.path().join("current_image.png"), 180).unwrap();
    assert_eq!(display.capabilities().color_depth, ColorDepth::Monochrome);

    display
        .display_image(&split_image(16, 8, 8), &[], DisplayOptions::default())
        .unwrap();
    display
        .display_image(&split_image(32, 16, 0), &[], DisplayOptions::default())
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.init_count, 1);
    assert_eq!(state.last_rotation, Some(180));
    assert_eq!(state.write_count, 2);
    assert_eq!(state.last_buffer.len(), ColorDepth::Monochrome.packed_len(16, 8));
}

#[test]
fn test_rejects_odd_mount_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let result = DisplayManager::new_with_driver(
        Box::new(MockDriver::new(16, 8)),
        dir.path().join("current_image.png"),
        45,
    );
    assert!(result.is_err());
}
