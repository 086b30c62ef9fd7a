//! crates/kova_core/src/photo_editor.rs
//!
//! Pan and zoom for a profile photo inside a circular mask.

use crate::domain::PhotoPosition;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.05;

/// Clamps to `[MIN_ZOOM, MAX_ZOOM]` and snaps to the slider step.
pub fn clamp_zoom(zoom: f64) -> f64 {
    if !zoom.is_finite() {
        return MIN_ZOOM;
    }
    let steps_per_unit = (1.0 / ZOOM_STEP).round();
    let snapped = (zoom * steps_per_unit).round() / steps_per_unit;
    snapped.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Rendered size of the mask container in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    pointer_id: i32,
    start_x: f64,
    start_y: f64,
    start_offset_x: f64,
    start_offset_y: f64,
}

#[derive(Debug, Clone)]
pub struct PhotoEditor {
    original: PhotoPosition,
    current: PhotoPosition,
    drag: Option<Drag>,
}

impl PhotoEditor {
    /// Opens the editor on the currently saved settings.
    pub fn open(saved: PhotoPosition) -> Self {
        Self {
            original: saved,
            current: PhotoPosition {
                zoom: clamp_zoom(saved.zoom),
                ..saved
            },
            drag: None,
        }
    }

    pub fn position(&self) -> PhotoPosition {
        self.current
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.current.zoom = clamp_zoom(zoom);
    }

    /// Captures the pointer. A second pointer is ignored while one is held.
    pub fn pointer_down(&mut self, pointer_id: i32, x: f64, y: f64) {
        if self.drag.is_some() {
            return;
        }
        self.drag = Some(Drag {
            pointer_id,
            start_x: x,
            start_y: y,
            start_offset_x: self.current.offset_x,
            start_offset_y: self.current.offset_y,
        });
    }

    pub fn pointer_move(&mut self, pointer_id: i32, x: f64, y: f64, container: ContainerSize) {
        let Some(drag) = self.drag else {
            return;
        };
        if drag.pointer_id != pointer_id || container.width <= 0.0 || container.height <= 0.0 {
            return;
        }
        let dx = (x - drag.start_x) / container.width * 100.0;
        let dy = (y - drag.start_y) / container.height * 100.0;
        // Offsets are left unbounded; panning past the image edge is allowed.
        self.current.offset_x = drag.start_offset_x + dx;
        self.current.offset_y = drag.start_offset_y + dy;
    }

    pub fn pointer_up(&mut self, pointer_id: i32) {
        if self.drag.is_some_and(|d| d.pointer_id == pointer_id) {
            self.drag = None;
        }
    }

    pub fn save(self) -> PhotoPosition {
        self.current
    }

    pub fn cancel(self) -> PhotoPosition {
        self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: ContainerSize = ContainerSize {
        width: 200.0,
        height: 100.0,
    };

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut editor = PhotoEditor::open(PhotoPosition::default());
        editor.set_zoom(5.0);
        assert_eq!(editor.position().zoom, 3.0);
        editor.set_zoom(0.2);
        assert_eq!(editor.position().zoom, 1.0);
    }

    #[test]
    fn zoom_snaps_to_step() {
        assert!((clamp_zoom(1.234) - 1.25).abs() < 1e-9);
        assert_eq!(clamp_zoom(f64::NAN), MIN_ZOOM);
    }

    #[test]
    fn drag_converts_pixels_to_percent_of_container() {
        let mut editor = PhotoEditor::open(PhotoPosition {
            zoom: 1.5,
            offset_x: 10.0,
            offset_y: -5.0,
        });
        editor.pointer_down(1, 50.0, 50.0);
        editor.pointer_move(1, 100.0, 25.0, BOX);
        let pos = editor.position();
        assert!((pos.offset_x - 35.0).abs() < 1e-9);
        assert!((pos.offset_y - -30.0).abs() < 1e-9);
        editor.pointer_up(1);
        assert!(!editor.is_dragging());
    }

    #[test]
    fn offsets_are_not_clamped() {
        let mut editor = PhotoEditor::open(PhotoPosition::default());
        editor.pointer_down(1, 0.0, 0.0);
        editor.pointer_move(1, 1000.0, 0.0, BOX);
        assert!((editor.position().offset_x - 500.0).abs() < 1e-9);
    }

    #[test]
    fn moves_without_capture_are_ignored() {
        let mut editor = PhotoEditor::open(PhotoPosition::default());
        editor.pointer_move(1, 40.0, 40.0, BOX);
        editor.pointer_down(1, 0.0, 0.0);
        editor.pointer_move(2, 40.0, 40.0, BOX);
        editor.pointer_up(1);
        editor.pointer_move(1, 40.0, 40.0, BOX);
        assert_eq!(editor.position(), PhotoPosition::default());
    }

    #[test]
    fn cancel_returns_prior_settings() {
        let saved = PhotoPosition {
            zoom: 2.0,
            offset_x: 3.0,
            offset_y: 4.0,
        };
        let mut editor = PhotoEditor::open(saved);
        editor.set_zoom(2.5);
        editor.pointer_down(7, 0.0, 0.0);
        editor.pointer_move(7, 20.0, 20.0, BOX);
        assert_eq!(editor.cancel(), saved);
    }

    #[test]
    fn save_emits_current_settings() {
        let mut editor = PhotoEditor::open(PhotoPosition::default());
        editor.set_zoom(1.5);
        let saved = editor.save();
        assert_eq!(saved.zoom, 1.5);
    }
}
