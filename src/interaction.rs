//! Select vs. pan pointer handling

use crate::engine::Viewport;
use crate::geometry::ScreenPoint;
use crate::selection::PointerButton;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    /// Pointer drags select text
    #[default]
    Select,
    /// Pointer drags scroll the viewport
    Pan,
}

impl InteractionMode {
    pub fn toggled(self) -> Self {
        match self {
            InteractionMode::Select => InteractionMode::Pan,
            InteractionMode::Pan => InteractionMode::Select,
        }
    }

    /// Cursor shown over the viewport
    pub fn cursor(self, dragging: bool) -> &'static str {
        match (self, dragging) {
            (InteractionMode::Select, _) => "text",
            (InteractionMode::Pan, false) => "grab",
            (InteractionMode::Pan, true) => "grabbing",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DragStart {
    pointer: ScreenPoint,
    scroll_left: f64,
    scroll_top: f64,
}

/// Drag-to-scroll; the content follows the pointer
#[derive(Debug, Default)]
pub struct PanGesture {
    start: Option<DragStart>,
}

impl PanGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    /// Begin a drag; only the primary button pans
    pub fn on_pointer_down(
        &mut self,
        button: PointerButton,
        pointer: ScreenPoint,
        viewport: &dyn Viewport,
    ) -> bool {
        if button != PointerButton::Primary {
            return false;
        }
        self.start = Some(DragStart {
            pointer,
            scroll_left: viewport.scroll_left(),
            scroll_top: viewport.scroll_top(),
        });
        true
    }

    pub fn on_pointer_move(&mut self, pointer: ScreenPoint, viewport: &mut dyn Viewport) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        viewport.set_scroll_left(start.scroll_left - (pointer.x - start.pointer.x));
        viewport.set_scroll_top(start.scroll_top - (pointer.y - start.pointer.y));
        true
    }

    pub fn on_pointer_up(&mut self) -> bool {
        self.start.take().is_some()
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeViewport;

    fn at(x: f64, y: f64) -> ScreenPoint {
        ScreenPoint { x, y }
    }

    #[test]
    fn drag_scrolls_by_inverse_delta() {
        let mut viewport = FakeViewport::scrolled_to(400.0);
        let mut pan = PanGesture::new();

        assert!(pan.on_pointer_down(PointerButton::Primary, at(100.0, 300.0), &viewport));
        assert!(pan.on_pointer_move(at(90.0, 200.0), &mut viewport));
        assert_eq!(viewport.scroll_top(), 500.0);
        assert_eq!(viewport.scroll_left(), 10.0);

        assert!(pan.on_pointer_move(at(100.0, 350.0), &mut viewport));
        assert_eq!(viewport.scroll_top(), 350.0);

        assert!(pan.on_pointer_up());
        assert!(!pan.on_pointer_move(at(0.0, 0.0), &mut viewport));
        assert_eq!(viewport.scroll_top(), 350.0);
    }

    #[test]
    fn secondary_button_does_not_pan() {
        let viewport = FakeViewport::scrolled_to(0.0);
        let mut pan = PanGesture::new();
        assert!(!pan.on_pointer_down(PointerButton::Secondary, at(0.0, 0.0), &viewport));
        assert!(!pan.is_dragging());
    }

    #[test]
    fn mode_toggles() {
        assert_eq!(InteractionMode::default(), InteractionMode::Select);
        assert_eq!(InteractionMode::Select.toggled(), InteractionMode::Pan);
        assert_eq!(InteractionMode::Pan.cursor(true), "grabbing");
    }
}
