//! Turning a platform text selection into page geometry
//!
//! A platform selection only tells us which overlay runs it starts and ends
//! in and at which char offsets. From that we measure one rect per run the
//! selection touches, trimming the first and last run to the selected chars,
//! and express the result in page-relative CSS pixels.

use crate::engine::{PageBox, PageLayout};
use crate::geometry::{Rect, ScaledPosition, ScreenPoint, Selection};
use crate::overlay::{OverlayManager, PageOverlay, PixelRect};

/// A selection endpoint inside an overlay run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunPosition {
    /// 1-based page number
    pub page: usize,
    /// Index of the run in the page overlay
    pub run: usize,
    /// Char offset inside the run
    pub offset: usize,
}

impl RunPosition {
    pub fn new(page: usize, run: usize, offset: usize) -> Self {
        Self { page, run, offset }
    }
}

/// Raw selection as reported by the platform.
///
/// An endpoint is `None` when its container is not an overlay run.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRange {
    pub start: Option<RunPosition>,
    pub end: Option<RunPosition>,
    /// The selected string as the platform serializes it
    pub text: String,
}

impl TextRange {
    pub fn new(start: RunPosition, end: RunPosition, text: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            text: text.into(),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// What a pointer-down landed on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    /// The UI that turns the current selection into a highlight
    SelectionActions,
    Elsewhere,
}

/// Resolve a platform range into a [`Selection`].
///
/// Returns `None` for whitespace-only text or endpoints outside the overlay.
/// A range ending on another page is measured on its start page only.
pub fn resolve(
    range: &TextRange,
    overlays: &OverlayManager,
    layout: &dyn PageLayout,
) -> Option<Selection> {
    let text = range.text.trim();
    if text.is_empty() {
        return None;
    }

    let start = range.start?;
    let overlay = overlays.page(start.page)?;
    overlay.run(start.run)?;
    let page_box = layout.page_box(start.page)?;
    if overlay.raster.width == 0 || page_box.width <= 0.0 {
        return None;
    }

    // endpoint on another page or outside the overlay anchors on the start run
    let end = range
        .end
        .filter(|end| end.page == start.page && overlay.run(end.run).is_some());
    // a backwards drag reports the anchor after the focus
    let (first, last) = match end {
        Some(end) if (end.run, end.offset) < (start.run, start.offset) => (end, Some(start)),
        _ => (start, end),
    };
    let last_idx = match last {
        Some(last) if last.run > first.run && last.offset == 0 => last.run - 1,
        Some(last) => last.run,
        None => first.run,
    };

    let selected: Vec<usize> = (first.run..=last_idx)
        .filter(|&i| {
            let run = &overlay.runs[i];
            !run.text.trim().is_empty() && !(i == first.run && first.offset >= run.char_count())
        })
        .collect();
    if selected.is_empty() {
        return None;
    }

    let rects: Vec<Rect> = selected
        .iter()
        .map(|&i| {
            let start_offset = (i == first.run).then_some(first.offset);
            let end_offset = last
                .filter(|last| last.run == i && last.offset > 0)
                .map(|last| last.offset);
            let px = overlay.runs[i].char_range_bounds(start_offset, end_offset);
            to_page_rect(&px, overlay, &page_box, start.page)
        })
        .collect();

    let position = ScaledPosition::from_rects(rects)?;
    let bounds = position.bounding_rect;
    let anchor = ScreenPoint {
        x: page_box.left + bounds.left + bounds.width / 2.0,
        y: page_box.top + bounds.top,
    };

    Some(Selection {
        position,
        text: text.to_string(),
        anchor,
    })
}

fn to_page_rect(px: &PixelRect, overlay: &PageOverlay, page_box: &PageBox, page: usize) -> Rect {
    let scale_x = page_box.width / f64::from(overlay.raster.width);
    let scale_y = if overlay.raster.height > 0 {
        page_box.height / f64::from(overlay.raster.height)
    } else {
        scale_x
    };
    Rect::new(
        px.left * scale_x,
        px.top * scale_y,
        px.width * scale_x,
        px.height * scale_y,
        page_box.width,
        page_box.height,
        page,
    )
}

/// Tracks the selection currently offered for highlighting
#[derive(Debug, Default)]
pub struct SelectionCapture {
    current: Option<Selection>,
}

impl SelectionCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// A primary pointer-down anywhere but the selection actions drops the selection
    pub fn on_pointer_down(&mut self, button: PointerButton, target: PointerTarget) {
        if button != PointerButton::Primary || target == PointerTarget::SelectionActions {
            return;
        }
        self.current = None;
    }

    /// Re-read the platform selection once the pointer is released
    pub fn on_pointer_up(
        &mut self,
        button: PointerButton,
        range: Option<&TextRange>,
        overlays: &OverlayManager,
        layout: &dyn PageLayout,
    ) -> Option<&Selection> {
        if button != PointerButton::Primary {
            return self.current.as_ref();
        }
        self.current = range
            .filter(|range| !range.is_collapsed())
            .and_then(|range| resolve(range, overlays, layout));
        self.current.as_ref()
    }

    /// Drop the current selection, handing it to the caller
    pub fn take(&mut self) -> Option<Selection> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeEngine;

    fn setup(engine: &mut FakeEngine) -> OverlayManager {
        let mut overlays = OverlayManager::new();
        overlays.refresh(engine);
        overlays
    }

    #[test]
    fn partial_run_yields_partial_rect() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 10),
            RunPosition::new(1, 0, 25),
            "Is All You Need",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        assert_eq!(selection.text, "Is All You Need");
        assert_eq!(selection.position.rects.len(), 1);
        let rect = selection.position.rects[0];
        assert!((rect.left - 100.0).abs() < 1e-9);
        assert!((rect.width - 75.0).abs() < 1e-9);
        assert!((rect.top - 52.0).abs() < 1e-9);
        assert_eq!(rect.page_width, 600.0);
        assert_eq!(rect.page_number, 1);
        assert!((selection.anchor.x - 137.5).abs() < 1e-9);
        assert!((selection.anchor.y - 52.0).abs() < 1e-9);
    }

    #[test]
    fn inner_runs_are_fully_selected() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 10),
            RunPosition::new(1, 2, 3),
            "Is All You Need\nAshish Vaswani\nGoo",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        let rects = &selection.position.rects;
        assert_eq!(rects.len(), 3);
        assert!((rects[0].left - 100.0).abs() < 1e-9);
        assert!((rects[1].left - 50.0).abs() < 1e-9);
        assert!((rects[1].width - 70.0).abs() < 1e-9);
        assert!((rects[2].width - 15.0).abs() < 1e-9);
        assert!(selection.position.bounds_consistent(1e-9));
    }

    #[test]
    fn end_at_start_of_next_run_excludes_it() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 10),
            RunPosition::new(1, 1, 0),
            "Is All You Need\n",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        assert_eq!(selection.position.rects.len(), 1);
        assert!((selection.position.rects[0].right() - 175.0).abs() < 1e-9);
    }

    #[test]
    fn backwards_selection_measures_the_same_chars() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 2, 3),
            RunPosition::new(1, 0, 10),
            "Is All You Need\nAshish Vaswani\nGoo",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        let rects = &selection.position.rects;
        assert_eq!(rects.len(), 3);
        assert!((rects[0].left - 100.0).abs() < 1e-9);
        assert!((rects[0].width - 75.0).abs() < 1e-9);
        assert!((rects[2].left - 50.0).abs() < 1e-9);
        assert!((rects[2].width - 15.0).abs() < 1e-9);

        let reversed_in_run = TextRange::new(
            RunPosition::new(1, 0, 25),
            RunPosition::new(1, 0, 10),
            "Is All You Need",
        );
        let rect = resolve(&reversed_in_run, &overlays, &engine).unwrap().position.rects[0];
        assert!((rect.left - 100.0).abs() < 1e-9);
        assert!((rect.width - 75.0).abs() < 1e-9);
    }

    #[test]
    fn start_at_end_of_run_excludes_it() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 25),
            RunPosition::new(1, 1, 6),
            "\nAshish",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        assert_eq!(selection.position.rects.len(), 1);
        let rect = selection.position.rects[0];
        assert!((rect.left - 50.0).abs() < 1e-9);
        assert!((rect.width - 30.0).abs() < 1e-9);
        assert!((rect.top - 72.0).abs() < 1e-9);
    }

    #[test]
    fn cross_page_selection_stays_on_start_page() {
        let mut engine = FakeEngine::two_page_document();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 10),
            RunPosition::new(2, 0, 4),
            "Is All You Need ... Abst",
        );

        let selection = resolve(&range, &overlays, &engine).unwrap();
        assert_eq!(selection.position.rects.len(), 1);
        assert_eq!(selection.position.page_number(), 1);
        assert!((selection.position.rects[0].right() - 175.0).abs() < 1e-9);
    }

    #[test]
    fn whitespace_selection_is_ignored() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(RunPosition::new(1, 0, 9), RunPosition::new(1, 0, 10), " ");
        assert!(resolve(&range, &overlays, &engine).is_none());
    }

    #[test]
    fn selection_outside_overlay_is_ignored() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange {
            start: None,
            end: Some(RunPosition::new(1, 0, 4)),
            text: "Atte".into(),
        };
        assert!(resolve(&range, &overlays, &engine).is_none());
    }

    #[test]
    fn raster_pixels_collapse_to_css_pixels() {
        let mut engine = FakeEngine::single_column_page().with_device_pixel_ratio(2.0);
        let overlays = setup(&mut engine);
        assert_eq!(overlays.page(1).unwrap().raster.width, 1200);

        let range = TextRange::new(
            RunPosition::new(1, 0, 10),
            RunPosition::new(1, 0, 25),
            "Is All You Need",
        );
        let selection = resolve(&range, &overlays, &engine).unwrap();
        let rect = selection.position.rects[0];
        assert!((rect.left - 100.0).abs() < 1e-9);
        assert!((rect.width - 75.0).abs() < 1e-9);
        assert_eq!(rect.page_width, 600.0);
    }

    #[test]
    fn pointer_lifecycle() {
        let mut engine = FakeEngine::single_column_page();
        let overlays = setup(&mut engine);
        let range = TextRange::new(
            RunPosition::new(1, 0, 0),
            RunPosition::new(1, 0, 9),
            "Attention",
        );
        let mut capture = SelectionCapture::new();

        assert!(
            capture
                .on_pointer_up(PointerButton::Primary, Some(&range), &overlays, &engine)
                .is_some()
        );

        capture.on_pointer_down(PointerButton::Primary, PointerTarget::SelectionActions);
        assert!(capture.current().is_some());

        capture.on_pointer_down(PointerButton::Secondary, PointerTarget::Elsewhere);
        assert!(capture.current().is_some());

        capture.on_pointer_down(PointerButton::Primary, PointerTarget::Elsewhere);
        assert!(capture.current().is_none());

        let collapsed = TextRange::new(
            RunPosition::new(1, 0, 3),
            RunPosition::new(1, 0, 3),
            "",
        );
        assert!(
            capture
                .on_pointer_up(PointerButton::Primary, Some(&collapsed), &overlays, &engine)
                .is_none()
        );
    }
}
