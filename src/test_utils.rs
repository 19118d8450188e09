//! In-memory stand-ins for the rendering engine and the annotation backend

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::engine::{
    GlyphRun, LayoutReactor, LayoutTrigger, Matrix, PageBox, PageLayout, PageSize,
    PageTextSource, PixelSize, ScaleValue, Viewport,
};
use crate::highlight::{Highlight, HighlightColor, HighlightId, Note, NoteId};
use crate::persistence::{AnnotationError, AnnotationSink, Annotations};

/// Font size of every fake run, in page units
pub const FONT_SIZE: f64 = 10.0;
/// Advance of every fake char, in page units
pub const CHAR_ADVANCE: f64 = 5.0;
/// Vertical gap between stacked pages, in CSS pixels
pub const PAGE_GAP: f64 = 10.0;

#[derive(Debug, Clone)]
struct FakePage {
    size: PageSize,
    runs: Vec<GlyphRun>,
    render_scale: f64,
    text_visible: bool,
    native_interactive: bool,
}

/// A document of fixed pages with monospaced text
#[derive(Debug, Clone)]
pub struct FakeEngine {
    pages: Vec<FakePage>,
    device_pixel_ratio: f64,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            device_pixel_ratio: 1.0,
        }
    }

    /// Append a page; lines are `(x, baseline, text)` in top-down page units
    pub fn with_page(mut self, width: f64, height: f64, lines: &[(f64, f64, &str)]) -> Self {
        let page = self.pages.len() + 1;
        let runs = lines
            .iter()
            .map(|&(x, baseline, text)| {
                let width = text.chars().count() as f64 * CHAR_ADVANCE;
                glyph(page, height, x, baseline, text, width)
            })
            .collect();
        self.pages.push(FakePage {
            size: PageSize { width, height },
            runs,
            render_scale: 1.0,
            text_visible: true,
            native_interactive: true,
        });
        self
    }

    /// Add a run whose reported advance differs from its text
    pub fn with_run(mut self, page: usize, x: f64, baseline: f64, text: &str, width: f64) -> Self {
        if let Some(p) = self.pages.get_mut(page - 1) {
            p.runs.push(glyph(page, p.size.height, x, baseline, text, width));
        }
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Title block of a paper on a 600x800 page
    pub fn single_column_page() -> Self {
        Self::new().with_page(600.0, 800.0, &title_block())
    }

    pub fn two_page_document() -> Self {
        Self::single_column_page().with_page(
            600.0,
            800.0,
            &[
                (50.0, 60.0, "Abstract"),
                (50.0, 80.0, "The dominant sequence transduction models"),
            ],
        )
    }

    /// A two-column page where the engine merged a left-column word with
    /// the whole line into one full-width run
    pub fn two_column_page() -> Self {
        Self::new()
            .with_page(
                600.0,
                800.0,
                &[
                    (40.0, 100.0, "Attention mechanisms"),
                    (320.0, 100.0, "Figure 3 shows"),
                ],
            )
            .with_run(1, 60.0, 200.0, "Results", 480.0)
    }

    /// Re-render a page at a new zoom
    pub fn rerasterize(&mut self, page: usize, scale: f64) {
        if let Some(p) = self.pages.get_mut(page - 1) {
            p.render_scale = scale;
        }
    }

    pub fn raster_width(&self, page: usize) -> u32 {
        self.raster_size(page).map_or(0, |r| r.width)
    }

    pub fn native_layer_interactive(&self, page: usize) -> bool {
        self.pages
            .get(page - 1)
            .is_some_and(|p| p.native_interactive)
    }

    /// Pretend the page's text content has not loaded yet
    pub fn hide_text(&mut self, page: usize) {
        if let Some(p) = self.pages.get_mut(page - 1) {
            p.text_visible = false;
        }
    }

    pub fn show_text(&mut self, page: usize) {
        if let Some(p) = self.pages.get_mut(page - 1) {
            p.text_visible = true;
        }
    }

    fn page(&self, page: usize) -> Option<&FakePage> {
        page.checked_sub(1).and_then(|i| self.pages.get(i))
    }
}

fn title_block() -> [(f64, f64, &'static str); 3] {
    [
        (50.0, 60.0, "Attention Is All You Need"),
        (50.0, 80.0, "Ashish Vaswani"),
        (50.0, 100.0, "Google Brain"),
    ]
}

fn glyph(page: usize, page_height: f64, x: f64, baseline: f64, text: &str, width: f64) -> GlyphRun {
    GlyphRun {
        page,
        transform: Matrix([FONT_SIZE, 0.0, 0.0, FONT_SIZE, x, page_height - baseline]),
        text: text.to_string(),
        width,
    }
}

impl PageTextSource for FakeEngine {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Option<PageSize> {
        self.page(page).map(|p| p.size)
    }

    fn raster_size(&self, page: usize) -> Option<PixelSize> {
        let p = self.page(page)?;
        let scale = p.render_scale * self.device_pixel_ratio;
        Some(PixelSize {
            width: (p.size.width * scale).round() as u32,
            height: (p.size.height * scale).round() as u32,
        })
    }

    fn glyph_runs(&self, page: usize) -> Option<Vec<GlyphRun>> {
        self.page(page)
            .filter(|p| p.text_visible)
            .map(|p| p.runs.clone())
    }

    fn set_native_text_layer_interactive(&mut self, page: usize, interactive: bool) {
        if let Some(p) = page.checked_sub(1).and_then(|i| self.pages.get_mut(i)) {
            p.native_interactive = interactive;
        }
    }
}

impl PageLayout for FakeEngine {
    fn page_box(&self, page: usize) -> Option<PageBox> {
        let target = self.page(page)?;
        let top: f64 = self.pages[..page - 1]
            .iter()
            .map(|p| p.size.height * p.render_scale + PAGE_GAP)
            .sum();
        Some(PageBox {
            left: 0.0,
            top,
            width: target.size.width * target.render_scale,
            height: target.size.height * target.render_scale,
        })
    }
}

/// A scroll container with a settable scale
#[derive(Debug, Clone, PartialEq)]
pub struct FakeViewport {
    scroll_top: f64,
    scroll_left: f64,
    scale: ScaleValue,
    /// Numeric scale the page-width sentinel resolves to
    pub fit_scale: f64,
}

impl Default for FakeViewport {
    fn default() -> Self {
        Self::scrolled_to(0.0)
    }
}

impl FakeViewport {
    pub fn scrolled_to(offset: f64) -> Self {
        Self {
            scroll_top: offset,
            scroll_left: 0.0,
            scale: ScaleValue::PageWidth,
            fit_scale: 1.0,
        }
    }

    pub fn scale_value(&self) -> ScaleValue {
        self.scale
    }
}

impl Viewport for FakeViewport {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        self.scroll_top = offset.max(0.0);
    }

    fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    fn set_scroll_left(&mut self, offset: f64) {
        self.scroll_left = offset.max(0.0);
    }

    fn current_scale(&self) -> f64 {
        match self.scale {
            ScaleValue::PageWidth => self.fit_scale,
            ScaleValue::Scale(scale) => scale,
        }
    }

    fn set_scale_value(&mut self, value: ScaleValue) {
        self.scale = value;
    }
}

/// Engine reaction that applies scale changes and throws away the scroll position
#[derive(Debug, Default)]
pub struct ScrollResettingReactor {
    reset_to: f64,
    reactions: Vec<LayoutTrigger>,
}

impl ScrollResettingReactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resetting_to(mut self, offset: f64) -> Self {
        self.reset_to = offset;
        self
    }

    pub fn reactions(&self) -> &[LayoutTrigger] {
        &self.reactions
    }
}

impl LayoutReactor for ScrollResettingReactor {
    fn react(&mut self, trigger: LayoutTrigger, viewport: &mut dyn Viewport) {
        self.reactions.push(trigger);
        if let LayoutTrigger::ScaleChanged(value) = trigger {
            viewport.set_scale_value(value);
        }
        viewport.set_scroll_top(self.reset_to);
        viewport.set_scroll_left(0.0);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    CreateHighlight(HighlightId),
    UpdateHighlightColor(HighlightId, HighlightColor),
    DeleteHighlight(HighlightId),
    CreateNote(NoteId),
    UpdateNote(NoteId),
    DeleteNote(NoteId),
}

#[derive(Debug, Default)]
struct SinkState {
    calls: Vec<SinkCall>,
    annotations: Annotations,
    failing: bool,
}

/// Sink that remembers every call; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Rc<RefCell<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.borrow().calls.clone()
    }

    pub fn annotations(&self) -> Annotations {
        self.state.borrow().annotations.clone()
    }

    fn record(
        &self,
        call: SinkCall,
        apply: impl FnOnce(&mut Annotations) -> Result<(), AnnotationError>,
    ) -> Result<(), AnnotationError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.failing {
            return Err(offline());
        }
        apply(&mut state.annotations)
    }
}

fn offline() -> AnnotationError {
    AnnotationError::Io(io::Error::other("sink offline"))
}

impl AnnotationSink for RecordingSink {
    fn load(&mut self) -> Result<Annotations, AnnotationError> {
        let state = self.state.borrow();
        if state.failing {
            return Err(offline());
        }
        Ok(state.annotations.clone())
    }

    fn create_highlight(&mut self, highlight: &Highlight) -> Result<(), AnnotationError> {
        self.record(SinkCall::CreateHighlight(highlight.id), |a| {
            a.upsert_highlight(highlight);
            Ok(())
        })
    }

    fn update_highlight_color(
        &mut self,
        id: HighlightId,
        color: HighlightColor,
    ) -> Result<(), AnnotationError> {
        self.record(SinkCall::UpdateHighlightColor(id, color), |a| {
            a.set_highlight_color(id, color)
        })
    }

    fn delete_highlight(&mut self, id: HighlightId) -> Result<(), AnnotationError> {
        self.record(SinkCall::DeleteHighlight(id), |a| {
            a.remove_highlight(id);
            Ok(())
        })
    }

    fn create_note(&mut self, note: &Note) -> Result<(), AnnotationError> {
        self.record(SinkCall::CreateNote(note.id), |a| {
            a.upsert_note(note);
            Ok(())
        })
    }

    fn update_note(&mut self, note: &Note) -> Result<(), AnnotationError> {
        self.record(SinkCall::UpdateNote(note.id), |a| a.replace_note(note))
    }

    fn delete_note(&mut self, id: NoteId) -> Result<(), AnnotationError> {
        self.record(SinkCall::DeleteNote(id), |a| {
            a.remove_note(id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_pages_stack_vertically() {
        let engine = FakeEngine::two_page_document();
        let second = engine.page_box(2).unwrap();
        assert_eq!(second.top, 800.0 + PAGE_GAP);
        assert!(engine.page_box(3).is_none());
        assert!(engine.page_box(0).is_none());
    }

    #[test]
    fn device_pixel_ratio_scales_raster_only() {
        let engine = FakeEngine::single_column_page().with_device_pixel_ratio(2.0);
        assert_eq!(engine.raster_width(1), 1200);
        assert_eq!(engine.page_box(1).unwrap().width, 600.0);
    }

    #[test]
    fn reactor_resets_scroll() {
        let mut viewport = FakeViewport::scrolled_to(500.0);
        let mut reactor = ScrollResettingReactor::new();
        reactor.react(LayoutTrigger::ScaleChanged(ScaleValue::Scale(2.0)), &mut viewport);
        assert_eq!(viewport.scroll_top(), 0.0);
        assert_eq!(viewport.current_scale(), 2.0);
    }
}
