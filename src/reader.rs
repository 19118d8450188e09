//! One open document: selection, highlights, zoom and scroll in one place
//!
//! Every change that alters what the engine draws or how it lays pages out
//! runs through the viewport stabilizer, so the reader never loses their place.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::engine::{LayoutReactor, LayoutTrigger, PageLayout, PageTextSource, ScaleValue, Viewport};
use crate::geometry::ScreenPoint;
use crate::highlight::{
    DrawnHighlight, GhostHighlight, HighlightColor, HighlightId, HighlightStore, NoteBlock, NoteId,
};
use crate::interaction::{InteractionMode, PanGesture};
use crate::normalize::Heuristics;
use crate::overlay::OverlayManager;
use crate::persistence::AnnotationSink;
use crate::reader_state::ReaderState;
use crate::selection::{PointerButton, PointerTarget, SelectionCapture, TextRange};
use crate::settings;
use crate::viewport::{ScrollSaver, ViewportStabilizer};
use crate::zoom::{DeltaMode, ZoomController};

/// Space left above a highlight scrolled into view
pub const SCROLL_TO_MARGIN: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub heuristics: Heuristics,
    pub note_color: HighlightColor,
    pub scroll_save_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heuristics: Heuristics::default(),
            note_color: HighlightColor::Green,
            scroll_save_debounce: ScrollSaver::DEFAULT_DEBOUNCE,
        }
    }
}

impl SessionConfig {
    pub fn from_settings() -> Self {
        Self {
            heuristics: settings::get_heuristics(),
            note_color: settings::get_default_note_color(),
            scroll_save_debounce: Duration::from_millis(settings::get_scroll_save_debounce_ms()),
        }
    }
}

pub struct DocumentSession<V, R> {
    document_id: String,
    store: HighlightStore,
    overlays: OverlayManager,
    capture: SelectionCapture,
    stabilizer: ViewportStabilizer,
    scroll_saver: ScrollSaver,
    zoom: ZoomController,
    mode: InteractionMode,
    pan: PanGesture,
    reader_state: ReaderState,
    note_color: HighlightColor,
    viewport: Option<V>,
    reactor: R,
}

impl<V: Viewport, R: LayoutReactor> DocumentSession<V, R> {
    /// Open a document, loading its annotations and last reading position.
    ///
    /// The viewport arrives later with [`attach_viewport`](Self::attach_viewport).
    pub fn open(
        document_id: impl Into<String>,
        sink: Box<dyn AnnotationSink>,
        reader_state: ReaderState,
        reactor: R,
        config: SessionConfig,
    ) -> Self {
        let document_id = document_id.into();
        let store = HighlightStore::open(document_id.clone(), sink, config.heuristics);
        let zoom = ZoomController::restore(reader_state.zoom(&document_id));
        let stabilizer = match reader_state.scroll_offset(&document_id) {
            Some(offset) => ViewportStabilizer::with_saved_scroll(offset),
            None => ViewportStabilizer::new(),
        };
        info!(
            "Opened {document_id} with {} highlights",
            store.highlights().len()
        );

        Self {
            scroll_saver: ScrollSaver::new(document_id.clone(), config.scroll_save_debounce),
            document_id,
            store,
            overlays: OverlayManager::new(),
            capture: SelectionCapture::new(),
            stabilizer,
            zoom,
            mode: InteractionMode::default(),
            pan: PanGesture::new(),
            reader_state,
            note_color: config.note_color,
            viewport: None,
            reactor,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn store(&self) -> &HighlightStore {
        &self.store
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn reader_state(&self) -> &ReaderState {
        &self.reader_state
    }

    pub fn viewport(&self) -> Option<&V> {
        self.viewport.as_ref()
    }

    pub fn viewport_mut(&mut self) -> Option<&mut V> {
        self.viewport.as_mut()
    }

    pub fn reactor(&self) -> &R {
        &self.reactor
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn zoom_value(&self) -> ScaleValue {
        self.zoom.value()
    }

    pub fn drawn_highlights(&self) -> Vec<DrawnHighlight<'_>> {
        self.store.drawn()
    }

    /// The engine mounted its viewer: restore the saved position and zoom
    pub fn attach_viewport(&mut self, mut viewport: V) {
        self.stabilizer.restore(Some(&mut viewport));
        self.viewport = Some(viewport);
        if let ScaleValue::Scale(_) = self.zoom.value() {
            self.relayout(LayoutTrigger::ScaleChanged(self.zoom.value()));
        }
    }

    /// The engine unmounted its viewer; the last offset is written first
    pub fn detach_viewport(&mut self) -> Option<V> {
        self.scroll_saver
            .teardown(self.viewport.as_ref().map(|v| v as &dyn Viewport), &mut self.reader_state);
        self.pan.cancel();
        self.viewport.take()
    }

    /// Bring the selectable overlay in line with the engine's pages
    pub fn on_engine_mutation(&mut self, source: &mut dyn PageTextSource) -> usize {
        self.overlays.refresh(source)
    }

    pub fn on_pointer_down(&mut self, button: PointerButton, target: PointerTarget, at: ScreenPoint) {
        match self.mode {
            InteractionMode::Select => {
                self.capture.on_pointer_down(button, target);
                if self.capture.current().is_none() && self.store.discard_ghost() {
                    self.relayout(LayoutTrigger::HighlightsChanged);
                }
            }
            InteractionMode::Pan => {
                if let Some(viewport) = self.viewport.as_ref() {
                    self.pan.on_pointer_down(button, at, viewport);
                }
            }
        }
    }

    pub fn on_pointer_move(&mut self, at: ScreenPoint) {
        if let Some(viewport) = self.viewport.as_mut() {
            self.pan.on_pointer_move(at, viewport);
        }
    }

    /// Finish a pointer gesture; a completed text selection becomes the ghost
    pub fn on_pointer_up(
        &mut self,
        button: PointerButton,
        range: Option<&TextRange>,
        layout: &dyn PageLayout,
    ) -> Option<&GhostHighlight> {
        if self.mode == InteractionMode::Pan {
            self.pan.on_pointer_up();
            return None;
        }

        let selection = self
            .capture
            .on_pointer_up(button, range, &self.overlays, layout)
            .cloned()?;
        self.store.begin_ghost(selection);
        self.relayout(LayoutTrigger::HighlightsChanged);
        self.store.ghost()
    }

    pub fn commit_selection(&mut self, color: HighlightColor) -> Option<HighlightId> {
        let id = self.store.commit_ghost(color)?;
        self.capture.clear();
        self.relayout(LayoutTrigger::HighlightsChanged);
        Some(id)
    }

    /// Commit the selection in the note color with a note quoting it
    pub fn commit_selection_with_note(&mut self) -> Option<(HighlightId, NoteId)> {
        let ids = self.store.commit_ghost_with_note(self.note_color)?;
        self.capture.clear();
        self.relayout(LayoutTrigger::HighlightsChanged);
        Some(ids)
    }

    pub fn discard_selection(&mut self) {
        self.capture.clear();
        if self.store.discard_ghost() {
            self.relayout(LayoutTrigger::HighlightsChanged);
        }
    }

    pub fn change_color(&mut self, id: HighlightId, color: HighlightColor) -> bool {
        let changed = self.store.change_color(id, color);
        if changed {
            self.relayout(LayoutTrigger::HighlightsChanged);
        }
        changed
    }

    pub fn delete_highlight(&mut self, id: HighlightId) -> bool {
        let deleted = self.store.delete_highlight(id);
        if deleted {
            self.relayout(LayoutTrigger::HighlightsChanged);
        }
        deleted
    }

    pub fn add_note(&mut self, highlight: Option<HighlightId>, text: &str) -> Option<NoteId> {
        let mut blocks = Vec::new();
        if let Some(highlight) = highlight.and_then(|id| self.store.highlight(id)) {
            blocks.push(NoteBlock::quote(highlight));
        }
        blocks.push(NoteBlock::text(text));
        self.store.add_note(highlight, blocks)
    }

    pub fn update_note_text(&mut self, id: NoteId, text: &str) -> bool {
        self.store.update_note_text(id, text)
    }

    pub fn delete_note(&mut self, id: NoteId) -> bool {
        self.store.delete_note(id)
    }

    /// Scroll a highlight into view and mark it
    pub fn scroll_to_highlight(&mut self, id: HighlightId, layout: &dyn PageLayout) -> bool {
        let Some(highlight) = self.store.highlight(id) else {
            return false;
        };
        let bounds = highlight.position.bounding_rect;
        let Some(page_box) = layout.page_box(bounds.page_number) else {
            debug!("Page {} not laid out, cannot scroll to {id}", bounds.page_number);
            return false;
        };
        let Some(viewport) = self.viewport.as_mut() else {
            return false;
        };

        let factor = if bounds.page_width > 0.0 {
            page_box.width / bounds.page_width
        } else {
            1.0
        };
        viewport.set_scroll_top((page_box.top + bounds.top * factor - SCROLL_TO_MARGIN).max(0.0));
        self.store.set_scrolled_to(Some(id));
        true
    }

    pub fn set_interaction_mode(&mut self, mode: InteractionMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.pan.cancel();
        self.capture.clear();
        self.relayout(LayoutTrigger::InteractionModeChanged);
    }

    pub fn toggle_interaction_mode(&mut self) {
        self.set_interaction_mode(self.mode.toggled());
    }

    pub fn zoom_in(&mut self) -> Option<ScaleValue> {
        let current = self.current_scale()?;
        let value = self.zoom.zoom_in(current)?;
        self.apply_zoom(value);
        Some(value)
    }

    pub fn zoom_out(&mut self) -> Option<ScaleValue> {
        let current = self.current_scale()?;
        let value = self.zoom.zoom_out(current)?;
        self.apply_zoom(value);
        Some(value)
    }

    pub fn pinch(&mut self, delta: f64, mode: DeltaMode) -> Option<ScaleValue> {
        let current = self.current_scale()?;
        let value = self.zoom.pinch(current, delta, mode)?;
        self.apply_zoom(value);
        Some(value)
    }

    pub fn reset_zoom(&mut self) -> Option<ScaleValue> {
        self.viewport.as_ref()?;
        let value = self.zoom.reset()?;
        self.apply_zoom(value);
        Some(value)
    }

    pub fn zoom_label(&self) -> String {
        ZoomController::label(self.current_scale())
    }

    pub fn at_min_zoom(&self) -> bool {
        ZoomController::at_min(self.current_scale())
    }

    pub fn at_max_zoom(&self) -> bool {
        ZoomController::at_max(self.current_scale())
    }

    pub fn on_scroll(&mut self, now: Instant) {
        self.scroll_saver.on_scroll(now);
    }

    /// Drive time-based work; call periodically
    pub fn tick(&mut self, now: Instant) {
        self.scroll_saver.tick(
            now,
            self.viewport.as_ref().map(|v| v as &dyn Viewport),
            &mut self.reader_state,
        );
    }

    /// Hand text interaction back to the engine and persist the position
    pub fn close(&mut self, source: &mut dyn PageTextSource) {
        self.overlays.teardown(source);
        self.detach_viewport();
        info!("Closed {}", self.document_id);
    }

    fn current_scale(&self) -> Option<f64> {
        self.viewport.as_ref().map(|v| v.current_scale())
    }

    fn apply_zoom(&mut self, value: ScaleValue) {
        self.reader_state.set_zoom(&self.document_id, value);
        self.relayout(LayoutTrigger::ScaleChanged(value));
    }

    fn relayout(&mut self, trigger: LayoutTrigger) {
        let viewport = self.viewport.as_mut().map(|v| v as &mut dyn Viewport);
        self.stabilizer.run_cycle(viewport, &mut self.reactor, trigger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::RunPosition;
    use crate::test_utils::{FakeEngine, FakeViewport, RecordingSink, ScrollResettingReactor};

    type Session = DocumentSession<FakeViewport, ScrollResettingReactor>;

    fn open(sink: &RecordingSink, state: ReaderState) -> Session {
        DocumentSession::open(
            "paper-1",
            Box::new(sink.clone()),
            state,
            ScrollResettingReactor::new(),
            SessionConfig::default(),
        )
    }

    fn title_range() -> TextRange {
        TextRange::new(
            RunPosition::new(1, 0, 0),
            RunPosition::new(1, 0, 25),
            "Attention Is All You Need",
        )
    }

    fn select(session: &mut Session, engine: &mut FakeEngine, range: &TextRange) {
        session.on_engine_mutation(engine);
        session.on_pointer_down(PointerButton::Primary, PointerTarget::Elsewhere, ScreenPoint::default());
        session.on_pointer_up(PointerButton::Primary, Some(range), engine);
    }

    #[test]
    fn selection_to_highlight_keeps_scroll() {
        let sink = RecordingSink::new();
        let mut engine = FakeEngine::single_column_page();
        let mut session = open(&sink, ReaderState::ephemeral());
        session.attach_viewport(FakeViewport::scrolled_to(500.0));

        select(&mut session, &mut engine, &title_range());
        assert!(session.store().ghost().is_some());
        assert_eq!(session.viewport().unwrap().scroll_top(), 500.0);

        let id = session.commit_selection(HighlightColor::Yellow).unwrap();
        assert_eq!(session.store().highlight(id).unwrap().selected_text, "Attention Is All You Need");
        assert_eq!(session.viewport().unwrap().scroll_top(), 500.0);
        assert_eq!(session.reactor().reactions().len(), 2);
    }

    #[test]
    fn clicking_elsewhere_drops_the_ghost() {
        let sink = RecordingSink::new();
        let mut engine = FakeEngine::single_column_page();
        let mut session = open(&sink, ReaderState::ephemeral());
        session.attach_viewport(FakeViewport::scrolled_to(0.0));

        select(&mut session, &mut engine, &title_range());
        session.on_pointer_down(
            PointerButton::Primary,
            PointerTarget::SelectionActions,
            ScreenPoint::default(),
        );
        assert!(session.store().ghost().is_some());

        session.on_pointer_down(PointerButton::Primary, PointerTarget::Elsewhere, ScreenPoint::default());
        assert!(session.store().ghost().is_none());
        assert!(session.drawn_highlights().is_empty());
    }

    #[test]
    fn pan_mode_drags_instead_of_selecting() {
        let sink = RecordingSink::new();
        let mut engine = FakeEngine::single_column_page();
        let mut session = open(&sink, ReaderState::ephemeral());
        session.on_engine_mutation(&mut engine);
        session.attach_viewport(FakeViewport::scrolled_to(200.0));

        session.toggle_interaction_mode();
        assert_eq!(session.mode(), InteractionMode::Pan);
        assert_eq!(session.viewport().unwrap().scroll_top(), 200.0);

        let start = ScreenPoint { x: 10.0, y: 300.0 };
        session.on_pointer_down(PointerButton::Primary, PointerTarget::Elsewhere, start);
        session.on_pointer_move(ScreenPoint { x: 10.0, y: 250.0 });
        assert!(
            session
                .on_pointer_up(PointerButton::Primary, Some(&title_range()), &engine)
                .is_none()
        );
        assert_eq!(session.viewport().unwrap().scroll_top(), 250.0);
        assert!(session.store().ghost().is_none());
    }

    #[test]
    fn zoom_is_applied_and_remembered() {
        let sink = RecordingSink::new();
        let mut session = open(&sink, ReaderState::ephemeral());
        assert_eq!(session.zoom_in(), None);
        assert_eq!(session.zoom_label(), "\u{2014}");

        session.attach_viewport(FakeViewport::scrolled_to(320.0));
        assert_eq!(session.zoom_in(), Some(ScaleValue::Scale(1.1)));
        assert_eq!(session.zoom_in(), Some(ScaleValue::Scale(1.25)));

        let viewport = session.viewport().unwrap();
        assert_eq!(viewport.scale_value(), ScaleValue::Scale(1.25));
        assert_eq!(viewport.scroll_top(), 320.0);
        assert_eq!(session.zoom_label(), "125%");
        assert_eq!(
            session.reader_state().zoom("paper-1"),
            Some(ScaleValue::Scale(1.25))
        );

        assert_eq!(session.reset_zoom(), Some(ScaleValue::PageWidth));
        assert_eq!(session.reader_state().zoom("paper-1"), Some(ScaleValue::PageWidth));
    }

    #[test]
    fn reopen_restores_scroll_and_zoom() {
        let sink = RecordingSink::new();
        let mut state = ReaderState::ephemeral();
        state.set_scroll_offset("paper-1", 640.0);
        state.set_zoom("paper-1", ScaleValue::Scale(1.5));

        let mut session = open(&sink, state);
        session.attach_viewport(FakeViewport::scrolled_to(0.0));

        let viewport = session.viewport().unwrap();
        assert_eq!(viewport.scroll_top(), 640.0);
        assert_eq!(viewport.scale_value(), ScaleValue::Scale(1.5));
    }

    #[test]
    fn scroll_to_highlight_marks_it() {
        let sink = RecordingSink::new();
        let mut engine = FakeEngine::two_page_document();
        let mut session = open(&sink, ReaderState::ephemeral());
        session.attach_viewport(FakeViewport::scrolled_to(0.0));

        let range = TextRange::new(RunPosition::new(2, 0, 0), RunPosition::new(2, 0, 8), "Abstract");
        select(&mut session, &mut engine, &range);
        let id = session.commit_selection(HighlightColor::Blue).unwrap();

        assert!(session.scroll_to_highlight(id, &engine));
        // page 2 starts at 810, the run's top is at 52
        assert_eq!(session.viewport().unwrap().scroll_top(), 810.0 + 52.0 - SCROLL_TO_MARGIN);
        assert!(matches!(
            session.drawn_highlights()[0],
            DrawnHighlight::Committed { scrolled_to: true, .. }
        ));
    }

    #[test]
    fn detach_writes_final_offset() {
        let sink = RecordingSink::new();
        let mut engine = FakeEngine::single_column_page();
        let mut session = open(&sink, ReaderState::ephemeral());
        session.on_engine_mutation(&mut engine);
        session.attach_viewport(FakeViewport::scrolled_to(90.0));

        session.close(&mut engine);

        assert_eq!(session.reader_state().scroll_offset("paper-1"), Some(90.0));
        assert!(session.viewport().is_none());
        assert!(engine.native_layer_interactive(1));
    }
}
