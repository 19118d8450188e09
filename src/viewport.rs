//! Keeping the reader's place while the engine re-lays out
//!
//! The engine resets its scroll position whenever the drawn highlights, the
//! interaction mode or the scale change. We cannot stop that, so every such
//! change runs as one cycle: read the offset, let the engine react, then put
//! the offset back before anything is painted.

use std::time::{Duration, Instant};

use log::debug;

use crate::engine::{LayoutReactor, LayoutTrigger, Viewport};
use crate::reader_state::ReaderState;

#[derive(Debug, Default)]
pub struct ViewportStabilizer {
    saved_scroll: Option<f64>,
}

impl ViewportStabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an offset loaded from durable storage
    pub fn with_saved_scroll(offset: f64) -> Self {
        Self {
            saved_scroll: Some(offset),
        }
    }

    pub fn saved_scroll(&self) -> Option<f64> {
        self.saved_scroll
    }

    /// Remember the viewport's offset; must run before the engine reacts
    pub fn capture(&mut self, viewport: Option<&dyn Viewport>) {
        match viewport {
            Some(viewport) => self.saved_scroll = Some(viewport.scroll_top()),
            None => debug!("Viewport not mounted, nothing to capture"),
        }
    }

    /// Put the remembered offset back; must run after the engine reacted.
    ///
    /// An offset of zero is left alone, the engine's reset already matches it.
    pub fn restore(&self, viewport: Option<&mut dyn Viewport>) -> bool {
        let Some(viewport) = viewport else {
            debug!("Viewport not mounted, nothing to restore");
            return false;
        };
        match self.saved_scroll {
            Some(offset) if offset > 0.0 => {
                viewport.set_scroll_top(offset);
                true
            }
            _ => false,
        }
    }

    /// Run the engine's reaction to `trigger` between capture and restore
    pub fn run_cycle(
        &mut self,
        viewport: Option<&mut dyn Viewport>,
        reactor: &mut dyn LayoutReactor,
        trigger: LayoutTrigger,
    ) {
        let Some(viewport) = viewport else {
            debug!("Viewport not mounted, skipping layout cycle for {trigger:?}");
            return;
        };
        self.capture(Some(&*viewport));
        reactor.react(trigger, &mut *viewport);
        if self.restore(Some(viewport)) {
            debug!("Restored scroll offset after {trigger:?}");
        }
    }
}

/// Writes the scroll offset to durable storage once scrolling settles
#[derive(Debug)]
pub struct ScrollSaver {
    document_id: String,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl ScrollSaver {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

    pub fn new(document_id: impl Into<String>, debounce: Duration) -> Self {
        Self {
            document_id: document_id.into(),
            debounce,
            deadline: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Every scroll event pushes the write further out
    pub fn on_scroll(&mut self, now: Instant) {
        self.deadline = Some(now + self.debounce);
    }

    /// Write the offset if the debounce period has elapsed; returns whether it did
    pub fn tick(
        &mut self,
        now: Instant,
        viewport: Option<&dyn Viewport>,
        state: &mut ReaderState,
    ) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return false,
        }
        let Some(viewport) = viewport else {
            return false;
        };
        self.deadline = None;
        self.write(viewport.scroll_top(), state);
        true
    }

    /// Final unconditional write when the document closes
    pub fn teardown(&mut self, viewport: Option<&dyn Viewport>, state: &mut ReaderState) {
        self.deadline = None;
        match viewport {
            Some(viewport) => self.write(viewport.scroll_top(), state),
            None => debug!("Viewport gone before teardown, keeping last saved offset"),
        }
    }

    fn write(&self, offset: f64, state: &mut ReaderState) {
        debug!("Saving scroll offset {offset} for {}", self.document_id);
        state.set_scroll_offset(&self.document_id, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeViewport, ScrollResettingReactor};

    #[test]
    fn scroll_survives_engine_reset() {
        let mut viewport = FakeViewport::scrolled_to(500.0);
        let mut reactor = ScrollResettingReactor::new();
        let mut stabilizer = ViewportStabilizer::new();

        stabilizer.run_cycle(
            Some(&mut viewport),
            &mut reactor,
            LayoutTrigger::HighlightsChanged,
        );

        assert_eq!(reactor.reactions(), &[LayoutTrigger::HighlightsChanged]);
        assert!((viewport.scroll_top() - 500.0).abs() <= 1.0);
    }

    #[test]
    fn restore_without_engine_reaction_shows_the_reset() {
        // capture alone is not enough: restore must follow the reaction
        let mut viewport = FakeViewport::scrolled_to(500.0);
        let mut reactor = ScrollResettingReactor::new();
        let mut stabilizer = ViewportStabilizer::new();

        stabilizer.capture(Some(&viewport));
        assert!(stabilizer.restore(Some(&mut viewport)));
        reactor.react(LayoutTrigger::HighlightsChanged, &mut viewport);
        assert_eq!(viewport.scroll_top(), 0.0);
    }

    #[test]
    fn zero_offset_is_not_restored() {
        let mut viewport = FakeViewport::scrolled_to(0.0);
        let mut reactor = ScrollResettingReactor::new().resetting_to(40.0);
        let mut stabilizer = ViewportStabilizer::new();

        stabilizer.run_cycle(
            Some(&mut viewport),
            &mut reactor,
            LayoutTrigger::InteractionModeChanged,
        );
        assert_eq!(viewport.scroll_top(), 40.0);
    }

    #[test]
    fn missing_viewport_is_a_no_op() {
        let mut reactor = ScrollResettingReactor::new();
        let mut stabilizer = ViewportStabilizer::with_saved_scroll(300.0);

        stabilizer.capture(None);
        assert!(!stabilizer.restore(None));
        stabilizer.run_cycle(None, &mut reactor, LayoutTrigger::HighlightsChanged);

        assert!(reactor.reactions().is_empty());
        assert_eq!(stabilizer.saved_scroll(), Some(300.0));
    }

    #[test]
    fn saved_scroll_is_debounced() {
        let viewport = FakeViewport::scrolled_to(120.0);
        let mut state = ReaderState::ephemeral();
        let mut saver = ScrollSaver::new("paper-1", ScrollSaver::DEFAULT_DEBOUNCE);
        let start = Instant::now();

        assert!(!saver.tick(start, Some(&viewport), &mut state));

        saver.on_scroll(start);
        saver.on_scroll(start + Duration::from_millis(300));
        assert!(!saver.tick(start + Duration::from_millis(600), Some(&viewport), &mut state));
        assert_eq!(state.scroll_offset("paper-1"), None);

        assert!(saver.tick(start + Duration::from_millis(800), Some(&viewport), &mut state));
        assert_eq!(state.scroll_offset("paper-1"), Some(120.0));
        assert!(!saver.is_pending());
    }

    #[test]
    fn teardown_writes_unconditionally() {
        let viewport = FakeViewport::scrolled_to(75.0);
        let mut state = ReaderState::ephemeral();
        let mut saver = ScrollSaver::new("paper-1", ScrollSaver::DEFAULT_DEBOUNCE);

        saver.teardown(Some(&viewport), &mut state);
        assert_eq!(state.scroll_offset("paper-1"), Some(75.0));

        saver.teardown(None, &mut state);
        assert_eq!(state.scroll_offset("paper-1"), Some(75.0));
    }
}
