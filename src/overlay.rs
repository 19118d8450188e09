//! Selectable text overlay built from engine glyph runs
//!
//! The engine's own text layer stretches each run to fill its box, which lets
//! selection highlights overshoot the real glyph extent and bleed into the
//! next column. The overlay replaces it for pointer purposes: every run gets
//! exactly its advance width, and per-character positions are derived from
//! that width so partial selections can be measured precisely.

use std::collections::HashMap;

use log::{debug, warn};
use unicode_width::UnicodeWidthChar;

use crate::engine::{GlyphRun, Matrix, PageSize, PageTextSource, PixelSize};

/// Portion of the font size above the baseline
pub const ASCENT_EM: f64 = 0.8;
/// Portion of the font size below the baseline
pub const DESCENT_EM: f64 = 0.2;
/// Runs rendered smaller than this (in device pixels) are not selectable
pub const MIN_FONT_SIZE_PX: f64 = 1.0;
/// Advance per display column when the engine reports no run width
pub const FALLBACK_ADVANCE_EM: f64 = 0.5;

/// A rectangle in raster pixel space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// One selectable text element of the overlay
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayRun {
    pub text: String,
    /// Start of the baseline in raster pixels
    pub x: f64,
    pub baseline: f64,
    pub font_size: f64,
    /// Exact rendered width; `None` when the engine reported no advance width
    pub text_length: Option<f64>,
    /// Cumulative display weight before each char, plus the total at the end
    offsets: Vec<f64>,
}

impl OverlayRun {
    fn new(text: String, x: f64, baseline: f64, font_size: f64, text_length: Option<f64>) -> Self {
        let weights: Vec<f64> = text
            .chars()
            .map(|c| c.width().unwrap_or(0) as f64)
            .collect();
        let uniform = weights.iter().sum::<f64>() <= 0.0;

        let mut offsets = Vec::with_capacity(weights.len() + 1);
        let mut acc = 0.0;
        offsets.push(acc);
        for w in weights {
            acc += if uniform { 1.0 } else { w };
            offsets.push(acc);
        }

        Self {
            text,
            x,
            baseline,
            font_size,
            text_length,
            offsets,
        }
    }

    pub fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Width the run occupies on the raster
    pub fn advance(&self) -> f64 {
        self.text_length.unwrap_or_else(|| {
            self.offsets.last().copied().unwrap_or(0.0) * FALLBACK_ADVANCE_EM * self.font_size
        })
    }

    /// Full box of the run
    pub fn bounds(&self) -> PixelRect {
        PixelRect {
            left: self.x,
            top: self.baseline - ASCENT_EM * self.font_size,
            width: self.advance(),
            height: (ASCENT_EM + DESCENT_EM) * self.font_size,
        }
    }

    /// X position where char `index` starts
    pub fn char_start_x(&self, index: usize) -> f64 {
        let total = self.offsets.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            return self.x;
        }
        let index = index.min(self.char_count());
        self.x + self.advance() * self.offsets[index] / total
    }

    /// Start and width of char `index`
    pub fn char_extent(&self, index: usize) -> (f64, f64) {
        let start = self.char_start_x(index);
        (start, self.char_start_x(index + 1) - start)
    }

    /// Box covering chars `start..end`.
    ///
    /// `None` on either side means "from the run start" / "to the run end".
    /// Degenerate or out-of-range requests fall back to the full run box.
    pub fn char_range_bounds(&self, start: Option<usize>, end: Option<usize>) -> PixelRect {
        let full = self.bounds();
        if start.is_none() && end.is_none() {
            return full;
        }
        let count = self.char_count();
        if count == 0 {
            return full;
        }

        let first = start.unwrap_or(0).min(count - 1);
        let end = end.map_or(count, |e| e.min(count));
        if first >= end {
            return full;
        }

        let left = self.char_start_x(first);
        let (last_x, last_w) = self.char_extent(end - 1);
        PixelRect {
            left,
            width: last_x + last_w - left,
            ..full
        }
    }
}

/// The overlay of one page, valid for one raster width
#[derive(Clone, Debug)]
pub struct PageOverlay {
    pub page: usize,
    pub raster: PixelSize,
    pub runs: Vec<OverlayRun>,
}

impl PageOverlay {
    /// Lay out glyph runs for a page rasterized at `raster`
    pub fn build(page: usize, size: PageSize, raster: PixelSize, glyphs: &[GlyphRun]) -> Self {
        let scale = f64::from(raster.width) / size.width;
        let viewport = Matrix::page_viewport(size.height, scale);

        let runs = glyphs
            .iter()
            .filter(|glyph| !glyph.text.is_empty())
            .filter_map(|glyph| {
                let device = viewport.multiply(&glyph.transform);
                let font_size = device.vertical_scale();
                if font_size < MIN_FONT_SIZE_PX {
                    return None;
                }
                let text_length = (glyph.width > 0.0).then(|| glyph.width * scale);
                Some(OverlayRun::new(
                    glyph.text.clone(),
                    device.translate_x(),
                    device.translate_y(),
                    font_size,
                    text_length,
                ))
            })
            .collect();

        Self { page, raster, runs }
    }

    pub fn run(&self, index: usize) -> Option<&OverlayRun> {
        self.runs.get(index)
    }
}

/// Keeps one overlay per rasterized page in sync with the engine
#[derive(Debug, Default)]
pub struct OverlayManager {
    pages: HashMap<usize, PageOverlay>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring every page's overlay up to date; returns how many were rebuilt.
    ///
    /// Call on every engine mutation signal. Pages whose data is not ready are
    /// skipped and picked up by a later call.
    pub fn refresh(&mut self, source: &mut dyn PageTextSource) -> usize {
        (1..=source.page_count())
            .filter(|&page| self.refresh_page(source, page))
            .count()
    }

    /// Rebuild the overlay of `page` if its raster width changed
    pub fn refresh_page(&mut self, source: &mut dyn PageTextSource, page: usize) -> bool {
        let Some(raster) = source.raster_size(page).filter(|r| r.width > 0) else {
            return false;
        };
        if self
            .pages
            .get(&page)
            .is_some_and(|overlay| overlay.raster.width == raster.width)
        {
            return false;
        }

        let Some(size) = source.page_size(page).filter(|s| s.width > 0.0) else {
            debug!("Page {page}: size not available yet, overlay deferred");
            return false;
        };
        let Some(glyphs) = source.glyph_runs(page) else {
            debug!("Page {page}: text content not available yet, overlay deferred");
            return false;
        };

        let overlay = PageOverlay::build(page, size, raster, &glyphs);
        if overlay.runs.len() < glyphs.len() {
            debug!(
                "Page {page}: {} of {} glyph runs not selectable",
                glyphs.len() - overlay.runs.len(),
                glyphs.len()
            );
        }
        if let Some(stale) = self.pages.insert(page, overlay) {
            debug!(
                "Page {page}: overlay rebuilt for raster width {} (was {})",
                raster.width, stale.raster.width
            );
        } else {
            debug!("Page {page}: overlay built for raster width {}", raster.width);
        }
        source.set_native_text_layer_interactive(page, false);
        true
    }

    pub fn page(&self, page: usize) -> Option<&PageOverlay> {
        self.pages.get(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Remove every overlay and hand pointer events back to the engine
    pub fn teardown(&mut self, source: &mut dyn PageTextSource) {
        for page in self.pages.keys() {
            if *page > source.page_count() {
                warn!("Page {page} vanished before overlay teardown");
                continue;
            }
            source.set_native_text_layer_interactive(*page, true);
        }
        self.pages.clear();
    }
}
