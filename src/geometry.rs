//! Page-relative highlight geometry
//!
//! All rectangles here live in page-relative CSS pixels: the origin is the
//! top-left corner of the rendered page and each rect carries the page size
//! it was measured against, so stored geometry can be re-scaled when the page
//! is later drawn at a different zoom.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing geometry produced by floating point math
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// Axis-aligned box on a page
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// Width of the page this rect was measured on
    pub page_width: f64,
    /// Height of the page this rect was measured on
    pub page_height: f64,
    /// 1-based page number
    pub page_number: usize,
}

impl Rect {
    #[must_use]
    pub fn new(
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        page_width: f64,
        page_height: f64,
        page_number: usize,
    ) -> Self {
        Self {
            left,
            top,
            width: width.max(0.0),
            height: height.max(0.0),
            page_width,
            page_height,
            page_number,
        }
    }

    /// Build a rect from its edges, keeping the page metadata of `page`
    #[must_use]
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64, page: &Rect) -> Self {
        Self::new(
            left,
            top,
            right - left,
            bottom - top,
            page.page_width,
            page.page_height,
            page.page_number,
        )
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Same rect with its right edge moved, never producing a negative width
    #[must_use]
    pub fn with_right(&self, right: f64) -> Self {
        Self {
            width: (right - self.left).max(0.0),
            ..*self
        }
    }

    /// Clip the rect to the page area it was measured on
    #[must_use]
    pub fn clipped_to_page(&self) -> Self {
        let left = self.left.clamp(0.0, self.page_width);
        let right = self.right().clamp(left, self.page_width);
        let (top, bottom) = if self.page_height > 0.0 {
            let top = self.top.clamp(0.0, self.page_height);
            (top, self.bottom().clamp(top, self.page_height))
        } else {
            (self.top, self.bottom())
        };
        Self::from_edges(left, top, right, bottom, self)
    }

    pub fn approx_eq(&self, other: &Rect, epsilon: f64) -> bool {
        self.page_number == other.page_number
            && (self.left - other.left).abs() <= epsilon
            && (self.top - other.top).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// Bounding rect plus the per-line rects that make up a highlight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaledPosition {
    pub bounding_rect: Rect,
    pub rects: Vec<Rect>,
}

impl ScaledPosition {
    /// Build a position whose bounding rect is the union of `rects`.
    ///
    /// Returns `None` for an empty rect list, there is nothing to enclose.
    #[must_use]
    pub fn from_rects(rects: Vec<Rect>) -> Option<Self> {
        let bounding_rect = union(&rects)?;
        Some(Self {
            bounding_rect,
            rects,
        })
    }

    /// Replace the constituent rects and recompute the bounding rect
    pub fn set_rects(&mut self, rects: Vec<Rect>) {
        if let Some(bounds) = union(&rects) {
            self.bounding_rect = bounds;
        }
        self.rects = rects;
    }

    pub fn page_number(&self) -> usize {
        self.bounding_rect.page_number
    }

    pub fn page_width(&self) -> f64 {
        self.bounding_rect.page_width
    }

    /// True when the bounding rect equals the union of the constituent rects
    pub fn bounds_consistent(&self, epsilon: f64) -> bool {
        union(&self.rects).is_some_and(|u| u.approx_eq(&self.bounding_rect, epsilon))
    }

    pub fn approx_eq(&self, other: &ScaledPosition, epsilon: f64) -> bool {
        self.rects.len() == other.rects.len()
            && self.bounding_rect.approx_eq(&other.bounding_rect, epsilon)
            && self
                .rects
                .iter()
                .zip(&other.rects)
                .all(|(a, b)| a.approx_eq(b, epsilon))
    }
}

/// Smallest rect enclosing every rect in `rects`
pub fn union(rects: &[Rect]) -> Option<Rect> {
    let first = rects.first()?;
    let (mut x1, mut y1, mut x2, mut y2) = (first.left, first.top, first.right(), first.bottom());
    for rect in &rects[1..] {
        x1 = x1.min(rect.left);
        y1 = y1.min(rect.top);
        x2 = x2.max(rect.right());
        y2 = y2.max(rect.bottom());
    }
    Some(Rect::from_edges(x1, y1, x2, y2, first))
}

/// A point in screen (viewport client) coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// A resolved text selection, ready to become a ghost highlight
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub position: ScaledPosition,
    pub text: String,
    /// Horizontal center / top edge of the selection, for placing transient UI
    pub anchor: ScreenPoint,
}
