//! Interface to the page rendering engine
//!
//! The engine rasterizes pages, reports positioned glyph runs and owns the
//! scrollable viewport. Nothing in this crate draws pages; everything talks to
//! the engine through the traits below so the selection pipeline can be driven
//! by a real renderer or by the in-memory doubles in `test_utils`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 2D affine transform in PDF order `[a, b, c, d, e, f]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Viewport transform for an unrotated page drawn at `scale`.
    ///
    /// Flips the y axis so that content-space baselines map to top-down
    /// device pixels.
    #[must_use]
    pub fn page_viewport(page_height: f64, scale: f64) -> Self {
        Matrix([scale, 0.0, 0.0, -scale, 0.0, page_height * scale])
    }

    /// `self * other`: apply `other` first, then `self`
    #[must_use]
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    pub fn translate_x(&self) -> f64 {
        self.0[4]
    }

    pub fn translate_y(&self) -> f64 {
        self.0[5]
    }

    /// Font height in device units, independent of the y-axis flip
    pub fn vertical_scale(&self) -> f64 {
        self.0[3].abs()
    }
}

/// One positioned run of text as reported by the engine
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    /// 1-based page number
    pub page: usize,
    /// Text-space to page content-space transform
    pub transform: Matrix,
    pub text: String,
    /// Advance width in unscaled page units; zero when the engine has no width
    pub width: f64,
}

/// Unscaled page dimensions (PDF points)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Dimensions of the current raster of a page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// Box of a rendered page in viewport content coordinates (CSS pixels)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Per-page text and raster information
pub trait PageTextSource {
    fn page_count(&self) -> usize;

    /// Unscaled page size, `None` until the page is loaded
    fn page_size(&self, page: usize) -> Option<PageSize>;

    /// Size of the page's current raster, `None` until it is rasterized
    fn raster_size(&self, page: usize) -> Option<PixelSize>;

    /// Glyph runs in reading order, `None` until text content is available
    fn glyph_runs(&self, page: usize) -> Option<Vec<GlyphRun>>;

    /// Toggle pointer interaction on the engine's built-in text layer
    fn set_native_text_layer_interactive(&mut self, page: usize, interactive: bool);
}

/// Where pages currently sit on screen
pub trait PageLayout {
    fn page_box(&self, page: usize) -> Option<PageBox>;
}

/// Requested scale for the engine's viewer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleValue {
    /// Fit the page to the viewer width
    PageWidth,
    Scale(f64),
}

impl ScaleValue {
    const PAGE_WIDTH: &'static str = "page-width";

    pub fn numeric(&self) -> Option<f64> {
        match self {
            ScaleValue::PageWidth => None,
            ScaleValue::Scale(scale) => Some(*scale),
        }
    }
}

impl Serialize for ScaleValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ScaleValue::PageWidth => serializer.serialize_str(Self::PAGE_WIDTH),
            ScaleValue::Scale(scale) => serializer.serialize_f64(*scale),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleValueSerde {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for ScaleValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ScaleValueSerde::deserialize(deserializer)? {
            ScaleValueSerde::Number(scale) => Ok(ScaleValue::Scale(scale)),
            ScaleValueSerde::Text(text) if text == Self::PAGE_WIDTH => Ok(ScaleValue::PageWidth),
            ScaleValueSerde::Text(text) => text
                .parse::<f64>()
                .map(ScaleValue::Scale)
                .map_err(|_| serde::de::Error::custom(format!("invalid scale value {text:?}"))),
        }
    }
}

/// The engine's scrollable, zoomable viewer
pub trait Viewport {
    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&mut self, offset: f64);
    fn scroll_left(&self) -> f64;
    fn set_scroll_left(&mut self, offset: f64);
    /// Numeric scale currently applied, also when fitting to width
    fn current_scale(&self) -> f64;
    fn set_scale_value(&mut self, value: ScaleValue);
}

/// State changes the engine reacts to with a layout pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayoutTrigger {
    HighlightsChanged,
    InteractionModeChanged,
    ScaleChanged(ScaleValue),
}

/// The engine's own reaction to a layout-relevant change.
///
/// Real engines recompute layout here and commonly reset the scroll offset;
/// callers cannot suppress that, only run around it.
pub trait LayoutReactor {
    fn react(&mut self, trigger: LayoutTrigger, viewport: &mut dyn Viewport);
}
