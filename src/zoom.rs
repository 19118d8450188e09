//! Zoom steps, pinch zoom and the remembered per-document scale

use log::warn;

use crate::engine::ScaleValue;

/// How a wheel event reports its delta
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaMode {
    Pixel,
    Line,
}

/// Requested scale of the viewer, independent of how it is applied
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomController {
    value: ScaleValue,
}

impl Default for ZoomController {
    fn default() -> Self {
        Self {
            value: ScaleValue::PageWidth,
        }
    }
}

impl ZoomController {
    /// Discrete zoom levels, ascending
    pub const SCALE_STEPS: [f64; 13] = [
        0.5, 0.67, 0.75, 0.8, 0.9, 1.0, 1.1, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0,
    ];
    pub const MIN_SCALE: f64 = 0.5;
    pub const MAX_SCALE: f64 = 3.0;
    /// Scales this close to a step count as that step
    pub const STEP_EPSILON: f64 = 0.001;
    /// Wheel lines are converted to this many pixels
    pub const LINE_HEIGHT_PX: f64 = 16.0;
    /// Scale factor per pixel of pinch delta
    pub const PINCH_BASE: f64 = 0.999;

    /// Start from a saved value, ignoring one outside the allowed range
    pub fn restore(saved: Option<ScaleValue>) -> Self {
        match saved {
            Some(ScaleValue::Scale(scale)) if Self::in_range(scale) => Self {
                value: ScaleValue::Scale(scale),
            },
            Some(ScaleValue::Scale(scale)) => {
                warn!("Ignoring saved zoom {scale} outside allowed range");
                Self::default()
            }
            _ => Self::default(),
        }
    }

    pub fn value(&self) -> ScaleValue {
        self.value
    }

    /// Next step strictly above `current`, or the maximum
    pub fn zoom_in(&mut self, current: f64) -> Option<ScaleValue> {
        let next = Self::SCALE_STEPS
            .iter()
            .copied()
            .find(|&step| step > current + Self::STEP_EPSILON)
            .unwrap_or(Self::MAX_SCALE);
        self.set(ScaleValue::Scale(next))
    }

    /// Previous step strictly below `current`, or the minimum
    pub fn zoom_out(&mut self, current: f64) -> Option<ScaleValue> {
        let previous = Self::SCALE_STEPS
            .iter()
            .rev()
            .copied()
            .find(|&step| step < current - Self::STEP_EPSILON)
            .unwrap_or(Self::MIN_SCALE);
        self.set(ScaleValue::Scale(previous))
    }

    /// Continuous zoom; a negative delta zooms in
    pub fn pinch(&mut self, current: f64, delta: f64, mode: DeltaMode) -> Option<ScaleValue> {
        let delta = match mode {
            DeltaMode::Pixel => delta,
            DeltaMode::Line => delta * Self::LINE_HEIGHT_PX,
        };
        let scale = Self::clamp(current * Self::PINCH_BASE.powf(delta));
        self.set(ScaleValue::Scale(scale))
    }

    /// Go back to fitting the page width
    pub fn reset(&mut self) -> Option<ScaleValue> {
        self.set(ScaleValue::PageWidth)
    }

    pub fn clamp(scale: f64) -> f64 {
        if !scale.is_finite() {
            return 1.0;
        }
        scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
    }

    pub fn in_range(scale: f64) -> bool {
        (Self::MIN_SCALE..=Self::MAX_SCALE).contains(&scale)
    }

    /// Percentage label for the applied scale, a dash while it is unknown
    pub fn label(current: Option<f64>) -> String {
        match current {
            Some(scale) => format!("{}%", (scale * 100.0).round()),
            None => "\u{2014}".to_string(),
        }
    }

    pub fn at_min(current: Option<f64>) -> bool {
        current.is_some_and(|scale| scale <= Self::MIN_SCALE)
    }

    pub fn at_max(current: Option<f64>) -> bool {
        current.is_some_and(|scale| scale >= Self::MAX_SCALE)
    }

    fn set(&mut self, value: ScaleValue) -> Option<ScaleValue> {
        if value == self.value {
            return None;
        }
        self.value = value;
        Some(value)
    }
}
