//! Correction of distorted highlight geometry
//!
//! Engines often report a line of a two-column page as one full-width text
//! item, so a selection of a few words comes back as a rect spanning both
//! columns. Others merge several selected lines into one tall rect. Both are
//! fixed here from the selected text alone: we estimate how wide that text can
//! plausibly be and cut rects that are far wider at the column boundary, then
//! split a lone rect that is clearly several lines tall.
//!
//! Always normalize the raw captured geometry. The result is a fixed point:
//! normalizing it again with the same text changes nothing.

use serde::{Deserialize, Serialize};

use crate::geometry::{GEOMETRY_EPSILON, Rect, ScaledPosition};

/// Tuned constants for the width and line-height estimates.
///
/// These are empirical, not derived from font metrics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// Expected advance of a CJK char, in line heights
    pub cjk_advance: f64,
    /// Expected advance of any other char, in line heights
    pub other_advance: f64,
    /// Padding added to the char count, in chars
    pub slack_chars: f64,
    /// A rect wider than this multiple of the expected width is suspicious
    pub bleed_factor: f64,
    /// ...and it must also be wider than this fraction of the page
    pub min_bleed_page_fraction: f64,
    pub left_column_start: f64,
    pub left_column_bleed: f64,
    pub left_column_clamp: f64,
    pub right_column_start: f64,
    pub right_column_bleed: f64,
    pub right_column_clamp: f64,
    /// A clamped rect keeps at least this multiple of the expected width
    pub clamp_floor_factor: f64,
    /// A lone rect taller than this many estimated lines gets split
    pub split_line_threshold: f64,
    /// Width-to-height ratio of a CJK glyph
    pub cjk_aspect: f64,
    /// Width-to-height ratio of any other glyph
    pub other_aspect: f64,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            cjk_advance: 1.4,
            other_advance: 0.85,
            slack_chars: 6.0,
            bleed_factor: 1.25,
            min_bleed_page_fraction: 0.30,
            left_column_start: 0.48,
            left_column_bleed: 0.52,
            left_column_clamp: 0.49,
            right_column_start: 0.50,
            right_column_bleed: 0.95,
            right_column_clamp: 0.96,
            clamp_floor_factor: 1.5,
            split_line_threshold: 1.6,
            cjk_aspect: 1.0,
            other_aspect: 0.55,
        }
    }
}

/// Code points counted as wide (CJK / Hangul) for width estimation
pub fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3000}'..='\u{9FFF}' | '\u{AC00}'..='\u{D7A3}' | '\u{0800}'..='\u{4E00}'
    )
}

/// Char counts of the selected text
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextProfile {
    pub cjk: f64,
    pub other: f64,
}

impl TextProfile {
    pub fn of(text: &str) -> Self {
        let (cjk, total) = text
            .chars()
            .fold((0usize, 0usize), |(cjk, total), c| {
                (cjk + usize::from(is_cjk(c)), total + 1)
            });
        Self {
            cjk: cjk as f64,
            other: (total - cjk) as f64,
        }
    }

    pub fn total(&self) -> f64 {
        self.cjk + self.other
    }

    fn share(&self, fraction: f64) -> Self {
        Self {
            cjk: self.cjk * fraction,
            other: self.other * fraction,
        }
    }

    /// Widest plausible run of this text at `line_height`
    pub fn expected_width(&self, line_height: f64, h: &Heuristics) -> f64 {
        (self.cjk * h.cjk_advance + self.other * h.other_advance + h.slack_chars) * line_height
    }

    /// Count-weighted glyph aspect ratio
    pub fn average_aspect(&self, h: &Heuristics) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return h.other_aspect;
        }
        (self.cjk * h.cjk_aspect + self.other * h.other_aspect) / total
    }
}

/// Normalize with the default heuristics
pub fn normalize(position: &ScaledPosition, text: &str) -> ScaledPosition {
    normalize_with(position, text, &Heuristics::default())
}

pub fn normalize_with(position: &ScaledPosition, text: &str, h: &Heuristics) -> ScaledPosition {
    let text = text.trim();
    let page_width = position.page_width();
    if text.is_empty() || position.rects.is_empty() || !(page_width > 0.0) {
        return position.clone();
    }

    let profile = TextProfile::of(text);
    let rects: Vec<Rect> = position.rects.iter().map(Rect::clipped_to_page).collect();
    let mut rects = clamp_column_bleed(&rects, &profile, page_width, h);

    if let [single] = rects.as_slice() {
        if let Some(lines) = split_merged_lines(single, &profile, h) {
            rects = lines;
        }
    }

    let mut normalized = position.clone();
    normalized.set_rects(rects);
    normalized
}

/// Cut rects that spill over the column boundary.
///
/// Each rect is judged against its share of the text. The one exception is
/// a flush stack that is exactly what splitting its union would produce: that
/// is judged as the union, so split output clamps the same as its source.
fn clamp_column_bleed(
    rects: &[Rect],
    profile: &TextProfile,
    page_width: f64,
    h: &Heuristics,
) -> Vec<Rect> {
    if let Some(union) = split_stack_union(rects, profile, h) {
        let expected = profile.expected_width(union.height, h);
        return rects
            .iter()
            .map(|r| clamp_rect(r, expected, page_width, h))
            .collect();
    }

    let share = profile.share(1.0 / rects.len() as f64);
    rects
        .iter()
        .map(|r| clamp_rect(r, share.expected_width(r.height, h), page_width, h))
        .collect()
}

fn clamp_rect(rect: &Rect, expected: f64, page_width: f64, h: &Heuristics) -> Rect {
    let bleeding =
        rect.width > expected * h.bleed_factor && rect.width > page_width * h.min_bleed_page_fraction;
    if !bleeding {
        return *rect;
    }

    let floor = rect.left + expected * h.clamp_floor_factor;
    let limit = if rect.left < page_width * h.left_column_start
        && rect.right() > page_width * h.left_column_bleed
    {
        (page_width * h.left_column_clamp).max(floor)
    } else if rect.left > page_width * h.right_column_start
        && rect.right() > page_width * h.right_column_bleed
    {
        (page_width * h.right_column_clamp).max(floor)
    } else {
        return *rect;
    };

    if limit < rect.right() - GEOMETRY_EPSILON {
        rect.with_right(limit)
    } else {
        *rect
    }
}

/// The rect `rects` were split from, if they look like splitter output
fn split_stack_union(rects: &[Rect], profile: &TextProfile, h: &Heuristics) -> Option<Rect> {
    let (first, last) = (rects.first()?, rects.last()?);
    if rects.len() < 2 || !rects.windows(2).all(|pair| stacks_on(&pair[0], &pair[1])) {
        return None;
    }

    let union = Rect::from_edges(first.left, first.top, first.right(), last.bottom(), first);
    let lines = split_count(&union, profile, h)?;
    (lines == rects.len()).then_some(union)
}

fn stacks_on(upper: &Rect, lower: &Rect) -> bool {
    upper.page_number == lower.page_number
        && (upper.left - lower.left).abs() <= GEOMETRY_EPSILON
        && (upper.right() - lower.right()).abs() <= GEOMETRY_EPSILON
        && (upper.height - lower.height).abs() <= GEOMETRY_EPSILON
        && (upper.bottom() - lower.top).abs() <= GEOMETRY_EPSILON
}

/// Estimated height of one rendered line inside `rect`
pub fn estimate_line_height(rect: &Rect, profile: &TextProfile, h: &Heuristics) -> Option<f64> {
    let chars = profile.total();
    if chars <= 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    Some((rect.height * rect.width / (chars * profile.average_aspect(h))).sqrt())
}

/// Number of lines a merged rect holds, `None` when it reads as one line
fn split_count(rect: &Rect, profile: &TextProfile, h: &Heuristics) -> Option<usize> {
    let line_height = estimate_line_height(rect, profile, h)?;
    let lines = rect.height / line_height;
    if lines <= h.split_line_threshold {
        return None;
    }
    Some((lines - GEOMETRY_EPSILON).ceil() as usize)
}

fn split_merged_lines(rect: &Rect, profile: &TextProfile, h: &Heuristics) -> Option<Vec<Rect>> {
    let count = split_count(rect, profile, h)?;
    let rects = (0..count)
        .map(|i| {
            let top = rect.top + rect.height * i as f64 / count as f64;
            let bottom = rect.top + rect.height * (i + 1) as f64 / count as f64;
            Rect::from_edges(rect.left, top, rect.right(), bottom, rect)
        })
        .collect();
    Some(rects)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_W: f64 = 600.0;
    const PAGE_H: f64 = 800.0;

    fn rect(left: f64, top: f64, width: f64, height: f64) -> Rect {
        Rect::new(left, top, width, height, PAGE_W, PAGE_H, 1)
    }

    fn position(rects: Vec<Rect>) -> ScaledPosition {
        ScaledPosition::from_rects(rects).unwrap()
    }

    fn assert_fixed_point(input: &ScaledPosition, text: &str) {
        let once = normalize(input, text);
        let twice = normalize(&once, text);
        assert!(
            once.approx_eq(&twice, 1e-9),
            "not idempotent for {text:?}:\n{once:?}\n{twice:?}"
        );
    }

    #[test]
    fn short_text_spanning_both_columns_is_clamped() {
        let input = position(vec![rect(60.0, 100.0, 480.0, 12.0)]);
        let out = normalize(&input, "short");

        assert_eq!(out.rects.len(), 1);
        let right = out.rects[0].right();
        assert!(right < PAGE_W * 0.55, "right edge {right}");
        assert!((right - PAGE_W * 0.49).abs() < 1e-9);
        assert_eq!(out.bounding_rect.right(), right);
        assert_fixed_point(&input, "short");
    }

    #[test]
    fn clamp_never_cuts_below_text_estimate() {
        // 30 chars at height 12 expect ~378px; floor is left + 1.5x that
        let text = "a".repeat(30);
        let input = position(vec![rect(20.0, 100.0, 580.0, 12.0)]);
        let out = normalize(&input, &text);
        let expected = (30.0 * 0.85 + 6.0) * 12.0;
        assert!(out.rects[0].right() <= 580.0 + 20.0);
        assert!((out.rects[0].right() - (20.0_f64 + expected * 1.5).min(600.0)).abs() < 1e-9);
    }

    #[test]
    fn flush_lines_of_short_text_are_clamped() {
        let text = "two short lines";
        let flush = position(vec![rect(40.0, 100.0, 520.0, 12.0), rect(40.0, 112.0, 520.0, 12.0)]);
        let gapped = position(vec![rect(40.0, 100.0, 520.0, 12.0), rect(40.0, 114.0, 520.0, 12.0)]);

        for input in [&flush, &gapped] {
            let out = normalize(input, text);
            for r in &out.rects {
                assert!((r.right() - PAGE_W * 0.49).abs() < 1e-9, "{r:?}");
            }
            assert_fixed_point(input, text);
        }
    }

    #[test]
    fn right_column_rect_bleeding_off_margin_is_clamped() {
        let input = position(vec![rect(320.0, 100.0, 280.0, 8.0)]);
        let out = normalize(&input, "ok");
        assert!((out.rects[0].right() - PAGE_W * 0.96).abs() < 1e-9);
        assert_fixed_point(&input, "ok");
    }

    #[test]
    fn plausible_rects_pass_through() {
        let input = position(vec![rect(40.0, 100.0, 240.0, 12.0)]);
        let text = "A perfectly ordinary line of left column text";
        assert_eq!(normalize(&input, text), input);
    }

    #[test]
    fn cjk_text_expects_wider_glyphs() {
        let latin = TextProfile::of("abcd");
        let cjk = TextProfile::of("注意力機");
        let h = Heuristics::default();
        assert_eq!(cjk.cjk, 4.0);
        assert!(cjk.expected_width(10.0, &h) > latin.expected_width(10.0, &h));
        assert!(is_cjk('한'));
        assert!(!is_cjk('a'));
    }

    #[test]
    fn merged_lines_are_split_evenly() {
        let text = "abcdefghij".repeat(36);
        let input = position(vec![rect(50.0, 100.0, 330.0, 60.0)]);
        let out = normalize(&input, &text);

        assert_eq!(out.rects.len(), 6);
        let total: f64 = out.rects.iter().map(|r| r.height).sum();
        assert!((total - 60.0).abs() < 1e-9);
        for (i, r) in out.rects.iter().enumerate() {
            assert!((r.height - 10.0).abs() < 1e-9);
            assert!((r.top - (100.0 + 10.0 * i as f64)).abs() < 1e-9);
            assert_eq!(r.width, 330.0);
        }
        assert!(out.bounds_consistent(1e-9));
        assert_fixed_point(&input, &text);
    }

    #[test]
    fn single_line_is_not_split() {
        let text = "abcdefghij".repeat(6);
        let input = position(vec![rect(50.0, 100.0, 330.0, 10.0)]);
        assert_eq!(normalize(&input, &text).rects.len(), 1);
    }

    #[test]
    fn degenerate_input_is_returned_unchanged() {
        let input = position(vec![rect(-20.0, 100.0, 700.0, 12.0)]);
        assert_eq!(normalize(&input, "   "), input);
        assert_eq!(normalize(&input, ""), input);

        let mut no_rects = input.clone();
        no_rects.rects.clear();
        assert_eq!(normalize(&no_rects, "text"), no_rects);

        let zero_width = position(vec![Rect::new(0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 1)]);
        assert_eq!(normalize(&zero_width, "text"), zero_width);
    }

    #[test]
    fn rects_stay_on_page_and_bounds_match_union() {
        let cases = [
            (vec![rect(-20.0, 100.0, 700.0, 12.0)], "spill"),
            (
                vec![rect(40.0, 100.0, 520.0, 12.0), rect(40.0, 114.0, 520.0, 12.0)],
                "two short lines",
            ),
            (vec![rect(310.0, 40.0, 400.0, 90.0)], "右栏的一段很长的中文文本需要被正确拆分成多行"),
            (vec![rect(0.0, 0.0, 600.0, 800.0)], "x"),
        ];
        for (rects, text) in cases {
            let out = normalize(&position(rects), text);
            for r in &out.rects {
                assert!(r.right() <= PAGE_W + GEOMETRY_EPSILON, "{r:?}");
                assert!(r.left >= 0.0);
            }
            assert!(out.bounds_consistent(1e-9));
        }
    }

    #[test]
    fn normalization_is_a_fixed_point() {
        let cases: Vec<(Vec<Rect>, String)> = vec![
            (vec![rect(60.0, 100.0, 480.0, 12.0)], "short".into()),
            (vec![rect(30.0, 100.0, 540.0, 48.0)], "a short but tall box".into()),
            (vec![rect(30.0, 100.0, 270.0, 17.0)], "abcdefghij".repeat(12)),
            (
                vec![rect(40.0, 100.0, 520.0, 12.0), rect(40.0, 112.0, 520.0, 12.0)],
                "stacked".into(),
            ),
            (
                vec![rect(40.0, 100.0, 520.0, 12.0), rect(40.0, 112.0, 500.0, 12.0)],
                "nearly stacked lines".into(),
            ),
            (vec![rect(310.0, 40.0, 290.0, 90.0)], "右栏的一段中文".into()),
            (vec![rect(0.0, 0.0, 600.0, 800.0)], "x".into()),
        ];
        for (rects, text) in cases {
            assert_fixed_point(&position(rects), &text);
        }
    }

    #[test]
    fn custom_heuristics_are_honoured() {
        let h = Heuristics {
            bleed_factor: 100.0,
            ..Heuristics::default()
        };
        let input = position(vec![rect(60.0, 100.0, 480.0, 12.0)]);
        assert_eq!(normalize_with(&input, "short", &h), input);
    }
}
