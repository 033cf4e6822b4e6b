use egui::{pos2, vec2, Pos2, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 5.0;
pub const FIT_MARGIN: f32 = 0.9;
pub const ZOOM_IN_STEP: f32 = 1.1;
pub const ZOOM_OUT_STEP: f32 = 0.9;

// ── Rectangle ───────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in image-pixel coordinates. The four floats are the
/// single source of truth for a region's geometry; egui rects are derived at
/// the drawing boundary and never stored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RegionRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_points(a: Pos2, b: Pos2) -> Self {
        Self::new(a.x, a.y, b.x, b.y).normalized()
    }

    /// Swap endpoints so that x1 < x2 and y1 < y2 holds.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn contains(&self, p: Pos2) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x1: self.x1 + delta.x,
            y1: self.y1 + delta.y,
            x2: self.x2 + delta.x,
            y2: self.y2 + delta.y,
        }
    }

    pub fn min(&self) -> Pos2 {
        pos2(self.x1, self.y1)
    }

    pub fn max(&self) -> Pos2 {
        pos2(self.x2, self.y2)
    }

    /// Integer corners as persisted in the book record.
    pub fn rounded(&self) -> (i32, i32, i32, i32) {
        (
            self.x1.round() as i32,
            self.y1.round() as i32,
            self.x2.round() as i32,
            self.y2.round() as i32,
        )
    }

    pub fn from_ints(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32).normalized()
    }
}

// ── View transform ──────────────────────────────────────────────────────────

/// Maps between image space (fixed pixel grid of the loaded page image) and
/// view space (the canvas, scaled and panned). No rotation, so rectangles map
/// corner-by-corner.
#[derive(Clone, Copy, Debug)]
pub struct ViewTransform {
    pub scale: f32,
    pub pan: Vec2,
    pub viewport: Vec2,
    pub image_size: Vec2,
}

impl ViewTransform {
    pub fn new(image_size: Vec2) -> Self {
        Self {
            scale: 1.0,
            pan: Vec2::ZERO,
            viewport: Vec2::ZERO,
            image_size,
        }
    }

    /// Offset that centers the scaled image in the viewport, floor per axis.
    fn centering_offset(&self) -> Vec2 {
        vec2(
            ((self.viewport.x - self.image_size.x * self.scale) / 2.0).floor(),
            ((self.viewport.y - self.image_size.y * self.scale) / 2.0).floor(),
        )
    }

    pub fn to_view(&self, p: Pos2) -> Pos2 {
        let offset = self.centering_offset() + self.pan;
        pos2(p.x * self.scale + offset.x, p.y * self.scale + offset.y)
    }

    pub fn to_image(&self, p: Pos2) -> Pos2 {
        let offset = self.centering_offset() + self.pan;
        pos2((p.x - offset.x) / self.scale, (p.y - offset.y) / self.scale)
    }

    pub fn rect_to_view(&self, r: &RegionRect) -> egui::Rect {
        egui::Rect::from_min_max(self.to_view(r.min()), self.to_view(r.max()))
    }

    pub fn rect_to_image(&self, r: egui::Rect) -> RegionRect {
        RegionRect::from_points(self.to_image(r.min), self.to_image(r.max))
    }

    pub fn set_viewport(&mut self, size: Vec2) {
        self.viewport = size;
    }

    /// Initial fit: scale the image into the viewport with a margin, clamped
    /// to the zoom range, and reset the pan.
    pub fn fit_to_viewport(&mut self) {
        if self.image_size.x <= 0.0 || self.image_size.y <= 0.0 {
            return;
        }
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return;
        }
        let scale_w = self.viewport.x / self.image_size.x;
        let scale_h = self.viewport.y / self.image_size.y;
        self.scale = (scale_w.min(scale_h) * FIT_MARGIN).clamp(MIN_SCALE, MAX_SCALE);
        self.pan = Vec2::ZERO;
    }

    /// One zoom step (±10%) keeping the image point under `cursor` fixed on
    /// screen. The pan is re-solved from the anchor equation after rescaling,
    /// so `to_view(anchor)` lands back on `cursor`.
    pub fn zoom_at(&mut self, cursor: Pos2, zoom_in: bool) {
        let factor = if zoom_in { ZOOM_IN_STEP } else { ZOOM_OUT_STEP };
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if new_scale == self.scale {
            return;
        }
        let anchor = self.to_image(cursor);
        self.scale = new_scale;
        let centering = self.centering_offset();
        self.pan = cursor.to_vec2() - vec2(anchor.x, anchor.y) * self.scale - centering;
    }

    /// Pan delta is in raw view pixels, independent of the zoom level.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> ViewTransform {
        let mut t = ViewTransform::new(vec2(800.0, 600.0));
        t.set_viewport(vec2(1000.0, 700.0));
        t
    }

    #[test]
    fn round_trip_is_identity() {
        let configs = [
            (1.0, Vec2::ZERO),
            (0.37, vec2(120.0, -45.0)),
            (2.5, vec2(-300.0, 17.5)),
            (0.1, vec2(3.0, 999.0)),
        ];
        for (scale, pan) in configs {
            let mut t = transform();
            t.scale = scale;
            t.pan = pan;
            for p in [pos2(0.0, 0.0), pos2(123.4, 567.8), pos2(800.0, 600.0)] {
                let back = t.to_image(t.to_view(p));
                assert!((back.x - p.x).abs() < 1e-3, "x mismatch at scale {scale}");
                assert!((back.y - p.y).abs() < 1e-3, "y mismatch at scale {scale}");
            }
        }
    }

    #[test]
    fn zoom_keeps_anchor_under_cursor() {
        for zoom_in in [true, false] {
            let mut t = transform();
            t.scale = 1.3;
            t.pan = vec2(40.0, -20.0);
            let cursor = pos2(412.0, 233.0);
            let anchor = t.to_image(cursor);
            t.zoom_at(cursor, zoom_in);
            let after = t.to_view(anchor);
            assert!((after.x - cursor.x).abs() < 1.0);
            assert!((after.y - cursor.y).abs() < 1.0);
        }
    }

    #[test]
    fn zoom_clamps_to_range() {
        let mut t = transform();
        t.scale = MAX_SCALE;
        t.zoom_at(pos2(10.0, 10.0), true);
        assert_eq!(t.scale, MAX_SCALE);
        t.scale = MIN_SCALE;
        t.zoom_at(pos2(10.0, 10.0), false);
        assert_eq!(t.scale, MIN_SCALE);
    }

    #[test]
    fn fit_uses_smaller_axis_with_margin() {
        let mut t = transform();
        t.fit_to_viewport();
        // width ratio 1.25, height ratio ~1.166 -> height wins
        let expected = (700.0f32 / 600.0) * FIT_MARGIN;
        assert!((t.scale - expected).abs() < 1e-5);
        assert_eq!(t.pan, Vec2::ZERO);
    }

    #[test]
    fn normalize_is_idempotent_and_positive() {
        let rects = [
            RegionRect::new(10.0, 20.0, 5.0, 2.0),
            RegionRect::new(-3.0, 7.0, -8.0, 7.5),
            RegionRect::new(0.0, 0.0, 1.0, 1.0),
        ];
        for r in rects {
            let n = r.normalized();
            assert_eq!(n, n.normalized());
            assert!(n.width() >= 0.0 && n.height() >= 0.0);
            assert!(n.x1 <= n.x2 && n.y1 <= n.y2);
        }
    }

    #[test]
    fn rounded_matches_persisted_ints() {
        let r = RegionRect::new(10.4, 20.6, 199.5, 149.2);
        assert_eq!(r.rounded(), (10, 21, 200, 149));
    }
}
