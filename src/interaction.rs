use egui::{Pos2, Vec2};

use crate::geometry::{RegionRect, ViewTransform};
use crate::history::{EditAction, EditKind};
use crate::region::{RegionId, RegionSet};

/// Half-width of the square hit area around each corner handle, view pixels.
pub const HANDLE_TOLERANCE: f32 = 12.0;
/// Minimum width and height, in image pixels, for a drawn region to count.
pub const MIN_DRAW_SIZE: f32 = 10.0;

// ── Handles ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Handle {
    pub const ALL: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomRight,
        Handle::BottomLeft,
    ];

    pub fn corner_of(&self, r: &RegionRect) -> Pos2 {
        match self {
            Handle::TopLeft => egui::pos2(r.x1, r.y1),
            Handle::TopRight => egui::pos2(r.x2, r.y1),
            Handle::BottomRight => egui::pos2(r.x2, r.y2),
            Handle::BottomLeft => egui::pos2(r.x1, r.y2),
        }
    }

    /// Move only this corner by `delta`; the opposite corner stays fixed.
    /// The result is intentionally not normalized so the caller can reject
    /// corner inversion.
    pub fn displace(&self, r: &RegionRect, delta: Vec2) -> RegionRect {
        let mut out = *r;
        match self {
            Handle::TopLeft => {
                out.x1 += delta.x;
                out.y1 += delta.y;
            }
            Handle::TopRight => {
                out.x2 += delta.x;
                out.y1 += delta.y;
            }
            Handle::BottomRight => {
                out.x2 += delta.x;
                out.y2 += delta.y;
            }
            Handle::BottomLeft => {
                out.x1 += delta.x;
                out.y2 += delta.y;
            }
        }
        out
    }
}

// ── State machine ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditMode {
    Edit,
    Add,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Panning {
        last: Pos2,
    },
    DraggingRegion {
        id: RegionId,
        origin: Pos2,
        original: RegionRect,
    },
    ResizingRegion {
        id: RegionId,
        handle: Handle,
        origin: Pos2,
        original: RegionRect,
    },
    DrawingNewRegion {
        start: Pos2,
        current: Option<RegionRect>,
    },
}

/// Outcomes of one pointer event, applied by the session.
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionEvent {
    SelectionChanged(Option<RegionId>),
    /// Live geometry while a drag or resize is in flight; not yet committed.
    RegionChanged { id: RegionId, rect: RegionRect },
    /// Live preview rectangle while drawing a new region.
    DrawingChanged(RegionRect),
    /// A drag or resize finished and belongs in the history log.
    EditCommitted(EditAction),
    /// A drawn rectangle passed the minimum size; the session materializes it.
    RegionDrawn(RegionRect),
    /// A drawn rectangle was below the minimum size and was thrown away.
    DrawDiscarded,
}

/// Classifies pointer events against handles and region bodies and drives
/// select / move / resize / draw / pan. Pure over (`RegionSet`,
/// `ViewTransform`); the session interprets the emitted events.
pub struct Interaction {
    state: DragState,
    mode: EditMode,
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
            mode: EditMode::Edit,
        }
    }
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    /// Rectangle being drawn right now, if any, for preview painting.
    pub fn preview_rect(&self) -> Option<RegionRect> {
        match &self.state {
            DragState::DrawingNewRegion { current, .. } => *current,
            _ => None,
        }
    }

    /// Switching modes discards any in-progress interaction.
    pub fn set_mode(&mut self, mode: EditMode, regions: &mut RegionSet) {
        self.abort(regions);
        self.mode = mode;
    }

    /// Discard an in-progress interaction: live move/resize geometry reverts
    /// to the rectangle captured at press time, nothing reaches the history.
    pub fn abort(&mut self, regions: &mut RegionSet) {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::DraggingRegion { id, original, .. }
            | DragState::ResizingRegion { id, original, .. } => {
                if let Some(region) = regions.get_mut(id) {
                    region.rect = original;
                }
            }
            _ => {}
        }
    }

    pub fn on_primary_down(
        &mut self,
        pos: Pos2,
        regions: &mut RegionSet,
        view: &ViewTransform,
        out: &mut Vec<InteractionEvent>,
    ) {
        if self.state != DragState::Idle {
            return;
        }
        let image_pos = view.to_image(pos);

        // Handles of the selected region take priority over every body, but
        // only outside add mode.
        if self.mode == EditMode::Edit {
            if let Some(selected) = regions.selected() {
                if let Some(handle) = hit_handle(&selected.rect, pos, view) {
                    self.state = DragState::ResizingRegion {
                        id: selected.id,
                        handle,
                        origin: image_pos,
                        original: selected.rect,
                    };
                    return;
                }
            }
        }

        if let Some(id) = regions.find_at(image_pos) {
            if regions.select(Some(id)) {
                out.push(InteractionEvent::SelectionChanged(Some(id)));
            }
            // In add mode a click only selects for inspection.
            if self.mode == EditMode::Edit {
                if let Some(region) = regions.get(id) {
                    self.state = DragState::DraggingRegion {
                        id,
                        origin: image_pos,
                        original: region.rect,
                    };
                }
            }
            return;
        }

        if self.mode == EditMode::Add {
            // Starting a new draw clears any drawn-but-unsaved region.
            regions.discard_unsaved();
            if regions.select(None) {
                out.push(InteractionEvent::SelectionChanged(None));
            }
            self.state = DragState::DrawingNewRegion {
                start: image_pos,
                current: None,
            };
            return;
        }

        if regions.select(None) {
            out.push(InteractionEvent::SelectionChanged(None));
        }
    }

    pub fn on_secondary_down(&mut self, pos: Pos2) {
        if self.state == DragState::Idle {
            self.state = DragState::Panning { last: pos };
        }
    }

    pub fn on_pointer_move(
        &mut self,
        pos: Pos2,
        regions: &mut RegionSet,
        view: &mut ViewTransform,
        out: &mut Vec<InteractionEvent>,
    ) {
        match &mut self.state {
            DragState::Idle => {}
            DragState::Panning { last } => {
                let delta = pos - *last;
                *last = pos;
                view.pan_by(delta);
            }
            DragState::DrawingNewRegion { start, current } => {
                let rect = RegionRect::from_points(*start, view.to_image(pos));
                *current = Some(rect);
                out.push(InteractionEvent::DrawingChanged(rect));
            }
            DragState::DraggingRegion { id, origin, original } => {
                let delta = view.to_image(pos) - *origin;
                let rect = original.translated(delta);
                let id = *id;
                if let Some(region) = regions.get_mut(id) {
                    region.rect = rect;
                    out.push(InteractionEvent::RegionChanged { id, rect });
                }
            }
            DragState::ResizingRegion {
                id,
                handle,
                origin,
                original,
            } => {
                let delta = view.to_image(pos) - *origin;
                let rect = handle.displace(original, delta);
                // No corner inversion: reject the step, keep the last shape.
                if rect.is_degenerate() {
                    return;
                }
                let id = *id;
                if let Some(region) = regions.get_mut(id) {
                    region.rect = rect;
                    out.push(InteractionEvent::RegionChanged { id, rect });
                }
            }
        }
    }

    pub fn on_primary_up(&mut self, regions: &mut RegionSet, out: &mut Vec<InteractionEvent>) {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::DraggingRegion { id, original, .. } => {
                self.commit(EditKind::Move, id, original, regions, out);
            }
            DragState::ResizingRegion { id, original, .. } => {
                self.commit(EditKind::Resize, id, original, regions, out);
            }
            DragState::DrawingNewRegion { current, .. } => match current {
                Some(rect) if rect.width() > MIN_DRAW_SIZE && rect.height() > MIN_DRAW_SIZE => {
                    out.push(InteractionEvent::RegionDrawn(rect));
                }
                _ => out.push(InteractionEvent::DrawDiscarded),
            },
            other => self.state = other,
        }
    }

    pub fn on_secondary_up(&mut self) {
        if matches!(self.state, DragState::Panning { .. }) {
            self.state = DragState::Idle;
        }
    }

    /// Wheel zoom is independent of the drag state and never changes it.
    pub fn on_scroll(&mut self, cursor: Pos2, zoom_in: bool, view: &mut ViewTransform) {
        view.zoom_at(cursor, zoom_in);
    }

    fn commit(
        &mut self,
        kind: EditKind,
        id: RegionId,
        original: RegionRect,
        regions: &mut RegionSet,
        out: &mut Vec<InteractionEvent>,
    ) {
        let Some(region) = regions.get_mut(id) else {
            return;
        };
        let final_rect = region.rect.normalized();
        region.rect = final_rect;
        if final_rect == original {
            return;
        }
        region.dirty = true;
        out.push(InteractionEvent::EditCommitted(EditAction {
            kind,
            region_id: id,
            old_rect: original,
            new_rect: final_rect,
        }));
    }
}

fn hit_handle(rect: &RegionRect, pointer_view: Pos2, view: &ViewTransform) -> Option<Handle> {
    Handle::ALL.into_iter().find(|h| {
        let corner = view.to_view(h.corner_of(rect));
        (pointer_view.x - corner.x).abs() <= HANDLE_TOLERANCE
            && (pointer_view.y - corner.y).abs() <= HANDLE_TOLERANCE
    })
}
