use egui::Pos2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EditorError, Result};
use crate::geometry::RegionRect;

pub type RegionId = Uuid;

// ── Category ────────────────────────────────────────────────────────────────

/// Annotation category. Exactly one per region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Word,
    Sentence,
    #[serde(rename = "FullText", alias = "Full Text")]
    FullText,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Word, Category::Sentence, Category::FullText];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Word => "Word",
            Category::Sentence => "Sentence",
            Category::FullText => "Full Text",
        }
    }
}

// ── Region ──────────────────────────────────────────────────────────────────

/// One labeled rectangle bound to text and an audio clip. `element_index`
/// points into the backing document's flat element list; `None` until the
/// region has been persisted.
#[derive(Clone, Debug)]
pub struct Region {
    pub id: RegionId,
    pub rect: RegionRect,
    pub text: String,
    pub category: Category,
    pub audio_file: String,
    pub element_index: Option<usize>,
    pub dirty: bool,
    pub newly_created: bool,
}

impl Region {
    pub fn new(rect: RegionRect, text: String, category: Category, audio_file: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            rect,
            text,
            category,
            audio_file,
            element_index: None,
            dirty: false,
            newly_created: false,
        }
    }
}

// ── Region set ──────────────────────────────────────────────────────────────

/// Regions of the page currently open, in draw order (last added is topmost).
#[derive(Default)]
pub struct RegionSet {
    regions: Vec<Region>,
    selected: Option<RegionId>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working set, dropping any selection.
    pub fn replace(&mut self, regions: Vec<Region>) {
        self.regions = regions;
        self.selected = None;
    }

    pub fn add(&mut self, region: Region) -> RegionId {
        let id = region.id;
        self.regions.push(region);
        self.selected = Some(id);
        id
    }

    pub fn remove(&mut self, id: RegionId) -> Option<Region> {
        let pos = self.regions.iter().position(|r| r.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.regions.remove(pos))
    }

    /// Drop regions drawn this session but never committed to the document.
    pub fn discard_unsaved(&mut self) {
        if let Some(sel) = self.selected {
            if self
                .get(sel)
                .is_some_and(|r| r.newly_created && r.element_index.is_none())
            {
                self.selected = None;
            }
        }
        self.regions
            .retain(|r| !(r.newly_created && r.element_index.is_none()));
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.id == id)
    }

    pub fn selected_id(&self) -> Option<RegionId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Region> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn select(&mut self, id: Option<RegionId>) -> bool {
        let changed = self.selected != id;
        self.selected = id;
        changed
    }

    /// Normalize and apply a new rectangle. Degenerate rectangles (zero or
    /// negative extent after normalization) are rejected without mutating.
    pub fn update_rect(&mut self, id: RegionId, rect: RegionRect) -> Result<()> {
        let normalized = rect.normalized();
        if normalized.is_degenerate() {
            return Err(EditorError::validation(format!(
                "degenerate rectangle {:?}",
                normalized.rounded()
            )));
        }
        let region = self
            .get_mut(id)
            .ok_or_else(|| EditorError::not_found(format!("region {id}")))?;
        region.rect = normalized;
        region.dirty = true;
        Ok(())
    }

    /// Topmost region containing the image-space point; ties go to the most
    /// recently added.
    pub fn find_at(&self, p: Pos2) -> Option<RegionId> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.rect.contains(p))
            .map(|r| r.id)
    }

    pub fn of_category(&self, category: Category) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.category == category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.regions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
