use std::path::{Path, PathBuf};

use egui::Pos2;
use serde_json::{Map, Value};

use crate::audio::{self, AudioPlayer};
use crate::document::{BookDocument, BookElement};
use crate::error::{EditorError, Result};
use crate::geometry::{RegionRect, ViewTransform};
use crate::history::HistoryLog;
use crate::interaction::{EditMode, Interaction, InteractionEvent};
use crate::paths::AssetPaths;
use crate::region::{Category, Region, RegionSet};

/// Inputs gathered in add mode before a drawn region can be committed.
#[derive(Default)]
pub struct PendingRegion {
    pub text: String,
    pub audio_source: Option<PathBuf>,
    pub audio_name: String,
}

impl PendingRegion {
    fn clear(&mut self) {
        self.text.clear();
        self.audio_source = None;
        self.audio_name.clear();
    }
}

/// Orchestrates one open book: loads pages into the region set, routes
/// pointer events through the interaction machine, applies their outcomes,
/// and flushes edits back to the document. All errors are recovered here;
/// the UI layer only displays them.
pub struct EditSession {
    pub document: Option<BookDocument>,
    pub regions: RegionSet,
    pub history: HistoryLog,
    pub interaction: Interaction,
    pub view: ViewTransform,
    pub paths: AssetPaths,
    pub pending: PendingRegion,
    pub category: Category,
    pub current_page: usize,
    /// Last operator-facing message (errors and confirmations).
    pub status: Option<String>,
    player: Box<dyn AudioPlayer>,
    /// Language tag for the translated-text mirror fields on new elements.
    translation_lang: String,
    live_rect: Option<RegionRect>,
}

impl EditSession {
    pub fn new(paths: AssetPaths, player: Box<dyn AudioPlayer>) -> Self {
        Self {
            document: None,
            regions: RegionSet::new(),
            history: HistoryLog::default(),
            interaction: Interaction::new(),
            view: ViewTransform::new(egui::vec2(0.0, 0.0)),
            paths,
            pending: PendingRegion::default(),
            category: Category::Word,
            current_page: 0,
            status: None,
            player,
            translation_lang: "zh".to_string(),
            live_rect: None,
        }
    }

    // ── Book / page lifecycle ───────────────────────────────────────────────

    /// Load a book record. On a format error the previously loaded document
    /// (if any) stays active.
    pub fn load_book(&mut self, path: &Path) -> Result<()> {
        let doc = BookDocument::load(path)?;
        self.document = Some(doc);
        self.current_page = 0;
        self.load_page(0)
    }

    /// Load a page: abort any in-flight interaction, clear the page-scoped
    /// history, drop unsaved regions from the previous page, and rebuild the
    /// working set filtered to the active category.
    pub fn load_page(&mut self, index: usize) -> Result<()> {
        self.interaction.abort(&mut self.regions);
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| EditorError::not_found("loaded book"))?;
        let built: Vec<Region> = doc
            .page_elements(index)?
            .into_iter()
            .filter(|(_, e)| e.category == self.category)
            .map(|(i, e)| {
                let mut region = Region::new(
                    e.rect(),
                    e.text.clone(),
                    e.category,
                    e.audio_file.clone(),
                );
                region.element_index = Some(i);
                region
            })
            .collect();
        log::info!(
            "page {index}: {} {} regions",
            built.len(),
            self.category.label()
        );
        self.regions.replace(built);
        self.history.clear();
        self.current_page = index;
        self.live_rect = None;
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.page_count())
    }

    pub fn has_prev_page(&self) -> bool {
        self.document.is_some() && self.current_page > 0
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page + 1 < self.page_count()
    }

    pub fn prev_page(&mut self) -> Result<()> {
        if self.has_prev_page() {
            self.load_page(self.current_page - 1)
        } else {
            Ok(())
        }
    }

    pub fn next_page(&mut self) -> Result<()> {
        if self.has_next_page() {
            self.load_page(self.current_page + 1)
        } else {
            Ok(())
        }
    }

    /// Re-filter the current page without touching the stored document.
    pub fn select_category(&mut self, category: Category) -> Result<()> {
        if self.category == category {
            return Ok(());
        }
        self.category = category;
        if self.document.is_some() {
            self.load_page(self.current_page)
        } else {
            Ok(())
        }
    }

    pub fn set_mode(&mut self, mode: EditMode) -> Result<()> {
        if self.interaction.mode() == mode {
            return Ok(());
        }
        self.interaction.set_mode(mode, &mut self.regions);
        self.regions.discard_unsaved();
        if self.document.is_some() {
            self.load_page(self.current_page)
        } else {
            Ok(())
        }
    }

    pub fn image_path(&self) -> Option<PathBuf> {
        let doc = self.document.as_ref()?;
        let image = doc.page_image(self.current_page).ok()?;
        Some(self.paths.image_path(doc.book_id(), image))
    }

    // ── Pointer events ──────────────────────────────────────────────────────

    pub fn pointer_primary_down(&mut self, pos: Pos2) {
        let mut out = Vec::new();
        self.interaction
            .on_primary_down(pos, &mut self.regions, &self.view, &mut out);
        self.apply_events(out);
    }

    pub fn pointer_secondary_down(&mut self, pos: Pos2) {
        self.interaction.on_secondary_down(pos);
    }

    pub fn pointer_moved(&mut self, pos: Pos2) {
        let mut out = Vec::new();
        self.interaction
            .on_pointer_move(pos, &mut self.regions, &mut self.view, &mut out);
        self.apply_events(out);
    }

    pub fn pointer_primary_up(&mut self) {
        let mut out = Vec::new();
        self.interaction.on_primary_up(&mut self.regions, &mut out);
        self.apply_events(out);
    }

    pub fn pointer_secondary_up(&mut self) {
        self.interaction.on_secondary_up();
    }

    pub fn scroll(&mut self, cursor: Pos2, zoom_in: bool) {
        self.interaction.on_scroll(cursor, zoom_in, &mut self.view);
    }

    fn apply_events(&mut self, events: Vec<InteractionEvent>) {
        for event in events {
            match event {
                InteractionEvent::SelectionChanged(id) => {
                    self.live_rect = id.and_then(|id| self.regions.get(id)).map(|r| r.rect);
                }
                InteractionEvent::RegionChanged { rect, .. } => {
                    self.live_rect = Some(rect);
                }
                InteractionEvent::DrawingChanged(rect) => {
                    self.live_rect = Some(rect);
                }
                InteractionEvent::EditCommitted(action) => {
                    self.history.push(action);
                }
                InteractionEvent::RegionDrawn(rect) => {
                    let mut region = Region::new(
                        rect,
                        self.pending.text.clone(),
                        self.category,
                        String::new(),
                    );
                    region.newly_created = true;
                    self.regions.add(region);
                    self.live_rect = Some(rect);
                }
                InteractionEvent::DrawDiscarded => {
                    self.live_rect = self.regions.selected().map(|r| r.rect);
                }
            }
        }
    }

    // ── History ─────────────────────────────────────────────────────────────

    pub fn undo(&mut self) {
        match self.history.undo() {
            Some(action) => {
                if self
                    .regions
                    .update_rect(action.region_id, action.old_rect)
                    .is_ok()
                {
                    self.live_rect = Some(action.old_rect);
                }
            }
            None => self.status = Some("nothing to undo".into()),
        }
    }

    pub fn redo(&mut self) {
        match self.history.redo() {
            Some(action) => {
                if self
                    .regions
                    .update_rect(action.region_id, action.new_rect)
                    .is_ok()
                {
                    self.live_rect = Some(action.new_rect);
                }
            }
            None => self.status = Some("nothing to redo".into()),
        }
    }

    // ── Persistence operations ──────────────────────────────────────────────

    /// Flush dirty regions back into the document and rewrite the record.
    /// Returns `Ok(false)` when there is nothing to save (the file is left
    /// untouched). On a write failure the in-memory document keeps the
    /// attempted edit; the operator retries.
    pub fn save_changes(&mut self) -> Result<bool> {
        let doc = self
            .document
            .as_mut()
            .ok_or_else(|| EditorError::not_found("loaded book"))?;
        let updates: Vec<(usize, RegionRect, String)> = self
            .regions
            .iter()
            .filter(|r| r.dirty)
            .filter_map(|r| r.element_index.map(|i| (i, r.rect, r.audio_file.clone())))
            .collect();
        if updates.is_empty() {
            self.status = Some("no changes to save".into());
            return Ok(false);
        }
        for (index, rect, audio_file) in &updates {
            doc.update_element_rect(*index, rect)?;
            doc.set_element_audio(*index, audio_file)?;
        }
        doc.save_with_backup()?;
        for region in self.regions.iter_mut() {
            region.dirty = false;
        }
        self.status = Some(format!("saved {} region(s)", updates.len()));
        Ok(true)
    }

    /// Commit the drawn-but-unsaved region using the pending inputs: install
    /// the chosen audio clip, append a canonical element, persist, reload.
    pub fn commit_new_region(&mut self) -> Result<()> {
        if self.pending.text.trim().is_empty() {
            return Err(EditorError::validation("enter the region text first"));
        }
        let source = self
            .pending
            .audio_source
            .clone()
            .ok_or_else(|| EditorError::validation("choose an audio file first"))?;
        let rect = self
            .regions
            .selected()
            .filter(|r| r.newly_created && r.element_index.is_none())
            .map(|r| r.rect)
            .ok_or_else(|| EditorError::validation("draw a region first"))?;
        let doc = self
            .document
            .as_mut()
            .ok_or_else(|| EditorError::not_found("loaded book"))?;

        let audio_name = if self.pending.audio_name.trim().is_empty() {
            source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string()
        } else {
            self.pending.audio_name.trim().to_string()
        };
        let target_dir = self.paths.audio_target_dir(doc.book_id());
        audio::install_audio_file(&source, &target_dir, &audio_name)?;

        let image = doc.page_image(self.current_page)?.to_string();
        let (x1, y1, x2, y2) = rect.normalized().rounded();
        let mut extra = Map::new();
        extra.insert(
            format!("{}_translation", self.translation_lang),
            Value::String(self.pending.text.clone()),
        );
        extra.insert(
            format!("{}_Audio_File", self.translation_lang),
            Value::String(audio_name.clone()),
        );
        let index = doc.add_element(BookElement {
            text: self.pending.text.trim().to_string(),
            category: self.category,
            image,
            x1,
            y1,
            x2,
            y2,
            audio_file: audio_name,
            id: None,
            extra,
        });
        doc.save()?;
        self.pending.clear();
        self.load_page(self.current_page)?;
        // reselect what was just added
        let id = self
            .regions
            .iter()
            .find(|r| r.element_index == Some(index))
            .map(|r| r.id);
        self.regions.select(id);
        self.status = Some("region added".into());
        Ok(())
    }

    /// Delete the selected region from both the flat list and the page
    /// grouping, persisting immediately. Fails with ResourceNotFound when the
    /// backing document no longer holds the element.
    pub fn delete_selected(&mut self) -> Result<()> {
        let id = self
            .regions
            .selected_id()
            .ok_or_else(|| EditorError::not_found("selected region"))?;
        let element_index = self
            .regions
            .get(id)
            .and_then(|r| r.element_index);
        match element_index {
            Some(index) => {
                let doc = self
                    .document
                    .as_mut()
                    .ok_or_else(|| EditorError::not_found("loaded book"))?;
                let removed = doc.remove_element(index)?;
                doc.save()?;
                log::info!("deleted region '{}'", removed.text);
                self.load_page(self.current_page)?;
            }
            None => {
                // never persisted; dropping it from the working set is enough
                self.regions.remove(id);
            }
        }
        self.status = Some("region deleted".into());
        Ok(())
    }

    // ── Audio ───────────────────────────────────────────────────────────────

    /// Resolve the selected region's clip and hand it to the player. A clip
    /// missing from every search location is reported, not fatal.
    pub fn play_selected_audio(&mut self) -> Result<()> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| EditorError::not_found("loaded book"))?;
        let region = self
            .regions
            .selected()
            .ok_or_else(|| EditorError::not_found("selected region"))?;
        if region.audio_file.is_empty() {
            return Err(EditorError::not_found("audio reference for this region"));
        }
        let path = self
            .paths
            .resolve_audio(doc.book_id(), &region.audio_file)
            .ok_or_else(|| {
                EditorError::not_found(format!("audio clip {}", region.audio_file))
            })?;
        self.player.stop();
        self.player.play(&path);
        Ok(())
    }

    /// Swap the selected region's audio clip: install the new file (with
    /// retry), rewrite the single audio reference with a `.bak` safety copy.
    pub fn update_selected_audio(&mut self, source: &Path) -> Result<()> {
        audio::validate_audio_source(source)?;
        let (id, index) = {
            let region = self
                .regions
                .selected()
                .ok_or_else(|| EditorError::not_found("selected region"))?;
            let index = region.element_index.ok_or_else(|| {
                EditorError::validation("region is not saved yet, add it first")
            })?;
            (region.id, index)
        };
        let doc = self
            .document
            .as_mut()
            .ok_or_else(|| EditorError::not_found("loaded book"))?;
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let target_dir = self.paths.audio_target_dir(doc.book_id());
        audio::install_audio_file(source, &target_dir, &filename)?;
        doc.set_element_audio(index, &filename)?;
        doc.save_with_backup()?;
        if let Some(region) = self.regions.get_mut(id) {
            region.audio_file = filename.clone();
        }
        self.status = Some(format!("audio updated to {filename}"));
        Ok(())
    }

    // ── Readouts ────────────────────────────────────────────────────────────

    /// Integer corner readout of the rectangle being edited (live) or the
    /// selection, for the toolbar coordinate display.
    pub fn coordinate_readout(&self) -> Option<(i32, i32, i32, i32)> {
        self.live_rect
            .or_else(|| self.regions.selected().map(|r| r.rect))
            .map(|r| r.normalized().rounded())
    }

    pub fn selected_audio_label(&self) -> Option<&str> {
        self.regions.selected().map(|r| r.audio_file.as_str())
    }

    /// Record an operation result in the status line; errors are logged.
    pub fn report<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("{err}");
                self.status = Some(err.to_string());
                None
            }
        }
    }
}
