use std::path::PathBuf;

use eframe::egui;
use egui::{pos2, vec2, Color32, Pos2, Rect, Stroke, StrokeKind};

use crate::audio::LogPlayer;
use crate::interaction::{EditMode, Handle, HANDLE_TOLERANCE};
use crate::paths::AssetPaths;
use crate::region::Category;
use crate::session::EditSession;

const UNSELECTED_STROKE: Color32 = Color32::from_rgb(0, 0, 255);
const SELECTED_STROKE: Color32 = Color32::from_rgb(0, 255, 0);
const SELECTED_FILL: Color32 = Color32::from_rgba_premultiplied(255, 255, 0, 50);
const PREVIEW_FILL: Color32 = Color32::from_rgba_premultiplied(0, 255, 0, 50);
const HANDLE_FILL: Color32 = Color32::WHITE;
const HANDLE_STROKE: Color32 = Color32::from_rgb(255, 0, 0);

pub struct EditorApp {
    session: EditSession,
    texture: Option<egui::TextureHandle>,
    texture_path: Option<PathBuf>,
    fit_pending: bool,
}

impl EditorApp {
    pub fn new(asset_root: PathBuf, book_path: Option<PathBuf>) -> Self {
        let mut session = EditSession::new(
            AssetPaths::new(asset_root, "en"),
            Box::new(LogPlayer),
        );
        if let Some(path) = book_path {
            let result = session.load_book(&path);
            session.report(result);
        }
        Self {
            session,
            texture: None,
            texture_path: None,
            fit_pending: true,
        }
    }

    /// Decode and upload the current page image when it changes. Decoding is
    /// an opaque service; failures only clear the canvas.
    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let wanted = self.session.image_path();
        if wanted == self.texture_path {
            return;
        }
        self.texture = None;
        self.texture_path = wanted.clone();
        let Some(path) = wanted else {
            return;
        };
        match image::open(&path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                let pixels = rgba.as_flat_samples();
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                self.texture =
                    Some(ctx.load_texture("page", color_image, egui::TextureOptions::LINEAR));
                self.session.view.image_size = vec2(size[0] as f32, size[1] as f32);
                self.fit_pending = true;
            }
            Err(e) => {
                log::error!("failed to load page image {path:?}: {e}");
                self.session.status = Some(format!("image not found: {}", path.display()));
            }
        }
    }

    fn open_book_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Book record", &["json"])
            .pick_file()
        {
            let result = self.session.load_book(&path);
            self.session.report(result);
            self.fit_pending = true;
        }
    }

    fn pick_audio_file() -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Audio", &["wav", "mp3", "ogg"])
            .pick_file()
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open book…").clicked() {
                self.open_book_dialog();
            }
            ui.separator();

            if ui
                .add_enabled(self.session.has_prev_page(), egui::Button::new("←"))
                .clicked()
            {
                let r = self.session.prev_page();
                self.session.report(r);
            }
            if ui
                .add_enabled(self.session.has_next_page(), egui::Button::new("→"))
                .clicked()
            {
                let r = self.session.next_page();
                self.session.report(r);
            }
            let page_count = self.session.page_count();
            let mut page = self.session.current_page + 1;
            ui.add_enabled(
                page_count > 0,
                egui::DragValue::new(&mut page).range(1..=page_count.max(1)),
            );
            ui.label(format!("/ {}", page_count.max(1)));
            if page_count > 0 && page - 1 != self.session.current_page {
                let r = self.session.load_page(page - 1);
                self.session.report(r);
            }
            ui.separator();

            let mut category = self.session.category;
            egui::ComboBox::from_label("category")
                .selected_text(category.label())
                .show_ui(ui, |ui| {
                    for cat in Category::ALL {
                        ui.selectable_value(&mut category, cat, cat.label());
                    }
                });
            if category != self.session.category {
                let r = self.session.select_category(category);
                self.session.report(r);
            }
            ui.separator();

            let mut mode = self.session.interaction.mode();
            ui.selectable_value(&mut mode, EditMode::Edit, "Edit");
            ui.selectable_value(&mut mode, EditMode::Add, "Add");
            if mode != self.session.interaction.mode() {
                let r = self.session.set_mode(mode);
                self.session.report(r);
            }
            ui.separator();

            if ui
                .add_enabled(self.session.history.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.session.undo();
            }
            if ui
                .add_enabled(self.session.history.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.session.redo();
            }
            if ui.button("Save").clicked() {
                let r = self.session.save_changes();
                self.session.report(r);
            }
            ui.separator();
            ui.label(format!("zoom: {:.0}%", self.session.view.scale * 100.0));
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Region");
        let count = self
            .session
            .regions
            .of_category(self.session.category)
            .count();
        ui.label(format!(
            "{count} {} region(s) on this page",
            self.session.category.label()
        ));
        match self.session.coordinate_readout() {
            Some((x1, y1, x2, y2)) => {
                ui.monospace(format!("X1: {x1}, Y1: {y1}"));
                ui.monospace(format!("X2: {x2}, Y2: {y2}"));
            }
            None => {
                ui.monospace("X1: -, Y1: -");
                ui.monospace("X2: -, Y2: -");
            }
        }
        ui.separator();

        ui.heading("Audio");
        let audio = self
            .session
            .selected_audio_label()
            .filter(|a| !a.is_empty())
            .map(str::to_owned);
        ui.label(audio.clone().unwrap_or_else(|| "no clip".into()));
        let has_selection = self.session.regions.selected_id().is_some();
        if ui
            .add_enabled(audio.is_some(), egui::Button::new("Play"))
            .clicked()
        {
            let r = self.session.play_selected_audio();
            self.session.report(r);
        }
        if ui
            .add_enabled(has_selection, egui::Button::new("Update audio…"))
            .clicked()
        {
            if let Some(source) = Self::pick_audio_file() {
                let r = self.session.update_selected_audio(&source);
                self.session.report(r);
            }
        }
        ui.separator();

        if self.session.interaction.mode() == EditMode::Add {
            ui.heading("New region");
            ui.label("Text:");
            ui.text_edit_singleline(&mut self.session.pending.text);
            ui.label("Audio clip:");
            let chosen = self
                .session
                .pending
                .audio_source
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("none")
                .to_string();
            ui.label(chosen);
            if ui.button("Choose audio…").clicked() {
                self.session.pending.audio_source = Self::pick_audio_file();
            }
            ui.label("Stored name (blank keeps original):");
            ui.text_edit_singleline(&mut self.session.pending.audio_name);
            if ui.button("Add region").clicked() {
                let r = self.session.commit_new_region();
                self.session.report(r);
            }
            ui.separator();
        }

        if ui
            .add_enabled(has_selection, egui::Button::new("Delete region"))
            .clicked()
        {
            let r = self.session.delete_selected();
            self.session.report(r);
        }

        if let Some(status) = &self.session.status {
            ui.separator();
            ui.label(status.clone());
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        let origin = canvas_rect.min.to_vec2();

        painter.rect_filled(canvas_rect, 0.0, Color32::from_gray(40));

        self.session.view.set_viewport(canvas_rect.size());
        if self.fit_pending && self.texture.is_some() {
            self.session.view.fit_to_viewport();
            self.fit_pending = false;
        }

        if let Some(tex) = &self.texture {
            let image_rect = self.session.view.rect_to_view(&crate::geometry::RegionRect::new(
                0.0,
                0.0,
                self.session.view.image_size.x,
                self.session.view.image_size.y,
            ));
            painter.image(
                tex.id(),
                image_rect.translate(origin),
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        self.draw_regions(&painter, origin);

        self.handle_pointer(ui.ctx(), &response, origin);
    }

    fn draw_regions(&self, painter: &egui::Painter, origin: egui::Vec2) {
        let selected_id = self.session.regions.selected_id();
        for region in self.session.regions.iter() {
            let rect = self
                .session
                .view
                .rect_to_view(&region.rect)
                .translate(origin);
            let is_selected = Some(region.id) == selected_id;
            if is_selected {
                painter.rect_filled(rect, 0.0, SELECTED_FILL);
                painter.rect_stroke(
                    rect,
                    0.0,
                    Stroke::new(2.0, SELECTED_STROKE),
                    StrokeKind::Middle,
                );
                if !region.text.is_empty() {
                    painter.text(
                        rect.min - vec2(0.0, 5.0),
                        egui::Align2::LEFT_BOTTOM,
                        &region.text,
                        egui::FontId::proportional(14.0),
                        Color32::BLACK,
                    );
                }
                self.draw_handles(painter, origin, &region.rect);
            } else {
                painter.rect_stroke(
                    rect,
                    0.0,
                    Stroke::new(1.0, UNSELECTED_STROKE),
                    StrokeKind::Middle,
                );
            }
        }

        if let Some(preview) = self.session.interaction.preview_rect() {
            let rect = self.session.view.rect_to_view(&preview).translate(origin);
            painter.rect_filled(rect, 0.0, PREVIEW_FILL);
            painter.rect_stroke(
                rect,
                0.0,
                Stroke::new(2.0, SELECTED_STROKE),
                StrokeKind::Middle,
            );
        }
    }

    fn draw_handles(&self, painter: &egui::Painter, origin: egui::Vec2, rect: &crate::geometry::RegionRect) {
        for handle in Handle::ALL {
            let center = self.session.view.to_view(handle.corner_of(rect)) + origin;
            let half = HANDLE_TOLERANCE / 2.0;
            let square = Rect::from_center_size(center, vec2(half * 2.0, half * 2.0));
            painter.rect_filled(square, 0.0, HANDLE_FILL);
            painter.rect_stroke(
                square,
                0.0,
                Stroke::new(1.0, HANDLE_STROKE),
                StrokeKind::Middle,
            );
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, response: &egui::Response, origin: egui::Vec2) {
        let to_local = |p: Pos2| p - origin;

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.session.pointer_primary_down(to_local(pos));
            }
        }
        if response.drag_started_by(egui::PointerButton::Secondary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.session.pointer_secondary_down(to_local(pos));
            }
        }
        if response.dragged_by(egui::PointerButton::Primary)
            || response.dragged_by(egui::PointerButton::Secondary)
        {
            if let Some(pos) = ctx.input(|i| i.pointer.latest_pos()) {
                self.session.pointer_moved(to_local(pos));
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.session.pointer_primary_up();
        }
        if response.drag_stopped_by(egui::PointerButton::Secondary) {
            self.session.pointer_secondary_up();
        }

        // Wheel zoom, one ±10% step per event, anchored at the cursor.
        let scroll = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 && response.hovered() {
            if let Some(cursor) = response.hover_pos() {
                self.session.scroll(to_local(cursor), scroll > 0.0);
            }
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        ctx.input(|i| {
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Z) {
                if i.modifiers.shift {
                    self.session.redo();
                } else {
                    self.session.undo();
                }
            }
        });
        if ctx.input(|i| i.modifiers.ctrl && i.key_pressed(egui::Key::S)) {
            let r = self.session.save_changes();
            self.session.report(r);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete))
            && self.session.regions.selected_id().is_some()
        {
            let r = self.session.delete_selected();
            self.session.report(r);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::left("inspector")
            .default_width(240.0)
            .show(ctx, |ui| self.side_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));
    }
}
