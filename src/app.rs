// ============================================================================
// APP SHELL — StickerFE editor window and sticker host controller
// ============================================================================

use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Pos2, Rect};
use uuid::Uuid;

use crate::assets::Assets;
use crate::canvas::{Canvas, CanvasState};
use crate::io::{self, ExportFormat};
use crate::ops::sticker::{GesturePhase, StickerEvent};
use crate::ops::transform::OriginAngle;
use crate::project::Project;

pub struct StickerFEApp {
    // Document state
    project: Option<Project>,
    untitled_counter: usize,

    // Canvas renderer
    canvas: Canvas,

    // Assets
    assets: Assets,

    // Sticker placement settings
    placement_angle: OriginAngle,
    stickers_locked: bool,

    // Pinch routing state (one pinch at a time, aimed at one sticker)
    pinch_active: bool,
    pinch_target: Option<Uuid>,
}

impl StickerFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut assets = Assets::new();
        assets.init(&cc.egui_ctx);

        StickerFEApp {
            project: None,
            untitled_counter: 0,
            canvas: Canvas::new(),
            assets,
            placement_angle: OriginAngle::Deg0,
            stickers_locked: false,
            pinch_active: false,
            pinch_target: None,
        }
    }

    // -----------------------------------------------------------------------
    //  File actions
    // -----------------------------------------------------------------------

    fn open_photo(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file()
        else {
            return;
        };
        match io::load_photo(&path) {
            Ok(photo) => {
                self.untitled_counter += 1;
                self.project = Some(Project::new_untitled(
                    self.untitled_counter,
                    CanvasState::new(photo),
                ));
                self.canvas.mark_photo_dirty();
                crate::log_info!("Opened photo {}", path.display());
            }
            Err(e) => {
                crate::log_err!("Failed to open photo {}: {}", path.display(), e);
            }
        }
    }

    fn open_document(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("StickerFE document", &["sfe"])
            .pick_file()
        else {
            return;
        };
        match io::load_sfe(&path) {
            Ok(state) => {
                self.project = Some(Project::from_file(path.clone(), state));
                self.canvas.mark_photo_dirty();
                crate::log_info!("Opened document {}", path.display());
            }
            Err(e) => {
                crate::log_err!("Failed to open document {}: {}", path.display(), e);
            }
        }
    }

    fn save_document(&mut self, force_dialog: bool) {
        let Some(project) = &mut self.project else {
            return;
        };
        let path = match (&project.path, force_dialog) {
            (Some(p), false) => Some(p.clone()),
            _ => rfd::FileDialog::new()
                .add_filter("StickerFE document", &["sfe"])
                .set_file_name(&format!("{}.sfe", project.name.trim_end_matches(".sfe")))
                .save_file(),
        };
        let Some(path) = path else { return };

        match io::save_sfe(&project.canvas_state, &path) {
            Ok(()) => {
                project.path = Some(path.clone());
                project.update_name_from_path();
                project.mark_clean();
                crate::log_info!("Saved document {}", path.display());
            }
            Err(e) => {
                crate::log_err!("Failed to save document {}: {}", path.display(), e);
            }
        }
    }

    fn export_flat(&mut self) {
        let Some(project) = &mut self.project else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .save_file()
        else {
            return;
        };
        let flat = project.canvas_state.composite();
        let format = ExportFormat::from_path(&path);
        match io::export_image(&flat, &path, format, 90) {
            Ok(()) => crate::log_info!("Exported {}", path.display()),
            Err(e) => crate::log_err!("Export to {} failed: {}", path.display(), e),
        }
    }

    // -----------------------------------------------------------------------
    //  Sticker actions
    // -----------------------------------------------------------------------

    fn add_sticker(&mut self) {
        let Some(project) = &mut self.project else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file()
        else {
            return;
        };
        match io::load_sticker_image(&path) {
            Ok(image) => {
                let id = project.canvas_state.add_sticker(
                    image,
                    self.canvas.zoom,
                    self.placement_angle,
                    Instant::now(),
                );
                project.mark_dirty();
                crate::log_info!("Placed sticker {} from {}", id, path.display());
            }
            Err(e) => {
                crate::log_err!("Failed to load sticker {}: {}", path.display(), e);
            }
        }
    }

    fn scale_canvas(&mut self, factor: f32) {
        if let Some(project) = &mut self.project {
            project.canvas_state.resize_canvas(factor);
            project.mark_dirty();
            self.canvas.mark_photo_dirty();
            crate::log_info!(
                "Canvas scaled by {} to {}x{}",
                factor,
                project.canvas_state.width,
                project.canvas_state.height
            );
        }
    }

    fn hide_all_chrome(&mut self) {
        if let Some(project) = &mut self.project {
            for sticker in &mut project.canvas_state.stickers {
                sticker.reset_state();
            }
        }
    }

    // -----------------------------------------------------------------------
    //  UI
    // -----------------------------------------------------------------------

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Photo…").clicked() {
                        self.open_photo();
                        ui.close_menu();
                    }
                    if ui.button("Open Document…").clicked() {
                        self.open_document();
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_project = self.project.is_some();
                    if ui
                        .add_enabled(has_project, egui::Button::new("Save Document"))
                        .clicked()
                    {
                        self.save_document(false);
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(has_project, egui::Button::new("Save Document As…"))
                        .clicked()
                    {
                        self.save_document(true);
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(has_project, egui::Button::new("Export Flat Image…"))
                        .clicked()
                    {
                        self.export_flat();
                        ui.close_menu();
                    }
                });

                ui.menu_button("Image", |ui| {
                    let has_project = self.project.is_some();
                    if ui
                        .add_enabled(has_project, egui::Button::new("Scale Canvas 50%"))
                        .clicked()
                    {
                        self.scale_canvas(0.5);
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(has_project, egui::Button::new("Scale Canvas 200%"))
                        .clicked()
                    {
                        self.scale_canvas(2.0);
                        ui.close_menu();
                    }
                });

                ui.menu_button("Sticker", |ui| {
                    let has_project = self.project.is_some();
                    if ui
                        .add_enabled(has_project, egui::Button::new("Add Sticker…"))
                        .clicked()
                    {
                        self.add_sticker();
                        ui.close_menu();
                    }
                    ui.separator();
                    ui.menu_button("Placement Angle", |ui| {
                        for &angle in OriginAngle::all() {
                            let label = match angle {
                                OriginAngle::Deg0 => "0°",
                                OriginAngle::Deg90 => "90°",
                                OriginAngle::Deg180 => "180°",
                                OriginAngle::Deg270 => "270°",
                            };
                            if ui
                                .radio(self.placement_angle == angle, label)
                                .clicked()
                            {
                                self.placement_angle = angle;
                                ui.close_menu();
                            }
                        }
                    });
                    ui.separator();
                    ui.checkbox(&mut self.stickers_locked, "Lock Stickers");
                    if ui
                        .add_enabled(has_project, egui::Button::new("Hide Selection Chrome"))
                        .clicked()
                    {
                        self.hide_all_chrome();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.project {
                    Some(project) => {
                        ui.label(project.display_title());
                        ui.separator();
                        ui.label(format!(
                            "{}×{}",
                            project.canvas_state.width, project.canvas_state.height
                        ));
                        ui.separator();
                        ui.label(format!(
                            "{} sticker(s)",
                            project.canvas_state.stickers.len()
                        ));
                        ui.separator();
                        ui.label(format!("{:.0}%", self.canvas.zoom * 100.0));
                    }
                    None => {
                        ui.label("No document open");
                    }
                }
            });
        });
    }
}

/// Pick the sticker a pinch should apply to: the one mid-interaction, else
/// the topmost sticker under the pointer.
fn pinch_target_id(
    state: &CanvasState,
    pointer: Option<Pos2>,
    image_rect: Rect,
    zoom: f32,
) -> Option<Uuid> {
    if let Some(active) = state.stickers.iter().find(|s| s.is_on_operation()) {
        return Some(active.id);
    }
    let pointer = pointer?;
    state
        .stickers
        .iter()
        .rev()
        .find(|s| s.hit_test(pointer, image_rect, zoom).is_some())
        .map(|s| s.id)
}

impl eframe::App for StickerFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.menu_bar(ctx);
        self.status_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(project) = &mut self.project else {
                ui.centered_and_justified(|ui| {
                    ui.label("Open a photo (File → Open Photo…) to start decorating.");
                });
                return;
            };
            let state = &mut project.canvas_state;
            state.set_ges_enabled(!self.stickers_locked);

            let avail = ui.available_rect_before_wrap();
            self.canvas.update_layout(avail, state);
            self.canvas.ensure_photo_texture(ctx, state);

            let _response = ui.allocate_rect(avail, egui::Sense::click_and_drag());
            let painter = ui.painter_at(avail);
            self.canvas.draw_photo(&painter);

            let now = Instant::now();
            let image_rect = self.canvas.image_rect;
            let zoom = self.canvas.zoom;
            let mut pending: Vec<(Uuid, StickerEvent)> = Vec::new();

            // Pointer input: topmost sticker first; the first to claim the
            // pointer wins the frame.
            for sticker in state.stickers.iter_mut().rev() {
                let outcome = sticker.handle_input(ui, image_rect, zoom, now);
                for event in outcome.events {
                    pending.push((sticker.id, event));
                }
                if outcome.consumed {
                    break;
                }
            }

            // Pinch input: true multi-touch gets proper phases; desktop zoom
            // steps collapse into a begin/change/end burst.
            let pointer = ui.input(|i| i.pointer.interact_pos());
            let touch_zoom = ui.input(|i| i.multi_touch().map(|mt| mt.zoom_delta));
            match touch_zoom {
                Some(delta) => {
                    let target = if self.pinch_active {
                        self.pinch_target
                    } else {
                        pinch_target_id(state, pointer, image_rect, zoom)
                    };
                    if let Some(id) = target
                        && let Some(idx) = state.sticker_index(id)
                    {
                        let sticker = &mut state.stickers[idx];
                        if self.pinch_active {
                            if let Some(ev) =
                                sticker.pinch_gesture(delta, GesturePhase::Changed, now)
                            {
                                pending.push((id, ev));
                            }
                        } else {
                            if let Some(ev) =
                                sticker.pinch_gesture(delta, GesturePhase::Began, now)
                            {
                                pending.push((id, ev));
                            }
                            sticker.pinch_gesture(1.0, GesturePhase::Changed, now);
                        }
                        self.pinch_active = true;
                        self.pinch_target = Some(id);
                    }
                }
                None => {
                    if self.pinch_active {
                        if let Some(id) = self.pinch_target
                            && let Some(idx) = state.sticker_index(id)
                            && let Some(ev) = state.stickers[idx].pinch_gesture(
                                1.0,
                                GesturePhase::Ended,
                                now,
                            )
                        {
                            pending.push((id, ev));
                        }
                        self.pinch_active = false;
                        self.pinch_target = None;
                    } else {
                        let step = ui.input(|i| i.zoom_delta());
                        if (step - 1.0).abs() > 1e-4
                            && let Some(id) = pinch_target_id(state, pointer, image_rect, zoom)
                            && let Some(idx) = state.sticker_index(id)
                        {
                            let sticker = &mut state.stickers[idx];
                            if let Some(ev) = sticker.pinch_gesture(step, GesturePhase::Began, now)
                            {
                                pending.push((id, ev));
                            }
                            sticker.pinch_gesture(1.0, GesturePhase::Changed, now);
                            if let Some(ev) = sticker.pinch_gesture(1.0, GesturePhase::Ended, now)
                            {
                                pending.push((id, ev));
                            }
                        }
                    }
                }
            }

            // Apply host reactions to the collected sticker events.
            let mut dirty = false;
            for (id, event) in pending {
                match event {
                    StickerEvent::Tapped | StickerEvent::InteractionBegan => {
                        state.bring_to_front(id);
                    }
                    StickerEvent::InteractionEnded => {
                        dirty = true;
                    }
                    StickerEvent::RemoveRequested => {
                        if state.remove_sticker(id) {
                            if self.pinch_target == Some(id) {
                                self.pinch_active = false;
                                self.pinch_target = None;
                            }
                            dirty = true;
                            crate::log_info!("Removed sticker {}", id);
                        }
                    }
                    StickerEvent::InteractionUpdated => {}
                }
            }
            if dirty {
                project.mark_dirty();
            }

            // Draw bottom-up so the z-order reads correctly.
            for sticker in &mut project.canvas_state.stickers {
                sticker.ensure_texture(ctx);
                sticker.draw(&painter, &self.assets, image_rect, zoom);
            }

            // Advance hide countdowns; keep frames coming while one is
            // pending so the chrome disappears on time.
            let mut next_deadline: Option<Duration> = None;
            for sticker in &mut project.canvas_state.stickers {
                if sticker.poll_hide(now) {
                    ctx.request_repaint();
                }
                if let Some(remaining) = sticker.hide_remaining(now) {
                    next_deadline =
                        Some(next_deadline.map_or(remaining, |d: Duration| d.min(remaining)));
                }
            }
            if let Some(remaining) = next_deadline {
                ctx.request_repaint_after(remaining + Duration::from_millis(16));
            }
        });
    }
}
