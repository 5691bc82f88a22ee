// ============================================================================
// CANVAS — the photo being decorated plus its sticker stack
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, TextureFilter, TextureHandle, TextureOptions, Vec2,
           pos2, vec2};
use image::{RgbaImage, imageops};
use uuid::Uuid;

use crate::ops::sticker::StickerView;
use crate::ops::transform::{OriginAngle, calculate_size};

/// Convert a canvas position to a screen position.
pub fn canvas_to_screen(canvas_pos: Pos2, image_rect: Rect, zoom: f32) -> Pos2 {
    pos2(
        image_rect.min.x + canvas_pos.x * zoom,
        image_rect.min.y + canvas_pos.y * zoom,
    )
}

/// Convert a screen position to a canvas position.
pub fn screen_to_canvas(screen_pos: Pos2, image_rect: Rect, zoom: f32) -> Pos2 {
    pos2(
        (screen_pos.x - image_rect.min.x) / zoom,
        (screen_pos.y - image_rect.min.y) / zoom,
    )
}

// ---------------------------------------------------------------------------
//  Document state
// ---------------------------------------------------------------------------

/// The open photo and the stickers floating above it. Sticker order is the
/// z-order: the last entry draws on top.
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub photo: RgbaImage,
    pub stickers: Vec<StickerView>,
}

impl CanvasState {
    pub fn new(photo: RgbaImage) -> Self {
        let (width, height) = photo.dimensions();
        CanvasState {
            width,
            height,
            photo,
            stickers: Vec::new(),
        }
    }

    /// Place a new sticker centered on the canvas.
    ///
    /// The layout frame is sized for the current on-screen width (a quarter
    /// of the displayed container, clamped), so `origin_scale` carries the
    /// inverse display scale: the placement transform blows the layout frame
    /// back up to canvas pixels.
    pub fn add_sticker(
        &mut self,
        image: RgbaImage,
        display_scale: f32,
        angle: OriginAngle,
        now: Instant,
    ) -> Uuid {
        let display_scale = if display_scale > 0.0 { display_scale } else { 1.0 };
        let container_width = self.width as f32 * display_scale;
        let size = calculate_size(
            vec2(image.width() as f32, image.height() as f32),
            container_width,
        );
        let center = pos2(self.width as f32 / 2.0, self.height as f32 / 2.0);
        let origin_frame = Rect::from_center_size(center, size);

        let sticker = StickerView::new(image, 1.0 / display_scale, angle, origin_frame, now);
        let id = sticker.id;
        self.stickers.push(sticker);
        id
    }

    pub fn sticker_index(&self, id: Uuid) -> Option<usize> {
        self.stickers.iter().position(|s| s.id == id)
    }

    /// Move a sticker to the top of the z-order.
    pub fn bring_to_front(&mut self, id: Uuid) {
        if let Some(idx) = self.sticker_index(id)
            && idx + 1 != self.stickers.len()
        {
            let sticker = self.stickers.remove(idx);
            self.stickers.push(sticker);
        }
    }

    /// Remove a sticker entirely; its pending hide countdown dies with it.
    pub fn remove_sticker(&mut self, id: Uuid) -> bool {
        match self.sticker_index(id) {
            Some(idx) => {
                self.stickers.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Enable or disable gestures on every sticker (used while dialogs are
    /// open).
    pub fn set_ges_enabled(&mut self, enabled: bool) {
        for sticker in &mut self.stickers {
            sticker.ges_enabled = enabled;
        }
    }

    /// Resize the photo by `factor` and re-anchor every sticker to match.
    pub fn resize_canvas(&mut self, factor: f32) {
        if factor <= 0.0 || (factor - 1.0).abs() < f32::EPSILON {
            return;
        }
        let new_w = ((self.width as f32 * factor).round() as u32).max(1);
        let new_h = ((self.height as f32 * factor).round() as u32).max(1);
        self.photo = imageops::resize(&self.photo, new_w, new_h, imageops::FilterType::Triangle);
        self.width = new_w;
        self.height = new_h;

        for sticker in &mut self.stickers {
            sticker.rescale(factor);
        }
    }

    /// Flatten the photo and all stickers into one full-resolution image.
    pub fn composite(&mut self) -> RgbaImage {
        let mut out = self.photo.clone();
        for sticker in &mut self.stickers {
            sticker.rasterize_onto(&mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
//  Display
// ---------------------------------------------------------------------------

/// Fit-to-window presentation of the canvas: keeps the photo texture and the
/// current canvas→screen mapping.
pub struct Canvas {
    photo_texture: Option<TextureHandle>,
    photo_dirty: bool,
    /// Screen pixels per canvas pixel.
    pub zoom: f32,
    /// Screen rectangle the photo occupies.
    pub image_rect: Rect,
}

impl Default for Canvas {
    fn default() -> Self {
        Canvas {
            photo_texture: None,
            photo_dirty: true,
            zoom: 1.0,
            image_rect: Rect::from_min_size(Pos2::ZERO, Vec2::ZERO),
        }
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a photo texture re-upload on the next frame.
    pub fn mark_photo_dirty(&mut self) {
        self.photo_dirty = true;
    }

    /// Compute the fit-to-window layout for this frame.
    pub fn update_layout(&mut self, avail: Rect, state: &CanvasState) {
        let cw = state.width.max(1) as f32;
        let ch = state.height.max(1) as f32;
        let zoom = (avail.width() / cw)
            .min(avail.height() / ch)
            .clamp(0.001, 1.0);
        let size = vec2(cw * zoom, ch * zoom);
        let min = pos2(
            avail.min.x + (avail.width() - size.x) / 2.0,
            avail.min.y + (avail.height() - size.y) / 2.0,
        );
        self.zoom = zoom;
        self.image_rect = Rect::from_min_size(min, size);
    }

    /// Upload (or re-upload) the photo texture when needed.
    pub fn ensure_photo_texture(&mut self, ctx: &egui::Context, state: &CanvasState) {
        if !self.photo_dirty && self.photo_texture.is_some() {
            return;
        }
        let (w, h) = (state.width as usize, state.height as usize);
        let pixels: Vec<Color32> = state
            .photo
            .as_raw()
            .chunks_exact(4)
            .map(|px| Color32::from_rgba_unmultiplied(px[0], px[1], px[2], px[3]))
            .collect();
        let color_image = ColorImage { size: [w, h], pixels };
        let image_data = egui::ImageData::Color(Arc::new(color_image));
        let options = TextureOptions {
            magnification: TextureFilter::Linear,
            minification: TextureFilter::Linear,
            ..Default::default()
        };
        if let Some(ref mut tex) = self.photo_texture {
            tex.set(image_data, options);
        } else {
            self.photo_texture = Some(ctx.load_texture("canvas_photo", image_data, options));
        }
        self.photo_dirty = false;
    }

    /// Draw the photo into its screen rectangle.
    pub fn draw_photo(&self, painter: &egui::Painter) {
        if let Some(tex) = &self.photo_texture {
            painter.image(
                tex.id(),
                self.image_rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn photo(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
    }

    fn sticker_image() -> RgbaImage {
        RgbaImage::from_pixel(200, 100, Rgba([250, 0, 0, 255]))
    }

    #[test]
    fn test_add_sticker_sizes_from_container_width() {
        let mut state = CanvasState::new(photo(800, 600));
        state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, Instant::now());

        // 200×100 in an 800-wide container: 222×122 after insets.
        let size = state.stickers[0].bounds_size();
        assert!((size.x - 222.0).abs() < 1e-3 && (size.y - 122.0).abs() < 1e-3);
    }

    #[test]
    fn test_bring_to_front_reorders() {
        let mut state = CanvasState::new(photo(400, 400));
        let now = Instant::now();
        let first = state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, now);
        let second = state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, now);

        state.bring_to_front(first);
        assert_eq!(state.stickers.last().unwrap().id, first);
        state.bring_to_front(second);
        assert_eq!(state.stickers.last().unwrap().id, second);
    }

    #[test]
    fn test_remove_sticker() {
        let mut state = CanvasState::new(photo(400, 400));
        let id = state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, Instant::now());
        assert!(state.remove_sticker(id));
        assert!(!state.remove_sticker(id));
        assert!(state.stickers.is_empty());
    }

    #[test]
    fn test_composite_paints_sticker_over_photo() {
        let mut state = CanvasState::new(photo(800, 600));
        state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, Instant::now());
        let flat = state.composite();

        // Center of the canvas is covered by the sticker image.
        let center = flat.get_pixel(400, 300);
        assert_eq!(center[0], 250);
        // A far corner is untouched photo.
        let corner = flat.get_pixel(2, 2);
        assert_eq!(corner.0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_resize_canvas_rescales_stickers() {
        let mut state = CanvasState::new(photo(800, 600));
        state.add_sticker(sticker_image(), 1.0, OriginAngle::Deg0, Instant::now());
        let before = state.stickers[0].frame();

        state.resize_canvas(0.5);
        assert_eq!((state.width, state.height), (400, 300));
        let after = state.stickers[0].frame();
        assert!((after.min.x - before.min.x * 0.5).abs() < 0.1);
        assert!((after.width() - before.width() * 0.5).abs() < 0.1);
    }

    #[test]
    fn test_screen_mapping_round_trips() {
        let rect = Rect::from_min_size(pos2(40.0, 60.0), vec2(400.0, 300.0));
        let zoom = 0.5;
        let p = pos2(123.0, 45.0);
        let back = screen_to_canvas(canvas_to_screen(p, rect, zoom), rect, zoom);
        assert!((back.x - p.x).abs() < 1e-3 && (back.y - p.y).abs() < 1e-3);
    }
}
