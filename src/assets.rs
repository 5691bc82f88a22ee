// ============================================================================
// ASSETS — sticker chrome icons (remove button, rotate/scale handle)
// ============================================================================
//
// Icons are requested by symbolic name and rasterized procedurally at startup;
// if a texture is missing for any reason the draw path falls back to a text
// glyph, so a failed asset never breaks the sticker itself.

use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Stroke, TextureHandle, TextureOptions, Vec2};

/// Icon identifiers for the asset system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Icon {
    /// The sticker remove button (top-left corner).
    Remove,
    /// The combined rotate/scale drag handle (bottom-right corner).
    TransformHandle,
}

impl Icon {
    pub fn all() -> &'static [Icon] {
        &[Icon::Remove, Icon::TransformHandle]
    }

    /// Symbolic asset name, the key icons are requested by.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Icon::Remove => "remove",
            Icon::TransformHandle => "transform-handle",
        }
    }

    pub fn from_name(name: &str) -> Option<Icon> {
        match name {
            "remove" => Some(Icon::Remove),
            "transform-handle" => Some(Icon::TransformHandle),
            _ => None,
        }
    }

    /// Text fallback when no texture is available.
    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::Remove => "\u{00D7}",
            Icon::TransformHandle => "\u{21BB}",
        }
    }
}

#[derive(Default)]
pub struct Assets {
    textures: HashMap<Icon, TextureHandle>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize and upload all icons. Safe to call repeatedly.
    pub fn init(&mut self, ctx: &egui::Context) {
        for &icon in Icon::all() {
            if self.textures.contains_key(&icon) {
                continue;
            }
            let Some(img) = render_icon(icon.asset_name()) else {
                continue;
            };
            let tex = ctx.load_texture(
                format!("icon_{}", icon.asset_name()),
                egui::ImageData::Color(Arc::new(img)),
                TextureOptions {
                    magnification: egui::TextureFilter::Linear,
                    minification: egui::TextureFilter::Linear,
                    ..Default::default()
                },
            );
            self.textures.insert(icon, tex);
        }
    }

    pub fn has_texture(&self, icon: Icon) -> bool {
        self.textures.contains_key(&icon)
    }

    pub fn get_texture(&self, icon: Icon) -> Option<&TextureHandle> {
        self.textures.get(&icon)
    }

    /// Draw an icon centered at `center` with the given screen-side length.
    pub fn draw_icon(&self, painter: &egui::Painter, icon: Icon, center: Pos2, size: f32) {
        match self.textures.get(&icon) {
            Some(tex) => {
                let rect = Rect::from_center_size(center, Vec2::splat(size));
                painter.image(
                    tex.id(),
                    rect,
                    Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            None => {
                // Glyph fallback: filled disc with the character on top.
                let radius = size / 2.0;
                painter.circle_filled(center, radius, Color32::WHITE);
                painter.circle_stroke(center, radius, Stroke::new(1.0, Color32::from_gray(90)));
                painter.text(
                    center,
                    egui::Align2::CENTER_CENTER,
                    icon.glyph(),
                    egui::FontId::proportional(size * 0.7),
                    Color32::BLACK,
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Procedural rasterization
// ---------------------------------------------------------------------------

const ICON_SIZE: usize = 44;

/// Rasterize the icon with the given symbolic name, or None for an unknown
/// name.
fn render_icon(name: &str) -> Option<ColorImage> {
    match name {
        "remove" => Some(rasterize(remove_coverage)),
        "transform-handle" => Some(rasterize(handle_coverage)),
        _ => None,
    }
}

/// Build an RGBA icon from a per-pixel coverage function returning
/// `(white_disc, black_mark)` coverages in 0..=1.
fn rasterize(coverage: fn(f32, f32) -> (f32, f32)) -> ColorImage {
    let mut pixels = Vec::with_capacity(ICON_SIZE * ICON_SIZE);
    let c = ICON_SIZE as f32 / 2.0;
    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let px = x as f32 + 0.5 - c;
            let py = y as f32 + 0.5 - c;
            let (disc, mark) = coverage(px, py);
            let a = disc.clamp(0.0, 1.0);
            let m = mark.clamp(0.0, 1.0);
            // White disc with the mark composited in black.
            let v = (255.0 * (1.0 - m)) as u8;
            pixels.push(Color32::from_rgba_unmultiplied(v, v, v, (a * 255.0) as u8));
        }
    }
    ColorImage {
        size: [ICON_SIZE, ICON_SIZE],
        pixels,
    }
}

/// Antialiased coverage of a disc edge at distance `d` from the boundary.
fn edge(d: f32) -> f32 {
    (0.5 - d).clamp(0.0, 1.0)
}

/// Remove icon: white disc with an × mark.
fn remove_coverage(x: f32, y: f32) -> (f32, f32) {
    let r = (x * x + y * y).sqrt();
    let disc = edge(r - 20.0);

    // Two diagonal strokes of half-width 2, limited to the disc interior.
    let arm = 9.0;
    let d1 = (x - y).abs() / std::f32::consts::SQRT_2;
    let d2 = (x + y).abs() / std::f32::consts::SQRT_2;
    let along = x.abs().max(y.abs());
    let mark = if along <= arm {
        edge(d1 - 2.0).max(edge(d2 - 2.0))
    } else {
        0.0
    };
    (disc, mark * disc)
}

/// Transform handle icon: white disc with a circular arrow.
fn handle_coverage(x: f32, y: f32) -> (f32, f32) {
    let r = (x * x + y * y).sqrt();
    let disc = edge(r - 20.0);

    // Ring of radius 10, thickness 4, with a gap; arrowhead at the gap's
    // leading edge.
    let ring = edge((r - 10.0).abs() - 2.0);
    let angle = y.atan2(x);
    let in_gap = angle > 0.2 && angle < 1.2;
    let mut mark = if in_gap { 0.0 } else { ring };

    // Triangular arrowhead pointing clockwise at the gap start.
    let tip_angle = 0.2f32;
    let (sin, cos) = tip_angle.sin_cos();
    let hx = 10.0 * cos;
    let hy = 10.0 * sin;
    let dx = x - hx;
    let dy = y - hy;
    // Local frame: u along the tangent, v along the radius.
    let u = -dx * sin + dy * cos;
    let v = dx * cos + dy * sin;
    if u > 0.0 && u < 6.0 {
        let half = (6.0 - u) * 0.8;
        if v.abs() <= half {
            mark = 1.0;
        }
    }
    (disc, mark * disc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_symbolic_names_round_trip() {
        for &icon in Icon::all() {
            assert_eq!(Icon::from_name(icon.asset_name()), Some(icon));
        }
        assert_eq!(Icon::from_name("bogus"), None);
    }

    #[test]
    fn test_render_icon_known_names() {
        for &icon in Icon::all() {
            let img = render_icon(icon.asset_name()).expect("known icon renders");
            assert_eq!(img.size, [ICON_SIZE, ICON_SIZE]);
            // Some opaque pixels, some transparent (it is a disc, not a square).
            assert!(img.pixels.iter().any(|p| p.a() > 200));
            assert!(img.pixels.iter().any(|p| p.a() == 0));
        }
        assert!(render_icon("bogus").is_none());
    }
}
