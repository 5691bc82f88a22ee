// ============================================================================
// STICKER OVERLAY — draggable / pinchable / rotatable image layer
// ============================================================================
//
// A sticker floats above the photo and is manipulated live through three
// gestures: drag anywhere on the body (move), pinch (scale), and drag on the
// corner handle (combined rotate + scale). While selected it shows a white
// border, a remove button (top-left) and the rotate/scale handle
// (bottom-right); the chrome hides itself two seconds after the last
// interaction.
//
// Placement is a single affine transform built from two layers:
//   * the origin transform — rotate(origin_angle), then the folded total
//     translation (axis-remapped), then scale(origin_scale); updated
//     permanently when a pan ends or the canvas is rescaled;
//   * the gesture transform — translate(remap(drag)), then scale, then
//     rotate; rebuilt on every changed-phase update and discarded once its
//     deltas are folded into the origin.
// The prepend order is load-bearing: translate before scale at the origin
// level, scale before rotate at the gesture level.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Stroke, TextureHandle, TextureOptions, Vec2, pos2,
           vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use uuid::Uuid;

use crate::assets::{Assets, Icon};
use crate::canvas::{canvas_to_screen, screen_to_canvas};
use crate::ops::transform::{Affine, EDGE_INSET, OriginAngle, point_distance};

/// Width of the selection border stroke.
pub const BORDER_WIDTH: f32 = 1.0;

/// Side length of the remove button and the rotate/scale handle, in layout
/// points (before the placement transform).
pub const BUTTON_SIZE: f32 = 22.0;

/// How long the chrome stays up after the last tap or interaction.
pub const HIDE_DELAY: Duration = Duration::from_secs(2);

/// The corner handle may never shrink a sticker below this many layout
/// points on its shorter side.
pub const MIN_SCALED_SIDE: f32 = 40.0;

/// Pointer movement (screen px) below which a press-release counts as a tap.
const TAP_SLOP: f32 = 4.0;

/// Minimum screen-px pick radius for the remove button and handle.
const GRAB_RADIUS: f32 = 10.0;

// ---------------------------------------------------------------------------
//  Gesture plumbing
// ---------------------------------------------------------------------------

/// Phase of a gesture, as reported by the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
}

/// The transient scale / rotation / translation accumulated during a live
/// interaction. Mutated only by the sticker's own transition methods.
#[derive(Clone, Copy, Debug)]
struct GestureState {
    translation: Vec2,
    rotation: f32,
    scale: f32,
}

impl Default for GestureState {
    fn default() -> Self {
        GestureState {
            translation: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

/// Baseline captured when a corner-handle drag begins.
#[derive(Clone, Copy, Debug)]
struct RotateBaseline {
    /// Pointer angle around the layout center minus the transform's current
    /// rotation.
    angle: f32,
    /// Pointer distance from the layout center at gesture start.
    distance: f32,
    /// Untransformed bounds at gesture start, for the minimum-scale clamp.
    bounds: Vec2,
}

/// Which pointer gesture is currently claiming input.
#[derive(Clone, Copy, Debug)]
enum ActiveGesture {
    /// Press on the body; becomes a pan once the pointer moves past the
    /// tap slop, otherwise resolves to a tap on release.
    Pan { press: Pos2, moved: bool },
    /// Drag on the rotate/scale handle.
    Rotate,
    /// Press started on the remove button.
    RemovePress,
}

/// Notifications delivered to the host (the editor app).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StickerEvent {
    /// The sticker was tapped; the host should bring it to the front.
    Tapped,
    /// A move / pinch / rotate interaction started.
    InteractionBegan,
    /// The interaction finished and its deltas were folded in.
    InteractionEnded,
    /// Reserved for per-frame mid-interaction notifications; not currently
    /// delivered.
    InteractionUpdated,
    /// The remove button was clicked; the host owns the actual removal.
    RemoveRequested,
}

/// What part of the sticker a screen position lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StickerHit {
    Remove,
    Handle,
    Body,
}

/// Result of feeding one frame of pointer input to a sticker.
#[derive(Default)]
pub struct InputOutcome {
    pub events: Vec<StickerEvent>,
    /// True when the sticker claimed the pointer this frame.
    pub consumed: bool,
}

// ---------------------------------------------------------------------------
//  Auto-hide countdown
// ---------------------------------------------------------------------------

/// A cancelable one-shot deadline for hiding the chrome.
///
/// Replacing the deadline cancels the previous one, so at most one countdown
/// is ever pending; dropping the owning sticker drops the deadline with it.
#[derive(Clone, Copy, Debug, Default)]
pub struct HideCountdown {
    deadline: Option<Instant>,
}

impl HideCountdown {
    /// Start (or restart) the countdown from `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + HIDE_DELAY);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, if one is pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Returns true exactly once when the deadline has passed, clearing it.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
//  Snapshot
// ---------------------------------------------------------------------------

/// Everything needed to reconstruct a sticker identically: the image plus
/// the placement quantities. The on-disk encoding lives in `io.rs`.
#[derive(Clone)]
pub struct StickerState {
    pub image: RgbaImage,
    pub origin_scale: f32,
    pub origin_angle: OriginAngle,
    pub origin_frame: Rect,
    pub ges_scale: f32,
    pub ges_rotation: f32,
    pub total_translation: Vec2,
}

// ---------------------------------------------------------------------------
//  Sticker view
// ---------------------------------------------------------------------------

pub struct StickerView {
    pub id: Uuid,
    pub image: RgbaImage,
    texture: Option<TextureHandle>,

    // --- Placement ---
    origin_scale: f32,
    origin_angle: OriginAngle,
    origin_frame: Rect,
    origin_transform: Affine,
    total_translation: Vec2,
    gesture: GestureState,
    transform: Affine,
    first_layout: bool,

    // --- Interaction ---
    /// Host switch: while false, all gestures are ignored.
    pub ges_enabled: bool,
    on_operation: bool,
    active_gesture: Option<ActiveGesture>,
    rotate_baseline: Option<RotateBaseline>,

    // --- Chrome ---
    chrome_visible: bool,
    countdown: HideCountdown,
}

impl StickerView {
    /// Place a new sticker. The chrome starts visible with the auto-hide
    /// countdown already running.
    pub fn new(
        image: RgbaImage,
        origin_scale: f32,
        origin_angle: OriginAngle,
        origin_frame: Rect,
        now: Instant,
    ) -> Self {
        let mut view = Self::with_placement(
            image,
            origin_scale,
            origin_angle,
            origin_frame,
            1.0,
            0.0,
            Vec2::ZERO,
        );
        view.chrome_visible = true;
        view.countdown.schedule(now);
        view
    }

    /// Reconstruct a sticker from a saved snapshot. The chrome starts hidden
    /// and no countdown is running.
    pub fn from_state(state: StickerState) -> Self {
        Self::with_placement(
            state.image,
            state.origin_scale,
            state.origin_angle,
            state.origin_frame,
            state.ges_scale,
            state.ges_rotation,
            state.total_translation,
        )
    }

    fn with_placement(
        image: RgbaImage,
        origin_scale: f32,
        origin_angle: OriginAngle,
        origin_frame: Rect,
        ges_scale: f32,
        ges_rotation: f32,
        total_translation: Vec2,
    ) -> Self {
        StickerView {
            id: Uuid::new_v4(),
            image,
            texture: None,
            origin_scale,
            origin_angle,
            origin_frame,
            origin_transform: Affine::IDENTITY,
            total_translation,
            gesture: GestureState {
                translation: Vec2::ZERO,
                rotation: ges_rotation,
                scale: ges_scale,
            },
            transform: Affine::IDENTITY,
            first_layout: true,
            ges_enabled: true,
            on_operation: false,
            active_gesture: None,
            rotate_baseline: None,
            chrome_visible: false,
            countdown: HideCountdown::default(),
        }
    }

    /// Snapshot the current placement.
    pub fn state(&self) -> StickerState {
        StickerState {
            image: self.image.clone(),
            origin_scale: self.origin_scale,
            origin_angle: self.origin_angle,
            origin_frame: self.origin_frame,
            ges_scale: self.gesture.scale,
            ges_rotation: self.gesture.rotation,
            total_translation: self.total_translation,
        }
    }

    // -----------------------------------------------------------------------
    //  Geometry
    // -----------------------------------------------------------------------

    /// Layout anchor in canvas coordinates. Translations live in the
    /// transform; the anchor itself never moves.
    pub fn center(&self) -> Pos2 {
        self.origin_frame.center()
    }

    /// Untransformed layout size.
    pub fn bounds_size(&self) -> Vec2 {
        self.origin_frame.size()
    }

    pub fn transform(&self) -> Affine {
        self.transform
    }

    pub fn origin_transform(&self) -> Affine {
        self.origin_transform
    }

    pub fn total_translation(&self) -> Vec2 {
        self.total_translation
    }

    pub fn ges_scale(&self) -> f32 {
        self.gesture.scale
    }

    pub fn ges_rotation(&self) -> f32 {
        self.gesture.rotation
    }

    /// Map a bounds-centered local point into canvas coordinates.
    fn to_canvas(&self, local: Pos2) -> Pos2 {
        let q = self.transform.apply(local);
        self.center() + vec2(q.x, q.y)
    }

    /// Map a canvas position back into bounds-centered local coordinates.
    fn from_canvas(&self, canvas_pos: Pos2) -> Pos2 {
        let v = canvas_pos - self.center();
        self.transform.invert().apply(pos2(v.x, v.y))
    }

    /// Axis-aligned bounding box of the transformed bounds, in canvas
    /// coordinates — the analogue of a view frame.
    pub fn frame(&self) -> Rect {
        let half = self.origin_frame.size() / 2.0;
        let mut min = pos2(f32::INFINITY, f32::INFINITY);
        let mut max = pos2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for corner in [
            pos2(-half.x, -half.y),
            pos2(half.x, -half.y),
            pos2(-half.x, half.y),
            pos2(half.x, half.y),
        ] {
            let q = self.to_canvas(corner);
            min = min.min(q);
            max = max.max(q);
        }
        Rect::from_min_max(min, max)
    }

    /// The aspect-fitted area the image occupies within the bounds, in
    /// bounds-centered local coordinates.
    fn image_rect_local(&self) -> Rect {
        let size = self.origin_frame.size();
        let inner = vec2(
            (size.x - EDGE_INSET * 4.0).max(1.0),
            (size.y - EDGE_INSET * 4.0).max(1.0),
        );
        let iw = self.image.width().max(1) as f32;
        let ih = self.image.height().max(1) as f32;
        let ratio = (inner.x / iw).min(inner.y / ih);
        Rect::from_center_size(Pos2::ZERO, vec2(iw * ratio, ih * ratio))
    }

    /// Magnitude of the scale the current transform applies.
    fn transform_scale(&self) -> f32 {
        (self.transform.a * self.transform.a + self.transform.b * self.transform.b).sqrt()
    }

    // -----------------------------------------------------------------------
    //  Transform composition
    // -----------------------------------------------------------------------

    /// Build the initial placement on first use. Rotation comes first, then
    /// the folded translation (axis-remapped), then the origin scale; the
    /// result is cached as the origin transform before any gesture transforms
    /// are layered on top. This sequence is fixed.
    pub fn layout_if_needed(&mut self) {
        if !self.first_layout {
            return;
        }
        self.first_layout = false;

        let mut t = Affine::IDENTITY.pre_rotate(self.origin_angle.radians());
        if self.total_translation != Vec2::ZERO {
            t = t.pre_translate(self.origin_angle.remap(self.total_translation));
        }
        t = t.pre_scale(self.origin_scale);
        self.origin_transform = t;

        if self.gesture.scale != 1.0 {
            t = t.pre_scale(self.gesture.scale);
        }
        if self.gesture.rotation != 0.0 {
            t = t.pre_rotate(self.gesture.rotation);
        }
        self.transform = t;
    }

    /// Recompose the live transform from the origin transform plus the
    /// current gesture state. Runs on every changed-phase update and never on
    /// a gesture end (ends fold into the origin instead).
    fn update_transform(&mut self) {
        let t = self
            .origin_transform
            .pre_translate(self.origin_angle.remap(self.gesture.translation))
            .pre_scale(self.gesture.scale)
            .pre_rotate(self.gesture.rotation);
        self.transform = t;
    }

    /// Flip the in-operation flag, managing chrome visibility and the hide
    /// countdown, and report the edge to the host.
    fn set_operation(&mut self, on: bool, now: Instant) -> Option<StickerEvent> {
        if on && !self.on_operation {
            self.on_operation = true;
            self.countdown.cancel();
            self.chrome_visible = true;
            Some(StickerEvent::InteractionBegan)
        } else if !on && self.on_operation {
            self.on_operation = false;
            self.countdown.schedule(now);
            Some(StickerEvent::InteractionEnded)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    //  Gesture transitions
    // -----------------------------------------------------------------------

    /// Body drag. `translation` is the cumulative drag since the gesture
    /// began, in canvas coordinates.
    pub fn pan_gesture(
        &mut self,
        translation: Vec2,
        phase: GesturePhase,
        now: Instant,
    ) -> Option<StickerEvent> {
        if !self.ges_enabled {
            return None;
        }
        self.layout_if_needed();
        self.gesture.translation = translation / self.origin_scale;
        match phase {
            GesturePhase::Began => self.set_operation(true, now),
            GesturePhase::Changed => {
                self.update_transform();
                None
            }
            GesturePhase::Ended => {
                self.total_translation += translation;
                let event = self.set_operation(false, now);
                self.origin_transform = self
                    .origin_transform
                    .pre_translate(self.origin_angle.remap(self.gesture.translation));
                self.gesture.translation = Vec2::ZERO;
                event
            }
        }
    }

    /// Corner-handle drag. `pointer` is the pointer position in canvas
    /// coordinates; rotation and scale are both derived from it.
    pub fn rotate_gesture(
        &mut self,
        pointer: Pos2,
        phase: GesturePhase,
        now: Instant,
    ) -> Option<StickerEvent> {
        if !self.ges_enabled {
            return None;
        }
        self.layout_if_needed();
        let center = self.center();
        match phase {
            GesturePhase::Began => {
                self.rotate_baseline = Some(RotateBaseline {
                    angle: (pointer.y - center.y).atan2(pointer.x - center.x)
                        - self.transform.angle(),
                    distance: point_distance(center, pointer).max(1.0),
                    bounds: self.origin_frame.size(),
                });
                self.set_operation(true, now)
            }
            GesturePhase::Changed => {
                if let Some(baseline) = self.rotate_baseline {
                    let angle = (pointer.y - center.y).atan2(pointer.x - center.x);
                    self.gesture.rotation = angle - baseline.angle;

                    let min_scale = MIN_SCALED_SIDE / baseline.bounds.x.min(baseline.bounds.y);
                    let scale = point_distance(center, pointer) / baseline.distance;
                    self.gesture.scale = scale.max(min_scale);

                    self.update_transform();
                }
                None
            }
            GesturePhase::Ended => {
                self.rotate_baseline = None;
                self.set_operation(false, now)
            }
        }
    }

    /// Pinch. `delta` is the incremental scale factor since the last update.
    pub fn pinch_gesture(
        &mut self,
        delta: f32,
        phase: GesturePhase,
        now: Instant,
    ) -> Option<StickerEvent> {
        if !self.ges_enabled {
            return None;
        }
        self.layout_if_needed();
        self.gesture.scale *= delta;
        match phase {
            GesturePhase::Began => self.set_operation(true, now),
            GesturePhase::Changed => {
                self.update_transform();
                None
            }
            GesturePhase::Ended => self.set_operation(false, now),
        }
    }

    /// Tap: restore the chrome and restart the countdown. The host brings
    /// the sticker to the front.
    pub fn tap(&mut self, now: Instant) {
        self.chrome_visible = true;
        self.countdown.schedule(now);
    }

    /// Abort any interaction state: clears the in-operation flag, cancels a
    /// pending countdown and hides the chrome.
    pub fn reset_state(&mut self) {
        self.on_operation = false;
        self.active_gesture = None;
        self.rotate_baseline = None;
        self.countdown.cancel();
        self.chrome_visible = false;
    }

    /// Advance the auto-hide countdown; hides the chrome when it fires.
    /// Returns true if the chrome just hid (a repaint is wanted).
    pub fn poll_hide(&mut self, now: Instant) -> bool {
        if self.countdown.fire_due(now) {
            self.chrome_visible = false;
            true
        } else {
            false
        }
    }

    pub fn chrome_visible(&self) -> bool {
        self.chrome_visible
    }

    pub fn is_on_operation(&self) -> bool {
        self.on_operation
    }

    pub fn hide_pending(&self) -> bool {
        self.countdown.is_pending()
    }

    /// Time until the pending auto-hide fires, for repaint scheduling.
    pub fn hide_remaining(&self, now: Instant) -> Option<Duration> {
        self.countdown.remaining(now)
    }

    // -----------------------------------------------------------------------
    //  Canvas rescale
    // -----------------------------------------------------------------------

    /// Re-anchor the sticker after the canvas is resized by `factor`.
    ///
    /// Peels the origin scale and gesture transforms off, scales the neutral
    /// frame's placement by `factor`, folds the centered-offset delta into
    /// both the live transform and the origin transform exactly as a pan end
    /// does, then reapplies everything. The step order must not change: any
    /// deviation drifts visibly under repeated resizes.
    pub fn rescale(&mut self, factor: f32) {
        self.layout_if_needed();

        self.transform = self
            .transform
            .pre_scale(1.0 / self.origin_scale)
            .pre_scale(1.0 / self.gesture.scale)
            .pre_rotate(-self.gesture.rotation);

        let frame = self.frame();
        let origin = pos2(frame.min.x * factor, frame.min.y * factor);

        let new_size = frame.size() * factor;
        let new_origin = pos2(
            frame.min.x + (frame.width() - new_size.x) / 2.0,
            frame.min.y + (frame.height() - new_size.y) / 2.0,
        );
        let diff = origin - new_origin;

        self.transform = self.transform.pre_translate(self.origin_angle.remap(diff));
        self.origin_transform = self
            .origin_transform
            .pre_translate(self.origin_angle.remap(diff / self.origin_scale));
        self.total_translation += diff;

        self.transform = self.transform.pre_scale(factor);

        self.transform = self
            .transform
            .pre_scale(self.origin_scale)
            .pre_scale(self.gesture.scale)
            .pre_rotate(self.gesture.rotation);

        self.gesture.scale *= factor;
    }

    // -----------------------------------------------------------------------
    //  Hit testing
    // -----------------------------------------------------------------------

    /// Determine what part of the sticker is under the given screen position.
    /// The buttons only hit while the chrome is visible.
    pub fn hit_test(&self, screen_pos: Pos2, image_rect: Rect, zoom: f32) -> Option<StickerHit> {
        let half = self.origin_frame.size() / 2.0;

        if self.chrome_visible {
            let pick = (BUTTON_SIZE / 2.0 * self.transform_scale() * zoom).max(GRAB_RADIUS);

            let remove_local = pos2(-half.x + BUTTON_SIZE / 2.0, -half.y + BUTTON_SIZE / 2.0);
            let remove_screen = canvas_to_screen(self.to_canvas(remove_local), image_rect, zoom);
            if screen_pos.distance(remove_screen) < pick {
                return Some(StickerHit::Remove);
            }

            let handle_local = pos2(half.x - BUTTON_SIZE / 2.0, half.y - BUTTON_SIZE / 2.0);
            let handle_screen = canvas_to_screen(self.to_canvas(handle_local), image_rect, zoom);
            if screen_pos.distance(handle_screen) < pick {
                return Some(StickerHit::Handle);
            }
        }

        let local = self.from_canvas(screen_to_canvas(screen_pos, image_rect, zoom));
        if local.x.abs() <= half.x && local.y.abs() <= half.y {
            return Some(StickerHit::Body);
        }

        None
    }

    // -----------------------------------------------------------------------
    //  Interaction (called each frame from canvas rendering)
    // -----------------------------------------------------------------------

    /// Feed one frame of pointer input. Emits host events and reports whether
    /// the sticker claimed the pointer.
    pub fn handle_input(
        &mut self,
        ui: &egui::Ui,
        image_rect: Rect,
        zoom: f32,
        now: Instant,
    ) -> InputOutcome {
        let mut out = InputOutcome::default();
        if !self.ges_enabled {
            return out;
        }
        self.layout_if_needed();

        let pointer = match ui.input(|i| i.pointer.interact_pos()) {
            Some(p) => p,
            None => return out,
        };
        let primary_pressed = ui.input(|i| i.pointer.primary_pressed());
        let primary_down = ui.input(|i| i.pointer.primary_down());
        let primary_released = ui.input(|i| i.pointer.any_released());
        let canvas_pos = screen_to_canvas(pointer, image_rect, zoom);

        // Start.
        if primary_pressed && self.active_gesture.is_none() {
            match self.hit_test(pointer, image_rect, zoom) {
                Some(StickerHit::Remove) => {
                    self.active_gesture = Some(ActiveGesture::RemovePress);
                    out.consumed = true;
                }
                Some(StickerHit::Handle) => {
                    self.active_gesture = Some(ActiveGesture::Rotate);
                    if let Some(ev) = self.rotate_gesture(canvas_pos, GesturePhase::Began, now) {
                        out.events.push(ev);
                    }
                    out.consumed = true;
                }
                Some(StickerHit::Body) => {
                    self.active_gesture = Some(ActiveGesture::Pan {
                        press: canvas_pos,
                        moved: false,
                    });
                    out.consumed = true;
                }
                None => {}
            }
            return out;
        }

        // Continue.
        if primary_down {
            match self.active_gesture {
                Some(ActiveGesture::Rotate) => {
                    self.rotate_gesture(canvas_pos, GesturePhase::Changed, now);
                    out.consumed = true;
                }
                Some(ActiveGesture::Pan { press, moved }) => {
                    let translation = canvas_pos - press;
                    if !moved && translation.length() * zoom > TAP_SLOP {
                        self.active_gesture = Some(ActiveGesture::Pan { press, moved: true });
                        if let Some(ev) = self.pan_gesture(translation, GesturePhase::Began, now) {
                            out.events.push(ev);
                        }
                    }
                    if matches!(self.active_gesture, Some(ActiveGesture::Pan { moved: true, .. }))
                    {
                        self.pan_gesture(translation, GesturePhase::Changed, now);
                    }
                    out.consumed = true;
                }
                Some(ActiveGesture::RemovePress) => {
                    out.consumed = true;
                }
                None => {}
            }
            return out;
        }

        // End.
        if primary_released {
            if let Some(gesture) = self.active_gesture.take() {
                match gesture {
                    ActiveGesture::Rotate => {
                        if let Some(ev) = self.rotate_gesture(canvas_pos, GesturePhase::Ended, now)
                        {
                            out.events.push(ev);
                        }
                    }
                    ActiveGesture::Pan { press, moved } => {
                        if moved {
                            let translation = canvas_pos - press;
                            if let Some(ev) =
                                self.pan_gesture(translation, GesturePhase::Ended, now)
                            {
                                out.events.push(ev);
                            }
                        } else {
                            self.tap(now);
                            out.events.push(StickerEvent::Tapped);
                        }
                    }
                    ActiveGesture::RemovePress => {
                        if matches!(
                            self.hit_test(pointer, image_rect, zoom),
                            Some(StickerHit::Remove)
                        ) {
                            out.events.push(StickerEvent::RemoveRequested);
                        }
                    }
                }
                out.consumed = true;
            }
        }

        out
    }

    // -----------------------------------------------------------------------
    //  Rendering
    // -----------------------------------------------------------------------

    /// Ensure the sticker image is uploaded as a texture. The quad's UV
    /// mapping handles all scaling, so one upload lasts the sticker's life.
    pub fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        let (w, h) = (self.image.width() as usize, self.image.height() as usize);
        let pixels: Vec<Color32> = self
            .image
            .as_raw()
            .chunks_exact(4)
            .map(|px| Color32::from_rgba_unmultiplied(px[0], px[1], px[2], px[3]))
            .collect();
        let color_image = ColorImage { size: [w, h], pixels };
        let tex = ctx.load_texture(
            format!("sticker_{}", self.id),
            egui::ImageData::Color(Arc::new(color_image)),
            TextureOptions {
                magnification: egui::TextureFilter::Linear,
                minification: egui::TextureFilter::Linear,
                ..Default::default()
            },
        );
        self.texture = Some(tex);
    }

    /// Draw the sticker image and, when visible, the selection chrome.
    pub fn draw(&mut self, painter: &egui::Painter, assets: &Assets, image_rect: Rect, zoom: f32) {
        self.layout_if_needed();

        // Image quad: the GPU handles rotation + scale via a textured mesh.
        if let Some(tex) = &self.texture {
            let r = self.image_rect_local();
            let corners = [
                r.min,
                pos2(r.max.x, r.min.y),
                pos2(r.min.x, r.max.y),
                r.max,
            ];
            let white = Color32::WHITE;
            let mut mesh = egui::Mesh::with_texture(tex.id());
            let uvs = [
                pos2(0.0, 0.0),
                pos2(1.0, 0.0),
                pos2(0.0, 1.0),
                pos2(1.0, 1.0),
            ];
            for (corner, uv) in corners.iter().zip(uvs) {
                mesh.vertices.push(egui::epaint::Vertex {
                    pos: canvas_to_screen(self.to_canvas(*corner), image_rect, zoom),
                    uv,
                    color: white,
                });
            }
            mesh.indices.extend_from_slice(&[0, 1, 2, 1, 3, 2]);
            painter.add(egui::Shape::mesh(mesh));
        }

        if !self.chrome_visible {
            return;
        }

        // Selection border, inset from the bounds for handle clearance.
        let half = self.origin_frame.size() / 2.0 - Vec2::splat(EDGE_INSET);
        let border_corners = [
            pos2(-half.x, -half.y),
            pos2(half.x, -half.y),
            pos2(half.x, half.y),
            pos2(-half.x, half.y),
        ];
        let screen_corners: Vec<Pos2> = border_corners
            .iter()
            .map(|c| canvas_to_screen(self.to_canvas(*c), image_rect, zoom))
            .collect();
        for i in 0..4 {
            painter.line_segment(
                [screen_corners[i], screen_corners[(i + 1) % 4]],
                Stroke::new(BORDER_WIDTH, Color32::WHITE),
            );
        }

        // Remove button (top-left) and rotate/scale handle (bottom-right).
        let bounds_half = self.origin_frame.size() / 2.0;
        let icon_size = BUTTON_SIZE * self.transform_scale() * zoom;

        let remove_local = pos2(
            -bounds_half.x + BUTTON_SIZE / 2.0,
            -bounds_half.y + BUTTON_SIZE / 2.0,
        );
        assets.draw_icon(
            painter,
            Icon::Remove,
            canvas_to_screen(self.to_canvas(remove_local), image_rect, zoom),
            icon_size,
        );

        let handle_local = pos2(
            bounds_half.x - BUTTON_SIZE / 2.0,
            bounds_half.y - BUTTON_SIZE / 2.0,
        );
        assets.draw_icon(
            painter,
            Icon::TransformHandle,
            canvas_to_screen(self.to_canvas(handle_local), image_rect, zoom),
            icon_size,
        );
    }

    // -----------------------------------------------------------------------
    //  Commit — rasterize the transformed sticker onto a canvas image
    // -----------------------------------------------------------------------

    /// Composite the sticker into `dst` (a canvas-sized image) at full
    /// resolution, with bilinear sampling and alpha blending.
    pub fn rasterize_onto(&mut self, dst: &mut RgbaImage) {
        self.layout_if_needed();

        let cw = dst.width();
        let ch = dst.height();
        if cw == 0 || ch == 0 {
            return;
        }

        let frame = self.frame();
        let row_start = (frame.min.y.floor().max(0.0)) as u32;
        let row_end = (frame.max.y.ceil().min(ch as f32 - 1.0)) as u32;
        let col_start = (frame.min.x.floor().max(0.0)) as u32;
        let col_end = (frame.max.x.ceil().min(cw as f32 - 1.0)) as u32;
        if row_start > row_end || col_start > col_end {
            return;
        }

        let inverse = self.transform.invert();
        let center = self.center();
        let img_rect = self.image_rect_local();
        let iw = self.image.width();
        let ih = self.image.height();
        if iw == 0 || ih == 0 || img_rect.width() <= 0.0 || img_rect.height() <= 0.0 {
            return;
        }
        let image = &self.image;

        let rows: Vec<u32> = (row_start..=row_end).collect();
        let patches: Vec<(u32, u32, Rgba<u8>)> = rows
            .par_iter()
            .flat_map(|&dy| {
                let mut row_patches = Vec::new();
                let py = dy as f32 + 0.5;
                for dx in col_start..=col_end {
                    let px = dx as f32 + 0.5;
                    let v = pos2(px, py) - center;
                    let local = inverse.apply(pos2(v.x, v.y));
                    if !img_rect.contains(local) {
                        continue;
                    }

                    // Image-space sample position for this canvas pixel.
                    let sx = (local.x - img_rect.min.x) / img_rect.width() * iw as f32 - 0.5;
                    let sy = (local.y - img_rect.min.y) / img_rect.height() * ih as f32 - 0.5;
                    let src_px = sample_bilinear(image, sx, sy, iw, ih);
                    if src_px[3] == 0 {
                        continue;
                    }

                    let dst_px = *dst.get_pixel(dx, dy);
                    row_patches.push((dx, dy, alpha_blend(dst_px, src_px)));
                }
                row_patches
            })
            .collect();

        for (dx, dy, px) in patches {
            dst.put_pixel(dx, dy, px);
        }
    }
}

/// Bilinear interpolation sample from an RgbaImage at fractional coords,
/// clamping to the image edge so borders don't blend with transparent black.
#[inline]
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32, w: u32, h: u32) -> Rgba<u8> {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        let cx = sx.clamp(0, w as i32 - 1) as u32;
        let cy = sy.clamp(0, h as i32 - 1) as u32;
        let p = img.get_pixel(cx, cy).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let inv_fx = 1.0 - fx;
    let inv_fy = 1.0 - fy;
    let w00 = inv_fx * inv_fy;
    let w10 = fx * inv_fy;
    let w01 = inv_fx * fy;
    let w11 = fx * fy;

    Rgba([
        (p00[0] * w00 + p10[0] * w10 + p01[0] * w01 + p11[0] * w11)
            .round()
            .clamp(0.0, 255.0) as u8,
        (p00[1] * w00 + p10[1] * w10 + p01[1] * w01 + p11[1] * w11)
            .round()
            .clamp(0.0, 255.0) as u8,
        (p00[2] * w00 + p10[2] * w10 + p01[2] * w01 + p11[2] * w11)
            .round()
            .clamp(0.0, 255.0) as u8,
        (p00[3] * w00 + p10[3] * w10 + p01[3] * w01 + p11[3] * w11)
            .round()
            .clamp(0.0, 255.0) as u8,
    ])
}

/// Simple alpha-composite: src over dst.
fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let inv = 1.0 / out_a;
    Rgba([
        ((src[0] as f32 * sa + dst[0] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8,
        ((src[1] as f32 * sa + dst[1] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8,
        ((src[2] as f32 * sa + dst[2] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Rect;

    const EPS: f32 = 1e-3;

    fn test_image() -> RgbaImage {
        RgbaImage::from_pixel(8, 4, Rgba([200, 60, 30, 255]))
    }

    fn test_sticker(angle: OriginAngle, origin_scale: f32) -> StickerView {
        let frame = Rect::from_center_size(pos2(100.0, 100.0), vec2(120.0, 80.0));
        let mut view = StickerView::new(test_image(), origin_scale, angle, frame, Instant::now());
        view.layout_if_needed();
        view
    }

    #[test]
    fn test_first_layout_composition_order() {
        let frame = Rect::from_center_size(pos2(50.0, 50.0), vec2(100.0, 100.0));
        let state = StickerState {
            image: test_image(),
            origin_scale: 2.0,
            origin_angle: OriginAngle::Deg90,
            origin_frame: frame,
            ges_scale: 1.5,
            ges_rotation: 0.3,
            total_translation: vec2(10.0, 4.0),
        };
        let mut view = StickerView::from_state(state);
        view.layout_if_needed();

        let expected_origin = Affine::IDENTITY
            .pre_rotate(OriginAngle::Deg90.radians())
            .pre_translate(OriginAngle::Deg90.remap(vec2(10.0, 4.0)))
            .pre_scale(2.0);
        let expected = expected_origin.pre_scale(1.5).pre_rotate(0.3);
        assert!(view.origin_transform().approx_eq(&expected_origin, EPS));
        assert!(view.transform().approx_eq(&expected, EPS));
    }

    #[test]
    fn test_rescale_by_one_is_noop() {
        for &angle in OriginAngle::all() {
            let mut view = test_sticker(angle, 1.25);
            let now = Instant::now();
            view.pan_gesture(vec2(30.0, -12.0), GesturePhase::Began, now);
            view.pan_gesture(vec2(30.0, -12.0), GesturePhase::Changed, now);
            view.pan_gesture(vec2(30.0, -12.0), GesturePhase::Ended, now);
            view.pinch_gesture(1.4, GesturePhase::Began, now);
            view.pinch_gesture(1.0, GesturePhase::Changed, now);
            view.pinch_gesture(1.0, GesturePhase::Ended, now);

            let before = view.transform();
            let before_origin = view.origin_transform();
            view.rescale(1.0);
            assert!(view.transform().approx_eq(&before, EPS));
            assert!(view.origin_transform().approx_eq(&before_origin, EPS));
        }
    }

    #[test]
    fn test_rescale_composes() {
        for &angle in OriginAngle::all() {
            let mut a = test_sticker(angle, 1.0);
            let mut b = test_sticker(angle, 1.0);
            let now = Instant::now();
            for view in [&mut a, &mut b] {
                view.pan_gesture(vec2(18.0, 25.0), GesturePhase::Began, now);
                view.pan_gesture(vec2(18.0, 25.0), GesturePhase::Changed, now);
                view.pan_gesture(vec2(18.0, 25.0), GesturePhase::Ended, now);
            }

            a.rescale(2.0);
            a.rescale(1.5);
            b.rescale(3.0);

            assert!(a.transform().approx_eq(&b.transform(), 5e-3));
            assert!((a.ges_scale() - b.ges_scale()).abs() < EPS);
            let fa = a.frame();
            let fb = b.frame();
            assert!((fa.min.x - fb.min.x).abs() < 0.05 && (fa.min.y - fb.min.y).abs() < 0.05);
        }
    }

    #[test]
    fn test_rescale_doubles_frame_placement() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let before = view.frame();
        view.rescale(2.0);
        let after = view.frame();
        assert!((after.min.x - before.min.x * 2.0).abs() < 0.05);
        assert!((after.min.y - before.min.y * 2.0).abs() < 0.05);
        assert!((after.width() - before.width() * 2.0).abs() < 0.05);
    }

    #[test]
    fn test_gesture_scale_always_precedes_rotation() {
        // Whatever order the events arrive in, the composed transform is
        // origin → translate → scale → rotate.
        let now = Instant::now();

        let mut pinch_first = test_sticker(OriginAngle::Deg0, 1.0);
        pinch_first.pinch_gesture(2.0, GesturePhase::Began, now);
        pinch_first.pinch_gesture(1.0, GesturePhase::Changed, now);
        let handle = pos2(160.0, 140.0);
        pinch_first.rotate_gesture(handle, GesturePhase::Began, now);
        pinch_first.rotate_gesture(pos2(140.0, 160.0), GesturePhase::Changed, now);

        let expected = pinch_first
            .origin_transform()
            .pre_scale(pinch_first.ges_scale())
            .pre_rotate(pinch_first.ges_rotation());
        assert!(pinch_first.transform().approx_eq(&expected, EPS));

        let mut rotate_first = test_sticker(OriginAngle::Deg0, 1.0);
        rotate_first.rotate_gesture(handle, GesturePhase::Began, now);
        rotate_first.rotate_gesture(pos2(140.0, 160.0), GesturePhase::Changed, now);
        rotate_first.rotate_gesture(pos2(140.0, 160.0), GesturePhase::Ended, now);
        rotate_first.pinch_gesture(1.3, GesturePhase::Began, now);
        rotate_first.pinch_gesture(1.0, GesturePhase::Changed, now);

        let expected = rotate_first
            .origin_transform()
            .pre_scale(rotate_first.ges_scale())
            .pre_rotate(rotate_first.ges_rotation());
        assert!(rotate_first.transform().approx_eq(&expected, EPS));
    }

    #[test]
    fn test_rotate_drag_clamps_minimum_scale() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let now = Instant::now();
        view.rotate_gesture(pos2(160.0, 140.0), GesturePhase::Began, now);
        // Drag the pointer (almost) into the center: scale must clamp.
        view.rotate_gesture(pos2(100.1, 100.0), GesturePhase::Changed, now);

        let min_scale = MIN_SCALED_SIDE / 80.0;
        assert!((view.ges_scale() - min_scale).abs() < EPS);
    }

    #[test]
    fn test_pan_end_folds_remapped_translation() {
        let frame = Rect::from_center_size(pos2(100.0, 100.0), vec2(120.0, 80.0));
        let state = StickerState {
            image: test_image(),
            origin_scale: 1.0,
            origin_angle: OriginAngle::Deg90,
            origin_frame: frame,
            ges_scale: 1.0,
            ges_rotation: 0.0,
            total_translation: vec2(10.0, 0.0),
        };
        let mut view = StickerView::from_state(state);
        view.layout_if_needed();

        let now = Instant::now();
        view.pan_gesture(vec2(5.0, 0.0), GesturePhase::Began, now);
        view.pan_gesture(vec2(5.0, 0.0), GesturePhase::Changed, now);
        let live = view.transform();
        view.pan_gesture(vec2(5.0, 0.0), GesturePhase::Ended, now);

        // The fold prepends translate(0, -5) — the 90° remap of (5, 0).
        let expected = Affine::IDENTITY
            .pre_rotate(OriginAngle::Deg90.radians())
            .pre_translate(OriginAngle::Deg90.remap(vec2(10.0, 0.0)))
            .pre_scale(1.0)
            .pre_translate(vec2(0.0, -5.0));
        assert!(view.origin_transform().approx_eq(&expected, EPS));
        assert_eq!(view.total_translation(), vec2(15.0, 0.0));

        // The end phase folds instead of recomputing: the live transform is
        // untouched, and recomposing from the new origin reproduces it.
        assert!(view.transform().approx_eq(&live, EPS));
        view.update_transform();
        assert!(view.transform().approx_eq(&live, EPS));
    }

    #[test]
    fn test_pan_divides_by_origin_scale() {
        let mut view = test_sticker(OriginAngle::Deg0, 2.0);
        let now = Instant::now();
        view.pan_gesture(vec2(10.0, 6.0), GesturePhase::Began, now);
        view.pan_gesture(vec2(10.0, 6.0), GesturePhase::Changed, now);

        let expected = view
            .origin_transform()
            .pre_translate(vec2(5.0, 3.0))
            .pre_scale(1.0)
            .pre_rotate(0.0);
        assert!(view.transform().approx_eq(&expected, EPS));
    }

    #[test]
    fn test_countdown_single_pending() {
        let mut countdown = HideCountdown::default();
        let now = Instant::now();
        assert!(!countdown.is_pending());

        countdown.schedule(now);
        countdown.schedule(now + Duration::from_millis(500));
        assert!(countdown.is_pending());

        // Only the most recent deadline exists: the first (now + 2 s) must
        // not fire early.
        assert!(!countdown.fire_due(now + Duration::from_millis(2400)));
        assert!(countdown.fire_due(now + Duration::from_millis(2600)));
        assert!(!countdown.is_pending());
        assert!(!countdown.fire_due(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_interaction_cancels_and_restarts_countdown() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let now = Instant::now();

        // A fresh sticker already has a countdown running.
        assert!(view.hide_pending());

        let began = view.pan_gesture(vec2(1.0, 0.0), GesturePhase::Began, now);
        assert_eq!(began, Some(StickerEvent::InteractionBegan));
        assert!(!view.hide_pending());
        assert!(view.chrome_visible());

        let ended = view.pan_gesture(vec2(1.0, 0.0), GesturePhase::Ended, now);
        assert_eq!(ended, Some(StickerEvent::InteractionEnded));
        assert!(view.hide_pending());

        // The countdown hides the chrome exactly once.
        assert!(!view.poll_hide(now + Duration::from_secs(1)));
        assert!(view.chrome_visible());
        assert!(view.poll_hide(now + Duration::from_secs(3)));
        assert!(!view.chrome_visible());
        assert!(!view.poll_hide(now + Duration::from_secs(4)));
    }

    #[test]
    fn test_tap_restores_chrome() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let now = Instant::now();
        assert!(view.poll_hide(now + Duration::from_secs(3)));
        assert!(!view.chrome_visible());

        let tap_time = now + Duration::from_secs(4);
        view.tap(tap_time);
        assert!(view.chrome_visible());
        assert!(view.hide_pending());
        assert!(view.poll_hide(tap_time + Duration::from_secs(3)));
    }

    #[test]
    fn test_reset_state_clears_everything() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let now = Instant::now();
        view.pan_gesture(vec2(1.0, 1.0), GesturePhase::Began, now);
        assert!(view.is_on_operation());

        view.reset_state();
        assert!(!view.is_on_operation());
        assert!(!view.hide_pending());
        assert!(!view.chrome_visible());
    }

    #[test]
    fn test_disabled_gestures_are_ignored() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        view.ges_enabled = false;
        let before = view.transform();
        let now = Instant::now();
        assert!(view.pan_gesture(vec2(50.0, 0.0), GesturePhase::Began, now).is_none());
        view.pan_gesture(vec2(50.0, 0.0), GesturePhase::Changed, now);
        assert!(view.transform().approx_eq(&before, EPS));
    }

    #[test]
    fn test_state_round_trip_reproduces_placement() {
        let mut view = test_sticker(OriginAngle::Deg180, 1.5);
        let now = Instant::now();
        view.pan_gesture(vec2(22.0, -9.0), GesturePhase::Began, now);
        view.pan_gesture(vec2(22.0, -9.0), GesturePhase::Changed, now);
        view.pan_gesture(vec2(22.0, -9.0), GesturePhase::Ended, now);
        view.pinch_gesture(1.8, GesturePhase::Began, now);
        view.pinch_gesture(1.0, GesturePhase::Changed, now);
        view.pinch_gesture(1.0, GesturePhase::Ended, now);

        let mut restored = StickerView::from_state(view.state());
        restored.layout_if_needed();
        assert!(restored.transform().approx_eq(&view.transform(), EPS));
        assert!(!restored.chrome_visible());
        assert!(!restored.hide_pending());
    }

    #[test]
    fn test_rasterize_stays_inside_frame() {
        let mut view = test_sticker(OriginAngle::Deg0, 1.0);
        let mut dst = RgbaImage::new(200, 200);
        view.rasterize_onto(&mut dst);

        let frame = view.frame();
        let mut painted = 0u32;
        for (x, y, px) in dst.enumerate_pixels() {
            if px[3] > 0 {
                painted += 1;
                let cx = x as f32 + 0.5;
                let cy = y as f32 + 0.5;
                assert!(
                    cx >= frame.min.x - 1.0
                        && cx <= frame.max.x + 1.0
                        && cy >= frame.min.y - 1.0
                        && cy <= frame.max.y + 1.0
                );
            }
        }
        assert!(painted > 0);
    }
}
