// ============================================================================
// TRANSFORM OPERATIONS — 2D affine composition for sticker placement
// ============================================================================

use egui::{Pos2, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};

/// Clearance added around the sticker image for the border and handles.
pub const EDGE_INSET: f32 = 11.0;

/// Smallest dimension a newly placed sticker may have, before insets.
pub const MIN_STICKER_SIDE: f32 = 80.0;

// ---------------------------------------------------------------------------
//  Affine transform
// ---------------------------------------------------------------------------

/// A 2D affine transform with the CoreGraphics-style layout
///
/// ```text
/// | a  b  0 |
/// | c  d  0 |
/// | tx ty 1 |
/// ```
///
/// mapping `(x, y)` to `(a·x + c·y + tx, b·x + d·y + ty)`.
///
/// The `pre_*` combinators *prepend* their operation: the new operation is
/// applied to the point first, then the existing transform. Sticker placement
/// is built exclusively from prepends, so the textual order of calls reads in
/// the same order the operations hit the point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Prepend a translation by `v`.
    #[must_use]
    pub fn pre_translate(self, v: Vec2) -> Affine {
        Affine {
            tx: self.tx + v.x * self.a + v.y * self.c,
            ty: self.ty + v.x * self.b + v.y * self.d,
            ..self
        }
    }

    /// Prepend a uniform scale by `s`.
    #[must_use]
    pub fn pre_scale(self, s: f32) -> Affine {
        Affine {
            a: self.a * s,
            b: self.b * s,
            c: self.c * s,
            d: self.d * s,
            ..self
        }
    }

    /// Prepend a rotation by `radians` (positive = clockwise in the
    /// y-down canvas coordinate system).
    #[must_use]
    pub fn pre_rotate(self, radians: f32) -> Affine {
        let (sin, cos) = radians.sin_cos();
        Affine {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            ..self
        }
    }

    /// Apply the transform to a point.
    pub fn apply(&self, p: Pos2) -> Pos2 {
        pos2(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// The rotation the transform applies, extracted from its first row.
    pub fn angle(&self) -> f32 {
        self.b.atan2(self.a)
    }

    /// Inverse transform. Returns identity on singular input.
    #[must_use]
    pub fn invert(&self) -> Affine {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return Affine::IDENTITY;
        }
        let inv = 1.0 / det;
        Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        }
    }

    /// Componentwise comparison within `eps`, for drift checks.
    pub fn approx_eq(&self, other: &Affine, eps: f32) -> bool {
        (self.a - other.a).abs() <= eps
            && (self.b - other.b).abs() <= eps
            && (self.c - other.c).abs() <= eps
            && (self.d - other.d).abs() <= eps
            && (self.tx - other.tx).abs() <= eps
            && (self.ty - other.ty).abs() <= eps
    }
}

// ---------------------------------------------------------------------------
//  Origin angle + axis remap
// ---------------------------------------------------------------------------

/// The screen rotation baked into a sticker's placement frame.
///
/// The editor lays stickers out in a coordinate frame that is pre-rotated by
/// one of the four cardinal angles. Every translation fed into the placement
/// transform has to be remapped into that rotated frame; [`OriginAngle::remap`]
/// is the single place those four cases live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginAngle {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl OriginAngle {
    pub fn all() -> &'static [OriginAngle] {
        &[
            OriginAngle::Deg0,
            OriginAngle::Deg90,
            OriginAngle::Deg180,
            OriginAngle::Deg270,
        ]
    }

    pub fn radians(self) -> f32 {
        match self {
            OriginAngle::Deg0 => 0.0,
            OriginAngle::Deg90 => std::f32::consts::FRAC_PI_2,
            OriginAngle::Deg180 => std::f32::consts::PI,
            OriginAngle::Deg270 => 1.5 * std::f32::consts::PI,
        }
    }

    /// The angle that undoes this one.
    pub fn inverse(self) -> OriginAngle {
        match self {
            OriginAngle::Deg0 => OriginAngle::Deg0,
            OriginAngle::Deg90 => OriginAngle::Deg270,
            OriginAngle::Deg180 => OriginAngle::Deg180,
            OriginAngle::Deg270 => OriginAngle::Deg90,
        }
    }

    /// Remap a translation from the unrotated canvas frame into the
    /// pre-rotated placement frame.
    ///
    /// Used identically by the live gesture update, the pan-end fold, and
    /// the canvas-rescale fold — the three call sites must never disagree.
    pub fn remap(self, v: Vec2) -> Vec2 {
        match self {
            OriginAngle::Deg0 => vec2(v.x, v.y),
            OriginAngle::Deg90 => vec2(v.y, -v.x),
            OriginAngle::Deg180 => vec2(-v.x, -v.y),
            OriginAngle::Deg270 => vec2(-v.y, v.x),
        }
    }
}

// ---------------------------------------------------------------------------
//  Layout sizing
// ---------------------------------------------------------------------------

/// Compute the on-canvas size for a newly placed sticker.
///
/// The image is fitted so its longer side lands between `MIN_STICKER_SIDE`
/// and a quarter of the container width, preserving aspect ratio, then both
/// dimensions are padded by `2 × EDGE_INSET` for the border and handles.
pub fn calculate_size(image_size: Vec2, container_width: f32) -> Vec2 {
    let max_side = container_width / 4.0;
    let min_side = MIN_STICKER_SIDE;
    let wh_ratio = image_size.x / image_size.y;
    let mut size = if wh_ratio >= 1.0 {
        let w = max_side.min(min_side.max(image_size.x));
        vec2(w, w / wh_ratio)
    } else {
        let h = max_side.min(min_side.max(image_size.x));
        vec2(h * wh_ratio, h)
    };
    size.x += EDGE_INSET * 2.0;
    size.y += EDGE_INSET * 2.0;
    size
}

/// Euclidean distance between two points.
pub fn point_distance(p1: Pos2, p2: Pos2) -> f32 {
    let fx = p2.x - p1.x;
    let fy = p2.y - p1.y;
    (fx * fx + fy * fy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_vec2_eq(a: Vec2, b: Vec2) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_remap_deg0_is_identity() {
        assert_vec2_eq(OriginAngle::Deg0.remap(vec2(3.0, -7.5)), vec2(3.0, -7.5));
    }

    #[test]
    fn test_remap_deg90_swaps_and_negates() {
        assert_vec2_eq(OriginAngle::Deg90.remap(vec2(10.0, 0.0)), vec2(0.0, -10.0));
        assert_vec2_eq(OriginAngle::Deg90.remap(vec2(0.0, 4.0)), vec2(4.0, 0.0));
    }

    #[test]
    fn test_remap_deg180_negates_both() {
        assert_vec2_eq(OriginAngle::Deg180.remap(vec2(2.0, 3.0)), vec2(-2.0, -3.0));
    }

    #[test]
    fn test_remap_deg270_swaps_and_negates() {
        assert_vec2_eq(OriginAngle::Deg270.remap(vec2(10.0, 0.0)), vec2(0.0, 10.0));
        assert_vec2_eq(OriginAngle::Deg270.remap(vec2(0.0, 4.0)), vec2(-4.0, 0.0));
    }

    #[test]
    fn test_remap_inverse_round_trips() {
        let v = vec2(12.5, -3.25);
        for &angle in OriginAngle::all() {
            assert_vec2_eq(angle.inverse().remap(angle.remap(v)), v);
        }
    }

    #[test]
    fn test_remap_is_linear_in_negation() {
        let v = vec2(-8.0, 5.0);
        for &angle in OriginAngle::all() {
            assert_vec2_eq(angle.remap(-v), -angle.remap(v));
        }
    }

    #[test]
    fn test_pre_translate_applies_first() {
        // Scale 2 with a prepended translation of (3, 4): the point moves
        // by the translation, then the whole thing is scaled.
        let t = Affine::IDENTITY.pre_scale(2.0).pre_translate(vec2(3.0, 4.0));
        let p = t.apply(pos2(1.0, 1.0));
        assert!((p.x - 8.0).abs() < EPS && (p.y - 10.0).abs() < EPS);
    }

    #[test]
    fn test_rotation_angle_round_trips() {
        for deg in [0.0f32, 30.0, 90.0, 145.0, -60.0] {
            let rad = deg.to_radians();
            let t = Affine::IDENTITY.pre_rotate(rad);
            let extracted = t.angle();
            let diff = (extracted - rad).rem_euclid(std::f32::consts::TAU);
            assert!(diff < EPS || (std::f32::consts::TAU - diff) < EPS);
        }
    }

    #[test]
    fn test_invert_round_trips_points() {
        let t = Affine::IDENTITY
            .pre_rotate(0.8)
            .pre_translate(vec2(14.0, -3.0))
            .pre_scale(2.5);
        let p = pos2(7.0, 11.0);
        let q = t.invert().apply(t.apply(p));
        assert!((q.x - p.x).abs() < 1e-3 && (q.y - p.y).abs() < 1e-3);
    }

    #[test]
    fn test_uniform_scale_commutes_with_rotation() {
        let a = Affine::IDENTITY.pre_scale(1.7).pre_rotate(0.6);
        let b = Affine::IDENTITY.pre_rotate(0.6).pre_scale(1.7);
        assert!(a.approx_eq(&b, EPS));
    }

    #[test]
    fn test_calculate_size_landscape() {
        // 200×100 image in an 800-wide container: max side 200, ratio 2,
        // width clamps to 200, height follows at 100, both padded by 22.
        let size = calculate_size(vec2(200.0, 100.0), 800.0);
        assert_vec2_eq(size, vec2(222.0, 122.0));
    }

    #[test]
    fn test_calculate_size_small_image_grows_to_minimum() {
        let size = calculate_size(vec2(40.0, 40.0), 800.0);
        assert_vec2_eq(size, vec2(102.0, 102.0));
    }

    #[test]
    fn test_calculate_size_portrait_clamps_on_width() {
        // Portrait branch clamps the image *width* between the min and max
        // sides and derives the width from the ratio.
        let size = calculate_size(vec2(100.0, 200.0), 800.0);
        assert_vec2_eq(size, vec2(72.0, 122.0));
    }

    #[test]
    fn test_point_distance() {
        assert!((point_distance(pos2(0.0, 0.0), pos2(3.0, 4.0)) - 5.0).abs() < EPS);
    }
}
