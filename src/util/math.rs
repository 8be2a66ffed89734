//! Math type re-exports and transform helpers.
//!
//! Re-exports the `glam` types used across the crate and adds the
//! bounding box and matrix-inverse helpers the scene builder relies on.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Axis-aligned bounding box in a single coordinate space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Empty bounds (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Check if no point has been added yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[inline]
    pub fn merge(&mut self, other: &Bounds) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Transform all 8 corners and return the enclosing box.
    pub fn transformed(&self, transform: &Mat4) -> Bounds {
        if self.is_empty() {
            return Bounds::EMPTY;
        }
        let mut out = Bounds::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(transform.transform_point3(corner));
        }
        out
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Relative volume below which a transform counts as singular.
const SINGULAR_VOLUME: f32 = 1e-6;

/// Invert a transform, rejecting singular or non-finite results.
///
/// An exact zero determinant is rare in floats: a flattening scale wrapped in
/// rotations leaves a tiny residue. The determinant of the linear part is
/// compared against the volume spanned by its axis lengths, which is scale
/// independent, and the inverse must reproduce the identity.
pub fn checked_inverse(m: &Mat4) -> Option<Mat4> {
    if !m.is_finite() {
        return None;
    }
    let upper = Mat3::from_mat4(*m);
    let volume = upper.x_axis.length() * upper.y_axis.length() * upper.z_axis.length();
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() || volume == 0.0 {
        return None;
    }
    if upper.determinant().abs() <= volume * SINGULAR_VOLUME {
        return None;
    }
    let inv = m.inverse();
    if !inv.is_finite() || !is_identity(&(inv * *m), 1e-3) {
        return None;
    }
    Some(inv)
}

/// Matrix that transforms normals: transpose of the inverse of the upper 3x3.
/// Falls back to the upper 3x3 itself for singular transforms.
pub fn normal_matrix(m: &Mat4) -> Mat3 {
    let upper = Mat3::from_mat4(*m);
    if upper.determinant() == 0.0 {
        return upper;
    }
    upper.inverse().transpose()
}

/// Whether `m` is the identity within `eps` per element.
pub fn is_identity(m: &Mat4, eps: f32) -> bool {
    m.abs_diff_eq(Mat4::IDENTITY, eps)
}
