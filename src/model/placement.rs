//! Initial placement of a freshly loaded model on the ground plane.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::ModelTree;

/// How a loaded model is oriented, scaled and dropped onto the floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementOptions {
    /// Rotation about X in radians, applied first (assets authored Z-up).
    pub rotate_x: f32,
    /// Uniform scale (assets authored in millimetres).
    pub scale: f32,
    /// Center the model on the XZ origin.
    pub center_xz: bool,
    /// Rest the lowest point on y = 0.
    pub rest_on_ground: bool,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            rotate_x: -std::f32::consts::FRAC_PI_2,
            scale: 0.001,
            center_xz: true,
            rest_on_ground: true,
        }
    }
}

impl PlacementOptions {
    /// Keep the model as authored.
    pub fn identity() -> Self {
        Self {
            rotate_x: 0.0,
            scale: 1.0,
            center_xz: false,
            rest_on_ground: false,
        }
    }
}

/// Model-to-world transform that applies `options` to `tree`.
pub fn ground_transform(tree: &ModelTree, options: &PlacementOptions) -> Mat4 {
    let base = Mat4::from_scale_rotation_translation(
        Vec3::splat(options.scale),
        Quat::from_rotation_x(options.rotate_x),
        Vec3::ZERO,
    );

    let bounds = tree.bounds().transformed(&base);
    if bounds.is_empty() {
        return base;
    }

    let center = bounds.center();
    let mut offset = Vec3::ZERO;
    if options.center_xz {
        offset.x = -center.x;
        offset.z = -center.z;
    }
    if options.rest_on_ground {
        offset.y = -bounds.min.y;
    }
    Mat4::from_translation(offset) * base
}
