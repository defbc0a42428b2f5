//! Per-eye overlay placement
//!
//! Both overlays sit just past the near clip plane, in front of their eye.
//! The lateral offset is the measured half-IPD pulled inward so the two quad
//! centres coincide at the overlay distance.

use crate::vr::{EyeSlot, Matrix34};

/// Overlay depth: near clip (0.1 m) plus 1 mm. Stored negated (forward is -z).
pub const OVERLAY_Z: f32 = -0.101;

/// Quad width at 1 m distance, in metres
pub const QUAD_SIZE_AT_ONE_METRE: f32 = 2.4;

/// Sentinel for "no half-IPD measured yet"
pub const UNMEASURED_HALF_IPD: f32 = f32::MIN;

/// Positive overlay distance in metres
pub fn overlay_distance() -> f32 {
    -OVERLAY_Z
}

/// Overlay width in metres at the overlay distance
pub fn overlay_width() -> f32 {
    QUAD_SIZE_AT_ONE_METRE * overlay_distance()
}

/// `h - (h*d)/2`: half-IPD shifted inward for quads placed `d` metres out.
/// Sign follows `h`.
pub fn corrected_half_ipd(half_ipd: f32, distance: f32) -> f32 {
    half_ipd - (half_ipd * distance) / 2.0
}

/// Resolved transforms for both eyes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeTransforms {
    pub left: Matrix34,
    pub right: Matrix34,
}

impl EyeTransforms {
    pub fn for_slot(&self, slot: EyeSlot) -> &Matrix34 {
        match slot {
            EyeSlot::Left => &self.left,
            EyeSlot::Right => &self.right,
        }
    }
}

/// Tracks the last measured half-IPD and produces eye transforms from it.
#[derive(Debug, Clone)]
pub struct TransformResolver {
    half_ipd: f32,
}

impl Default for TransformResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformResolver {
    pub fn new() -> Self {
        Self {
            half_ipd: UNMEASURED_HALF_IPD,
        }
    }

    pub fn half_ipd(&self) -> f32 {
        self.half_ipd
    }

    /// Compare the right eye's lateral offset against the cached half-IPD.
    /// Returns true (and caches the new value) when it moved.
    pub fn observe(&mut self, right_eye_to_head: &Matrix34) -> bool {
        let measured = right_eye_to_head.m[0][3];
        if measured == self.half_ipd {
            return false;
        }
        self.half_ipd = measured;
        true
    }

    /// Build both eye transforms from the right eye-to-head base and the
    /// cached half-IPD.
    pub fn resolve(&self, right_eye_to_head: &Matrix34) -> EyeTransforms {
        let half_ipd = if self.half_ipd == UNMEASURED_HALF_IPD {
            right_eye_to_head.m[0][3]
        } else {
            self.half_ipd
        };
        let corrected = corrected_half_ipd(half_ipd, overlay_distance());

        let mut right = *right_eye_to_head;
        right.m[2][3] = OVERLAY_Z;
        right.m[0][3] = corrected;

        let mut left = right;
        left.m[0][3] = -corrected;

        EyeTransforms { left, right }
    }

    /// Full IPD for display, e.g. "63.00mm"
    pub fn readable_ipd(&self) -> String {
        if self.half_ipd == UNMEASURED_HALF_IPD {
            return "--".to_string();
        }
        millimetres(self.half_ipd * 2.0)
    }
}

pub fn readable_overlay_depth() -> String {
    millimetres(overlay_distance())
}

pub fn readable_overlay_width() -> String {
    millimetres(overlay_width())
}

fn millimetres(metres: f32) -> String {
    format!("{:.2}mm", metres * 1000.0)
}
