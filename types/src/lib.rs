//! Shared configuration types for ALBRT
//!
//! This crate contains the serializable types shared between the runtime core
//! (albrt-core), the renderer (albrt-overlay) and anything that edits or stores
//! overlay settings.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Mask & Animation Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Which visual pattern is rendered into the eye overlay textures.
///
/// Discriminants are stable: new variants take the next value and deprecated
/// variants are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskType {
    None = 0,
    /// Image file mask. Deprecated, kept so old settings still parse.
    Image = 1,
    /// Flat or radial colour patch (2D)
    #[default]
    Patch = 2,
    /// Alternating slats, reciprocal between eyes (2D)
    Slat = 3,
    /// Reserved 3D fog mask. Selectable, renders nothing new.
    Fog = 4,
}

impl MaskType {
    /// Value handed to the mask kernel as the `maskType` uniform
    pub fn uniform_value(self) -> i32 {
        self as i32
    }

    /// Returns true for the mask types drawn by the 2D program
    pub fn is_2d(self) -> bool {
        matches!(self, MaskType::Patch | MaskType::Slat)
    }
}

/// Alpha-over-time animation curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimationType {
    None = 0,
    /// Ramp 0 → 1, repeating every period
    A01 = 1,
    /// Ramp 1 → 0, repeating every period
    A10 = 2,
    /// Sinusoidal fade in and out
    #[default]
    #[serde(alias = "APINGPONG")]
    PingPong = 3,
}

/// Patch mask shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchType {
    None = 0,
    Flat = 1,
    #[default]
    Radial = 2,
}

/// Fog mask styles (reserved for the 3D mask path)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FogType {
    None = 0,
    #[default]
    Clouds = 1,
    GridWindows = 2,
    DotWindows = 3,
}

/// Which eye texture(s) receive the mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eye {
    None = 0,
    Left = 1,
    Right = 2,
    #[default]
    Both = 3,
}

impl Eye {
    pub fn includes_left(self) -> bool {
        matches!(self, Eye::Left | Eye::Both)
    }

    pub fn includes_right(self) -> bool {
        matches!(self, Eye::Right | Eye::Both)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Colours & Vectors
// ─────────────────────────────────────────────────────────────────────────────

/// Linear RGB colour, each channel 0.0 - 1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub [f32; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0.0, 0.0, 0.0]);

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }
}

/// Linear RGBA colour, each channel 0.0 - 1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub const OPAQUE_BLACK: Rgba = Rgba([0.0, 0.0, 0.0, 1.0]);
}

/// Plain 3-component vector (fog drift direction)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vec3(pub [f32; 3]);

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Overlay Settings
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_alpha() -> f32 {
    1.0
}

fn default_patch_radial_size() -> f32 {
    0.05
}

fn default_patch_radial_softness() -> f32 {
    0.2
}

fn default_slat_height() -> f32 {
    0.5
}

fn default_slat_slice_height() -> f32 {
    0.1
}

fn default_alpha_t_speed() -> f32 {
    3.0
}

/// Every persisted overlay property, as written to `settings.json`.
///
/// Missing fields fall back to their defaults so older or hand-edited files
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySettings {
    /// Static overlay opacity (0 = invisible, 1 = opaque)
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default)]
    pub overlay_mask_type: MaskType,

    #[serde(default)]
    pub patch_colour: Rgb,
    #[serde(default)]
    pub patch_type: PatchType,
    #[serde(default = "default_patch_radial_size")]
    pub patch_radial_size: f32,
    #[serde(default = "default_patch_radial_softness")]
    pub patch_radial_softness: f32,

    #[serde(default)]
    pub slat_colour: Rgb,
    /// Fraction of a slice (slat + gap) that is slat
    #[serde(default = "default_slat_height")]
    pub slat_height: f32,
    /// Fraction of the viewport one slice fills
    #[serde(default = "default_slat_slice_height")]
    pub slat_slice_height: f32,
    #[serde(default)]
    pub slat_slice_offset: f32,

    #[serde(default = "default_true")]
    pub hide_in_dash: bool,
    #[serde(default = "default_true")]
    pub overlays_visible: bool,
    #[serde(default)]
    pub eye_to_render: Eye,
    #[serde(default)]
    pub eyes_switched: bool,

    #[serde(default)]
    pub alpha_t_enabled: bool,
    /// Alpha-over-time period in seconds
    #[serde(default = "default_alpha_t_speed")]
    pub alpha_t_speed: f32,
    #[serde(default)]
    pub alpha_t_type: AnimationType,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            overlay_mask_type: MaskType::Patch,
            patch_colour: Rgb::BLACK,
            patch_type: PatchType::Radial,
            patch_radial_size: default_patch_radial_size(),
            patch_radial_softness: default_patch_radial_softness(),
            slat_colour: Rgb::BLACK,
            slat_height: default_slat_height(),
            slat_slice_height: default_slat_slice_height(),
            slat_slice_offset: 0.0,
            hide_in_dash: true,
            overlays_visible: true,
            eye_to_render: Eye::Both,
            eyes_switched: false,
            alpha_t_enabled: false,
            alpha_t_speed: default_alpha_t_speed(),
            alpha_t_type: AnimationType::PingPong,
        }
    }
}
