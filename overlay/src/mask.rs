//! CPU mask kernel
//!
//! Rasterises the 2D masks into one eye's stereo-wide target. The mask goes
//! into the left half of the target; the right half stays transparent, so
//! the side-by-side overlay flags deliver it to a single eye. Output is
//! premultiplied RGBA8.

use std::collections::HashMap;

use albrt_types::{Eye, MaskType, PatchType, Rgb};
use tiny_skia::{Color, ColorU8, Paint, Pixmap, Rect, Transform};

use crate::gpu::UniformValue;
use crate::utils::{color_from_rgb, unit_to_u8};

/// Mask parameters as seen by the kernel, decoded from uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    pub mask_type: MaskType,
    pub eye: Eye,
    pub patch_colour: Rgb,
    pub patch_type: PatchType,
    pub patch_radial_size: f32,
    pub patch_radial_softness: f32,
    pub slat_colour: Rgb,
    pub slat_height: f32,
    pub slice_height: f32,
    pub slice_offset: f32,
}

impl MaskParams {
    pub fn from_uniforms(uniforms: &HashMap<String, UniformValue>) -> Self {
        let int = |name: &str| match uniforms.get(name) {
            Some(UniformValue::Int(v)) => *v,
            _ => 0,
        };
        let float = |name: &str| match uniforms.get(name) {
            Some(UniformValue::Float(v)) => *v,
            _ => 0.0,
        };
        let vec3 = |name: &str| match uniforms.get(name) {
            Some(UniformValue::Vec3(v)) => Rgb(*v),
            _ => Rgb::BLACK,
        };

        Self {
            mask_type: mask_type_from_i32(int("maskType")),
            eye: eye_from_i32(int("eye")),
            patch_colour: vec3("patchColour"),
            patch_type: patch_type_from_i32(int("patchType")),
            patch_radial_size: float("patchRadialSize"),
            patch_radial_softness: float("patchRadialSoftness"),
            slat_colour: vec3("slatColour"),
            slat_height: float("slatHeight"),
            slice_height: float("sliceHeight"),
            slice_offset: float("sliceOffset"),
        }
    }
}

fn mask_type_from_i32(v: i32) -> MaskType {
    match v {
        1 => MaskType::Image,
        2 => MaskType::Patch,
        3 => MaskType::Slat,
        4 => MaskType::Fog,
        _ => MaskType::None,
    }
}

fn eye_from_i32(v: i32) -> Eye {
    match v {
        1 => Eye::Left,
        2 => Eye::Right,
        3 => Eye::Both,
        _ => Eye::None,
    }
}

fn patch_type_from_i32(v: i32) -> PatchType {
    match v {
        1 => PatchType::Flat,
        2 => PatchType::Radial,
        _ => PatchType::None,
    }
}

/// Which colour attachment is being drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    LeftEye,
    RightEye,
}

impl Target {
    pub fn from_attachment(index: usize) -> Option<Target> {
        match index {
            0 => Some(Target::LeftEye),
            1 => Some(Target::RightEye),
            _ => None,
        }
    }

    fn selected_by(self, eye: Eye) -> bool {
        match self {
            Target::LeftEye => eye.includes_left(),
            Target::RightEye => eye.includes_right(),
        }
    }
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Draw the mask for one target. Assumes the target was already cleared.
pub fn draw(pixmap: &mut Pixmap, params: &MaskParams, target: Target) {
    if !target.selected_by(params.eye) {
        return;
    }
    let half_width = pixmap.width() / 2;
    if half_width == 0 || pixmap.height() == 0 {
        return;
    }

    match params.mask_type {
        MaskType::Patch => draw_patch(pixmap, half_width, params),
        MaskType::Slat => draw_slats(pixmap, half_width, params, target),
        MaskType::None | MaskType::Image | MaskType::Fog => {}
    }
}

fn solid_paint(colour: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(colour);
    paint.anti_alias = false;
    paint
}

fn draw_patch(pixmap: &mut Pixmap, half_width: u32, params: &MaskParams) {
    match params.patch_type {
        PatchType::None => {}
        PatchType::Flat => {
            let height = pixmap.height() as f32;
            if let Some(rect) = Rect::from_xywh(0.0, 0.0, half_width as f32, height) {
                let paint = solid_paint(color_from_rgb(params.patch_colour));
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
        PatchType::Radial => draw_radial_patch(pixmap, half_width, params),
    }
}

/// Disc of radius `patchRadialSize` (in viewport units) fading out over
/// `patchRadialSoftness`
fn draw_radial_patch(pixmap: &mut Pixmap, half_width: u32, params: &MaskParams) {
    let width = pixmap.width() as usize;
    let height = pixmap.height();
    let size = params.patch_radial_size.max(0.0);
    let outer = size + params.patch_radial_softness.max(0.0);

    // Only pixels within the outer radius can be non-transparent
    let x0 = ((0.5 - outer) * half_width as f32).floor().max(0.0) as u32;
    let x1 = ((0.5 + outer) * half_width as f32).ceil().min(half_width as f32) as u32;
    let y0 = ((0.5 - outer) * height as f32).floor().max(0.0) as u32;
    let y1 = ((0.5 + outer) * height as f32).ceil().min(height as f32) as u32;

    let [r, g, b] = params.patch_colour.0;
    let (r, g, b) = (unit_to_u8(r), unit_to_u8(g), unit_to_u8(b));
    let pixels = pixmap.pixels_mut();

    for y in y0..y1 {
        let v = (y as f32 + 0.5) / height as f32;
        for x in x0..x1 {
            let u = (x as f32 + 0.5) / half_width as f32;
            let dist = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
            let alpha = 1.0 - smoothstep(size, outer, dist);
            if alpha <= 0.0 {
                continue;
            }
            pixels[y as usize * width + x as usize] =
                ColorU8::from_rgba(r, g, b, unit_to_u8(alpha)).premultiply();
        }
    }
}

/// Horizontal bands: a slice is `sliceHeight` of the viewport, the first
/// `slatHeight` fraction of each slice is slat. The right eye draws the gaps.
/// Slices are at least one pixel tall.
fn draw_slats(pixmap: &mut Pixmap, half_width: u32, params: &MaskParams, target: Target) {
    let height = pixmap.height() as f32;
    if !(params.slice_height.is_finite()
        && params.slice_height > 0.0
        && params.slice_offset.is_finite())
    {
        return;
    }
    let slice = params.slice_height.max(1.0 / height);
    let offset = params.slice_offset.rem_euclid(slice);
    let slat = params.slat_height.clamp(0.0, 1.0);
    let paint = solid_paint(color_from_rgb(params.slat_colour));

    // One slice above the viewport, then enough to cover it
    let bands = (1.0 / slice).ceil() as i64 + 2;
    for k in -1..bands {
        let slice_start = k as f32 * slice - offset;
        if slice_start >= 1.0 {
            break;
        }
        let (start, end) = match target {
            Target::LeftEye => (slice_start, slice_start + slat * slice),
            Target::RightEye => (slice_start + slat * slice, slice_start + slice),
        };

        let y0 = (start.max(0.0) * height).round();
        let y1 = (end.min(1.0) * height).round();
        if y1 > y0
            && let Some(rect) = Rect::from_xywh(0.0, y0, half_width as f32, y1 - y0)
        {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mask_type: MaskType) -> MaskParams {
        MaskParams {
            mask_type,
            eye: Eye::Both,
            patch_colour: Rgb::new(1.0, 0.0, 0.0),
            patch_type: PatchType::Flat,
            patch_radial_size: 0.1,
            patch_radial_softness: 0.1,
            slat_colour: Rgb::new(0.0, 0.0, 1.0),
            slat_height: 0.5,
            slice_height: 0.25,
            slice_offset: 0.0,
        }
    }

    fn alpha_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0)
    }

    #[test]
    fn flat_patch_fills_left_half_only() {
        let mut pixmap = Pixmap::new(64, 32).unwrap();
        draw(&mut pixmap, &params(MaskType::Patch), Target::LeftEye);

        let inside = pixmap.pixel(10, 10).unwrap();
        assert_eq!(inside.alpha(), 255);
        assert_eq!(inside.red(), 255);
        assert_eq!(alpha_at(&pixmap, 40, 10), 0);
    }

    #[test]
    fn radial_patch_is_opaque_at_centre_and_clear_at_edge() {
        let mut pixmap = Pixmap::new(128, 64).unwrap();
        let mut p = params(MaskType::Patch);
        p.patch_type = PatchType::Radial;

        draw(&mut pixmap, &p, Target::RightEye);

        assert_eq!(alpha_at(&pixmap, 32, 32), 255);
        assert_eq!(alpha_at(&pixmap, 1, 1), 0);
        let mid = alpha_at(&pixmap, 32 + 9, 32);
        assert!(mid > 0 && mid < 255, "falloff alpha {mid}");
    }

    #[test]
    fn slats_are_reciprocal_between_eyes() {
        let p = params(MaskType::Slat);
        let mut left = Pixmap::new(64, 80).unwrap();
        let mut right = Pixmap::new(64, 80).unwrap();

        draw(&mut left, &p, Target::LeftEye);
        draw(&mut right, &p, Target::RightEye);

        // slice = 20px, slat = first 10px of each slice
        for y in [2u32, 25, 45, 65] {
            assert_eq!(alpha_at(&left, 5, y), 255, "left slat row {y}");
            assert_eq!(alpha_at(&right, 5, y), 0, "right gap row {y}");
        }
        for y in [15u32, 35, 55, 75] {
            assert_eq!(alpha_at(&left, 5, y), 0, "left gap row {y}");
            assert_eq!(alpha_at(&right, 5, y), 255, "right slat row {y}");
        }
    }

    #[test]
    fn slice_offset_shifts_bands() {
        let mut p = params(MaskType::Slat);
        p.slice_offset = 0.125; // half a slice
        let mut left = Pixmap::new(64, 80).unwrap();

        draw(&mut left, &p, Target::LeftEye);

        assert_eq!(alpha_at(&left, 5, 2), 0);
        assert_eq!(alpha_at(&left, 5, 15), 255);
    }

    #[test]
    fn slice_offset_wraps_by_whole_slices() {
        let mut p = params(MaskType::Slat);
        p.slice_offset = 0.125 + 0.25 * 40.0;
        let mut left = Pixmap::new(64, 80).unwrap();

        draw(&mut left, &p, Target::LeftEye);

        assert_eq!(alpha_at(&left, 5, 2), 0);
        assert_eq!(alpha_at(&left, 5, 15), 255);
    }

    #[test]
    fn non_finite_slice_offset_draws_nothing() {
        for offset in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut p = params(MaskType::Slat);
            p.slice_offset = offset;
            let mut left = Pixmap::new(64, 80).unwrap();

            draw(&mut left, &p, Target::LeftEye);

            assert!(
                left.pixels().iter().all(|px| px.alpha() == 0),
                "offset {offset}"
            );
        }
    }

    #[test]
    fn sub_pixel_slice_height_is_drawn_one_pixel_tall() {
        let mut p = params(MaskType::Slat);
        p.slice_height = 1e-9;
        p.slat_height = 1.0;
        let mut left = Pixmap::new(64, 80).unwrap();

        draw(&mut left, &p, Target::LeftEye);

        for y in [0u32, 1, 40, 79] {
            assert_eq!(alpha_at(&left, 5, y), 255, "row {y}");
            assert_eq!(alpha_at(&left, 40, y), 0, "right half row {y}");
        }
    }

    #[test]
    fn eye_selection_skips_unselected_target() {
        let mut p = params(MaskType::Patch);
        p.eye = Eye::Left;
        let mut right = Pixmap::new(64, 32).unwrap();

        draw(&mut right, &p, Target::RightEye);

        assert!(right.pixels().iter().all(|px| px.alpha() == 0));
    }

    #[test]
    fn fog_and_none_draw_nothing() {
        for mask in [MaskType::Fog, MaskType::None, MaskType::Image] {
            let mut pixmap = Pixmap::new(16, 16).unwrap();
            draw(&mut pixmap, &params(mask), Target::LeftEye);
            assert!(pixmap.pixels().iter().all(|px| px.alpha() == 0));
        }
    }

    #[test]
    fn uniforms_decode() {
        let mut uniforms = HashMap::new();
        uniforms.insert("maskType".to_string(), UniformValue::Int(3));
        uniforms.insert("eye".to_string(), UniformValue::Int(2));
        uniforms.insert("sliceHeight".to_string(), UniformValue::Float(0.2));
        uniforms.insert("slatColour".to_string(), UniformValue::Vec3([0.1, 0.2, 0.3]));

        let decoded = MaskParams::from_uniforms(&uniforms);

        assert_eq!(decoded.mask_type, MaskType::Slat);
        assert_eq!(decoded.eye, Eye::Right);
        assert_eq!(decoded.slice_height, 0.2);
        assert_eq!(decoded.slat_colour, Rgb([0.1, 0.2, 0.3]));
        assert_eq!(decoded.patch_type, PatchType::None);
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.1, 0.3, 0.0), 0.0);
        assert_eq!(smoothstep(0.1, 0.3, 0.5), 1.0);
        assert!((smoothstep(0.1, 0.3, 0.2) - 0.5).abs() < 1e-6);
        assert_eq!(smoothstep(0.2, 0.2, 0.1), 0.0);
    }
}
