//! Common colour helpers for the mask kernel

use albrt_types::Rgb;
use tiny_skia::Color;

/// Map a 0.0 - 1.0 channel to 0 - 255, clamping out-of-range input
#[inline]
pub fn unit_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert an opaque [`Rgb`] to a tiny_skia Color
#[inline]
pub fn color_from_rgb(rgb: Rgb) -> Color {
    let [r, g, b] = rgb.0;
    Color::from_rgba8(unit_to_u8(r), unit_to_u8(g), unit_to_u8(b), 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_clamp() {
        assert_eq!(unit_to_u8(-1.0), 0);
        assert_eq!(unit_to_u8(0.5), 128);
        assert_eq!(unit_to_u8(7.0), 255);
        assert_eq!(unit_to_u8(f32::NAN), 0);
    }
}
