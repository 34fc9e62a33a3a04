//! Packed color conversions and brightness scaling

use crate::{LightRequest, RGB8};

/// Reference maximum brightness requests are expressed against.
pub const DEFAULT_MAX_BRIGHTNESS: u32 = 255;

/// RGB part of a packed ARGB value
const RGB_MASK: u32 = 0x00ff_ffff;

/// Unpack the RGB bytes of a packed ARGB color, ignoring alpha.
#[must_use]
pub fn channels(color: u32) -> RGB8 {
    let [_, r, g, b] = color.to_be_bytes();
    RGB8::new(r, g, b)
}

/// Pack RGB channels into a color with a zero alpha byte.
#[must_use]
pub fn pack(rgb: RGB8) -> u32 {
    u32::from_be_bytes([0, rgb.r, rgb.g, rgb.b])
}

/// Perceptual brightness of a packed color.
///
/// Fixed-point BT.601-style weights (77/150/29 out of 256), truncating.
/// The alpha byte is ignored. The result is always in `0..=255`.
#[must_use]
pub fn luma(color: u32) -> u32 {
    let c = channels(color);
    (77 * u32::from(c.r) + 150 * u32::from(c.g) + 29 * u32::from(c.b)) >> 8
}

/// Whether any of the RGB channels is non-zero.
#[must_use]
pub fn is_lit(color: u32) -> bool {
    color & RGB_MASK != 0
}

/// Apply the alpha byte as a brightness override.
///
/// Alpha values strictly between 0 and 255 scale each channel by
/// `alpha / 255` and the result is repacked with alpha cleared. Alpha 0 and
/// 255 both leave the request untouched, so a zero alpha does not mean
/// "invisible".
#[must_use]
pub fn apply_alpha_scale(request: LightRequest) -> LightRequest {
    let alpha = request.color >> 24;
    if alpha == 0 || alpha == DEFAULT_MAX_BRIGHTNESS {
        return request;
    }

    // channel * alpha / 255 < 255 for alpha < 255, so the result fits in u8
    let scale = |c: u8| u8::try_from(u32::from(c) * alpha / DEFAULT_MAX_BRIGHTNESS).unwrap_or(u8::MAX);
    let c = channels(request.color);

    LightRequest {
        color: pack(RGB8::new(scale(c.r), scale(c.g), scale(c.b))),
        ..request
    }
}

/// Rescale a brightness from the reference range to the panel's range.
///
/// Identity when the panel maximum equals [`DEFAULT_MAX_BRIGHTNESS`],
/// otherwise `brightness * panel_max / 255`, rounded down.
#[must_use]
pub fn scale_backlight(brightness: u32, panel_max: u32) -> u32 {
    if panel_max == DEFAULT_MAX_BRIGHTNESS {
        return brightness;
    }
    let scaled = u64::from(brightness) * u64::from(panel_max) / u64::from(DEFAULT_MAX_BRIGHTNESS);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}
