//! Parameter mapping from [`EncodeOptions`] to backend-native settings.
//!
//! The two backends disagree on almost every knob: AVIF takes a quantizer
//! and a speed, JPEG XL a butteraugli distance and an effort; AVIF describes
//! color with CICP code points, JPEG XL with a structured color encoding.
//! The rules both share live here.

pub mod avif;
pub mod jxl;

pub use avif::AvifEncodePlan;
pub use jxl::JxlEncodePlan;

use crate::config::{ColorSpace, EncodeOptions, EncodeTransfer};

const DEFAULT_QUALITY: f32 = 75.0;
const DEFAULT_AVIF_SPEED: u8 = 6;
const DEFAULT_JXL_EFFORT: u8 = 7;

/// Quality clamped to 0-100. Non-finite values fall back to the default.
pub(crate) fn clamp_quality(quality: f32) -> f32 {
    if quality.is_finite() {
        quality.clamp(0.0, 100.0)
    } else {
        DEFAULT_QUALITY
    }
}

/// Transfer function to signal, given the output depth.
///
/// An explicit choice wins. Otherwise wide-gamut content deeper than 8 bits
/// is assumed to be PQ, and everything else sRGB.
pub fn resolve_transfer(options: &EncodeOptions, depth: u32) -> EncodeTransfer {
    options.transfer_function.unwrap_or(
        if options.color_space == ColorSpace::Rec2020 && depth > 8 {
            EncodeTransfer::Pq
        } else {
            EncodeTransfer::Srgb
        },
    )
}

/// AVIF speed in 0..=10. Falls back to the mirror of `effort`.
pub fn avif_speed(options: &EncodeOptions) -> u8 {
    options
        .speed
        .or_else(|| options.effort.map(|e| 10 - e.min(10)))
        .unwrap_or(DEFAULT_AVIF_SPEED)
        .min(10)
}

/// JPEG XL effort in 1..=10. Falls back to the mirror of `speed`.
pub fn jxl_effort(options: &EncodeOptions) -> u8 {
    options
        .effort
        .or_else(|| options.speed.map(|s| 10 - s.min(10)))
        .unwrap_or(DEFAULT_JXL_EFFORT)
        .clamp(1, 10)
}

/// Worker threads for one call: the request, capped by what the backend
/// reports it can run, and never below 1.
pub fn effective_threads(requested: usize, capability: usize) -> usize {
    requested.min(capability).max(1)
}
