//! JPEG XL encoder parameters.

use super::{clamp_quality, effective_threads, jxl_effort, resolve_transfer};
use crate::backend::{
    JxlBasicInfo, JxlColorEncoding, JxlFrameSettings, JxlPixelFormat, JxlPrimaries,
    JxlTransferFunction, JxlWhitePoint,
};
use crate::config::{ColorSpace, EncodeOptions, EncodeTransfer};
use crate::pixel::DataType;

/// Distance units per quality point below 100.
const DISTANCE_PER_QUALITY_POINT: f32 = 0.15;

/// Everything the JPEG XL encode pipeline hands to the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JxlEncodePlan {
    pub basic_info: JxlBasicInfo,
    pub color_encoding: JxlColorEncoding,
    pub frame: JxlFrameSettings,
    pub pixel_format: JxlPixelFormat,
    pub threads: usize,
}

impl JxlEncodePlan {
    /// Map `options` for a `width × height` image of `channels` interleaved
    /// samples of `data_type`, `input_depth` bits deep.
    pub fn new(
        options: &EncodeOptions,
        width: u32,
        height: u32,
        channels: u32,
        data_type: DataType,
        input_depth: u32,
        thread_capability: usize,
    ) -> Self {
        let (bits_per_sample, exponent_bits_per_sample) = match data_type {
            DataType::Float32 => (32, 8),
            DataType::Float16 => (16, 5),
            DataType::Uint8 | DataType::Uint16 => {
                (options.bit_depth.unwrap_or(input_depth).clamp(8, 16), 0)
            }
        };
        let has_alpha = channels == 2 || channels == 4;
        let is_gray = channels < 3;

        let basic_info = JxlBasicInfo {
            xsize: width,
            ysize: height,
            bits_per_sample,
            exponent_bits_per_sample,
            num_color_channels: if is_gray { 1 } else { 3 },
            num_extra_channels: u32::from(has_alpha),
            alpha_bits: if has_alpha { bits_per_sample } else { 0 },
            alpha_exponent_bits: if has_alpha {
                exponent_bits_per_sample
            } else {
                0
            },
            have_animation: false,
            // Lossless must skip the XYB transform.
            uses_original_profile: options.lossless,
        };

        let mut color_encoding = JxlColorEncoding::srgb(is_gray);
        match options.color_space {
            ColorSpace::Srgb => {}
            ColorSpace::DisplayP3 => {
                color_encoding.primaries = JxlPrimaries::P3;
                color_encoding.white_point = JxlWhitePoint::D65;
            }
            ColorSpace::Rec2020 => {
                color_encoding.primaries = JxlPrimaries::Rec2100;
                color_encoding.white_point = JxlWhitePoint::D65;
            }
        }
        color_encoding.transfer_function = match resolve_transfer(options, bits_per_sample) {
            EncodeTransfer::Srgb => JxlTransferFunction::Srgb,
            EncodeTransfer::Pq => JxlTransferFunction::Pq,
            EncodeTransfer::Hlg => JxlTransferFunction::Hlg,
            EncodeTransfer::Linear => JxlTransferFunction::Linear,
        };

        Self {
            basic_info,
            color_encoding,
            frame: JxlFrameSettings {
                distance: quality_to_distance(options.quality, options.lossless),
                lossless: options.lossless,
                effort: jxl_effort(options),
                responsive: options.progressive,
            },
            pixel_format: JxlPixelFormat {
                num_channels: channels,
                data_type: data_type.to_jxl(),
                align: 0,
            },
            threads: effective_threads(options.max_threads, thread_capability),
        }
    }
}

/// Map 0-100 quality onto butteraugli distance: 100 is 0.0, 0 is 15.0.
/// Lossless is exactly 0.
pub fn quality_to_distance(quality: f32, lossless: bool) -> f32 {
    if lossless {
        return 0.0;
    }
    (100.0 - clamp_quality(quality)) * DISTANCE_PER_QUALITY_POINT
}
