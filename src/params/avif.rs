//! AVIF encoder parameters.

use super::{avif_speed, clamp_quality, effective_threads, resolve_transfer};
use crate::backend::{
    AvifEncoderSettings, Cicp, CicpMatrix, CicpPrimaries, CicpTransfer, YuvFormat, YuvRange,
};
use crate::config::{ChromaSubsampling, ColorSpace, EncodeOptions, EncodeTransfer, Tune};

/// Everything the AVIF encode pipeline configures on the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvifEncodePlan {
    pub yuv_format: YuvFormat,
    /// Coded depth: 8, 10 or 12.
    pub depth: u32,
    pub cicp: Cicp,
    pub range: YuvRange,
    pub settings: AvifEncoderSettings,
}

impl AvifEncodePlan {
    /// Map `options` for input of `input_depth` bits on a backend that can
    /// run `thread_capability` workers.
    pub fn new(options: &EncodeOptions, input_depth: u32, thread_capability: usize) -> Self {
        let depth = coded_depth(options.bit_depth.unwrap_or(input_depth));
        let yuv_format = if options.lossless {
            YuvFormat::Yuv444
        } else {
            yuv_format(options.chroma_subsampling)
        };

        let cicp = Cicp {
            color_primaries: primaries(options.color_space),
            transfer_characteristics: transfer(resolve_transfer(options, depth)),
            // Lossless RGB needs the identity matrix to survive the YUV round trip.
            matrix_coefficients: if options.lossless {
                CicpMatrix::IDENTITY
            } else {
                CicpMatrix::BT601
            },
        };

        let (quality, quality_alpha) = if options.lossless {
            (100, 100)
        } else {
            let q = clamp_quality(options.quality);
            let qa = clamp_quality(options.quality_alpha.unwrap_or(q));
            (q.round() as u8, qa.round() as u8)
        };

        Self {
            yuv_format,
            depth,
            cicp,
            range: YuvRange::Full,
            settings: AvifEncoderSettings {
                quality,
                quality_alpha,
                quantizer: quantizer(quality),
                quantizer_alpha: quantizer(quality_alpha),
                speed: avif_speed(options),
                max_threads: effective_threads(options.max_threads, thread_capability),
                auto_tiling: options.tune == Tune::Ssim,
                lossless: options.lossless,
            },
        }
    }
}

/// Inverted 0-63 quantizer scale: quality 100 is quantizer 0.
pub fn quantizer(quality: u8) -> u8 {
    let q = u32::from(quality.min(100));
    (63 - q * 63 / 100) as u8
}

/// Snap a requested depth to one AV1 can code.
fn coded_depth(depth: u32) -> u32 {
    match depth {
        0..=8 => 8,
        9..=10 => 10,
        _ => 12,
    }
}

fn yuv_format(subsampling: ChromaSubsampling) -> YuvFormat {
    match subsampling {
        ChromaSubsampling::Yuv444 => YuvFormat::Yuv444,
        ChromaSubsampling::Yuv422 => YuvFormat::Yuv422,
        ChromaSubsampling::Yuv420 => YuvFormat::Yuv420,
        ChromaSubsampling::Yuv400 => YuvFormat::Yuv400,
    }
}

fn primaries(color_space: ColorSpace) -> CicpPrimaries {
    match color_space {
        ColorSpace::Srgb => CicpPrimaries::BT709,
        ColorSpace::DisplayP3 => CicpPrimaries::SMPTE432,
        ColorSpace::Rec2020 => CicpPrimaries::BT2020,
    }
}

fn transfer(transfer: EncodeTransfer) -> CicpTransfer {
    match transfer {
        EncodeTransfer::Srgb => CicpTransfer::SRGB,
        EncodeTransfer::Pq => CicpTransfer::PQ,
        EncodeTransfer::Hlg => CicpTransfer::HLG,
        EncodeTransfer::Linear => CicpTransfer::LINEAR,
    }
}
