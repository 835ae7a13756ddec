//! AVIF encoding through the pure-Rust `ravif` encoder.
//!
//! Encode only. `ravif` takes 8-bit RGB or RGBA, always codes 4:4:4, and
//! signals sRGB, so the requested subsampling and CICP are advisory.

use core::convert::Infallible;
use core::num::NonZeroUsize;

use ::ravif::{BitDepth, ColorModel, Encoder, Img, RGB8, RGBA8};

use super::avif::{
    AvifBackend, AvifEncodeImage, AvifEncoder, AvifEncoderSettings, Cicp, CicpPrimaries,
    CicpTransfer, RgbFormat, RgbView, YuvFormat, YuvRange,
};
use crate::error::BackendError;

/// AVIF backend backed by `ravif`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RavifBackend;

impl AvifBackend for RavifBackend {
    type Decoder<'input> = Infallible;
    type Image = RavifImage;
    type Encoder = RavifEncoder;

    fn max_threads(&self) -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        None
    }

    fn create_image(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        yuv_format: YuvFormat,
    ) -> Option<RavifImage> {
        if yuv_format != YuvFormat::Yuv444 {
            tracing::warn!(?yuv_format, "ravif always encodes 4:4:4");
        }
        Some(RavifImage {
            width: width as usize,
            height: height as usize,
            depth,
            pixels: Pixels::Empty,
        })
    }

    fn create_encoder(&self) -> Option<RavifEncoder> {
        Some(RavifEncoder::default())
    }
}

#[derive(Debug)]
enum Pixels {
    Empty,
    Rgb(Vec<RGB8>),
    Rgba(Vec<RGBA8>),
}

/// Pixels staged for [`RavifEncoder::write`].
#[derive(Debug)]
pub struct RavifImage {
    width: usize,
    height: usize,
    /// Coded depth requested by the caller.
    depth: u32,
    pixels: Pixels,
}

impl AvifEncodeImage for RavifImage {
    fn set_color(&mut self, cicp: Cicp, range: YuvRange) {
        let srgb = cicp.color_primaries == CicpPrimaries::BT709
            && cicp.transfer_characteristics == CicpTransfer::SRGB;
        if !srgb || range != YuvRange::Full {
            tracing::warn!(?cicp, ?range, "ravif signals sRGB full range only");
        }
    }

    fn set_icc_profile(&mut self, _icc: &[u8]) -> Result<(), BackendError> {
        Err(BackendError::new("ravif cannot embed ICC profiles"))
    }

    fn rgb_to_yuv(&mut self, rgb: &RgbView<'_>) -> Result<(), BackendError> {
        if rgb.depth != 8 {
            return Err(BackendError::new(format!(
                "ravif takes 8-bit input, got {}-bit",
                rgb.depth
            )));
        }
        let channels = rgb.format.channels() as usize;
        let row_len = self.width * channels;
        if rgb.row_bytes < row_len || rgb.pixels.len() < rgb.row_bytes * self.height {
            return Err(BackendError::new("pixel buffer does not match image geometry"));
        }
        let rows = rgb.pixels.chunks(rgb.row_bytes).take(self.height);
        self.pixels = match rgb.format {
            RgbFormat::Rgb => Pixels::Rgb(
                rows.flat_map(|row| row[..row_len].chunks_exact(3))
                    .map(|p| RGB8::new(p[0], p[1], p[2]))
                    .collect(),
            ),
            RgbFormat::Rgba => Pixels::Rgba(
                rows.flat_map(|row| row[..row_len].chunks_exact(4))
                    .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
                    .collect(),
            ),
            RgbFormat::Gray | RgbFormat::GrayAlpha => {
                return Err(BackendError::new("ravif takes RGB or RGBA input"));
            }
        };
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RavifEncoder {
    settings: Option<AvifEncoderSettings>,
}

impl AvifEncoder for RavifEncoder {
    type Image = RavifImage;

    fn configure(&mut self, settings: &AvifEncoderSettings) -> Result<(), BackendError> {
        self.settings = Some(*settings);
        Ok(())
    }

    fn write(&mut self, image: &RavifImage) -> Result<Vec<u8>, BackendError> {
        let settings = self
            .settings
            .ok_or_else(|| BackendError::new("encoder is not configured"))?;
        let encoder = Encoder::new()
            .with_quality(f32::from(settings.quality.clamp(1, 100)))
            .with_alpha_quality(f32::from(settings.quality_alpha.clamp(1, 100)))
            .with_speed(settings.speed.clamp(1, 10))
            .with_bit_depth(if image.depth > 8 {
                BitDepth::Ten
            } else {
                BitDepth::Eight
            })
            .with_internal_color_model(if settings.lossless {
                ColorModel::RGB
            } else {
                ColorModel::YCbCr
            })
            .with_num_threads(Some(settings.max_threads.max(1)));

        let encoded = match &image.pixels {
            Pixels::Rgb(px) => {
                encoder.encode_rgb(Img::new(px.as_slice(), image.width, image.height))
            }
            Pixels::Rgba(px) => {
                encoder.encode_rgba(Img::new(px.as_slice(), image.width, image.height))
            }
            Pixels::Empty => return Err(BackendError::new("image has no pixels")),
        }
        .map_err(|e| BackendError::new(e.to_string()))?;
        Ok(encoded.avif_file)
    }
}
