//! Encoder options shared by both backends.
//!
//! [`EncodeOptions`] is the single user-facing vocabulary. It deserializes
//! from a host options object with camelCase keys (`"qualityAlpha"`,
//! `"chromaSubsampling": 444`, `"colorSpace": "display-p3"`), and every field
//! is optional on the wire. The parameter mapper in [`crate::params`] turns it
//! into backend-native settings; fields one backend has no use for are
//! ignored there.

use serde::{Deserialize, Serialize};

use crate::pixel::DataType;

/// Chroma subsampling of the encoded planes.
///
/// On the wire this is the number `444`, `422`, `420` or `400`. Any other
/// number means 4:2:0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum ChromaSubsampling {
    Yuv444,
    Yuv422,
    #[default]
    Yuv420,
    /// Monochrome.
    Yuv400,
}

impl From<u16> for ChromaSubsampling {
    fn from(value: u16) -> Self {
        match value {
            444 => ChromaSubsampling::Yuv444,
            422 => ChromaSubsampling::Yuv422,
            400 => ChromaSubsampling::Yuv400,
            _ => ChromaSubsampling::Yuv420,
        }
    }
}

impl From<ChromaSubsampling> for u16 {
    fn from(value: ChromaSubsampling) -> Self {
        match value {
            ChromaSubsampling::Yuv444 => 444,
            ChromaSubsampling::Yuv422 => 422,
            ChromaSubsampling::Yuv420 => 420,
            ChromaSubsampling::Yuv400 => 400,
        }
    }
}

/// Gamut of the input pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "srgb")]
    Srgb,
    #[serde(rename = "display-p3", alias = "p3")]
    DisplayP3,
    #[serde(rename = "rec2020", alias = "bt2020")]
    Rec2020,
}

/// Transfer function of the input pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeTransfer {
    Srgb,
    Pq,
    Hlg,
    Linear,
}

/// Metric the AVIF encoder tunes for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tune {
    #[default]
    Default,
    Ssim,
    Psnr,
}

/// Encoding parameters.
///
/// # Example
///
/// ```
/// use codec_bridge::{ChromaSubsampling, EncodeOptions};
///
/// let options = EncodeOptions::default()
///     .with_quality(90.0)
///     .with_chroma_subsampling(ChromaSubsampling::Yuv444);
/// assert_eq!(options.quality, 90.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodeOptions {
    /// 0-100, 100 = best.
    pub quality: f32,
    /// Alpha plane quality (AVIF only). Defaults to `quality`.
    pub quality_alpha: Option<f32>,
    /// AVIF speed, 0 (slowest) to 10 (fastest). Derived from `effort` when unset.
    pub speed: Option<u8>,
    /// JPEG XL effort, 1 (fastest) to 10 (slowest). Derived from `speed` when unset.
    pub effort: Option<u8>,
    /// Mathematically lossless. Overrides quality and subsampling.
    pub lossless: bool,
    pub chroma_subsampling: ChromaSubsampling,
    /// Output bits per sample. Defaults to the input depth.
    pub bit_depth: Option<u32>,
    pub color_space: ColorSpace,
    /// Derived from `color_space` and depth when unset.
    pub transfer_function: Option<EncodeTransfer>,
    /// Worker threads for this call, at least 1.
    pub max_threads: usize,
    /// AVIF only.
    pub tune: Tune,
    /// JPEG XL only: emit a responsive bitstream.
    pub progressive: bool,
    /// Sample type of the input pixels. Defaults to the integer type that
    /// fits the input depth. Floating point input is JPEG XL only.
    pub data_type: Option<DataType>,
    /// ICC profile to embed.
    pub icc_profile: Option<Vec<u8>>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 75.0,
            quality_alpha: None,
            speed: None,
            effort: None,
            lossless: false,
            chroma_subsampling: ChromaSubsampling::Yuv420,
            bit_depth: None,
            color_space: ColorSpace::Srgb,
            transfer_function: None,
            max_threads: 1,
            tune: Tune::Default,
            progressive: false,
            data_type: None,
            icc_profile: None,
        }
    }
}

impl EncodeOptions {
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_quality_alpha(mut self, quality: f32) -> Self {
        self.quality_alpha = Some(quality);
        self
    }

    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_effort(mut self, effort: u8) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn with_chroma_subsampling(mut self, subsampling: ChromaSubsampling) -> Self {
        self.chroma_subsampling = subsampling;
        self
    }

    pub fn with_bit_depth(mut self, depth: u32) -> Self {
        self.bit_depth = Some(depth);
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_transfer_function(mut self, transfer: EncodeTransfer) -> Self {
        self.transfer_function = Some(transfer);
        self
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    pub fn with_tune(mut self, tune: Tune) -> Self {
        self.tune = tune;
        self
    }

    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_icc_profile(mut self, icc: impl Into<Vec<u8>>) -> Self {
        self.icc_profile = Some(icc.into());
        self
    }
}
