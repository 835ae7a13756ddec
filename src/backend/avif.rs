//! AV1 image file (AVIF) backend protocol.

use core::convert::Infallible;

use super::Unsupported;
use crate::error::BackendError;

/// CICP color primaries code point (ITU-T H.273).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CicpPrimaries(pub u8);

impl CicpPrimaries {
    pub const BT709: Self = Self(1);
    pub const UNSPECIFIED: Self = Self(2);
    pub const BT470M: Self = Self(4);
    pub const BT470BG: Self = Self(5);
    pub const BT601: Self = Self(6);
    pub const SMPTE240: Self = Self(7);
    pub const GENERIC_FILM: Self = Self(8);
    pub const BT2020: Self = Self(9);
    pub const XYZ: Self = Self(10);
    pub const SMPTE431: Self = Self(11);
    pub const SMPTE432: Self = Self(12);
    pub const EBU3213: Self = Self(22);
}

/// CICP transfer characteristics code point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CicpTransfer(pub u8);

impl CicpTransfer {
    pub const BT709: Self = Self(1);
    pub const UNSPECIFIED: Self = Self(2);
    pub const BT470M: Self = Self(4);
    pub const BT470BG: Self = Self(5);
    pub const BT601: Self = Self(6);
    pub const SMPTE240: Self = Self(7);
    pub const LINEAR: Self = Self(8);
    pub const LOG100: Self = Self(9);
    pub const LOG100_SQRT10: Self = Self(10);
    pub const IEC61966: Self = Self(11);
    pub const BT1361: Self = Self(12);
    pub const SRGB: Self = Self(13);
    pub const BT2020_10BIT: Self = Self(14);
    pub const BT2020_12BIT: Self = Self(15);
    pub const PQ: Self = Self(16);
    pub const SMPTE428: Self = Self(17);
    pub const HLG: Self = Self(18);
}

/// CICP matrix coefficients code point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CicpMatrix(pub u8);

impl CicpMatrix {
    pub const IDENTITY: Self = Self(0);
    pub const BT709: Self = Self(1);
    pub const UNSPECIFIED: Self = Self(2);
    pub const FCC: Self = Self(4);
    pub const BT470BG: Self = Self(5);
    pub const BT601: Self = Self(6);
    pub const SMPTE240: Self = Self(7);
    pub const YCGCO: Self = Self(8);
    pub const BT2020_NCL: Self = Self(9);
    pub const BT2020_CL: Self = Self(10);
    pub const SMPTE2085: Self = Self(11);
    pub const CHROMA_DERIVED_NCL: Self = Self(12);
    pub const CHROMA_DERIVED_CL: Self = Self(13);
    pub const ICTCP: Self = Self(14);
}

/// Coding-independent code points carried in the `colr` box / sequence header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cicp {
    pub color_primaries: CicpPrimaries,
    pub transfer_characteristics: CicpTransfer,
    pub matrix_coefficients: CicpMatrix,
}

impl Cicp {
    pub const UNSPECIFIED: Self = Self {
        color_primaries: CicpPrimaries::UNSPECIFIED,
        transfer_characteristics: CicpTransfer::UNSPECIFIED,
        matrix_coefficients: CicpMatrix::UNSPECIFIED,
    };
}

/// Chroma subsampling of the coded planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum YuvFormat {
    Yuv444,
    Yuv422,
    Yuv420,
    /// Luma only.
    Yuv400,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum YuvRange {
    Limited,
    Full,
}

/// `clli` box contents, in nits. Zero when absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentLightLevel {
    pub max_cll: u16,
    pub max_pall: u16,
}

/// Header view of the current image, valid after a successful parse.
#[derive(Clone, Copy, Debug)]
pub struct AvifImageHeader<'a> {
    pub width: u32,
    pub height: u32,
    /// Coded bit depth: 8, 10 or 12.
    pub depth: u32,
    pub yuv_format: YuvFormat,
    pub yuv_range: YuvRange,
    pub cicp: Cicp,
    pub clli: ContentLightLevel,
    pub has_alpha: bool,
    /// Embedded ICC profile, empty if none.
    pub icc: &'a [u8],
}

/// Interleaved channel order of an RGB buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgbFormat {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl RgbFormat {
    pub fn channels(self) -> u32 {
        match self {
            RgbFormat::Gray => 1,
            RgbFormat::GrayAlpha => 2,
            RgbFormat::Rgb => 3,
            RgbFormat::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, RgbFormat::GrayAlpha | RgbFormat::Rgba)
    }
}

/// Interleaved pixels handed to the backend. Samples wider than 8 bits are
/// native-endian `u16`.
#[derive(Clone, Copy, Debug)]
pub struct RgbView<'a> {
    pub width: u32,
    pub height: u32,
    pub format: RgbFormat,
    pub depth: u32,
    pub row_bytes: usize,
    pub pixels: &'a [u8],
}

/// Destination for a YUV to RGB conversion. Same layout rules as [`RgbView`].
#[derive(Debug)]
pub struct RgbViewMut<'a> {
    pub width: u32,
    pub height: u32,
    pub format: RgbFormat,
    pub depth: u32,
    pub row_bytes: usize,
    pub pixels: &'a mut [u8],
}

/// Decoder configuration applied before input is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AvifDecoderOptions {
    pub max_threads: usize,
    /// Reject files with commonly tolerated container violations.
    pub strict: bool,
    pub ignore_exif: bool,
    pub ignore_xmp: bool,
}

impl Default for AvifDecoderOptions {
    fn default() -> Self {
        Self {
            max_threads: 1,
            strict: false,
            ignore_exif: true,
            ignore_xmp: true,
        }
    }
}

/// Encoder configuration produced by the parameter mapper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvifEncoderSettings {
    /// 0-100, 100 = lossless.
    pub quality: u8,
    pub quality_alpha: u8,
    /// Quantizer equivalent of `quality`: 0 (best) to 63 (worst).
    pub quantizer: u8,
    pub quantizer_alpha: u8,
    /// 0 (slowest) to 10 (fastest).
    pub speed: u8,
    pub max_threads: usize,
    pub auto_tiling: bool,
    pub lossless: bool,
}

/// Entry point of an AVIF codec implementation.
pub trait AvifBackend {
    type Decoder<'input>: AvifDecoder<'input>;
    type Image: AvifEncodeImage;
    type Encoder: AvifEncoder<Image = Self::Image>;

    /// Whether this backend is linked at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Worker threads a single decoder or encoder may use. 1 when the
    /// backend was built without threading.
    fn max_threads(&self) -> usize;

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>>;

    /// Allocate an empty image of the given geometry for encoding.
    fn create_image(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        yuv_format: YuvFormat,
    ) -> Option<Self::Image>;

    fn create_encoder(&self) -> Option<Self::Encoder>;
}

/// Decoder instance bound to one input buffer.
pub trait AvifDecoder<'input> {
    fn configure(&mut self, options: &AvifDecoderOptions);

    /// Bind the complete file. The decoder reads it in place.
    fn set_io_memory(&mut self, data: &'input [u8]) -> Result<(), BackendError>;

    fn parse(&mut self) -> Result<(), BackendError>;

    /// Header of the current image. Meaningful only after [`parse`](Self::parse).
    fn image(&self) -> AvifImageHeader<'_>;

    fn next_image(&mut self) -> Result<(), BackendError>;

    /// Convert the decoded planes into `out`.
    fn yuv_to_rgb(&self, out: &mut RgbViewMut<'_>) -> Result<(), BackendError>;
}

/// Image being prepared for encoding.
pub trait AvifEncodeImage {
    fn set_color(&mut self, cicp: Cicp, range: YuvRange);

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError>;

    /// Convert interleaved input into the image's planes.
    fn rgb_to_yuv(&mut self, rgb: &RgbView<'_>) -> Result<(), BackendError>;
}

pub trait AvifEncoder {
    type Image;

    fn configure(&mut self, settings: &AvifEncoderSettings) -> Result<(), BackendError>;

    /// Encode `image` as a single-image AVIF file.
    fn write(&mut self, image: &Self::Image) -> Result<Vec<u8>, BackendError>;
}

impl AvifBackend for Unsupported {
    type Decoder<'input> = Infallible;
    type Image = Infallible;
    type Encoder = Infallible;

    fn is_available(&self) -> bool {
        false
    }

    fn max_threads(&self) -> usize {
        1
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        None
    }

    fn create_image(&self, _: u32, _: u32, _: u32, _: YuvFormat) -> Option<Infallible> {
        None
    }

    fn create_encoder(&self) -> Option<Infallible> {
        None
    }
}

impl AvifDecoder<'_> for Infallible {
    fn configure(&mut self, _: &AvifDecoderOptions) {
        match *self {}
    }

    fn set_io_memory(&mut self, _: &[u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn parse(&mut self) -> Result<(), BackendError> {
        match *self {}
    }

    fn image(&self) -> AvifImageHeader<'_> {
        match *self {}
    }

    fn next_image(&mut self) -> Result<(), BackendError> {
        match *self {}
    }

    fn yuv_to_rgb(&self, _: &mut RgbViewMut<'_>) -> Result<(), BackendError> {
        match *self {}
    }
}

impl AvifEncodeImage for Infallible {
    fn set_color(&mut self, _: Cicp, _: YuvRange) {
        match *self {}
    }

    fn set_icc_profile(&mut self, _: &[u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn rgb_to_yuv(&mut self, _: &RgbView<'_>) -> Result<(), BackendError> {
        match *self {}
    }
}

impl AvifEncoder for Infallible {
    type Image = Infallible;

    fn configure(&mut self, _: &AvifEncoderSettings) -> Result<(), BackendError> {
        match *self {}
    }

    fn write(&mut self, _: &Infallible) -> Result<Vec<u8>, BackendError> {
        match *self {}
    }
}
