//! JPEG XL backend protocol.
//!
//! Decoding is event driven: the caller subscribes to events, binds the
//! whole input, and calls [`JxlDecoder::process_input`] until it reports
//! [`JxlEvent::Success`] or a terminal condition. Encoding pushes settings
//! and one frame, then drains output with [`JxlEncoder::process_output`].

use core::convert::Infallible;
use core::ops::BitOr;

use super::Unsupported;
use crate::error::BackendError;

/// Set of decoder events to be informed about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const BASIC_INFO: Self = Self(1 << 6);
    pub const COLOR_ENCODING: Self = Self(1 << 8);
    pub const FULL_IMAGE: Self = Self(1 << 12);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of one [`JxlDecoder::process_input`] step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JxlEvent {
    /// Basic info is available through [`JxlDecoder::basic_info`].
    BasicInfo,
    /// Color encoding and ICC profile are available.
    ColorEncoding,
    /// The decoder wants an output buffer before producing pixels.
    NeedImageOutBuffer,
    /// The current frame's pixels have been written.
    FullImage,
    /// All subscribed work is done.
    Success,
    /// Input ended early.
    NeedMoreInput,
    Error(BackendError),
}

impl JxlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JxlEvent::BasicInfo => "BASIC_INFO",
            JxlEvent::ColorEncoding => "COLOR_ENCODING",
            JxlEvent::NeedImageOutBuffer => "NEED_IMAGE_OUT_BUFFER",
            JxlEvent::FullImage => "FULL_IMAGE",
            JxlEvent::Success => "SUCCESS",
            JxlEvent::NeedMoreInput => "NEED_MORE_INPUT",
            JxlEvent::Error(_) => "ERROR",
        }
    }
}

/// Image-level header fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JxlBasicInfo {
    pub xsize: u32,
    pub ysize: u32,
    pub bits_per_sample: u32,
    /// Non-zero for floating point samples.
    pub exponent_bits_per_sample: u32,
    /// 1 (grey) or 3 (color).
    pub num_color_channels: u32,
    pub num_extra_channels: u32,
    pub alpha_bits: u32,
    pub alpha_exponent_bits: u32,
    pub have_animation: bool,
    /// Keep the input color space instead of converting to XYB.
    pub uses_original_profile: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlDataType {
    Uint8,
    Uint16,
    Float16,
    Float,
}

impl JxlDataType {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            JxlDataType::Uint8 => 1,
            JxlDataType::Uint16 | JxlDataType::Float16 => 2,
            JxlDataType::Float => 4,
        }
    }
}

/// Interleaved, native-endian pixel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JxlPixelFormat {
    pub num_channels: u32,
    pub data_type: JxlDataType,
    /// Row alignment in bytes, 0 for tightly packed rows.
    pub align: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlColorSpace {
    Rgb,
    Gray,
    Xyb,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlWhitePoint {
    D65,
    Custom,
    E,
    Dci,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlPrimaries {
    Srgb,
    Custom,
    /// ITU-R BT.2100 (same primaries as BT.2020).
    Rec2100,
    P3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlTransferFunction {
    Bt709,
    Unknown,
    Linear,
    Srgb,
    Pq,
    Dci,
    Hlg,
    /// Pure power law, exponent in [`JxlColorEncoding::gamma`].
    Gamma,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JxlRenderingIntent {
    Perceptual,
    Relative,
    Saturation,
    Absolute,
}

/// Structured color description, used when no ICC profile is supplied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JxlColorEncoding {
    pub color_space: JxlColorSpace,
    pub white_point: JxlWhitePoint,
    pub primaries: JxlPrimaries,
    pub transfer_function: JxlTransferFunction,
    pub gamma: f64,
    pub rendering_intent: JxlRenderingIntent,
}

impl JxlColorEncoding {
    /// sRGB (or sRGB-transfer grey) with relative intent.
    pub fn srgb(is_gray: bool) -> Self {
        Self {
            color_space: if is_gray {
                JxlColorSpace::Gray
            } else {
                JxlColorSpace::Rgb
            },
            white_point: JxlWhitePoint::D65,
            primaries: JxlPrimaries::Srgb,
            transfer_function: JxlTransferFunction::Srgb,
            gamma: 0.0,
            rendering_intent: JxlRenderingIntent::Relative,
        }
    }
}

/// Per-frame encoder settings produced by the parameter mapper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JxlFrameSettings {
    /// Butteraugli distance, 0 = mathematically lossless.
    pub distance: f32,
    pub lossless: bool,
    /// 1 (fastest) to 10 (slowest).
    pub effort: u8,
    /// Emit a responsive (progressive) bitstream.
    pub responsive: bool,
}

/// Outcome of one [`JxlEncoder::process_output`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JxlEncoderStatus {
    /// Output is complete; `written` bytes went into the slice.
    Success { written: usize },
    /// The slice filled up after `written` bytes; call again with more room.
    NeedMoreOutput { written: usize },
}

/// Entry point of a JPEG XL codec implementation.
pub trait JxlBackend {
    type Decoder<'input>: JxlDecoder<'input>;
    type Encoder: JxlEncoder;

    /// Whether this backend is linked at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Worker threads a parallel runner may use. 1 when the backend was
    /// built without threading.
    fn max_threads(&self) -> usize;

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>>;

    fn create_encoder(&self) -> Option<Self::Encoder>;
}

pub trait JxlDecoder<'input> {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError>;

    fn subscribe_events(&mut self, events: EventMask) -> Result<(), BackendError>;

    fn set_input(&mut self, data: &'input [u8]) -> Result<(), BackendError>;

    /// Declare that no more input follows.
    fn close_input(&mut self);

    /// Advance to the next event.
    ///
    /// Once an output buffer has been set, the caller passes it here on every
    /// call and the decoder writes pixels into it.
    fn process_input(&mut self, out: Option<&mut [u8]>) -> JxlEvent;

    fn basic_info(&self) -> Result<JxlBasicInfo, BackendError>;

    /// Size of the ICC profile of the decoded data, `None` if unavailable.
    fn icc_profile_size(&self) -> Option<usize>;

    fn copy_icc_profile(&self, out: &mut [u8]) -> Result<(), BackendError>;

    /// Structured color encoding, `None` if only an ICC profile describes it.
    fn encoded_color_profile(&self) -> Option<JxlColorEncoding>;

    fn image_out_buffer_size(&self, format: &JxlPixelFormat) -> Result<usize, BackendError>;

    /// Announce the layout and length of the buffer later passed to
    /// [`process_input`](Self::process_input).
    fn set_image_out_buffer(
        &mut self,
        format: &JxlPixelFormat,
        len: usize,
    ) -> Result<(), BackendError>;
}

pub trait JxlEncoder {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError>;

    fn set_basic_info(&mut self, info: &JxlBasicInfo) -> Result<(), BackendError>;

    fn set_color_encoding(&mut self, color: &JxlColorEncoding) -> Result<(), BackendError>;

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError>;

    fn configure_frame(&mut self, settings: &JxlFrameSettings) -> Result<(), BackendError>;

    fn add_image_frame(
        &mut self,
        format: &JxlPixelFormat,
        pixels: &[u8],
    ) -> Result<(), BackendError>;

    fn close_input(&mut self);

    /// Write the next chunk of the codestream into `out`.
    fn process_output(&mut self, out: &mut [u8]) -> Result<JxlEncoderStatus, BackendError>;
}

impl JxlBackend for Unsupported {
    type Decoder<'input> = Infallible;
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

    fn create_encoder(&self) -> Option<Infallible> {
        None
    }
}

impl JxlDecoder<'_> for Infallible {
    fn set_parallel_runner(&mut self, _: usize) -> Result<(), BackendError> {
        match *self {}
    }

    fn subscribe_events(&mut self, _: EventMask) -> Result<(), BackendError> {
        match *self {}
    }

    fn set_input(&mut self, _: &[u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn close_input(&mut self) {
        match *self {}
    }

    fn process_input(&mut self, _: Option<&mut [u8]>) -> JxlEvent {
        match *self {}
    }

    fn basic_info(&self) -> Result<JxlBasicInfo, BackendError> {
        match *self {}
    }

    fn icc_profile_size(&self) -> Option<usize> {
        match *self {}
    }

    fn copy_icc_profile(&self, _: &mut [u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn encoded_color_profile(&self) -> Option<JxlColorEncoding> {
        match *self {}
    }

    fn image_out_buffer_size(&self, _: &JxlPixelFormat) -> Result<usize, BackendError> {
        match *self {}
    }

    fn set_image_out_buffer(&mut self, _: &JxlPixelFormat, _: usize) -> Result<(), BackendError> {
        match *self {}
    }
}

impl JxlEncoder for Infallible {
    fn set_parallel_runner(&mut self, _: usize) -> Result<(), BackendError> {
        match *self {}
    }

    fn set_basic_info(&mut self, _: &JxlBasicInfo) -> Result<(), BackendError> {
        match *self {}
    }

    fn set_color_encoding(&mut self, _: &JxlColorEncoding) -> Result<(), BackendError> {
        match *self {}
    }

    fn set_icc_profile(&mut self, _: &[u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn configure_frame(&mut self, _: &JxlFrameSettings) -> Result<(), BackendError> {
        match *self {}
    }

    fn add_image_frame(&mut self, _: &JxlPixelFormat, _: &[u8]) -> Result<(), BackendError> {
        match *self {}
    }

    fn close_input(&mut self) {
        match *self {}
    }

    fn process_output(&mut self, _: &mut [u8]) -> Result<JxlEncoderStatus, BackendError> {
        match *self {}
    }
}
