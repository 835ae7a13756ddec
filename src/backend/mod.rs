//! Capability sets of the external codec backends.
//!
//! The bridge never implements compression itself. It drives a backend
//! through one of these traits, which mirror the published call protocol of
//! each codec family:
//!
//! - [`AvifBackend`]: a linear sequence (create, bind input, parse, decode
//!   one image, convert to RGB).
//! - [`JxlBackend`]: an event loop over [`JxlEvent`]s.
//!
//! A family that is not linked into the build is represented by
//! [`Unsupported`], whose constructors always report failure.
//!
//! Concrete backends are feature gated: `libavif` and `libjxl` wrap the C
//! reference libraries for both directions, `ravif` encodes AVIF in pure Rust.

pub mod avif;
pub mod jxl;
#[cfg(feature = "libavif")]
#[allow(unsafe_code)]
mod libavif;
#[cfg(feature = "libjxl")]
#[allow(unsafe_code)]
mod libjxl;
#[cfg(feature = "ravif")]
mod ravif;

pub use avif::{
    AvifBackend, AvifDecoder, AvifDecoderOptions, AvifEncodeImage, AvifEncoder,
    AvifEncoderSettings, AvifImageHeader, Cicp, CicpMatrix, CicpPrimaries, CicpTransfer,
    ContentLightLevel, RgbFormat, RgbView, RgbViewMut, YuvFormat, YuvRange,
};
#[cfg(feature = "libavif")]
pub use self::libavif::{LibavifBackend, LibavifDecoder, LibavifEncoder, LibavifImage};
#[cfg(feature = "libjxl")]
pub use self::libjxl::{LibjxlBackend, LibjxlDecoder, LibjxlEncoder};
pub use jxl::{
    EventMask, JxlBackend, JxlBasicInfo, JxlColorEncoding, JxlColorSpace, JxlDataType,
    JxlDecoder, JxlEncoder, JxlEncoderStatus, JxlEvent, JxlFrameSettings, JxlPixelFormat,
    JxlPrimaries, JxlRenderingIntent, JxlTransferFunction, JxlWhitePoint,
};
#[cfg(feature = "ravif")]
pub use self::ravif::{RavifBackend, RavifEncoder, RavifImage};

/// Placeholder backend for a codec family that is not available.
///
/// It reports itself unavailable, so the bridge answers with
/// `"no ... backend available"` before constructing anything. Its `create_*`
/// calls return `None` regardless.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;
