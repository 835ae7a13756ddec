//! # codec-bridge
//!
//! Uniform decode and encode over AVIF and JPEG XL codec backends, with
//! results handed across a foreign-memory boundary.
//!
//! The codecs themselves are external. A [`Bridge`] drives one
//! [`AvifBackend`](backend::AvifBackend) and one
//! [`JxlBackend`](backend::JxlBackend) through their native call protocols,
//! normalizes what they report into one [`ImageMetadata`] vocabulary, maps
//! one [`EncodeOptions`] onto both, and times every stage.
//!
//! Every call returns a plain result value. Failures never panic or
//! propagate: the `error` field carries a stage-tagged message
//! (`"Parse error: ..."`, `"YUV to RGB error: ..."`) and the numeric fields
//! are zero. Binary payloads are [`OwnedBuffer`]s on the bridge's
//! [`ForeignHeap`]; each is released exactly once, by dropping it or by the
//! host after [`OwnedBuffer::into_raw`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codec_bridge::{BorrowedBuffer, Bridge, EncodeOptions, ImageFormat};
//! # #[cfg(feature = "ravif")]
//! # fn demo() {
//! use codec_bridge::backend::{RavifBackend, Unsupported};
//!
//! let bridge = Bridge::new(RavifBackend, Unsupported);
//! let pixels = vec![255u8, 0, 0].repeat(4);
//! let options = EncodeOptions::default().with_quality(90.0);
//! let encoded = bridge.encode(
//!     ImageFormat::Avif,
//!     BorrowedBuffer::from_slice(&pixels),
//!     2,
//!     2,
//!     3,
//!     8,
//!     &options,
//! );
//! assert!(encoded.is_ok(), "{}", encoded.error);
//! println!("{} bytes in {:.2} ms", encoded.data_size(), encoded.timings.total);
//! # }
//! ```
//!
//! ## Features
//!
//! - `libavif`: [`LibavifBackend`](backend::LibavifBackend), AVIF decode and
//!   encode through libavif (built with libaom).
//! - `libjxl`: [`LibjxlBackend`](backend::LibjxlBackend), JPEG XL decode and
//!   encode through libjxl.
//! - `ravif`: [`RavifBackend`](backend::RavifBackend), AVIF encoding through
//!   the pure-Rust `ravif` encoder.

#![deny(unsafe_code)]

pub mod backend;
mod bridge;
#[allow(unsafe_code)]
pub mod buffer;
mod codecs;
pub mod config;
mod decode;
mod encode;
mod error;
mod format;
mod limits;
pub mod metadata;
pub mod params;
pub mod pixel;
mod timing;

pub use bridge::Bridge;
pub use buffer::{
    BorrowedBuffer, ForeignHeap, OwnedBuffer, PendingAllocation, RawBuffer, SharedHeap,
    SystemHeap, TrackingHeap,
};
pub use config::{ChromaSubsampling, ColorSpace, EncodeOptions, EncodeTransfer, Tune};
pub use decode::{DecodeResult, ImageInfo, ImageLayout};
pub use encode::EncodeResult;
pub use error::{BackendError, BridgeError, Conversion, ErrorKind};
pub use format::ImageFormat;
pub use limits::Limits;
pub use metadata::{
    ColorPrimaries, ImageMetadata, MasteringDisplay, MatrixCoefficients, TransferFunction, is_hdr,
};
pub use pixel::DataType;
pub use timing::{DecodeTimings, EncodeTimings};
