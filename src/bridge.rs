//! Host-facing entry points.

use std::sync::Arc;

use crate::backend::{AvifBackend, JxlBackend, Unsupported};
use crate::buffer::{BorrowedBuffer, SharedHeap, SystemHeap};
use crate::codecs::{CallContext, avif_dec, avif_enc, jxl_dec, jxl_enc};
use crate::config::EncodeOptions;
use crate::decode::{DecodeResult, ImageInfo};
use crate::encode::EncodeResult;
use crate::error::BridgeError;
use crate::format::ImageFormat;
use crate::limits::Limits;
use crate::timing::DecodeTimings;

/// Decode/encode bridge over one AVIF and one JPEG XL backend.
///
/// Every call builds and tears down its own backend objects; nothing is
/// shared between calls except the heap results are placed on. A `Bridge`
/// is therefore usable from several threads at once when its backends are.
///
/// ```
/// use codec_bridge::{Bridge, BorrowedBuffer};
///
/// let bridge = Bridge::unsupported();
/// let result = bridge.decode(BorrowedBuffer::from_slice(b"not an image"), 0, 1);
/// assert_eq!(result.error, "Invalid input: unrecognized image format");
/// assert_eq!(result.data_size(), 0);
/// ```
pub struct Bridge<A = Unsupported, J = Unsupported> {
    avif: A,
    jxl: J,
    heap: SharedHeap,
    limits: Limits,
}

impl Bridge {
    /// A bridge with no codec linked. Useful for probing the error surface.
    pub fn unsupported() -> Self {
        Bridge::new(Unsupported, Unsupported)
    }
}

impl<A: AvifBackend, J: JxlBackend> Bridge<A, J> {
    /// Results go to the process allocator and no limits apply.
    pub fn new(avif: A, jxl: J) -> Self {
        Self {
            avif,
            jxl,
            heap: Arc::new(SystemHeap),
            limits: Limits::none(),
        }
    }

    /// Place results on `heap` instead of the process allocator.
    pub fn with_heap(mut self, heap: SharedHeap) -> Self {
        self.heap = heap;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn heap(&self) -> &SharedHeap {
        &self.heap
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn avif_backend(&self) -> &A {
        &self.avif
    }

    pub fn jxl_backend(&self) -> &J {
        &self.jxl
    }

    /// Formats this bridge can currently decode or encode.
    pub fn available_formats(&self) -> Vec<ImageFormat> {
        let mut formats = Vec::with_capacity(2);
        if self.avif.is_available() {
            formats.push(ImageFormat::Avif);
        }
        if self.jxl.is_available() {
            formats.push(ImageFormat::Jxl);
        }
        formats
    }

    fn ctx(&self) -> CallContext<'_> {
        CallContext {
            heap: &self.heap,
            limits: &self.limits,
        }
    }

    /// Decode the first image of an AVIF or JPEG XL file.
    ///
    /// `target_depth` of 0 keeps the source depth; any value is clamped to
    /// 8..=16 for integer output. `max_threads` is capped by the backend.
    pub fn decode(
        &self,
        input: BorrowedBuffer<'_>,
        target_depth: u32,
        max_threads: usize,
    ) -> DecodeResult {
        match route(&input) {
            Ok(ImageFormat::Avif) => self.decode_avif(input, target_depth, max_threads),
            Ok(ImageFormat::Jxl) => self.decode_jxl(input, target_depth, max_threads),
            Err(err) => DecodeResult::failed(&err, DecodeTimings::default()),
        }
    }

    /// Dimensions, depth, channels and metadata, without decoding pixels.
    pub fn get_image_info(&self, input: BorrowedBuffer<'_>) -> ImageInfo {
        match route(&input) {
            Ok(ImageFormat::Avif) => self.avif_image_info(input),
            Ok(ImageFormat::Jxl) => self.jxl_image_info(input),
            Err(err) => ImageInfo::failed(&err, DecodeTimings::default()),
        }
    }

    /// Encode `width × height` interleaved pixels of `channels` samples,
    /// each `input_depth` bits deep (or `options.data_type`).
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        format: ImageFormat,
        pixels: BorrowedBuffer<'_>,
        width: u32,
        height: u32,
        channels: u32,
        input_depth: u32,
        options: &EncodeOptions,
    ) -> EncodeResult {
        match format {
            ImageFormat::Avif => {
                self.encode_avif(pixels, width, height, channels, input_depth, options)
            }
            ImageFormat::Jxl => {
                self.encode_jxl(pixels, width, height, channels, input_depth, options)
            }
        }
    }

    pub fn decode_avif(
        &self,
        input: BorrowedBuffer<'_>,
        target_depth: u32,
        max_threads: usize,
    ) -> DecodeResult {
        avif_dec::decode(&self.avif, input.as_slice(), target_depth, max_threads, self.ctx())
    }

    pub fn decode_jxl(
        &self,
        input: BorrowedBuffer<'_>,
        target_depth: u32,
        max_threads: usize,
    ) -> DecodeResult {
        jxl_dec::decode(&self.jxl, input.as_slice(), target_depth, max_threads, self.ctx())
    }

    pub fn avif_image_info(&self, input: BorrowedBuffer<'_>) -> ImageInfo {
        avif_dec::image_info(&self.avif, input.as_slice(), self.ctx())
    }

    pub fn jxl_image_info(&self, input: BorrowedBuffer<'_>) -> ImageInfo {
        jxl_dec::image_info(&self.jxl, input.as_slice(), self.ctx())
    }

    pub fn encode_avif(
        &self,
        pixels: BorrowedBuffer<'_>,
        width: u32,
        height: u32,
        channels: u32,
        input_depth: u32,
        options: &EncodeOptions,
    ) -> EncodeResult {
        avif_enc::encode(
            &self.avif,
            pixels.as_slice(),
            width,
            height,
            channels,
            input_depth,
            options,
            self.ctx(),
        )
    }

    pub fn encode_jxl(
        &self,
        pixels: BorrowedBuffer<'_>,
        width: u32,
        height: u32,
        channels: u32,
        input_depth: u32,
        options: &EncodeOptions,
    ) -> EncodeResult {
        jxl_enc::encode(
            &self.jxl,
            pixels.as_slice(),
            width,
            height,
            channels,
            input_depth,
            options,
            self.ctx(),
        )
    }
}

impl<A, J> std::fmt::Debug for Bridge<A, J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("avif", &std::any::type_name::<A>())
            .field("jxl", &std::any::type_name::<J>())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn route(input: &[u8]) -> Result<ImageFormat, BridgeError> {
    if input.is_empty() {
        return Err(BridgeError::invalid("input buffer is empty"));
    }
    ImageFormat::detect(input).ok_or(BridgeError::UnrecognizedFormat)
}
