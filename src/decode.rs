//! Decode results.

use crate::buffer::OwnedBuffer;
use crate::error::BridgeError;
use crate::metadata::ImageMetadata;
use crate::pixel::{self, DataType, ImgRef, RGB8, RGBA8};
use crate::timing::DecodeTimings;

/// Geometry and sample format of decoded output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    /// Bits per sample of the output.
    pub depth: u32,
    /// Interleaved channels: 1 (grey), 2 (grey+alpha), 3 (RGB), 4 (RGBA).
    pub channels: u32,
    /// `None` only on failure.
    pub data_type: Option<DataType>,
}

impl ImageLayout {
    pub fn has_alpha(&self) -> bool {
        self.channels == 2 || self.channels == 4
    }
}

/// Outcome of [`Bridge::decode`](crate::Bridge::decode).
///
/// On success `error` is empty and `data` owns the interleaved pixels. On
/// failure `error` names the stage that failed, `data` is empty, and every
/// numeric field is zero.
#[derive(Debug, Default)]
pub struct DecodeResult {
    pub data: OwnedBuffer,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub channels: u32,
    pub data_type: Option<DataType>,
    pub metadata: ImageMetadata,
    pub timings: DecodeTimings,
    pub error: String,
}

impl DecodeResult {
    pub(crate) fn decoded(
        data: OwnedBuffer,
        layout: ImageLayout,
        metadata: ImageMetadata,
        timings: DecodeTimings,
    ) -> Self {
        Self {
            data,
            width: layout.width,
            height: layout.height,
            depth: layout.depth,
            channels: layout.channels,
            data_type: layout.data_type,
            metadata,
            timings,
            error: String::new(),
        }
    }

    pub(crate) fn failed(error: &BridgeError, timings: DecodeTimings) -> Self {
        tracing::debug!(kind = ?error.kind(), %error, "decode failed");
        Self {
            timings,
            error: error.to_string(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout {
            width: self.width,
            height: self.height,
            depth: self.depth,
            channels: self.channels,
            data_type: self.data_type,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.layout().has_alpha()
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Typed view of 8-bit RGB output.
    pub fn rgb8(&self) -> Option<ImgRef<'_, RGB8>> {
        if self.channels != 3 || self.data_type != Some(DataType::Uint8) {
            return None;
        }
        pixel::rgb8_view(&self.data, self.width, self.height)
    }

    /// Typed view of 8-bit RGBA output.
    pub fn rgba8(&self) -> Option<ImgRef<'_, RGBA8>> {
        if self.channels != 4 || self.data_type != Some(DataType::Uint8) {
            return None;
        }
        pixel::rgba8_view(&self.data, self.width, self.height)
    }

    /// Samples of `uint16` output.
    pub fn samples_u16(&self) -> Option<&[u16]> {
        if self.data_type != Some(DataType::Uint16) {
            return None;
        }
        self.data.samples()
    }

    /// Samples of `float32` output.
    pub fn samples_f32(&self) -> Option<&[f32]> {
        if self.data_type != Some(DataType::Float32) {
            return None;
        }
        self.data.samples()
    }
}

/// Outcome of [`Bridge::get_image_info`](crate::Bridge::get_image_info).
///
/// Reports exactly what a default [`decode`](crate::Bridge::decode) of the
/// same input would, without producing pixels.
#[derive(Debug, Default)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub channels: u32,
    pub data_type: Option<DataType>,
    pub metadata: ImageMetadata,
    pub timings: DecodeTimings,
    pub error: String,
}

impl ImageInfo {
    pub(crate) fn probed(
        layout: ImageLayout,
        metadata: ImageMetadata,
        timings: DecodeTimings,
    ) -> Self {
        Self {
            width: layout.width,
            height: layout.height,
            depth: layout.depth,
            channels: layout.channels,
            data_type: layout.data_type,
            metadata,
            timings,
            error: String::new(),
        }
    }

    pub(crate) fn failed(error: &BridgeError, timings: DecodeTimings) -> Self {
        tracing::debug!(kind = ?error.kind(), %error, "probe failed");
        Self {
            timings,
            error: error.to_string(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout {
            width: self.width,
            height: self.height,
            depth: self.depth,
            channels: self.channels,
            data_type: self.data_type,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.layout().has_alpha()
    }
}
