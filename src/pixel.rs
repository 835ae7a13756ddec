//! Sample types and interleaved buffer layout.
//!
//! Typed views use `imgref::ImgRef` over pixels from the `rgb` crate.

use serde::{Deserialize, Serialize};

pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{RGB8, RGB16, RGBA8, RGBA16};

use crate::backend::JxlDataType;
use crate::error::BridgeError;

/// Storage type of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
    Float16,
    Float32,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Float16 => "float16",
            DataType::Float32 => "float32",
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            DataType::Uint8 => 1,
            DataType::Uint16 | DataType::Float16 => 2,
            DataType::Float32 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float16 | DataType::Float32)
    }

    /// Integer storage wide enough for `depth` bits.
    pub fn for_integer_depth(depth: u32) -> Self {
        if depth > 8 {
            DataType::Uint16
        } else {
            DataType::Uint8
        }
    }

    pub(crate) fn to_jxl(self) -> JxlDataType {
        match self {
            DataType::Uint8 => JxlDataType::Uint8,
            DataType::Uint16 => JxlDataType::Uint16,
            DataType::Float16 => JxlDataType::Float16,
            DataType::Float32 => JxlDataType::Float,
        }
    }
}

/// Byte length of a tightly packed `width × height × channels` buffer.
///
/// `None` on overflow.
pub fn packed_len(width: u32, height: u32, channels: u32, data_type: DataType) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)?
        .checked_mul(data_type.bytes_per_sample())
}

/// Row stride of a tightly packed buffer.
pub(crate) fn packed_row_bytes(
    width: u32,
    channels: u32,
    data_type: DataType,
) -> Result<usize, BridgeError> {
    (width as usize)
        .checked_mul(channels as usize)
        .and_then(|n| n.checked_mul(data_type.bytes_per_sample()))
        .ok_or_else(|| BridgeError::invalid("image row size overflows"))
}

/// Interpret packed 8-bit RGB bytes as a typed image.
///
/// Returns `None` if `bytes` does not hold exactly `width × height` pixels.
pub fn rgb8_view(bytes: &[u8], width: u32, height: u32) -> Option<ImgRef<'_, RGB8>> {
    use rgb::FromSlice;
    let pixels = bytes.as_rgb();
    (pixels.len() == width as usize * height as usize && bytes.len() % 3 == 0)
        .then(|| Img::new(pixels, width as usize, height as usize))
}

/// Interpret packed 8-bit RGBA bytes as a typed image.
pub fn rgba8_view(bytes: &[u8], width: u32, height: u32) -> Option<ImgRef<'_, RGBA8>> {
    use rgb::FromSlice;
    let pixels = bytes.as_rgba();
    (pixels.len() == width as usize * height as usize && bytes.len() % 4 == 0)
        .then(|| Img::new(pixels, width as usize, height as usize))
}
