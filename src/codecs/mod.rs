//! Decode and encode pipelines.
//!
//! Each module drives one backend family through its native protocol and
//! flattens the outcome into the host-facing result types. Pipelines own the
//! backend objects they construct for exactly one call; dropping them on any
//! exit path releases everything.

pub(crate) mod avif_dec;
pub(crate) mod avif_enc;
pub(crate) mod jxl_dec;
pub(crate) mod jxl_enc;
pub(crate) mod jxl_state;

use crate::buffer::SharedHeap;
use crate::error::BridgeError;
use crate::limits::Limits;
use crate::pixel::{self, DataType};

/// Host-side resources every pipeline call draws on.
#[derive(Clone, Copy)]
pub(crate) struct CallContext<'a> {
    pub heap: &'a SharedHeap,
    pub limits: &'a Limits,
}

/// Output depth: the caller's hint when given, else the source depth, in 8..=16.
pub(crate) fn output_depth(target_depth: u32, source_depth: u32) -> u32 {
    let depth = if target_depth > 0 {
        target_depth
    } else {
        source_depth
    };
    depth.clamp(8, 16)
}

/// What an encode pipeline accepts as raw input.
pub(crate) struct InputRules {
    pub channels: &'static [u32],
    /// Accepted depths for integer samples.
    pub depths: &'static [u32],
    pub float: bool,
}

pub(crate) const AVIF_INPUT: InputRules = InputRules {
    channels: &[3, 4],
    depths: &[8, 10, 12, 16],
    float: false,
};

pub(crate) const JXL_INPUT: InputRules = InputRules {
    channels: &[1, 2, 3, 4],
    depths: &[8, 10, 12, 16],
    float: true,
};

/// Raw pixels that passed the validation gate.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EncodeInput<'a> {
    /// Exactly `row_bytes × height` bytes.
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub depth: u32,
    pub data_type: DataType,
    pub row_bytes: usize,
}

/// Validation gate run before any backend object exists.
#[allow(clippy::too_many_arguments)]
pub(crate) fn validate_encode_input<'a>(
    rules: &InputRules,
    pixels: &'a [u8],
    width: u32,
    height: u32,
    channels: u32,
    input_depth: u32,
    data_type: Option<DataType>,
    limits: &Limits,
) -> Result<EncodeInput<'a>, BridgeError> {
    if pixels.is_empty() {
        return Err(BridgeError::invalid("pixel buffer is empty"));
    }
    if width == 0 || height == 0 {
        return Err(BridgeError::invalid(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    if !rules.channels.contains(&channels) {
        return Err(BridgeError::invalid(format!(
            "unsupported channel count {channels}"
        )));
    }

    let data_type = data_type.unwrap_or_else(|| DataType::for_integer_depth(input_depth));
    if data_type.is_float() {
        if !rules.float {
            return Err(BridgeError::invalid(format!(
                "{} samples are not supported",
                data_type.as_str()
            )));
        }
    } else {
        if !rules.depths.contains(&input_depth) {
            return Err(BridgeError::invalid(format!(
                "unsupported input depth {input_depth}"
            )));
        }
        if data_type != DataType::for_integer_depth(input_depth) {
            return Err(BridgeError::invalid(format!(
                "{} samples cannot carry {input_depth}-bit input",
                data_type.as_str()
            )));
        }
    }

    let needed = pixel::packed_len(width, height, channels, data_type)
        .ok_or_else(|| BridgeError::invalid("pixel buffer size overflows"))?;
    if pixels.len() < needed {
        return Err(BridgeError::invalid(format!(
            "pixel data too small: need {needed} bytes, got {}",
            pixels.len()
        )));
    }
    limits.validate(width, height, needed)?;

    Ok(EncodeInput {
        pixels: &pixels[..needed],
        width,
        height,
        channels,
        depth: input_depth,
        data_type,
        row_bytes: pixel::packed_row_bytes(width, channels, data_type)?,
    })
}
