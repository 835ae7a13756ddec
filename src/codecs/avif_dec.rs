//! AVIF decode pipeline.
//!
//! Strictly linear: construct, bind input, parse, decode the first image,
//! convert to interleaved RGB. The first failing stage ends the call.

use super::{CallContext, output_depth};
use crate::backend::{
    AvifBackend, AvifDecoder, AvifDecoderOptions, RgbFormat, RgbViewMut, YuvFormat,
};
use crate::buffer::{OwnedBuffer, PendingAllocation};
use crate::decode::{DecodeResult, ImageInfo, ImageLayout};
use crate::error::{BackendError, BridgeError, Conversion};
use crate::format::ImageFormat;
use crate::metadata::{ImageMetadata, MetadataDraft};
use crate::params::effective_threads;
use crate::pixel::{self, DataType};
use crate::timing::{DecodeTimings, Stopwatch};

/// A decoder that has parsed its input, plus everything derived from the header.
struct Parsed<D> {
    decoder: D,
    layout: ImageLayout,
    format: RgbFormat,
    row_bytes: usize,
    len: usize,
    draft: MetadataDraft,
}

pub(crate) fn decode<B: AvifBackend>(
    backend: &B,
    input: &[u8],
    target_depth: u32,
    max_threads: usize,
    ctx: CallContext<'_>,
) -> DecodeResult {
    let _span = tracing::debug_span!("avif.decode", input_len = input.len()).entered();
    let mut clock = Stopwatch::start();
    let mut timings = DecodeTimings::default();
    let threads = effective_threads(max_threads, backend.max_threads());

    let outcome = run_decode(backend, input, target_depth, threads, ctx, &mut clock, &mut timings);
    timings.total = clock.total();
    match outcome {
        Ok((data, layout, metadata)) => DecodeResult::decoded(data, layout, metadata, timings),
        Err(err) => DecodeResult::failed(&err, timings),
    }
}

/// Header and metadata only; no pixel planes are decoded.
pub(crate) fn image_info<B: AvifBackend>(
    backend: &B,
    input: &[u8],
    ctx: CallContext<'_>,
) -> ImageInfo {
    let _span = tracing::debug_span!("avif.info", input_len = input.len()).entered();
    let mut clock = Stopwatch::start();
    let mut timings = DecodeTimings::default();

    let outcome = open(backend, input, 0, 1, &mut clock, &mut timings)
        .and_then(|parsed| Ok((parsed.layout, parsed.draft.publish(ctx.heap)?)));
    timings.total = clock.total();
    match outcome {
        Ok((layout, metadata)) => ImageInfo::probed(layout, metadata, timings),
        Err(err) => ImageInfo::failed(&err, timings),
    }
}

fn run_decode<B: AvifBackend>(
    backend: &B,
    input: &[u8],
    target_depth: u32,
    threads: usize,
    ctx: CallContext<'_>,
    clock: &mut Stopwatch,
    timings: &mut DecodeTimings,
) -> Result<(OwnedBuffer, ImageLayout, ImageMetadata), BridgeError> {
    let mut parsed = open(backend, input, target_depth, threads, clock, timings)?;
    let layout = parsed.layout;
    ctx.limits.validate(layout.width, layout.height, parsed.len)?;

    parsed.decoder.next_image().map_err(BridgeError::Decode)?;
    timings.decode = clock.lap("decode");

    let mut pending = PendingAllocation::new(ctx.heap, parsed.len)?;
    let mut out = RgbViewMut {
        width: layout.width,
        height: layout.height,
        format: parsed.format,
        depth: layout.depth,
        row_bytes: parsed.row_bytes,
        pixels: pending.as_mut_slice(),
    };
    parsed
        .decoder
        .yuv_to_rgb(&mut out)
        .map_err(|source| BridgeError::ColorConversion {
            direction: Conversion::YuvToRgb,
            source,
        })?;
    let metadata = parsed.draft.publish(ctx.heap)?;
    let data = pending.commit();
    timings.convert = clock.lap("convert");

    Ok((data, layout, metadata))
}

fn open<'input, B: AvifBackend>(
    backend: &B,
    input: &'input [u8],
    target_depth: u32,
    threads: usize,
    clock: &mut Stopwatch,
    timings: &mut DecodeTimings,
) -> Result<Parsed<B::Decoder<'input>>, BridgeError> {
    if input.is_empty() {
        return Err(BridgeError::invalid("input buffer is empty"));
    }
    if !backend.is_available() {
        return Err(BridgeError::UnsupportedFormat(ImageFormat::Avif));
    }

    let mut decoder = backend
        .create_decoder()
        .ok_or(BridgeError::BackendConstruction("decoder"))?;
    decoder.configure(&AvifDecoderOptions {
        max_threads: threads,
        ..AvifDecoderOptions::default()
    });
    decoder.set_io_memory(input).map_err(BridgeError::IoBinding)?;
    timings.setup = clock.lap("setup");

    decoder.parse().map_err(BridgeError::Parse)?;
    let header = decoder.image();
    if header.width == 0 || header.height == 0 {
        return Err(BridgeError::Parse(BackendError::new("image has zero dimensions")));
    }

    let depth = output_depth(target_depth, header.depth);
    let format = match (header.yuv_format, header.has_alpha) {
        (YuvFormat::Yuv400, false) => RgbFormat::Gray,
        (YuvFormat::Yuv400, true) => RgbFormat::GrayAlpha,
        (_, false) => RgbFormat::Rgb,
        (_, true) => RgbFormat::Rgba,
    };
    let data_type = DataType::for_integer_depth(depth);
    let layout = ImageLayout {
        width: header.width,
        height: header.height,
        depth,
        channels: format.channels(),
        data_type: Some(data_type),
    };
    let row_bytes = pixel::packed_row_bytes(header.width, format.channels(), data_type)?;
    let len = row_bytes
        .checked_mul(header.height as usize)
        .ok_or_else(|| BridgeError::invalid("image size overflows"))?;
    timings.header = clock.lap("header");

    let draft = MetadataDraft::from_avif(&header);
    timings.color = clock.lap("color");

    Ok(Parsed {
        decoder,
        layout,
        format,
        row_bytes,
        len,
        draft,
    })
}
