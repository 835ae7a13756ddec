//! JPEG XL decode pipeline.
//!
//! Drives the decoder's event loop through [`Dispatcher`] and performs the
//! action each transition asks for.

use super::jxl_state::{Action, Dispatcher, Mode};
use super::{CallContext, output_depth};
use crate::backend::{
    EventMask, JxlBackend, JxlBasicInfo, JxlColorEncoding, JxlDecoder, JxlPixelFormat,
};
use crate::buffer::PendingAllocation;
use crate::decode::{DecodeResult, ImageInfo, ImageLayout};
use crate::error::{BackendError, BridgeError};
use crate::format::ImageFormat;
use crate::metadata::MetadataDraft;
use crate::params::effective_threads;
use crate::pixel::DataType;
use crate::timing::{DecodeTimings, Stopwatch};

/// Output layout chosen from basic info, before the decoder asks for a buffer.
#[derive(Clone, Copy, Debug)]
struct Header {
    basic: JxlBasicInfo,
    layout: ImageLayout,
    format: JxlPixelFormat,
}

/// Everything the event loop captured.
struct Captured {
    header: Header,
    draft: MetadataDraft,
    pixels: Option<PendingAllocation>,
}

pub(crate) fn decode<B: JxlBackend>(
    backend: &B,
    input: &[u8],
    target_depth: u32,
    max_threads: usize,
    ctx: CallContext<'_>,
) -> DecodeResult {
    let _span = tracing::debug_span!("jxl.decode", input_len = input.len()).entered();
    let mut clock = Stopwatch::start();
    let mut timings = DecodeTimings::default();
    let threads = effective_threads(max_threads, backend.max_threads());

    let outcome = run(
        backend,
        input,
        Mode::Pixels,
        target_depth,
        threads,
        ctx,
        &mut clock,
        &mut timings,
    )
    .and_then(|captured| {
        let metadata = captured.draft.publish(ctx.heap)?;
        let pixels = captured.pixels.ok_or(BridgeError::Protocol {
            event: "SUCCESS",
            state: "awaiting output buffer request",
        })?;
        Ok((pixels.commit(), captured.header.layout, metadata))
    });
    if outcome.is_ok() {
        timings.convert = clock.lap("convert");
    }
    timings.total = clock.total();
    match outcome {
        Ok((data, layout, metadata)) => DecodeResult::decoded(data, layout, metadata, timings),
        Err(err) => DecodeResult::failed(&err, timings),
    }
}

/// Basic info and color only. Pixels are never requested.
pub(crate) fn image_info<B: JxlBackend>(
    backend: &B,
    input: &[u8],
    ctx: CallContext<'_>,
) -> ImageInfo {
    let _span = tracing::debug_span!("jxl.info", input_len = input.len()).entered();
    let mut clock = Stopwatch::start();
    let mut timings = DecodeTimings::default();

    let outcome = run(backend, input, Mode::Info, 0, 1, ctx, &mut clock, &mut timings)
        .and_then(|captured| Ok((captured.header.layout, captured.draft.publish(ctx.heap)?)));
    timings.total = clock.total();
    match outcome {
        Ok((layout, metadata)) => ImageInfo::probed(layout, metadata, timings),
        Err(err) => ImageInfo::failed(&err, timings),
    }
}

#[allow(clippy::too_many_arguments)]
fn run<B: JxlBackend>(
    backend: &B,
    input: &[u8],
    mode: Mode,
    target_depth: u32,
    threads: usize,
    ctx: CallContext<'_>,
    clock: &mut Stopwatch,
    timings: &mut DecodeTimings,
) -> Result<Captured, BridgeError> {
    if input.is_empty() {
        return Err(BridgeError::invalid("input buffer is empty"));
    }
    if !backend.is_available() {
        return Err(BridgeError::UnsupportedFormat(ImageFormat::Jxl));
    }

    let mut decoder = backend
        .create_decoder()
        .ok_or(BridgeError::BackendConstruction("decoder"))?;
    if threads > 1 {
        decoder
            .set_parallel_runner(threads)
            .map_err(|_| BridgeError::BackendConstruction("parallel runner"))?;
    }
    let events = match mode {
        Mode::Pixels => EventMask::BASIC_INFO | EventMask::COLOR_ENCODING | EventMask::FULL_IMAGE,
        Mode::Info => EventMask::BASIC_INFO | EventMask::COLOR_ENCODING,
    };
    decoder.subscribe_events(events).map_err(BridgeError::Decode)?;
    decoder.set_input(input).map_err(BridgeError::IoBinding)?;
    decoder.close_input();
    timings.setup = clock.lap("setup");

    let mut dispatcher = Dispatcher::new(mode);
    let mut header: Option<Header> = None;
    let mut color: Option<JxlColorEncoding> = None;
    let mut icc = Vec::new();
    let mut pixels: Option<PendingAllocation> = None;

    while !dispatcher.is_done() {
        let event = decoder.process_input(pixels.as_mut().map(PendingAllocation::as_mut_slice));
        match dispatcher.step(event)? {
            Action::CaptureBasicInfo => {
                let basic = decoder.basic_info().map_err(BridgeError::Decode)?;
                header = Some(read_header(basic, target_depth)?);
                timings.header = clock.lap("header");
            }
            Action::CaptureColor => {
                icc = copy_icc(&decoder);
                color = decoder.encoded_color_profile();
                timings.color = clock.lap("color");
            }
            Action::BindOutput => {
                let Some(h) = header.as_ref() else {
                    return Err(BridgeError::Protocol {
                        event: "NEED_IMAGE_OUT_BUFFER",
                        state: "awaiting basic info",
                    });
                };
                let len = decoder
                    .image_out_buffer_size(&h.format)
                    .map_err(BridgeError::Decode)?;
                ctx.limits.validate(h.layout.width, h.layout.height, len)?;
                let buffer = PendingAllocation::new(ctx.heap, len)?;
                decoder
                    .set_image_out_buffer(&h.format, len)
                    .map_err(BridgeError::Decode)?;
                pixels = Some(buffer);
            }
            Action::CompleteFrame => timings.decode = clock.lap("decode"),
            Action::Finish => {}
        }
    }

    let header = header.ok_or(BridgeError::Protocol {
        event: "SUCCESS",
        state: "awaiting basic info",
    })?;
    let draft = MetadataDraft::from_jxl(&header.basic, color.as_ref(), icc);
    tracing::trace!(state = ?dispatcher.state(), "jxl loop finished");
    Ok(Captured {
        header,
        draft,
        pixels,
    })
}

/// Choose the output sample type from the source's sample format.
fn read_header(basic: JxlBasicInfo, target_depth: u32) -> Result<Header, BridgeError> {
    if basic.xsize == 0 || basic.ysize == 0 {
        return Err(BridgeError::Decode(BackendError::new("image has zero dimensions")));
    }
    let (depth, data_type) = match (basic.exponent_bits_per_sample, basic.bits_per_sample) {
        (0, bits) => {
            let depth = output_depth(target_depth, bits);
            (depth, DataType::for_integer_depth(depth))
        }
        (5, 16) => (16, DataType::Float16),
        (8, 32) => (32, DataType::Float32),
        _ => {
            return Err(BridgeError::Decode(BackendError::new(
                "Unsupported float format",
            )));
        }
    };
    let channels = match basic.num_color_channels {
        1 => 1,
        _ => 3,
    } + u32::from(basic.alpha_bits > 0);

    Ok(Header {
        basic,
        layout: ImageLayout {
            width: basic.xsize,
            height: basic.ysize,
            depth,
            channels,
            data_type: Some(data_type),
        },
        format: JxlPixelFormat {
            num_channels: channels,
            data_type: data_type.to_jxl(),
            align: 0,
        },
    })
}

/// The ICC profile of the decoded data. Empty when the decoder has none or
/// the copy fails; a broken profile is not worth failing the decode over.
fn copy_icc<'input, D: JxlDecoder<'input>>(decoder: &D) -> Vec<u8> {
    let Some(size) = decoder.icc_profile_size().filter(|&n| n > 0) else {
        return Vec::new();
    };
    let mut icc = vec![0; size];
    match decoder.copy_icc_profile(&mut icc) {
        Ok(()) => icc,
        Err(err) => {
            tracing::debug!(%err, "dropping unreadable ICC profile");
            Vec::new()
        }
    }
}
