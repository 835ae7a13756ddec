//! JPEG XL encode pipeline.

use super::{CallContext, EncodeInput, JXL_INPUT, validate_encode_input};
use crate::backend::{JxlBackend, JxlEncoder, JxlEncoderStatus};
use crate::buffer::OwnedBuffer;
use crate::config::{EncodeOptions, Tune};
use crate::encode::EncodeResult;
use crate::error::{BackendError, BridgeError};
use crate::format::ImageFormat;
use crate::params::JxlEncodePlan;
use crate::timing::{EncodeTimings, Stopwatch};

/// First output chunk; doubled each time the encoder runs out of room.
const INITIAL_OUTPUT_CAPACITY: usize = 64 * 1024;

#[allow(clippy::too_many_arguments)]
pub(crate) fn encode<B: JxlBackend>(
    backend: &B,
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u32,
    input_depth: u32,
    options: &EncodeOptions,
    ctx: CallContext<'_>,
) -> EncodeResult {
    let _span = tracing::debug_span!("jxl.encode", width, height, channels).entered();
    let mut clock = Stopwatch::start();
    let mut timings = EncodeTimings::default();

    let outcome = validate_encode_input(
        &JXL_INPUT,
        pixels,
        width,
        height,
        channels,
        input_depth,
        options.data_type,
        ctx.limits,
    )
    .and_then(|input| run(backend, &input, options, ctx, &mut clock, &mut timings));
    timings.total = clock.total();
    match outcome {
        Ok(data) => EncodeResult::encoded(data, timings),
        Err(err) => EncodeResult::failed(&err, timings),
    }
}

fn run<B: JxlBackend>(
    backend: &B,
    input: &EncodeInput<'_>,
    options: &EncodeOptions,
    ctx: CallContext<'_>,
    clock: &mut Stopwatch,
    timings: &mut EncodeTimings,
) -> Result<OwnedBuffer, BridgeError> {
    if !backend.is_available() {
        return Err(BridgeError::UnsupportedFormat(ImageFormat::Jxl));
    }
    if options.tune != Tune::Default {
        tracing::warn!(tune = ?options.tune, "tune has no JPEG XL equivalent; ignored");
    }

    let plan = JxlEncodePlan::new(
        options,
        input.width,
        input.height,
        input.channels,
        input.data_type,
        input.depth,
        backend.max_threads(),
    );
    let mut encoder = backend
        .create_encoder()
        .ok_or(BridgeError::BackendConstruction("encoder"))?;
    if plan.threads > 1 {
        encoder
            .set_parallel_runner(plan.threads)
            .map_err(|_| BridgeError::BackendConstruction("parallel runner"))?;
    }
    encoder
        .set_basic_info(&plan.basic_info)
        .map_err(BridgeError::Encode)?;
    let color = match options.icc_profile.as_deref() {
        Some(icc) if !icc.is_empty() => encoder.set_icc_profile(icc),
        _ => encoder.set_color_encoding(&plan.color_encoding),
    };
    color.map_err(BridgeError::Encode)?;
    encoder
        .configure_frame(&plan.frame)
        .map_err(BridgeError::Encode)?;
    timings.setup = clock.lap("setup");

    encoder
        .add_image_frame(&plan.pixel_format, input.pixels)
        .map_err(BridgeError::Encode)?;
    encoder.close_input();
    timings.convert = clock.lap("convert");

    let bitstream = drain(&mut encoder, ctx)?;
    timings.encode = clock.lap("encode");

    let data = OwnedBuffer::copy_from(ctx.heap, &bitstream)?;
    timings.output = clock.lap("output");
    Ok(data)
}

/// Pull the codestream out of `encoder`, growing the buffer as needed.
fn drain<E: JxlEncoder>(encoder: &mut E, ctx: CallContext<'_>) -> Result<Vec<u8>, BridgeError> {
    let mut out = vec![0u8; INITIAL_OUTPUT_CAPACITY];
    let mut filled = 0;
    loop {
        match encoder
            .process_output(&mut out[filled..])
            .map_err(BridgeError::Encode)?
        {
            JxlEncoderStatus::Success { written } => {
                filled = (filled + written).min(out.len());
                break;
            }
            JxlEncoderStatus::NeedMoreOutput { written } => {
                filled = (filled + written).min(out.len());
                let grown = out
                    .len()
                    .checked_mul(2)
                    .ok_or_else(|| {
                        BridgeError::Encode(BackendError::new("output size overflows"))
                    })?;
                ctx.limits
                    .check_memory(grown as u64)
                    .map_err(BridgeError::LimitExceeded)?;
                tracing::trace!(capacity = grown, "growing output buffer");
                out.resize(grown, 0);
            }
        }
    }
    out.truncate(filled);
    Ok(out)
}
