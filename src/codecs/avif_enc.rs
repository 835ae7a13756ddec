//! AVIF encode pipeline.
//!
//! Image construction, RGB to YUV conversion, encoder configuration, write.
//! Backend objects are dropped on every exit, so an early failure releases
//! whatever the earlier stages built.

use super::{AVIF_INPUT, CallContext, EncodeInput, validate_encode_input};
use crate::backend::{AvifBackend, AvifEncodeImage, AvifEncoder, RgbFormat, RgbView};
use crate::buffer::OwnedBuffer;
use crate::config::EncodeOptions;
use crate::encode::EncodeResult;
use crate::error::{BridgeError, Conversion};
use crate::format::ImageFormat;
use crate::params::AvifEncodePlan;
use crate::timing::{EncodeTimings, Stopwatch};

#[allow(clippy::too_many_arguments)]
pub(crate) fn encode<B: AvifBackend>(
    backend: &B,
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u32,
    input_depth: u32,
    options: &EncodeOptions,
    ctx: CallContext<'_>,
) -> EncodeResult {
    let _span = tracing::debug_span!("avif.encode", width, height, channels).entered();
    let mut clock = Stopwatch::start();
    let mut timings = EncodeTimings::default();

    let outcome = validate_encode_input(
        &AVIF_INPUT,
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

fn run<B: AvifBackend>(
    backend: &B,
    input: &EncodeInput<'_>,
    options: &EncodeOptions,
    ctx: CallContext<'_>,
    clock: &mut Stopwatch,
    timings: &mut EncodeTimings,
) -> Result<OwnedBuffer, BridgeError> {
    if !backend.is_available() {
        return Err(BridgeError::UnsupportedFormat(ImageFormat::Avif));
    }
    if options.progressive {
        tracing::warn!("progressive has no AVIF equivalent; ignored");
    }

    let plan = AvifEncodePlan::new(options, input.depth, backend.max_threads());
    let mut image = backend
        .create_image(input.width, input.height, plan.depth, plan.yuv_format)
        .ok_or(BridgeError::BackendConstruction("image"))?;
    image.set_color(plan.cicp, plan.range);
    if let Some(icc) = options.icc_profile.as_deref().filter(|icc| !icc.is_empty()) {
        image.set_icc_profile(icc).map_err(BridgeError::Encode)?;
    }
    timings.setup = clock.lap("setup");

    let format = if input.channels == 4 {
        RgbFormat::Rgba
    } else {
        RgbFormat::Rgb
    };
    image
        .rgb_to_yuv(&RgbView {
            width: input.width,
            height: input.height,
            format,
            depth: input.depth,
            row_bytes: input.row_bytes,
            pixels: input.pixels,
        })
        .map_err(|source| BridgeError::ColorConversion {
            direction: Conversion::RgbToYuv,
            source,
        })?;
    timings.convert = clock.lap("convert");

    let mut encoder = backend
        .create_encoder()
        .ok_or(BridgeError::BackendConstruction("encoder"))?;
    encoder
        .configure(&plan.settings)
        .map_err(BridgeError::Encode)?;
    let bitstream = encoder.write(&image).map_err(BridgeError::Encode)?;
    timings.encode = clock.lap("encode");

    ctx.limits
        .check_memory(bitstream.len() as u64)
        .map_err(BridgeError::LimitExceeded)?;
    let data = OwnedBuffer::copy_from(ctx.heap, &bitstream)?;
    timings.output = clock.lap("output");
    Ok(data)
}
