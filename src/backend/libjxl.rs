//! JPEG XL encoding and decoding through libjxl (`jpegxl-sys`).
//!
//! libjxl binds the output buffer by pointer when it asks for one. The
//! bridge hands the buffer over on the following
//! [`process_input`](JxlDecoder::process_input) call instead, so the pointer
//! is bound there, once, and every later call must pass the same buffer.

use core::ffi::c_void;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::num::NonZeroUsize;
use core::ptr::{self, NonNull};

use jpegxl_sys::color::color_encoding as color;
use jpegxl_sys::common::types::{self as types, JxlBool, JxlEndianness};
use jpegxl_sys::decode::{self as dec, JxlColorProfileTarget, JxlDecoderStatus};
use jpegxl_sys::encoder::encode::{self as enc, JxlEncoderFrameSettingId};
use jpegxl_sys::metadata::codestream_header as header;
use jpegxl_sys::threads::thread_parallel_runner as runner;

use super::jxl::{
    EventMask, JxlBackend, JxlBasicInfo, JxlColorEncoding, JxlColorSpace, JxlDataType,
    JxlDecoder, JxlEncoder, JxlEncoderStatus, JxlEvent, JxlFrameSettings, JxlPixelFormat,
    JxlPrimaries, JxlRenderingIntent, JxlTransferFunction, JxlWhitePoint,
};
use crate::error::BackendError;

fn jxl_bool(value: bool) -> JxlBool {
    if value { JxlBool::True } else { JxlBool::False }
}

fn is_true(value: JxlBool) -> bool {
    value as i32 != 0
}

fn decoder_ok(status: JxlDecoderStatus, call: &str) -> Result<(), BackendError> {
    if matches!(status, JxlDecoderStatus::Success) {
        Ok(())
    } else {
        Err(BackendError::new(format!("{call} failed")))
    }
}

fn sys_pixel_format(format: &JxlPixelFormat) -> types::JxlPixelFormat {
    types::JxlPixelFormat {
        num_channels: format.num_channels,
        data_type: match format.data_type {
            JxlDataType::Uint8 => types::JxlDataType::Uint8,
            JxlDataType::Uint16 => types::JxlDataType::Uint16,
            JxlDataType::Float16 => types::JxlDataType::Float16,
            JxlDataType::Float => types::JxlDataType::Float,
        },
        endianness: JxlEndianness::Native,
        align: format.align,
    }
}

/// Read a libjxl color encoding by discriminant. Values this crate has no
/// name for fall back to the "custom"/"unknown" member.
fn from_sys_color(c: color::JxlColorEncoding) -> JxlColorEncoding {
    JxlColorEncoding {
        color_space: match c.color_space as u32 {
            0 => JxlColorSpace::Rgb,
            1 => JxlColorSpace::Gray,
            2 => JxlColorSpace::Xyb,
            _ => JxlColorSpace::Unknown,
        },
        white_point: match c.white_point as u32 {
            1 => JxlWhitePoint::D65,
            10 => JxlWhitePoint::E,
            11 => JxlWhitePoint::Dci,
            _ => JxlWhitePoint::Custom,
        },
        primaries: match c.primaries as u32 {
            1 => JxlPrimaries::Srgb,
            9 => JxlPrimaries::Rec2100,
            11 => JxlPrimaries::P3,
            _ => JxlPrimaries::Custom,
        },
        transfer_function: match c.transfer_function as u32 {
            1 => JxlTransferFunction::Bt709,
            8 => JxlTransferFunction::Linear,
            13 => JxlTransferFunction::Srgb,
            16 => JxlTransferFunction::Pq,
            17 => JxlTransferFunction::Dci,
            18 => JxlTransferFunction::Hlg,
            65535 => JxlTransferFunction::Gamma,
            _ => JxlTransferFunction::Unknown,
        },
        gamma: c.gamma,
        rendering_intent: match c.rendering_intent as u32 {
            0 => JxlRenderingIntent::Perceptual,
            2 => JxlRenderingIntent::Saturation,
            3 => JxlRenderingIntent::Absolute,
            _ => JxlRenderingIntent::Relative,
        },
    }
}

/// libjxl's thread pool, shared with one decoder or encoder.
#[derive(Debug)]
struct ThreadRunner(NonNull<c_void>);

impl ThreadRunner {
    fn new(threads: usize) -> Result<Self, BackendError> {
        // SAFETY: a null memory manager selects libjxl's default allocator.
        let raw = unsafe { runner::JxlThreadParallelRunnerCreate(ptr::null(), threads) };
        NonNull::new(raw)
            .map(Self)
            .ok_or_else(|| BackendError::new("JxlThreadParallelRunnerCreate failed"))
    }
}

impl Drop for ThreadRunner {
    fn drop(&mut self) {
        // SAFETY: created by JxlThreadParallelRunnerCreate, destroyed once,
        // after the decoder or encoder using it.
        unsafe { runner::JxlThreadParallelRunnerDestroy(self.0.as_ptr()) }
    }
}

/// JPEG XL backend over the C libjxl library.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibjxlBackend;

impl JxlBackend for LibjxlBackend {
    type Decoder<'input> = LibjxlDecoder<'input>;
    type Encoder = LibjxlEncoder;

    fn max_threads(&self) -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        // SAFETY: a null memory manager selects libjxl's default allocator.
        let raw = NonNull::new(unsafe { dec::JxlDecoderCreate(ptr::null()) })?;
        Some(LibjxlDecoder {
            raw,
            runner: None,
            announced: None,
            bound: None,
            _input: PhantomData,
        })
    }

    fn create_encoder(&self) -> Option<LibjxlEncoder> {
        // SAFETY: as above.
        let raw = NonNull::new(unsafe { enc::JxlEncoderCreate(ptr::null()) })?;
        Some(LibjxlEncoder {
            raw,
            frame: None,
            runner: None,
        })
    }
}

#[derive(Debug)]
pub struct LibjxlDecoder<'input> {
    raw: NonNull<dec::JxlDecoder>,
    runner: Option<ThreadRunner>,
    /// Layout and length from `set_image_out_buffer`, not yet bound.
    announced: Option<(JxlPixelFormat, usize)>,
    /// Address of the bound output buffer.
    bound: Option<usize>,
    _input: PhantomData<&'input [u8]>,
}

impl Drop for LibjxlDecoder<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from JxlDecoderCreate and is destroyed once.
        // The runner field drops afterwards.
        unsafe { dec::JxlDecoderDestroy(self.raw.as_ptr()) }
    }
}

impl LibjxlDecoder<'_> {
    fn bind_output(&mut self, out: &mut [u8]) -> Result<(), BackendError> {
        if let Some((format, len)) = self.announced.take() {
            if out.len() < len {
                return Err(BackendError::new("output buffer is smaller than announced"));
            }
            let format = sys_pixel_format(&format);
            // SAFETY: `out` is the caller's output allocation, which the
            // decode loop keeps alive and in place until the decoder drops.
            decoder_ok(
                unsafe {
                    dec::JxlDecoderSetImageOutBuffer(
                        self.raw.as_ptr(),
                        &format,
                        out.as_mut_ptr().cast(),
                        len,
                    )
                },
                "JxlDecoderSetImageOutBuffer",
            )?;
            self.bound = Some(out.as_ptr() as usize);
        } else if self.bound.is_some_and(|addr| addr != out.as_ptr() as usize) {
            return Err(BackendError::new("output buffer moved after binding"));
        }
        Ok(())
    }
}

impl<'input> JxlDecoder<'input> for LibjxlDecoder<'input> {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError> {
        let pool = ThreadRunner::new(threads)?;
        // SAFETY: the pool outlives the decoder (see `Drop`).
        decoder_ok(
            unsafe {
                dec::JxlDecoderSetParallelRunner(
                    self.raw.as_ptr(),
                    runner::JxlThreadParallelRunner,
                    pool.0.as_ptr(),
                )
            },
            "JxlDecoderSetParallelRunner",
        )?;
        self.runner = Some(pool);
        Ok(())
    }

    fn subscribe_events(&mut self, events: EventMask) -> Result<(), BackendError> {
        // EventMask bits are libjxl's JXL_DEC_* values.
        let wanted = i32::try_from(events.bits())
            .map_err(|_| BackendError::new("event mask out of range"))?;
        // SAFETY: live decoder.
        decoder_ok(
            unsafe { dec::JxlDecoderSubscribeEvents(self.raw.as_ptr(), wanted) },
            "JxlDecoderSubscribeEvents",
        )
    }

    fn set_input(&mut self, data: &'input [u8]) -> Result<(), BackendError> {
        // SAFETY: `data` outlives the decoder through `'input`.
        decoder_ok(
            unsafe { dec::JxlDecoderSetInput(self.raw.as_ptr(), data.as_ptr(), data.len()) },
            "JxlDecoderSetInput",
        )
    }

    fn close_input(&mut self) {
        // SAFETY: live decoder.
        unsafe { dec::JxlDecoderCloseInput(self.raw.as_ptr()) }
    }

    fn process_input(&mut self, out: Option<&mut [u8]>) -> JxlEvent {
        if let Some(out) = out {
            if let Err(err) = self.bind_output(out) {
                return JxlEvent::Error(err);
            }
        }
        // SAFETY: live decoder; any bound output buffer is still in place.
        let status = unsafe { dec::JxlDecoderProcessInput(self.raw.as_ptr()) };
        match status {
            JxlDecoderStatus::Success => JxlEvent::Success,
            JxlDecoderStatus::BasicInfo => JxlEvent::BasicInfo,
            JxlDecoderStatus::ColorEncoding => JxlEvent::ColorEncoding,
            JxlDecoderStatus::NeedImageOutBuffer => JxlEvent::NeedImageOutBuffer,
            JxlDecoderStatus::FullImage => JxlEvent::FullImage,
            JxlDecoderStatus::NeedMoreInput => JxlEvent::NeedMoreInput,
            JxlDecoderStatus::Error => JxlEvent::Error(BackendError::new("libjxl decoding error")),
            other => JxlEvent::Error(BackendError::new(format!(
                "unexpected libjxl status {}",
                other as i32
            ))),
        }
    }

    fn basic_info(&self) -> Result<JxlBasicInfo, BackendError> {
        let mut info = MaybeUninit::<header::JxlBasicInfo>::uninit();
        // SAFETY: libjxl fills the whole struct on success.
        decoder_ok(
            unsafe { dec::JxlDecoderGetBasicInfo(self.raw.as_ptr(), info.as_mut_ptr()) },
            "JxlDecoderGetBasicInfo",
        )?;
        // SAFETY: initialized by the successful call above.
        let info = unsafe { info.assume_init() };
        Ok(JxlBasicInfo {
            xsize: info.xsize,
            ysize: info.ysize,
            bits_per_sample: info.bits_per_sample,
            exponent_bits_per_sample: info.exponent_bits_per_sample,
            num_color_channels: info.num_color_channels,
            num_extra_channels: info.num_extra_channels,
            alpha_bits: info.alpha_bits,
            alpha_exponent_bits: info.alpha_exponent_bits,
            have_animation: is_true(info.have_animation),
            uses_original_profile: is_true(info.uses_original_profile),
        })
    }

    fn icc_profile_size(&self) -> Option<usize> {
        let mut size = 0usize;
        // SAFETY: live decoder, `size` is a valid out pointer.
        let status = unsafe {
            dec::JxlDecoderGetICCProfileSize(
                self.raw.as_ptr(),
                JxlColorProfileTarget::Data,
                &mut size,
            )
        };
        matches!(status, JxlDecoderStatus::Success).then_some(size)
    }

    fn copy_icc_profile(&self, out: &mut [u8]) -> Result<(), BackendError> {
        // SAFETY: `out` is writable for `out.len()` bytes.
        decoder_ok(
            unsafe {
                dec::JxlDecoderGetColorAsICCProfile(
                    self.raw.as_ptr(),
                    JxlColorProfileTarget::Data,
                    out.as_mut_ptr(),
                    out.len(),
                )
            },
            "JxlDecoderGetColorAsICCProfile",
        )
    }

    fn encoded_color_profile(&self) -> Option<JxlColorEncoding> {
        let mut encoding = MaybeUninit::<color::JxlColorEncoding>::uninit();
        // SAFETY: libjxl fills the struct on success only.
        let status = unsafe {
            dec::JxlDecoderGetColorAsEncodedProfile(
                self.raw.as_ptr(),
                JxlColorProfileTarget::Data,
                encoding.as_mut_ptr(),
            )
        };
        if !matches!(status, JxlDecoderStatus::Success) {
            return None;
        }
        // SAFETY: initialized by the successful call above.
        Some(from_sys_color(unsafe { encoding.assume_init() }))
    }

    fn image_out_buffer_size(&self, format: &JxlPixelFormat) -> Result<usize, BackendError> {
        let format = sys_pixel_format(format);
        let mut size = 0usize;
        // SAFETY: live decoder, valid in and out pointers.
        decoder_ok(
            unsafe { dec::JxlDecoderImageOutBufferSize(self.raw.as_ptr(), &format, &mut size) },
            "JxlDecoderImageOutBufferSize",
        )?;
        Ok(size)
    }

    fn set_image_out_buffer(
        &mut self,
        format: &JxlPixelFormat,
        len: usize,
    ) -> Result<(), BackendError> {
        if self.bound.is_some() {
            return Err(BackendError::new("output buffer already bound"));
        }
        self.announced = Some((*format, len));
        Ok(())
    }
}

#[derive(Debug)]
pub struct LibjxlEncoder {
    raw: NonNull<enc::JxlEncoder>,
    /// Owned by the encoder and freed with it.
    frame: Option<NonNull<enc::JxlEncoderFrameSettings>>,
    runner: Option<ThreadRunner>,
}

impl Drop for LibjxlEncoder {
    fn drop(&mut self) {
        // SAFETY: `raw` came from JxlEncoderCreate and is destroyed once,
        // together with its frame settings. The runner field drops afterwards.
        unsafe { enc::JxlEncoderDestroy(self.raw.as_ptr()) }
    }
}

impl LibjxlEncoder {
    fn check(&self, status: enc::JxlEncoderStatus, call: &str) -> Result<(), BackendError> {
        if matches!(status, enc::JxlEncoderStatus::Success) {
            return Ok(());
        }
        Err(self.error(call))
    }

    fn error(&self, call: &str) -> BackendError {
        // SAFETY: live encoder.
        let code = unsafe { enc::JxlEncoderGetError(self.raw.as_ptr()) } as i32;
        BackendError::new(format!("{call} failed (libjxl error {code})"))
    }

    fn frame(&self) -> Result<*mut enc::JxlEncoderFrameSettings, BackendError> {
        self.frame
            .map(NonNull::as_ptr)
            .ok_or_else(|| BackendError::new("frame settings are not configured"))
    }
}

impl JxlEncoder for LibjxlEncoder {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError> {
        let pool = ThreadRunner::new(threads)?;
        // SAFETY: the pool outlives the encoder (see `Drop`).
        let status = unsafe {
            enc::JxlEncoderSetParallelRunner(
                self.raw.as_ptr(),
                runner::JxlThreadParallelRunner,
                pool.0.as_ptr(),
            )
        };
        self.check(status, "JxlEncoderSetParallelRunner")?;
        self.runner = Some(pool);
        Ok(())
    }

    fn set_basic_info(&mut self, basic: &JxlBasicInfo) -> Result<(), BackendError> {
        let mut info = MaybeUninit::<header::JxlBasicInfo>::uninit();
        // SAFETY: JxlEncoderInitBasicInfo writes every field.
        unsafe { enc::JxlEncoderInitBasicInfo(info.as_mut_ptr()) };
        let mut info = unsafe { info.assume_init() };
        info.xsize = basic.xsize;
        info.ysize = basic.ysize;
        info.bits_per_sample = basic.bits_per_sample;
        info.exponent_bits_per_sample = basic.exponent_bits_per_sample;
        info.num_color_channels = basic.num_color_channels;
        info.num_extra_channels = basic.num_extra_channels;
        info.alpha_bits = basic.alpha_bits;
        info.alpha_exponent_bits = basic.alpha_exponent_bits;
        info.have_animation = jxl_bool(basic.have_animation);
        info.uses_original_profile = jxl_bool(basic.uses_original_profile);
        // SAFETY: live encoder; libjxl copies the struct.
        let status = unsafe { enc::JxlEncoderSetBasicInfo(self.raw.as_ptr(), &info) };
        self.check(status, "JxlEncoderSetBasicInfo")
    }

    fn set_color_encoding(&mut self, encoding: &JxlColorEncoding) -> Result<(), BackendError> {
        let is_gray = encoding.color_space == JxlColorSpace::Gray;
        let mut c = MaybeUninit::<color::JxlColorEncoding>::uninit();
        // SAFETY: JxlColorEncodingSetToSRGB writes every field.
        unsafe { enc::JxlColorEncodingSetToSRGB(c.as_mut_ptr(), jxl_bool(is_gray)) };
        let mut c = unsafe { c.assume_init() };
        c.white_point = match encoding.white_point {
            JxlWhitePoint::D65 => color::JxlWhitePoint::D65,
            JxlWhitePoint::Custom => color::JxlWhitePoint::Custom,
            JxlWhitePoint::E => color::JxlWhitePoint::E,
            JxlWhitePoint::Dci => color::JxlWhitePoint::Dci,
        };
        c.primaries = match encoding.primaries {
            JxlPrimaries::Srgb => color::JxlPrimaries::SRgb,
            JxlPrimaries::Custom => color::JxlPrimaries::Custom,
            JxlPrimaries::Rec2100 => color::JxlPrimaries::Rec2100,
            JxlPrimaries::P3 => color::JxlPrimaries::P3,
        };
        c.transfer_function = match encoding.transfer_function {
            JxlTransferFunction::Bt709 => color::JxlTransferFunction::BT709,
            JxlTransferFunction::Unknown => color::JxlTransferFunction::Unknown,
            JxlTransferFunction::Linear => color::JxlTransferFunction::Linear,
            JxlTransferFunction::Srgb => color::JxlTransferFunction::SRGB,
            JxlTransferFunction::Pq => color::JxlTransferFunction::PQ,
            JxlTransferFunction::Dci => color::JxlTransferFunction::DCI,
            JxlTransferFunction::Hlg => color::JxlTransferFunction::HLG,
            JxlTransferFunction::Gamma => color::JxlTransferFunction::Gamma,
        };
        c.gamma = encoding.gamma;
        c.rendering_intent = match encoding.rendering_intent {
            JxlRenderingIntent::Perceptual => color::JxlRenderingIntent::Perceptual,
            JxlRenderingIntent::Relative => color::JxlRenderingIntent::Relative,
            JxlRenderingIntent::Saturation => color::JxlRenderingIntent::Saturation,
            JxlRenderingIntent::Absolute => color::JxlRenderingIntent::Absolute,
        };
        // SAFETY: live encoder; libjxl copies the struct.
        let status = unsafe { enc::JxlEncoderSetColorEncoding(self.raw.as_ptr(), &c) };
        self.check(status, "JxlEncoderSetColorEncoding")
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError> {
        // SAFETY: libjxl copies the profile.
        let status =
            unsafe { enc::JxlEncoderSetICCProfile(self.raw.as_ptr(), icc.as_ptr(), icc.len()) };
        self.check(status, "JxlEncoderSetICCProfile")
    }

    fn configure_frame(&mut self, settings: &JxlFrameSettings) -> Result<(), BackendError> {
        // SAFETY: live encoder; null source means default settings.
        let frame = NonNull::new(unsafe {
            enc::JxlEncoderFrameSettingsCreate(self.raw.as_ptr(), ptr::null())
        })
        .ok_or_else(|| self.error("JxlEncoderFrameSettingsCreate"))?;
        self.frame = Some(frame);
        let frame = frame.as_ptr();

        // SAFETY: `frame` belongs to this live encoder.
        let status = if settings.lossless {
            unsafe { enc::JxlEncoderSetFrameLossless(frame, JxlBool::True) }
        } else {
            unsafe { enc::JxlEncoderSetFrameDistance(frame, settings.distance) }
        };
        self.check(status, "frame quality")?;
        let status = unsafe {
            enc::JxlEncoderFrameSettingsSetOption(
                frame,
                JxlEncoderFrameSettingId::Effort,
                i64::from(settings.effort),
            )
        };
        self.check(status, "frame effort")?;
        if settings.responsive {
            let status = unsafe {
                enc::JxlEncoderFrameSettingsSetOption(
                    frame,
                    JxlEncoderFrameSettingId::Responsive,
                    1,
                )
            };
            self.check(status, "frame responsive")?;
        }
        Ok(())
    }

    fn add_image_frame(
        &mut self,
        format: &JxlPixelFormat,
        pixels: &[u8],
    ) -> Result<(), BackendError> {
        let frame = self.frame()?;
        let format = sys_pixel_format(format);
        // SAFETY: libjxl copies `pixels` before returning.
        let status = unsafe {
            enc::JxlEncoderAddImageFrame(frame, &format, pixels.as_ptr().cast(), pixels.len())
        };
        self.check(status, "JxlEncoderAddImageFrame")
    }

    fn close_input(&mut self) {
        // SAFETY: live encoder.
        unsafe { enc::JxlEncoderCloseInput(self.raw.as_ptr()) }
    }

    fn process_output(&mut self, out: &mut [u8]) -> Result<JxlEncoderStatus, BackendError> {
        let mut next = out.as_mut_ptr();
        let mut avail = out.len();
        // SAFETY: `next` points at `avail` writable bytes; libjxl advances
        // both as it writes.
        let status =
            unsafe { enc::JxlEncoderProcessOutput(self.raw.as_ptr(), &mut next, &mut avail) };
        let written = out.len() - avail;
        match status {
            enc::JxlEncoderStatus::Success => Ok(JxlEncoderStatus::Success { written }),
            enc::JxlEncoderStatus::NeedMoreOutput => {
                Ok(JxlEncoderStatus::NeedMoreOutput { written })
            }
            _ => Err(self.error("JxlEncoderProcessOutput")),
        }
    }
}
