//! AVIF encoding and decoding through libavif (`libavif-sys`).
//!
//! Each wrapper owns exactly one object obtained from a libavif `*Create`
//! call and destroys it on drop, so an early return from any pipeline stage
//! releases everything built so far.

use core::ffi::{CStr, c_int};
use core::marker::PhantomData;
use core::num::NonZeroUsize;
use core::ptr::{self, NonNull};

use libavif_sys as sys;

use super::avif::{
    AvifBackend, AvifDecoder, AvifDecoderOptions, AvifEncodeImage, AvifEncoder,
    AvifEncoderSettings, AvifImageHeader, Cicp, CicpMatrix, CicpPrimaries, CicpTransfer,
    ContentLightLevel, RgbFormat, RgbView, RgbViewMut, YuvFormat, YuvRange,
};
use crate::error::BackendError;

fn check(result: sys::avifResult) -> Result<(), BackendError> {
    if result == sys::AVIF_RESULT_OK {
        return Ok(());
    }
    // SAFETY: avifResultToString returns a static NUL-terminated string for
    // every input, including unknown codes.
    let reason = unsafe { CStr::from_ptr(sys::avifResultToString(result)) };
    Err(BackendError::new(reason.to_string_lossy().into_owned()))
}

fn threads(n: usize) -> c_int {
    c_int::try_from(n.max(1)).unwrap_or(c_int::MAX)
}

fn pixel_format(yuv_format: YuvFormat) -> sys::avifPixelFormat {
    match yuv_format {
        YuvFormat::Yuv444 => sys::AVIF_PIXEL_FORMAT_YUV444,
        YuvFormat::Yuv422 => sys::AVIF_PIXEL_FORMAT_YUV422,
        YuvFormat::Yuv420 => sys::AVIF_PIXEL_FORMAT_YUV420,
        YuvFormat::Yuv400 => sys::AVIF_PIXEL_FORMAT_YUV400,
    }
}

fn rgb_format(format: RgbFormat) -> sys::avifRGBFormat {
    if format.has_alpha() {
        sys::AVIF_RGB_FORMAT_RGBA
    } else {
        sys::AVIF_RGB_FORMAT_RGB
    }
}

fn code_point(value: impl TryInto<u8>, unspecified: u8) -> u8 {
    value.try_into().unwrap_or(unspecified)
}

/// AVIF backend over the C libavif library.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibavifBackend;

impl AvifBackend for LibavifBackend {
    type Decoder<'input> = LibavifDecoder<'input>;
    type Image = LibavifImage;
    type Encoder = LibavifEncoder;

    fn max_threads(&self) -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        // SAFETY: no preconditions. Null means allocation failed.
        let raw = NonNull::new(unsafe { sys::avifDecoderCreate() })?;
        Some(LibavifDecoder {
            raw,
            _input: PhantomData,
        })
    }

    fn create_image(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        yuv_format: YuvFormat,
    ) -> Option<LibavifImage> {
        // SAFETY: plain values in, owned image (or null) out.
        let raw = NonNull::new(unsafe {
            sys::avifImageCreate(width, height, depth, pixel_format(yuv_format))
        })?;
        Some(LibavifImage { raw })
    }

    fn create_encoder(&self) -> Option<LibavifEncoder> {
        // SAFETY: no preconditions. Null means allocation failed.
        let raw = NonNull::new(unsafe { sys::avifEncoderCreate() })?;
        Some(LibavifEncoder { raw })
    }
}

/// `avifDecoder` reading a borrowed input buffer in place.
#[derive(Debug)]
pub struct LibavifDecoder<'input> {
    raw: NonNull<sys::avifDecoder>,
    /// libavif keeps a pointer to the bound input.
    _input: PhantomData<&'input [u8]>,
}

impl Drop for LibavifDecoder<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from avifDecoderCreate and is destroyed once.
        unsafe { sys::avifDecoderDestroy(self.raw.as_ptr()) }
    }
}

impl LibavifDecoder<'_> {
    fn current_image(&self) -> Option<&sys::avifImage> {
        // SAFETY: `image` is owned by the decoder and is only replaced by
        // calls that take `&mut self`.
        unsafe { self.raw.as_ref().image.as_ref() }
    }
}

impl<'input> AvifDecoder<'input> for LibavifDecoder<'input> {
    fn configure(&mut self, options: &AvifDecoderOptions) {
        // SAFETY: exclusive access to a live decoder.
        let decoder = unsafe { self.raw.as_mut() };
        decoder.maxThreads = threads(options.max_threads);
        decoder.strictFlags = if options.strict {
            sys::AVIF_STRICT_ENABLED as _
        } else {
            sys::AVIF_STRICT_DISABLED as _
        };
        decoder.ignoreExif = sys::avifBool::from(options.ignore_exif);
        decoder.ignoreXMP = sys::avifBool::from(options.ignore_xmp);
    }

    fn set_io_memory(&mut self, data: &'input [u8]) -> Result<(), BackendError> {
        // SAFETY: `data` outlives the decoder through `'input`.
        check(unsafe { sys::avifDecoderSetIOMemory(self.raw.as_ptr(), data.as_ptr(), data.len()) })
    }

    fn parse(&mut self) -> Result<(), BackendError> {
        // SAFETY: live decoder with input bound.
        check(unsafe { sys::avifDecoderParse(self.raw.as_ptr()) })
    }

    fn image(&self) -> AvifImageHeader<'_> {
        let Some(image) = self.current_image() else {
            return AvifImageHeader {
                width: 0,
                height: 0,
                depth: 0,
                yuv_format: YuvFormat::Yuv420,
                yuv_range: YuvRange::Full,
                cicp: Cicp::UNSPECIFIED,
                clli: ContentLightLevel::default(),
                has_alpha: false,
                icc: &[],
            };
        };
        let yuv_format = match image.yuvFormat {
            sys::AVIF_PIXEL_FORMAT_YUV444 => YuvFormat::Yuv444,
            sys::AVIF_PIXEL_FORMAT_YUV422 => YuvFormat::Yuv422,
            sys::AVIF_PIXEL_FORMAT_YUV400 => YuvFormat::Yuv400,
            _ => YuvFormat::Yuv420,
        };
        let icc = if image.icc.data.is_null() || image.icc.size == 0 {
            &[][..]
        } else {
            // SAFETY: libavif owns `size` bytes at `data` for as long as the
            // image, which `&self` keeps alive.
            unsafe { core::slice::from_raw_parts(image.icc.data, image.icc.size) }
        };
        AvifImageHeader {
            width: image.width,
            height: image.height,
            depth: image.depth,
            yuv_format,
            yuv_range: if image.yuvRange == sys::AVIF_RANGE_FULL {
                YuvRange::Full
            } else {
                YuvRange::Limited
            },
            cicp: Cicp {
                color_primaries: CicpPrimaries(code_point(
                    image.colorPrimaries,
                    CicpPrimaries::UNSPECIFIED.0,
                )),
                transfer_characteristics: CicpTransfer(code_point(
                    image.transferCharacteristics,
                    CicpTransfer::UNSPECIFIED.0,
                )),
                matrix_coefficients: CicpMatrix(code_point(
                    image.matrixCoefficients,
                    CicpMatrix::UNSPECIFIED.0,
                )),
            },
            clli: ContentLightLevel {
                max_cll: image.clli.maxCLL,
                max_pall: image.clli.maxPALL,
            },
            has_alpha: !image.alphaPlane.is_null(),
            icc,
        }
    }

    fn next_image(&mut self) -> Result<(), BackendError> {
        // SAFETY: live, parsed decoder.
        check(unsafe { sys::avifDecoderNextImage(self.raw.as_ptr()) })
    }

    fn yuv_to_rgb(&self, out: &mut RgbViewMut<'_>) -> Result<(), BackendError> {
        let image = self
            .current_image()
            .ok_or_else(|| BackendError::new("no decoded image"))?;
        match out.format {
            RgbFormat::Rgb | RgbFormat::Rgba => {
                convert_to_rgb(image, out.format, out.depth, out.row_bytes, out.pixels)
            }
            // libavif has no grey layout: convert to RGB(A) and keep the
            // first color channel, which equals luma for 4:0:0 sources.
            RgbFormat::Gray | RgbFormat::GrayAlpha => {
                let color = if out.format.has_alpha() {
                    RgbFormat::Rgba
                } else {
                    RgbFormat::Rgb
                };
                let sample = if out.depth > 8 { 2 } else { 1 };
                let width = out.width as usize;
                let row_bytes = width * color.channels() as usize * sample;
                let mut scratch = vec![0u8; row_bytes * out.height as usize];
                convert_to_rgb(image, color, out.depth, row_bytes, &mut scratch)?;

                let src_px = color.channels() as usize * sample;
                let dst_px = out.format.channels() as usize * sample;
                for (src, dst) in scratch
                    .chunks_exact(row_bytes)
                    .zip(out.pixels.chunks_mut(out.row_bytes))
                {
                    for (s, d) in src.chunks_exact(src_px).zip(dst.chunks_exact_mut(dst_px)) {
                        d[..sample].copy_from_slice(&s[..sample]);
                        if out.format.has_alpha() {
                            d[sample..].copy_from_slice(&s[3 * sample..]);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn convert_to_rgb(
    image: &sys::avifImage,
    format: RgbFormat,
    depth: u32,
    row_bytes: usize,
    pixels: &mut [u8],
) -> Result<(), BackendError> {
    let row_bytes_c =
        u32::try_from(row_bytes).map_err(|_| BackendError::new("row stride overflows"))?;
    if pixels.len() < row_bytes * image.height as usize {
        return Err(BackendError::new("output buffer is smaller than the image"));
    }
    // SAFETY: avifRGBImage is plain data and avifRGBImageSetDefaults
    // initializes every field from `image`.
    let mut rgb: sys::avifRGBImage = unsafe { core::mem::zeroed() };
    unsafe { sys::avifRGBImageSetDefaults(&mut rgb, image) };
    rgb.depth = depth;
    rgb.format = rgb_format(format);
    rgb.pixels = pixels.as_mut_ptr();
    rgb.rowBytes = row_bytes_c;
    // SAFETY: `pixels` holds `rowBytes * height` writable bytes for the
    // whole call and libavif keeps no reference afterwards.
    check(unsafe { sys::avifImageYUVToRGB(image, &mut rgb) })
}

/// `avifImage` being filled for encoding.
#[derive(Debug)]
pub struct LibavifImage {
    raw: NonNull<sys::avifImage>,
}

impl Drop for LibavifImage {
    fn drop(&mut self) {
        // SAFETY: `raw` came from avifImageCreate and is destroyed once.
        unsafe { sys::avifImageDestroy(self.raw.as_ptr()) }
    }
}

impl AvifEncodeImage for LibavifImage {
    fn set_color(&mut self, cicp: Cicp, range: YuvRange) {
        // SAFETY: exclusive access to a live image.
        let image = unsafe { self.raw.as_mut() };
        image.colorPrimaries = cicp.color_primaries.0.into();
        image.transferCharacteristics = cicp.transfer_characteristics.0.into();
        image.matrixCoefficients = cicp.matrix_coefficients.0.into();
        image.yuvRange = match range {
            YuvRange::Full => sys::AVIF_RANGE_FULL,
            YuvRange::Limited => sys::AVIF_RANGE_LIMITED,
        };
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError> {
        // SAFETY: libavif copies the profile.
        check(unsafe { sys::avifImageSetProfileICC(self.raw.as_ptr(), icc.as_ptr(), icc.len()) })
    }

    fn rgb_to_yuv(&mut self, rgb: &RgbView<'_>) -> Result<(), BackendError> {
        if matches!(rgb.format, RgbFormat::Gray | RgbFormat::GrayAlpha) {
            return Err(BackendError::new("libavif takes RGB or RGBA input"));
        }
        let row_bytes =
            u32::try_from(rgb.row_bytes).map_err(|_| BackendError::new("row stride overflows"))?;
        if rgb.pixels.len() < rgb.row_bytes * rgb.height as usize {
            return Err(BackendError::new("pixel buffer does not match image geometry"));
        }
        // SAFETY: as in `convert_to_rgb`.
        let mut view: sys::avifRGBImage = unsafe { core::mem::zeroed() };
        unsafe { sys::avifRGBImageSetDefaults(&mut view, self.raw.as_ptr()) };
        view.depth = rgb.depth;
        view.format = rgb_format(rgb.format);
        // libavif only reads through `pixels` during RGB to YUV conversion.
        view.pixels = rgb.pixels.as_ptr().cast_mut();
        view.rowBytes = row_bytes;
        // SAFETY: `rgb.pixels` covers `rowBytes * height` bytes for the call.
        check(unsafe { sys::avifImageRGBToYUV(self.raw.as_ptr(), &view) })
    }
}

/// Owned `avifRWData`, freed with libavif's allocator.
struct RwData(sys::avifRWData);

impl Drop for RwData {
    fn drop(&mut self) {
        // SAFETY: freeing an empty or libavif-filled buffer is always valid.
        unsafe { sys::avifRWDataFree(&mut self.0) }
    }
}

#[derive(Debug)]
pub struct LibavifEncoder {
    raw: NonNull<sys::avifEncoder>,
}

impl Drop for LibavifEncoder {
    fn drop(&mut self) {
        // SAFETY: `raw` came from avifEncoderCreate and is destroyed once.
        unsafe { sys::avifEncoderDestroy(self.raw.as_ptr()) }
    }
}

impl AvifEncoder for LibavifEncoder {
    type Image = LibavifImage;

    fn configure(&mut self, settings: &AvifEncoderSettings) -> Result<(), BackendError> {
        // SAFETY: exclusive access to a live encoder.
        let encoder = unsafe { self.raw.as_mut() };
        encoder.maxThreads = threads(settings.max_threads);
        encoder.speed = c_int::from(settings.speed);
        encoder.quality = c_int::from(settings.quality);
        encoder.qualityAlpha = c_int::from(settings.quality_alpha);
        encoder.autoTiling = sys::avifBool::from(settings.auto_tiling);
        Ok(())
    }

    fn write(&mut self, image: &LibavifImage) -> Result<Vec<u8>, BackendError> {
        let mut output = RwData(sys::avifRWData {
            data: ptr::null_mut(),
            size: 0,
        });
        // SAFETY: live encoder and image; `output` receives a buffer owned
        // by libavif that `RwData` frees.
        check(unsafe {
            sys::avifEncoderWrite(self.raw.as_ptr(), image.raw.as_ptr(), &mut output.0)
        })?;
        if output.0.data.is_null() {
            return Err(BackendError::new("encoder produced no output"));
        }
        // SAFETY: on success libavif filled `size` bytes at `data`.
        Ok(unsafe { core::slice::from_raw_parts(output.0.data, output.0.size) }.to_vec())
    }
}
