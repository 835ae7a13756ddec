//! In-process reference backends for the integration tests.
//!
//! Both implement the backend traits over a trivial container so the bridge
//! can be exercised end to end without native codecs:
//!
//! - [`MockAvif`] stores planes as run-length coded samples. Lossy encodes
//!   quantize by a step derived from the quantizer, so output shrinks as
//!   quality drops and quantizer 0 is bit-exact.
//! - [`MockJxl`] stores basic info, color, ICC and one frame verbatim and
//!   replays the event protocol over it. It can also replay a fixed event
//!   script to drive the dispatcher into unusual paths.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use codec_bridge::BackendError;
use codec_bridge::backend::{
    AvifBackend, AvifDecoder, AvifDecoderOptions, AvifEncodeImage, AvifEncoder,
    AvifEncoderSettings, AvifImageHeader, Cicp, CicpMatrix, CicpPrimaries, CicpTransfer,
    ContentLightLevel, EventMask, JxlBackend, JxlBasicInfo, JxlColorEncoding, JxlColorSpace,
    JxlDataType, JxlDecoder, JxlEncoder, JxlEncoderStatus, JxlEvent, JxlFrameSettings,
    JxlPixelFormat, JxlPrimaries, JxlRenderingIntent, JxlTransferFunction, JxlWhitePoint,
    RgbView, RgbViewMut, YuvFormat, YuvRange,
};

// ---------------------------------------------------------------------------
// Byte plumbing
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ReadError {
    Truncated,
    Invalid(String),
}

impl From<ReadError> for BackendError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Truncated => BackendError::new("truncated file"),
            ReadError::Invalid(reason) => BackendError::new(reason),
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.data.len() - self.pos < n {
            return Err(ReadError::Truncated);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ReadError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ReadError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, ReadError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn code<T: PartialEq + Copy>(all: &[T], value: T) -> u8 {
    all.iter().position(|&v| v == value).unwrap_or(0) as u8
}

fn pick<T: Copy>(all: &[T], code: u8) -> Result<T, ReadError> {
    all.get(code as usize)
        .copied()
        .ok_or_else(|| ReadError::Invalid(format!("bad enum code {code}")))
}

fn max_value(depth: u32) -> u32 {
    (1u32 << depth) - 1
}

/// Rescale `v` from `from` to `to` bits, rounding to nearest.
fn rescale(v: u32, from: u32, to: u32) -> u32 {
    if from == to {
        return v;
    }
    (v * max_value(to) + max_value(from) / 2) / max_value(from)
}

fn read_sample(bytes: &[u8], index: usize, wide: bool) -> u32 {
    if wide {
        u32::from(u16::from_ne_bytes([bytes[index * 2], bytes[index * 2 + 1]]))
    } else {
        u32::from(bytes[index])
    }
}

fn write_sample(bytes: &mut [u8], index: usize, wide: bool, v: u32) {
    if wide {
        bytes[index * 2..index * 2 + 2].copy_from_slice(&(v as u16).to_ne_bytes());
    } else {
        bytes[index] = v as u8;
    }
}

// ---------------------------------------------------------------------------
// AVIF
// ---------------------------------------------------------------------------

const YUV_FORMATS: [YuvFormat; 4] = [
    YuvFormat::Yuv444,
    YuvFormat::Yuv422,
    YuvFormat::Yuv420,
    YuvFormat::Yuv400,
];
const AVIF_MAGIC: &[u8] = b"MOCK";

/// Decoded content of a mock AVIF file.
#[derive(Clone, Debug, PartialEq)]
pub struct AvifFile {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub yuv_format: YuvFormat,
    pub range: YuvRange,
    pub cicp: Cicp,
    pub clli: ContentLightLevel,
    /// 3 (color) or 4 (color + alpha).
    pub channels: u32,
    pub icc: Vec<u8>,
    /// Interleaved samples at `depth` bits.
    pub samples: Vec<u16>,
}

impl AvifFile {
    /// Opaque sRGB image filled with one color.
    pub fn solid(width: u32, height: u32, depth: u32, rgb: [u16; 3]) -> Self {
        let samples = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self {
            width,
            height,
            depth,
            yuv_format: YuvFormat::Yuv444,
            range: YuvRange::Full,
            cicp: Cicp {
                color_primaries: CicpPrimaries::BT709,
                transfer_characteristics: CicpTransfer::SRGB,
                matrix_coefficients: CicpMatrix::BT601,
            },
            clli: ContentLightLevel::default(),
            channels: 3,
            icc: Vec::new(),
            samples,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 16];
        out.extend_from_slice(b"ftypavif");
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(AVIF_MAGIC);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.depth as u8);
        out.push(code(&YUV_FORMATS, self.yuv_format));
        out.push(u8::from(self.range == YuvRange::Full));
        out.push(self.cicp.color_primaries.0);
        out.push(self.cicp.transfer_characteristics.0);
        out.push(self.cicp.matrix_coefficients.0);
        out.push(self.channels as u8);
        out.extend_from_slice(&self.clli.max_cll.to_le_bytes());
        out.extend_from_slice(&self.clli.max_pall.to_le_bytes());
        put_bytes(&mut out, &self.icc);

        // One run-length coded plane per channel.
        let channels = self.channels as usize;
        let mut runs: Vec<(u16, u16)> = Vec::new();
        for c in 0..channels {
            let mut plane = self.samples.iter().skip(c).step_by(channels);
            let Some(&first) = plane.next() else { continue };
            let mut run = (1u16, first);
            for &v in plane {
                if v == run.1 && run.0 < u16::MAX {
                    run.0 += 1;
                } else {
                    runs.push(run);
                    run = (1, v);
                }
            }
            runs.push(run);
        }
        out.extend_from_slice(&(runs.len() as u32).to_le_bytes());
        for (count, value) in runs {
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        Self::read(data).map_err(BackendError::from)
    }

    fn read(data: &[u8]) -> Result<Self, ReadError> {
        let mut r = Reader::new(data);
        if r.take(16)?.get(4..12) != Some(b"ftypavif".as_slice()) || r.take(4)? != AVIF_MAGIC {
            return Err(ReadError::Invalid("not a mock AVIF file".into()));
        }
        let width = r.u32()?;
        let height = r.u32()?;
        let depth = u32::from(r.u8()?);
        let yuv_format = pick(&YUV_FORMATS, r.u8()?)?;
        let range = if r.u8()? == 1 {
            YuvRange::Full
        } else {
            YuvRange::Limited
        };
        let cicp = Cicp {
            color_primaries: CicpPrimaries(r.u8()?),
            transfer_characteristics: CicpTransfer(r.u8()?),
            matrix_coefficients: CicpMatrix(r.u8()?),
        };
        let channels = u32::from(r.u8()?);
        let clli = ContentLightLevel {
            max_cll: r.u16()?,
            max_pall: r.u16()?,
        };
        let icc = r.bytes()?;

        let pixels = (width * height) as usize;
        let mut planes: Vec<Vec<u16>> = Vec::new();
        let mut current = Vec::with_capacity(pixels);
        for _ in 0..r.u32()? {
            let count = r.u16()?;
            let value = r.u16()?;
            current.extend(std::iter::repeat_n(value, count as usize));
            if current.len() >= pixels {
                planes.push(std::mem::take(&mut current));
            }
        }
        if planes.len() != channels as usize || planes.iter().any(|p| p.len() != pixels) {
            return Err(ReadError::Invalid("plane data does not match header".into()));
        }
        let samples = (0..pixels)
            .flat_map(|i| planes.iter().map(move |p| p[i]))
            .collect();

        Ok(Self {
            width,
            height,
            depth,
            yuv_format,
            range,
            cicp,
            clli,
            channels,
            icc,
            samples,
        })
    }
}

/// What the mock AVIF backend was asked to do, for assertions.
#[derive(Clone, Debug, Default)]
pub struct AvifRecord {
    pub decoder_options: Option<AvifDecoderOptions>,
    pub settings: Option<AvifEncoderSettings>,
    pub image_depth: Option<u32>,
    pub yuv_format: Option<YuvFormat>,
    pub cicp: Option<Cicp>,
}

#[derive(Clone, Debug)]
pub struct MockAvif {
    /// Stage that reports failure: `decoder`, `io`, `parse`, `decode`,
    /// `yuv`, `image`, `icc`, `rgb`, `encoder`, `configure` or `write`.
    pub fail_at: Option<&'static str>,
    pub max_threads: usize,
    pub record: Arc<Mutex<AvifRecord>>,
}

impl Default for MockAvif {
    fn default() -> Self {
        Self {
            fail_at: None,
            max_threads: 1,
            record: Arc::default(),
        }
    }
}

impl MockAvif {
    pub fn failing_at(stage: &'static str) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    pub fn record(&self) -> AvifRecord {
        self.record.lock().unwrap().clone()
    }

    fn check(&self, stage: &'static str) -> Result<(), BackendError> {
        check(self.fail_at, stage)
    }
}

fn check(fail_at: Option<&'static str>, stage: &'static str) -> Result<(), BackendError> {
    if fail_at == Some(stage) {
        Err(BackendError::new(format!("mock {stage} failure")))
    } else {
        Ok(())
    }
}

impl AvifBackend for MockAvif {
    type Decoder<'input> = MockAvifDecoder<'input>;
    type Image = MockAvifImage;
    type Encoder = MockAvifEncoder;

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        self.check("decoder").ok()?;
        Some(MockAvifDecoder {
            backend: self.clone(),
            input: None,
            file: None,
            decoded: false,
        })
    }

    fn create_image(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        yuv_format: YuvFormat,
    ) -> Option<MockAvifImage> {
        self.check("image").ok()?;
        let mut record = self.record.lock().unwrap();
        record.image_depth = Some(depth);
        record.yuv_format = Some(yuv_format);
        Some(MockAvifImage {
            backend: self.clone(),
            width,
            height,
            depth,
            yuv_format,
            cicp: Cicp::UNSPECIFIED,
            range: YuvRange::Full,
            icc: Vec::new(),
            channels: 0,
            samples: Vec::new(),
        })
    }

    fn create_encoder(&self) -> Option<MockAvifEncoder> {
        self.check("encoder").ok()?;
        Some(MockAvifEncoder {
            backend: self.clone(),
            settings: None,
        })
    }
}

pub struct MockAvifDecoder<'input> {
    backend: MockAvif,
    input: Option<&'input [u8]>,
    file: Option<AvifFile>,
    decoded: bool,
}

impl<'input> AvifDecoder<'input> for MockAvifDecoder<'input> {
    fn configure(&mut self, options: &AvifDecoderOptions) {
        self.backend.record.lock().unwrap().decoder_options = Some(*options);
    }

    fn set_io_memory(&mut self, data: &'input [u8]) -> Result<(), BackendError> {
        self.backend.check("io")?;
        self.input = Some(data);
        Ok(())
    }

    fn parse(&mut self) -> Result<(), BackendError> {
        self.backend.check("parse")?;
        let input = self.input.ok_or_else(|| BackendError::new("no input"))?;
        self.file = Some(AvifFile::parse(input)?);
        Ok(())
    }

    fn image(&self) -> AvifImageHeader<'_> {
        match &self.file {
            Some(f) => AvifImageHeader {
                width: f.width,
                height: f.height,
                depth: f.depth,
                yuv_format: f.yuv_format,
                yuv_range: f.range,
                cicp: f.cicp,
                clli: f.clli,
                has_alpha: f.channels == 4,
                icc: &f.icc,
            },
            None => AvifImageHeader {
                width: 0,
                height: 0,
                depth: 0,
                yuv_format: YuvFormat::Yuv444,
                yuv_range: YuvRange::Full,
                cicp: Cicp::UNSPECIFIED,
                clli: ContentLightLevel::default(),
                has_alpha: false,
                icc: &[],
            },
        }
    }

    fn next_image(&mut self) -> Result<(), BackendError> {
        self.backend.check("decode")?;
        if self.file.is_none() {
            return Err(BackendError::new("not parsed"));
        }
        self.decoded = true;
        Ok(())
    }

    fn yuv_to_rgb(&self, out: &mut RgbViewMut<'_>) -> Result<(), BackendError> {
        self.backend.check("yuv")?;
        let file = match (&self.file, self.decoded) {
            (Some(f), true) => f,
            _ => return Err(BackendError::new("no decoded image")),
        };
        let src_ch = file.channels as usize;
        let out_ch = out.format.channels() as usize;
        let wide = out.depth > 8;
        let sample_bytes = if wide { 2 } else { 1 };
        for y in 0..out.height as usize {
            let row = &mut out.pixels[y * out.row_bytes..];
            for x in 0..out.width as usize {
                let px = &file.samples[(y * file.width as usize + x) * src_ch..][..src_ch];
                for c in 0..out_ch {
                    let is_alpha = out.format.has_alpha() && c == out_ch - 1;
                    let v = if is_alpha {
                        if src_ch == 4 {
                            rescale(u32::from(px[3]), file.depth, out.depth)
                        } else {
                            max_value(out.depth)
                        }
                    } else if out_ch <= 2 {
                        rescale(u32::from(px[0]), file.depth, out.depth)
                    } else {
                        rescale(u32::from(px[c]), file.depth, out.depth)
                    };
                    let index = x * out_ch + c;
                    debug_assert!(index * sample_bytes < out.row_bytes);
                    write_sample(row, index, wide, v);
                }
            }
        }
        Ok(())
    }
}

pub struct MockAvifImage {
    backend: MockAvif,
    width: u32,
    height: u32,
    depth: u32,
    yuv_format: YuvFormat,
    cicp: Cicp,
    range: YuvRange,
    icc: Vec<u8>,
    channels: u32,
    samples: Vec<u16>,
}

impl AvifEncodeImage for MockAvifImage {
    fn set_color(&mut self, cicp: Cicp, range: YuvRange) {
        self.cicp = cicp;
        self.range = range;
        self.backend.record.lock().unwrap().cicp = Some(cicp);
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError> {
        self.backend.check("icc")?;
        self.icc = icc.to_vec();
        Ok(())
    }

    fn rgb_to_yuv(&mut self, rgb: &RgbView<'_>) -> Result<(), BackendError> {
        self.backend.check("rgb")?;
        if (rgb.width, rgb.height) != (self.width, self.height) {
            return Err(BackendError::new("geometry mismatch"));
        }
        let channels = rgb.format.channels() as usize;
        let wide = rgb.depth > 8;
        self.channels = channels as u32;
        self.samples.clear();
        for y in 0..rgb.height as usize {
            let row = &rgb.pixels[y * rgb.row_bytes..];
            for i in 0..rgb.width as usize * channels {
                let v = read_sample(row, i, wide);
                self.samples.push(rescale(v, rgb.depth, self.depth) as u16);
            }
        }
        Ok(())
    }
}

pub struct MockAvifEncoder {
    backend: MockAvif,
    settings: Option<AvifEncoderSettings>,
}

impl AvifEncoder for MockAvifEncoder {
    type Image = MockAvifImage;

    fn configure(&mut self, settings: &AvifEncoderSettings) -> Result<(), BackendError> {
        self.backend.check("configure")?;
        self.settings = Some(*settings);
        self.backend.record.lock().unwrap().settings = Some(*settings);
        Ok(())
    }

    fn write(&mut self, image: &MockAvifImage) -> Result<Vec<u8>, BackendError> {
        self.backend.check("write")?;
        let settings = self
            .settings
            .ok_or_else(|| BackendError::new("not configured"))?;
        let channels = image.channels as usize;
        let max = max_value(image.depth);
        let samples = image
            .samples
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let q = if channels == 4 && i % 4 == 3 {
                    settings.quantizer_alpha
                } else {
                    settings.quantizer
                };
                let step = 1u32 << (q / 8);
                if step == 1 {
                    v
                } else {
                    ((u32::from(v) / step * step + step / 2).min(max)) as u16
                }
            })
            .collect();
        Ok(AvifFile {
            width: image.width,
            height: image.height,
            depth: image.depth,
            yuv_format: image.yuv_format,
            range: image.range,
            cicp: image.cicp,
            clli: ContentLightLevel::default(),
            channels: image.channels,
            icc: image.icc.clone(),
            samples,
        }
        .to_bytes())
    }
}

// ---------------------------------------------------------------------------
// JPEG XL
// ---------------------------------------------------------------------------

const JXL_MAGIC: &[u8] = b"MJXL";
const COLOR_SPACES: [JxlColorSpace; 4] = [
    JxlColorSpace::Rgb,
    JxlColorSpace::Gray,
    JxlColorSpace::Xyb,
    JxlColorSpace::Unknown,
];
const WHITE_POINTS: [JxlWhitePoint; 4] = [
    JxlWhitePoint::D65,
    JxlWhitePoint::Custom,
    JxlWhitePoint::E,
    JxlWhitePoint::Dci,
];
const PRIMARIES: [JxlPrimaries; 4] = [
    JxlPrimaries::Srgb,
    JxlPrimaries::Custom,
    JxlPrimaries::Rec2100,
    JxlPrimaries::P3,
];
const TRANSFERS: [JxlTransferFunction; 8] = [
    JxlTransferFunction::Bt709,
    JxlTransferFunction::Unknown,
    JxlTransferFunction::Linear,
    JxlTransferFunction::Srgb,
    JxlTransferFunction::Pq,
    JxlTransferFunction::Dci,
    JxlTransferFunction::Hlg,
    JxlTransferFunction::Gamma,
];
const INTENTS: [JxlRenderingIntent; 4] = [
    JxlRenderingIntent::Perceptual,
    JxlRenderingIntent::Relative,
    JxlRenderingIntent::Saturation,
    JxlRenderingIntent::Absolute,
];
const DATA_TYPES: [JxlDataType; 4] = [
    JxlDataType::Uint8,
    JxlDataType::Uint16,
    JxlDataType::Float16,
    JxlDataType::Float,
];

/// Header part of a mock JPEG XL file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JxlHeader {
    pub basic: JxlBasicInfo,
    pub frames: u8,
    pub color: Option<JxlColorEncoding>,
    pub icc: Vec<u8>,
}

/// A complete mock JPEG XL file.
#[derive(Clone, Debug, PartialEq)]
pub struct JxlFile {
    pub header: JxlHeader,
    pub format: JxlPixelFormat,
    pub pixels: Vec<u8>,
}

impl JxlFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        let b = &self.header.basic;
        let mut out = vec![0xFF, 0x0A];
        out.extend_from_slice(JXL_MAGIC);
        out.extend_from_slice(&b.xsize.to_le_bytes());
        out.extend_from_slice(&b.ysize.to_le_bytes());
        for v in [
            b.bits_per_sample,
            b.exponent_bits_per_sample,
            b.num_color_channels,
            b.num_extra_channels,
            b.alpha_bits,
            b.alpha_exponent_bits,
            u32::from(b.have_animation),
            u32::from(b.uses_original_profile),
        ] {
            out.push(v as u8);
        }
        out.push(self.header.frames);
        match &self.header.color {
            Some(c) => {
                out.push(1);
                out.push(code(&COLOR_SPACES, c.color_space));
                out.push(code(&WHITE_POINTS, c.white_point));
                out.push(code(&PRIMARIES, c.primaries));
                out.push(code(&TRANSFERS, c.transfer_function));
                out.push(code(&INTENTS, c.rendering_intent));
            }
            None => out.push(0),
        }
        put_bytes(&mut out, &self.header.icc);
        out.push(self.format.num_channels as u8);
        out.push(code(&DATA_TYPES, self.format.data_type));
        put_bytes(&mut out, &self.pixels);
        out
    }

    fn read_header(r: &mut Reader<'_>) -> Result<JxlHeader, ReadError> {
        if r.take(2)? != [0xFF, 0x0A] || r.take(4)? != JXL_MAGIC {
            return Err(ReadError::Invalid("not a mock JPEG XL file".into()));
        }
        let xsize = r.u32()?;
        let ysize = r.u32()?;
        let mut f = [0u32; 8];
        for v in &mut f {
            *v = u32::from(r.u8()?);
        }
        let basic = JxlBasicInfo {
            xsize,
            ysize,
            bits_per_sample: f[0],
            exponent_bits_per_sample: f[1],
            num_color_channels: f[2],
            num_extra_channels: f[3],
            alpha_bits: f[4],
            alpha_exponent_bits: f[5],
            have_animation: f[6] != 0,
            uses_original_profile: f[7] != 0,
        };
        let frames = r.u8()?;
        let color = if r.u8()? == 1 {
            Some(JxlColorEncoding {
                color_space: pick(&COLOR_SPACES, r.u8()?)?,
                white_point: pick(&WHITE_POINTS, r.u8()?)?,
                primaries: pick(&PRIMARIES, r.u8()?)?,
                transfer_function: pick(&TRANSFERS, r.u8()?)?,
                gamma: 0.0,
                rendering_intent: pick(&INTENTS, r.u8()?)?,
            })
        } else {
            None
        };
        let icc = r.bytes()?;
        Ok(JxlHeader {
            basic,
            frames,
            color,
            icc,
        })
    }

    fn read_frame(r: &mut Reader<'_>) -> Result<(JxlPixelFormat, Vec<u8>), ReadError> {
        let num_channels = u32::from(r.u8()?);
        let data_type = pick(&DATA_TYPES, r.u8()?)?;
        let pixels = r.bytes()?;
        Ok((
            JxlPixelFormat {
                num_channels,
                data_type,
                align: 0,
            },
            pixels,
        ))
    }

    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let mut r = Reader::new(data);
        let header = Self::read_header(&mut r)?;
        let (format, pixels) = Self::read_frame(&mut r)?;
        Ok(Self {
            header,
            format,
            pixels,
        })
    }
}

/// What the mock JPEG XL backend was asked to do, for assertions.
#[derive(Clone, Debug, Default)]
pub struct JxlRecord {
    pub decoder_threads: Option<usize>,
    pub encoder_threads: Option<usize>,
    pub events: Option<EventMask>,
    pub basic: Option<JxlBasicInfo>,
    pub color: Option<JxlColorEncoding>,
    pub icc: Option<Vec<u8>>,
    pub frame: Option<JxlFrameSettings>,
    pub output_calls: usize,
}

#[derive(Clone, Debug)]
pub struct MockJxl {
    /// Stage that reports failure: `decoder`, `runner`, `input`, `encoder`,
    /// `basic`, `frame`, `add` or `output`.
    pub fail_at: Option<&'static str>,
    pub max_threads: usize,
    /// When set, decoders replay these events instead of reading input.
    pub script: Option<Script>,
    pub record: Arc<Mutex<JxlRecord>>,
}

/// Canned decoder behavior.
#[derive(Clone, Debug)]
pub struct Script {
    pub basic: JxlBasicInfo,
    pub color: Option<JxlColorEncoding>,
    pub icc: Vec<u8>,
    pub events: Vec<JxlEvent>,
}

impl Default for MockJxl {
    fn default() -> Self {
        Self {
            fail_at: None,
            max_threads: 1,
            script: None,
            record: Arc::default(),
        }
    }
}

impl MockJxl {
    pub fn failing_at(stage: &'static str) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn scripted(script: Script) -> Self {
        Self {
            script: Some(script),
            ..Self::default()
        }
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    pub fn record(&self) -> JxlRecord {
        self.record.lock().unwrap().clone()
    }
}

impl JxlBackend for MockJxl {
    type Decoder<'input> = MockJxlDecoder<'input>;
    type Encoder = MockJxlEncoder;

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn create_decoder<'input>(&self) -> Option<Self::Decoder<'input>> {
        check(self.fail_at, "decoder").ok()?;
        Some(MockJxlDecoder {
            backend: self.clone(),
            events: EventMask::empty(),
            input: None,
            closed: false,
            phase: Phase::Start,
            header: None,
            out_format: None,
            frames_done: 0,
            script: self
                .script
                .as_ref()
                .map(|s| s.events.iter().cloned().collect()),
        })
    }

    fn create_encoder(&self) -> Option<MockJxlEncoder> {
        check(self.fail_at, "encoder").ok()?;
        Some(MockJxlEncoder {
            backend: self.clone(),
            header: JxlHeader::default(),
            frame: None,
            output: None,
            sent: 0,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Start,
    Basic,
    Color,
    WantBuffer,
    FrameDone,
    Done,
}

pub struct MockJxlDecoder<'input> {
    backend: MockJxl,
    events: EventMask,
    input: Option<&'input [u8]>,
    closed: bool,
    phase: Phase,
    header: Option<(JxlHeader, usize)>,
    out_format: Option<(JxlPixelFormat, usize)>,
    frames_done: u8,
    script: Option<VecDeque<JxlEvent>>,
}

impl MockJxlDecoder<'_> {
    fn current_header(&self) -> Option<JxlHeader> {
        match &self.backend.script {
            Some(s) => Some(JxlHeader {
                basic: s.basic,
                frames: 1,
                color: s.color,
                icc: s.icc.clone(),
            }),
            None => self.header.as_ref().map(|(h, _)| h.clone()),
        }
    }

    fn replay(&mut self, out: Option<&mut [u8]>) -> JxlEvent {
        let Some(event) = self.script.as_mut().and_then(VecDeque::pop_front) else {
            return JxlEvent::Error(BackendError::new("script exhausted"));
        };
        if event == JxlEvent::FullImage {
            if let Some(out) = out {
                out.fill(0x5A);
            }
        }
        event
    }

    fn step(&mut self, mut out: Option<&mut [u8]>) -> JxlEvent {
        let Some(input) = self.input else {
            return JxlEvent::Error(BackendError::new("no input"));
        };
        loop {
            match self.phase {
                Phase::Start => {
                    let mut r = Reader::new(input);
                    match JxlFile::read_header(&mut r) {
                        Ok(header) => self.header = Some((header, r.pos)),
                        Err(ReadError::Truncated) => return JxlEvent::NeedMoreInput,
                        Err(e) => return JxlEvent::Error(e.into()),
                    }
                    self.phase = Phase::Basic;
                    if self.events.contains(EventMask::BASIC_INFO) {
                        return JxlEvent::BasicInfo;
                    }
                }
                Phase::Basic => {
                    self.phase = Phase::Color;
                    if self.events.contains(EventMask::COLOR_ENCODING) {
                        return JxlEvent::ColorEncoding;
                    }
                }
                Phase::Color => {
                    if self.events.contains(EventMask::FULL_IMAGE) {
                        self.phase = Phase::WantBuffer;
                        return JxlEvent::NeedImageOutBuffer;
                    }
                    self.phase = Phase::Done;
                    return JxlEvent::Success;
                }
                Phase::WantBuffer => {
                    let (Some((format, len)), Some(out)) = (self.out_format, out.take()) else {
                        return JxlEvent::Error(BackendError::new("no output buffer set"));
                    };
                    let Some((_, offset)) = &self.header else {
                        return JxlEvent::Error(BackendError::new("no header"));
                    };
                    let mut r = Reader::new(&input[*offset..]);
                    let (stored, pixels) = match JxlFile::read_frame(&mut r) {
                        Ok(frame) => frame,
                        Err(ReadError::Truncated) => return JxlEvent::NeedMoreInput,
                        Err(e) => return JxlEvent::Error(e.into()),
                    };
                    if let Err(e) = convert(&stored, &pixels, &format, &mut out[..len]) {
                        return JxlEvent::Error(e);
                    }
                    self.frames_done += 1;
                    self.phase = Phase::FrameDone;
                    return JxlEvent::FullImage;
                }
                Phase::FrameDone => {
                    let frames = self.header.as_ref().map_or(1, |(h, _)| h.frames);
                    if self.frames_done < frames {
                        self.out_format = None;
                        self.phase = Phase::WantBuffer;
                        return JxlEvent::NeedImageOutBuffer;
                    }
                    self.phase = Phase::Done;
                    return JxlEvent::Success;
                }
                Phase::Done => return JxlEvent::Error(BackendError::new("already finished")),
            }
        }
    }
}

/// Copy a stored frame into the requested layout.
fn convert(
    stored: &JxlPixelFormat,
    pixels: &[u8],
    want: &JxlPixelFormat,
    out: &mut [u8],
) -> Result<(), BackendError> {
    if stored.num_channels != want.num_channels {
        return Err(BackendError::new("channel conversion not supported"));
    }
    match (stored.data_type, want.data_type) {
        (a, b) if a == b => {
            if pixels.len() != out.len() {
                return Err(BackendError::new("frame size mismatch"));
            }
            out.copy_from_slice(pixels);
        }
        (JxlDataType::Uint16, JxlDataType::Uint8) => {
            for (i, o) in out.iter_mut().enumerate() {
                *o = (read_sample(pixels, i, true) >> 8) as u8;
            }
        }
        (JxlDataType::Uint8, JxlDataType::Uint16) => {
            for i in 0..out.len() / 2 {
                write_sample(out, i, true, u32::from(pixels[i]) * 257);
            }
        }
        _ => return Err(BackendError::new("sample conversion not supported")),
    }
    Ok(())
}

impl<'input> JxlDecoder<'input> for MockJxlDecoder<'input> {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError> {
        check(self.backend.fail_at, "runner")?;
        self.backend.record.lock().unwrap().decoder_threads = Some(threads);
        Ok(())
    }

    fn subscribe_events(&mut self, events: EventMask) -> Result<(), BackendError> {
        self.events = events;
        self.backend.record.lock().unwrap().events = Some(events);
        Ok(())
    }

    fn set_input(&mut self, data: &'input [u8]) -> Result<(), BackendError> {
        check(self.backend.fail_at, "input")?;
        self.input = Some(data);
        Ok(())
    }

    fn close_input(&mut self) {
        self.closed = true;
    }

    fn process_input(&mut self, out: Option<&mut [u8]>) -> JxlEvent {
        if self.script.is_some() {
            self.replay(out)
        } else {
            self.step(out)
        }
    }

    fn basic_info(&self) -> Result<JxlBasicInfo, BackendError> {
        self.current_header()
            .map(|h| h.basic)
            .ok_or_else(|| BackendError::new("basic info not available yet"))
    }

    fn icc_profile_size(&self) -> Option<usize> {
        self.current_header().map(|h| h.icc.len())
    }

    fn copy_icc_profile(&self, out: &mut [u8]) -> Result<(), BackendError> {
        let header = self
            .current_header()
            .ok_or_else(|| BackendError::new("no header"))?;
        if out.len() != header.icc.len() {
            return Err(BackendError::new("ICC size mismatch"));
        }
        out.copy_from_slice(&header.icc);
        Ok(())
    }

    fn encoded_color_profile(&self) -> Option<JxlColorEncoding> {
        self.current_header().and_then(|h| h.color)
    }

    fn image_out_buffer_size(&self, format: &JxlPixelFormat) -> Result<usize, BackendError> {
        let header = self
            .current_header()
            .ok_or_else(|| BackendError::new("no header"))?;
        Ok(header.basic.xsize as usize
            * header.basic.ysize as usize
            * format.num_channels as usize
            * format.data_type.bytes_per_sample())
    }

    fn set_image_out_buffer(
        &mut self,
        format: &JxlPixelFormat,
        len: usize,
    ) -> Result<(), BackendError> {
        if len < self.image_out_buffer_size(format)? {
            return Err(BackendError::new("output buffer too small"));
        }
        self.out_format = Some((*format, len));
        Ok(())
    }
}

pub struct MockJxlEncoder {
    backend: MockJxl,
    header: JxlHeader,
    frame: Option<(JxlPixelFormat, Vec<u8>)>,
    output: Option<Vec<u8>>,
    sent: usize,
}

impl JxlEncoder for MockJxlEncoder {
    fn set_parallel_runner(&mut self, threads: usize) -> Result<(), BackendError> {
        check(self.backend.fail_at, "runner")?;
        self.backend.record.lock().unwrap().encoder_threads = Some(threads);
        Ok(())
    }

    fn set_basic_info(&mut self, info: &JxlBasicInfo) -> Result<(), BackendError> {
        check(self.backend.fail_at, "basic")?;
        self.header.basic = *info;
        self.header.frames = 1;
        self.backend.record.lock().unwrap().basic = Some(*info);
        Ok(())
    }

    fn set_color_encoding(&mut self, color: &JxlColorEncoding) -> Result<(), BackendError> {
        self.header.color = Some(*color);
        self.backend.record.lock().unwrap().color = Some(*color);
        Ok(())
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), BackendError> {
        self.header.icc = icc.to_vec();
        self.backend.record.lock().unwrap().icc = Some(icc.to_vec());
        Ok(())
    }

    fn configure_frame(&mut self, settings: &JxlFrameSettings) -> Result<(), BackendError> {
        check(self.backend.fail_at, "frame")?;
        self.backend.record.lock().unwrap().frame = Some(*settings);
        Ok(())
    }

    fn add_image_frame(
        &mut self,
        format: &JxlPixelFormat,
        pixels: &[u8],
    ) -> Result<(), BackendError> {
        check(self.backend.fail_at, "add")?;
        let b = &self.header.basic;
        let expected = b.xsize as usize
            * b.ysize as usize
            * format.num_channels as usize
            * format.data_type.bytes_per_sample();
        if pixels.len() != expected {
            return Err(BackendError::new("frame size does not match basic info"));
        }
        self.frame = Some((*format, pixels.to_vec()));
        Ok(())
    }

    fn close_input(&mut self) {
        if let Some((format, pixels)) = self.frame.take() {
            self.output = Some(
                JxlFile {
                    header: self.header.clone(),
                    format,
                    pixels,
                }
                .to_bytes(),
            );
        }
    }

    fn process_output(&mut self, out: &mut [u8]) -> Result<JxlEncoderStatus, BackendError> {
        check(self.backend.fail_at, "output")?;
        self.backend.record.lock().unwrap().output_calls += 1;
        let data = self
            .output
            .as_ref()
            .ok_or_else(|| BackendError::new("input not closed"))?;
        let n = out.len().min(data.len() - self.sent);
        out[..n].copy_from_slice(&data[self.sent..self.sent + n]);
        self.sent += n;
        Ok(if self.sent == data.len() {
            JxlEncoderStatus::Success { written: n }
        } else {
            JxlEncoderStatus::NeedMoreOutput { written: n }
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A small synthetic ICC profile: header-shaped bytes with a recognizable tail.
pub fn sample_icc() -> Vec<u8> {
    let mut icc = vec![0u8; 128];
    icc[..4].copy_from_slice(&132u32.to_be_bytes());
    icc[36..40].copy_from_slice(b"acsp");
    icc.extend_from_slice(b"test");
    icc
}

/// Deterministic 8-bit RGB test images with smooth and textured regions.
pub fn corpus(width: u32, height: u32) -> Vec<Vec<u8>> {
    (1..=10u32)
        .map(|seed| {
            let mut px = Vec::with_capacity((width * height * 3) as usize);
            for y in 0..height {
                for x in 0..width {
                    let r = (x * seed + y) % 256;
                    let g = (y * (seed + 2) + x / 2) % 256;
                    let b = ((x ^ y) * seed / 3 + x * y / 16) % 256;
                    px.extend_from_slice(&[r as u8, g as u8, b as u8]);
                }
            }
            px
        })
        .collect()
}
