//! Codec-agnostic color and HDR metadata.
//!
//! Both backends describe color differently: AVIF through CICP code points and
//! a `clli` box, JPEG XL through a structured color encoding. This module maps
//! both into one [`ImageMetadata`] with a fixed string vocabulary. The mapping
//! is total: anything without a name becomes `"unknown"`.

use core::fmt;

use crate::backend::{
    AvifImageHeader, CicpMatrix, CicpPrimaries, CicpTransfer, JxlBasicInfo, JxlColorEncoding,
    JxlPrimaries, JxlTransferFunction, YuvRange,
};
use crate::buffer::{OwnedBuffer, SharedHeap};
use crate::error::BridgeError;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $($variant,)*
            #[default]
            Unknown,
        }

        impl $name {
            /// Vocabulary string, e.g. for a host-side metadata object.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                    $name::Unknown => "unknown",
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Chromaticities of the RGB primaries.
    pub enum ColorPrimaries {
        Bt709 => "bt709",
        Bt470m => "bt470m",
        Bt470bg => "bt470bg",
        Bt601 => "bt601",
        Smpte240 => "smpte240",
        GenericFilm => "generic-film",
        Bt2020 => "bt2020",
        Xyz => "xyz",
        DciP3 => "dci-p3",
        DisplayP3 => "display-p3",
        Ebu3213 => "ebu3213",
    }
}

vocabulary! {
    /// Opto-electronic transfer function.
    pub enum TransferFunction {
        Bt709 => "bt709",
        Bt470m => "bt470m",
        Bt470bg => "bt470bg",
        Bt601 => "bt601",
        Smpte240 => "smpte240",
        Linear => "linear",
        Log100 => "log100",
        Log100Sqrt10 => "log100-sqrt10",
        Iec61966 => "iec61966",
        Bt1361 => "bt1361",
        Srgb => "srgb",
        Bt2020TenBit => "bt2020-10bit",
        Bt2020TwelveBit => "bt2020-12bit",
        Pq => "pq",
        Smpte428 => "smpte428",
        Hlg => "hlg",
        Dci => "dci",
        Gamma => "gamma",
    }
}

vocabulary! {
    /// YUV to RGB matrix.
    pub enum MatrixCoefficients {
        Identity => "identity",
        Bt709 => "bt709",
        Fcc => "fcc",
        Bt470bg => "bt470bg",
        Bt601 => "bt601",
        Smpte240 => "smpte240",
        YCgCo => "ycgco",
        Bt2020Ncl => "bt2020-ncl",
        Bt2020Cl => "bt2020-cl",
        Smpte2085 => "smpte2085",
        ChromaDerivedNcl => "chroma-derived-ncl",
        ChromaDerivedCl => "chroma-derived-cl",
        Ictcp => "ictcp",
    }
}

const PRIMARIES: [(CicpPrimaries, ColorPrimaries); 11] = [
    (CicpPrimaries::BT709, ColorPrimaries::Bt709),
    (CicpPrimaries::BT470M, ColorPrimaries::Bt470m),
    (CicpPrimaries::BT470BG, ColorPrimaries::Bt470bg),
    (CicpPrimaries::BT601, ColorPrimaries::Bt601),
    (CicpPrimaries::SMPTE240, ColorPrimaries::Smpte240),
    (CicpPrimaries::GENERIC_FILM, ColorPrimaries::GenericFilm),
    (CicpPrimaries::BT2020, ColorPrimaries::Bt2020),
    (CicpPrimaries::XYZ, ColorPrimaries::Xyz),
    (CicpPrimaries::SMPTE431, ColorPrimaries::DciP3),
    (CicpPrimaries::SMPTE432, ColorPrimaries::DisplayP3),
    (CicpPrimaries::EBU3213, ColorPrimaries::Ebu3213),
];

const TRANSFERS: [(CicpTransfer, TransferFunction); 16] = [
    (CicpTransfer::BT709, TransferFunction::Bt709),
    (CicpTransfer::BT470M, TransferFunction::Bt470m),
    (CicpTransfer::BT470BG, TransferFunction::Bt470bg),
    (CicpTransfer::BT601, TransferFunction::Bt601),
    (CicpTransfer::SMPTE240, TransferFunction::Smpte240),
    (CicpTransfer::LINEAR, TransferFunction::Linear),
    (CicpTransfer::LOG100, TransferFunction::Log100),
    (CicpTransfer::LOG100_SQRT10, TransferFunction::Log100Sqrt10),
    (CicpTransfer::IEC61966, TransferFunction::Iec61966),
    (CicpTransfer::BT1361, TransferFunction::Bt1361),
    (CicpTransfer::SRGB, TransferFunction::Srgb),
    (CicpTransfer::BT2020_10BIT, TransferFunction::Bt2020TenBit),
    (CicpTransfer::BT2020_12BIT, TransferFunction::Bt2020TwelveBit),
    (CicpTransfer::PQ, TransferFunction::Pq),
    (CicpTransfer::SMPTE428, TransferFunction::Smpte428),
    (CicpTransfer::HLG, TransferFunction::Hlg),
];

const MATRICES: [(CicpMatrix, MatrixCoefficients); 13] = [
    (CicpMatrix::IDENTITY, MatrixCoefficients::Identity),
    (CicpMatrix::BT709, MatrixCoefficients::Bt709),
    (CicpMatrix::FCC, MatrixCoefficients::Fcc),
    (CicpMatrix::BT470BG, MatrixCoefficients::Bt470bg),
    (CicpMatrix::BT601, MatrixCoefficients::Bt601),
    (CicpMatrix::SMPTE240, MatrixCoefficients::Smpte240),
    (CicpMatrix::YCGCO, MatrixCoefficients::YCgCo),
    (CicpMatrix::BT2020_NCL, MatrixCoefficients::Bt2020Ncl),
    (CicpMatrix::BT2020_CL, MatrixCoefficients::Bt2020Cl),
    (CicpMatrix::SMPTE2085, MatrixCoefficients::Smpte2085),
    (CicpMatrix::CHROMA_DERIVED_NCL, MatrixCoefficients::ChromaDerivedNcl),
    (CicpMatrix::CHROMA_DERIVED_CL, MatrixCoefficients::ChromaDerivedCl),
    (CicpMatrix::ICTCP, MatrixCoefficients::Ictcp),
];

fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|&(_, v)| v)
}

fn reverse<K: Copy, V: PartialEq + Copy>(table: &[(K, V)], value: V) -> Option<K> {
    table.iter().find(|(_, v)| *v == value).map(|&(k, _)| k)
}

impl ColorPrimaries {
    pub fn from_cicp(code: CicpPrimaries) -> Self {
        lookup(&PRIMARIES, code).unwrap_or(Self::Unknown)
    }

    /// CICP code point, `None` for names H.273 does not define.
    pub fn to_cicp(self) -> Option<CicpPrimaries> {
        reverse(&PRIMARIES, self)
    }

    pub fn from_jxl(primaries: JxlPrimaries) -> Self {
        match primaries {
            JxlPrimaries::Srgb => Self::Bt709,
            JxlPrimaries::Rec2100 => Self::Bt2020,
            JxlPrimaries::P3 => Self::DisplayP3,
            JxlPrimaries::Custom => Self::Unknown,
        }
    }
}

impl TransferFunction {
    pub fn from_cicp(code: CicpTransfer) -> Self {
        lookup(&TRANSFERS, code).unwrap_or(Self::Unknown)
    }

    pub fn to_cicp(self) -> Option<CicpTransfer> {
        reverse(&TRANSFERS, self)
    }

    pub fn from_jxl(transfer: JxlTransferFunction) -> Self {
        match transfer {
            JxlTransferFunction::Srgb => Self::Srgb,
            JxlTransferFunction::Linear => Self::Linear,
            JxlTransferFunction::Pq => Self::Pq,
            JxlTransferFunction::Hlg => Self::Hlg,
            JxlTransferFunction::Bt709 => Self::Bt709,
            JxlTransferFunction::Dci => Self::Dci,
            JxlTransferFunction::Gamma => Self::Gamma,
            JxlTransferFunction::Unknown => Self::Unknown,
        }
    }

    /// PQ or HLG.
    pub fn is_hdr_curve(self) -> bool {
        matches!(self, Self::Pq | Self::Hlg)
    }
}

impl MatrixCoefficients {
    pub fn from_cicp(code: CicpMatrix) -> Self {
        lookup(&MATRICES, code).unwrap_or(Self::Unknown)
    }

    pub fn to_cicp(self) -> Option<CicpMatrix> {
        reverse(&MATRICES, self)
    }
}

/// HDR classification shared by both backends.
///
/// True for PQ or HLG content and for anything deeper than 8 bits per sample.
pub fn is_hdr(transfer: TransferFunction, depth: u32) -> bool {
    transfer.is_hdr_curve() || depth > 8
}

/// SMPTE ST 2086 mastering display color volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MasteringDisplay {
    pub red_x: f32,
    pub red_y: f32,
    pub green_x: f32,
    pub green_y: f32,
    pub blue_x: f32,
    pub blue_y: f32,
    pub white_x: f32,
    pub white_y: f32,
    /// cd/m².
    pub min_luminance: f32,
    pub max_luminance: f32,
    /// False when the source carried no mastering display data. The other
    /// fields are then all zero.
    pub present: bool,
}

impl MasteringDisplay {
    pub const ABSENT: Self = Self {
        red_x: 0.0,
        red_y: 0.0,
        green_x: 0.0,
        green_y: 0.0,
        blue_x: 0.0,
        blue_y: 0.0,
        white_x: 0.0,
        white_y: 0.0,
        min_luminance: 0.0,
        max_luminance: 0.0,
        present: false,
    };
}

impl Default for MasteringDisplay {
    fn default() -> Self {
        Self::ABSENT
    }
}

/// Color, HDR and animation metadata of a decoded image.
///
/// `icc_profile` is an owned region on the foreign heap; it is empty exactly
/// when the source had no ICC profile.
#[derive(Debug, Default, PartialEq)]
pub struct ImageMetadata {
    pub color_primaries: ColorPrimaries,
    pub transfer_function: TransferFunction,
    pub matrix_coefficients: MatrixCoefficients,
    pub full_range: bool,
    /// Maximum content light level in nits, 0 if unknown.
    pub max_cll: u16,
    /// Maximum picture-average light level in nits, 0 if unknown.
    pub max_pall: u16,
    pub mastering_display: MasteringDisplay,
    pub icc_profile: OwnedBuffer,
    pub is_hdr: bool,
    pub is_animated: bool,
    /// 1 for still images. 0 for animations, whose frames are not counted.
    pub frame_count: u32,
}

impl ImageMetadata {
    pub fn has_icc_profile(&self) -> bool {
        !self.icc_profile.is_empty()
    }
}

/// Metadata collected while a pipeline runs, before anything is placed on
/// the foreign heap.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MetadataDraft {
    pub color_primaries: ColorPrimaries,
    pub transfer_function: TransferFunction,
    pub matrix_coefficients: MatrixCoefficients,
    pub full_range: bool,
    pub max_cll: u16,
    pub max_pall: u16,
    pub mastering_display: MasteringDisplay,
    pub icc_profile: Vec<u8>,
    pub is_hdr: bool,
    pub is_animated: bool,
    pub frame_count: u32,
}

impl MetadataDraft {
    /// Normalize the header of a parsed AVIF image.
    pub fn from_avif(header: &AvifImageHeader<'_>) -> Self {
        let transfer_function = TransferFunction::from_cicp(header.cicp.transfer_characteristics);
        Self {
            color_primaries: ColorPrimaries::from_cicp(header.cicp.color_primaries),
            transfer_function,
            matrix_coefficients: MatrixCoefficients::from_cicp(header.cicp.matrix_coefficients),
            full_range: header.yuv_range == YuvRange::Full,
            max_cll: header.clli.max_cll,
            max_pall: header.clli.max_pall,
            // No extraction path for mdcv; report it as absent.
            mastering_display: MasteringDisplay::ABSENT,
            icc_profile: header.icc.to_vec(),
            is_hdr: is_hdr(transfer_function, header.depth),
            is_animated: false,
            frame_count: 1,
        }
    }

    /// Normalize JPEG XL basic info plus whatever the color event produced.
    ///
    /// Output is always RGB, so the matrix is identity and range is full.
    pub fn from_jxl(
        basic: &JxlBasicInfo,
        color: Option<&JxlColorEncoding>,
        icc_profile: Vec<u8>,
    ) -> Self {
        let (color_primaries, transfer_function) = match color {
            Some(c) => (
                ColorPrimaries::from_jxl(c.primaries),
                TransferFunction::from_jxl(c.transfer_function),
            ),
            None => (ColorPrimaries::Unknown, TransferFunction::Unknown),
        };
        Self {
            color_primaries,
            transfer_function,
            matrix_coefficients: MatrixCoefficients::Identity,
            full_range: true,
            max_cll: 0,
            max_pall: 0,
            mastering_display: MasteringDisplay::ABSENT,
            icc_profile,
            is_hdr: is_hdr(transfer_function, basic.bits_per_sample),
            is_animated: basic.have_animation,
            frame_count: if basic.have_animation { 0 } else { 1 },
        }
    }

    /// Copy the ICC profile to the foreign heap and produce the public value.
    pub fn publish(self, heap: &SharedHeap) -> Result<ImageMetadata, BridgeError> {
        let icc_profile = OwnedBuffer::copy_from(heap, &self.icc_profile)?;
        Ok(ImageMetadata {
            color_primaries: self.color_primaries,
            transfer_function: self.transfer_function,
            matrix_coefficients: self.matrix_coefficients,
            full_range: self.full_range,
            max_cll: self.max_cll,
            max_pall: self.max_pall,
            mastering_display: self.mastering_display,
            icc_profile,
            is_hdr: self.is_hdr,
            is_animated: self.is_animated,
            frame_count: self.frame_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Cicp, ContentLightLevel, JxlColorEncoding, YuvFormat};
    use crate::buffer::TrackingHeap;

    #[test]
    fn hdr_matrix() {
        let curves = [
            (TransferFunction::Srgb, false),
            (TransferFunction::Pq, true),
            (TransferFunction::Hlg, true),
            (TransferFunction::Linear, false),
        ];
        for depth in [8, 10, 12, 16] {
            for (curve, hdr_curve) in curves {
                assert_eq!(
                    is_hdr(curve, depth),
                    hdr_curve || depth > 8,
                    "{curve} at {depth} bits"
                );
            }
        }
    }

    #[test]
    fn cicp_names() {
        assert_eq!(ColorPrimaries::from_cicp(CicpPrimaries(12)).as_str(), "display-p3");
        assert_eq!(ColorPrimaries::from_cicp(CicpPrimaries(11)).as_str(), "dci-p3");
        assert_eq!(TransferFunction::from_cicp(CicpTransfer(16)).as_str(), "pq");
        assert_eq!(TransferFunction::from_cicp(CicpTransfer(14)).as_str(), "bt2020-10bit");
        assert_eq!(MatrixCoefficients::from_cicp(CicpMatrix(0)).as_str(), "identity");
        assert_eq!(MatrixCoefficients::from_cicp(CicpMatrix(9)).as_str(), "bt2020-ncl");
    }

    #[test]
    fn unrecognized_codes_are_unknown() {
        assert_eq!(ColorPrimaries::from_cicp(CicpPrimaries::UNSPECIFIED), ColorPrimaries::Unknown);
        assert_eq!(ColorPrimaries::from_cicp(CicpPrimaries(200)).as_str(), "unknown");
        assert_eq!(TransferFunction::from_cicp(CicpTransfer(3)), TransferFunction::Unknown);
        assert_eq!(MatrixCoefficients::from_cicp(CicpMatrix(15)), MatrixCoefficients::Unknown);
    }

    #[test]
    fn cicp_round_trips_through_vocabulary() {
        for (code, name) in PRIMARIES {
            assert_eq!(name.to_cicp(), Some(code));
        }
        for (code, name) in TRANSFERS {
            assert_eq!(name.to_cicp(), Some(code));
        }
        assert_eq!(TransferFunction::Gamma.to_cicp(), None);
        assert_eq!(MatrixCoefficients::Unknown.to_cicp(), None);
    }

    #[test]
    fn jxl_color_names() {
        assert_eq!(ColorPrimaries::from_jxl(JxlPrimaries::Rec2100), ColorPrimaries::Bt2020);
        assert_eq!(ColorPrimaries::from_jxl(JxlPrimaries::Custom), ColorPrimaries::Unknown);
        assert_eq!(TransferFunction::from_jxl(JxlTransferFunction::Dci).as_str(), "dci");
    }

    #[test]
    fn avif_header_normalization() {
        let icc = [1u8, 2, 3, 4];
        let header = AvifImageHeader {
            width: 4,
            height: 4,
            depth: 10,
            yuv_format: YuvFormat::Yuv420,
            yuv_range: YuvRange::Limited,
            cicp: Cicp {
                color_primaries: CicpPrimaries::BT2020,
                transfer_characteristics: CicpTransfer::PQ,
                matrix_coefficients: CicpMatrix::BT2020_NCL,
            },
            clli: ContentLightLevel {
                max_cll: 1000,
                max_pall: 400,
            },
            has_alpha: false,
            icc: &icc,
        };
        let draft = MetadataDraft::from_avif(&header);
        assert_eq!(draft.color_primaries, ColorPrimaries::Bt2020);
        assert_eq!(draft.transfer_function, TransferFunction::Pq);
        assert!(!draft.full_range);
        assert_eq!((draft.max_cll, draft.max_pall), (1000, 400));
        assert!(!draft.mastering_display.present);
        assert!(draft.is_hdr);
        assert_eq!(draft.frame_count, 1);
        assert_eq!(draft.icc_profile, icc);
    }

    #[test]
    fn jxl_without_color_encoding() {
        let basic = JxlBasicInfo {
            bits_per_sample: 8,
            have_animation: true,
            ..Default::default()
        };
        let draft = MetadataDraft::from_jxl(&basic, None, Vec::new());
        assert_eq!(draft.color_primaries, ColorPrimaries::Unknown);
        assert_eq!(draft.transfer_function, TransferFunction::Unknown);
        assert_eq!(draft.matrix_coefficients, MatrixCoefficients::Identity);
        assert!(draft.full_range);
        assert!(!draft.is_hdr);
        assert!(draft.is_animated);
        assert_eq!(draft.frame_count, 0);
    }

    #[test]
    fn jxl_hlg_is_hdr_at_8_bits() {
        let basic = JxlBasicInfo {
            bits_per_sample: 8,
            ..Default::default()
        };
        let mut color = JxlColorEncoding::srgb(false);
        color.transfer_function = JxlTransferFunction::Hlg;
        let draft = MetadataDraft::from_jxl(&basic, Some(&color), Vec::new());
        assert!(draft.is_hdr);
    }

    #[test]
    fn publish_distinguishes_absent_icc() {
        let tracker = TrackingHeap::new();
        let heap = tracker.shared();

        let meta = MetadataDraft::default().publish(&heap).unwrap();
        assert!(!meta.has_icc_profile());
        assert_eq!(tracker.total_allocations(), 0);

        let draft = MetadataDraft {
            icc_profile: vec![0xAB; 32],
            ..Default::default()
        };
        let meta = draft.publish(&heap).unwrap();
        assert_eq!(meta.icc_profile.len(), 32);
        assert_eq!(tracker.outstanding(), 1);
        drop(meta);
        assert_eq!(tracker.outstanding(), 0);
    }
}
