//! Image format detection.

use core::fmt;

/// Image formats the bridge can route to a backend.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// AV1 still image in a HEIF container.
    Avif,
    /// JPEG XL, bare codestream or ISO-BMFF container.
    Jxl,
}

/// Signature of the JPEG XL container's first box.
const JXL_CONTAINER_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];

impl ImageFormat {
    /// Detect format from magic bytes. Returns None if unrecognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if is_avif(data) {
            return Some(ImageFormat::Avif);
        }

        // JPEG XL codestream: FF 0A
        if data.len() >= 2 && data[0] == 0xFF && data[1] == 0x0A {
            return Some(ImageFormat::Jxl);
        }

        if data.starts_with(&JXL_CONTAINER_SIGNATURE) {
            return Some(ImageFormat::Jxl);
        }

        None
    }
}

/// An ISO-BMFF `ftyp` box naming `avif` or `avis` as its major brand or
/// among its compatible brands.
fn is_avif(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size < 12 || box_size > data.len() {
        return false;
    }
    let is_avif_brand = |brand: &[u8]| brand == b"avif" || brand == b"avis";
    if is_avif_brand(&data[8..12]) {
        return true;
    }
    // Minor version at 12..16, compatible brands follow.
    data.get(16..box_size)
        .is_some_and(|brands| brands.chunks_exact(4).any(is_avif_brand))
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Avif => "AVIF",
            ImageFormat::Jxl => "JPEG XL",
        })
    }
}
