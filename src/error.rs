//! Stage-tagged error types for bridge operations.
//!
//! Every pipeline returns `Result<_, BridgeError>` internally. The public
//! entry points flatten the error into the `error` string of their result
//! value, so the `Display` text of each variant carries the stage prefix the
//! host sees.

use crate::format::ImageFormat;

/// Failure reason reported by a codec backend.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct BackendError {
    pub reason: String,
}

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Broad failure class of a [`BridgeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed arguments, rejected before touching a backend.
    InputValidation,
    /// Decoder, encoder or image object could not be created.
    BackendConstruction,
    /// Backend rejected the input buffer.
    IoBinding,
    /// Malformed container or headers.
    Parse,
    /// Backend-internal failure while decoding.
    Decode,
    /// Backend-internal failure while encoding.
    Encode,
    /// Planar/interleaved conversion failed.
    ColorConversion,
    /// Output buffer could not be obtained from the foreign heap.
    Allocation,
}

/// Direction of a color conversion stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    YuvToRgb,
    RgbToYuv,
}

impl core::fmt::Display for Conversion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Conversion::YuvToRgb => "YUV to RGB",
            Conversion::RgbToYuv => "RGB to YUV",
        })
    }
}

/// Unified error type for bridge operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// Input validation failed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Resource limit exceeded.
    #[error("Invalid input: {0}")]
    LimitExceeded(&'static str),
    /// Format not recognized from magic bytes.
    #[error("Invalid input: unrecognized image format")]
    UnrecognizedFormat,
    /// Format recognized but no backend is linked for it.
    #[error("Invalid input: no {0} backend available")]
    UnsupportedFormat(ImageFormat),
    /// A backend object could not be constructed.
    #[error("Failed to create {0}")]
    BackendConstruction(&'static str),
    /// The backend refused the input buffer.
    #[error("IO error: {0}")]
    IoBinding(#[source] BackendError),
    #[error("Parse error: {0}")]
    Parse(#[source] BackendError),
    #[error("Decode error: {0}")]
    Decode(#[source] BackendError),
    /// The bitstream ended before the image was complete.
    #[error("Decode error: Incomplete input data")]
    IncompleteInput,
    /// The backend emitted an event the decode protocol does not allow here.
    #[error("Decode error: unexpected {event} event while {state}")]
    Protocol {
        event: &'static str,
        state: &'static str,
    },
    #[error("Encode error: {0}")]
    Encode(#[source] BackendError),
    #[error("{direction} error: {source}")]
    ColorConversion {
        direction: Conversion,
        #[source]
        source: BackendError,
    },
    /// The foreign heap could not supply the requested number of bytes.
    #[error("Failed to allocate output buffer ({0} bytes)")]
    Allocation(usize),
}

impl BridgeError {
    /// Failure class, for callers that branch on the stage rather than the text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidInput(_)
            | BridgeError::LimitExceeded(_)
            | BridgeError::UnrecognizedFormat
            | BridgeError::UnsupportedFormat(_) => ErrorKind::InputValidation,
            BridgeError::BackendConstruction(_) => ErrorKind::BackendConstruction,
            BridgeError::IoBinding(_) => ErrorKind::IoBinding,
            BridgeError::Parse(_) => ErrorKind::Parse,
            BridgeError::Decode(_)
            | BridgeError::IncompleteInput
            | BridgeError::Protocol { .. } => ErrorKind::Decode,
            BridgeError::Encode(_) => ErrorKind::Encode,
            BridgeError::ColorConversion { .. } => ErrorKind::ColorConversion,
            BridgeError::Allocation(_) => ErrorKind::Allocation,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BridgeError::InvalidInput(msg.into())
    }
}
