//! Encode results.

use crate::buffer::OwnedBuffer;
use crate::error::BridgeError;
use crate::timing::EncodeTimings;

/// Outcome of [`Bridge::encode`](crate::Bridge::encode).
///
/// On success `data` owns the encoded file and `error` is empty. On failure
/// `data` is empty and `error` names the stage that failed.
#[derive(Debug, Default)]
pub struct EncodeResult {
    pub data: OwnedBuffer,
    pub timings: EncodeTimings,
    pub error: String,
}

impl EncodeResult {
    pub(crate) fn encoded(data: OwnedBuffer, timings: EncodeTimings) -> Self {
        Self {
            data,
            timings,
            error: String::new(),
        }
    }

    pub(crate) fn failed(error: &BridgeError, timings: EncodeTimings) -> Self {
        tracing::debug!(kind = ?error.kind(), %error, "encode failed");
        Self {
            data: OwnedBuffer::empty(),
            timings,
            error: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }
}
