//! Per-stage wall-clock timings.
//!
//! All values are milliseconds. On `wasm32-unknown-unknown` there is no
//! monotonic clock in std, so every reading is 0.

use serde::Serialize;

/// Stage timings of a decode or info call.
///
/// Stages that did not run (e.g. `decode` and `convert` for an info call)
/// stay 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeTimings {
    /// Decoder construction, threading and input binding.
    pub setup: f64,
    /// Container/header parse, or the basic-info event.
    pub header: f64,
    /// Color encoding and ICC extraction.
    pub color: f64,
    /// Pixel decode.
    pub decode: f64,
    /// Planar to interleaved conversion and copy into the output region.
    pub convert: f64,
    pub total: f64,
}

/// Stage timings of an encode call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeTimings {
    /// Validation, parameter mapping and backend object construction.
    pub setup: f64,
    /// RGB to codec-native conversion, or frame submission.
    pub convert: f64,
    /// Bitstream production.
    pub encode: f64,
    /// Copy into the output region.
    pub output: f64,
    pub total: f64,
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
#[derive(Clone, Copy, Debug)]
struct Tick(std::time::Instant);

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
impl Tick {
    fn now() -> Self {
        Tick(std::time::Instant::now())
    }

    fn ms_since(self, earlier: Tick) -> f64 {
        self.0.duration_since(earlier.0).as_secs_f64() * 1000.0
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
#[derive(Clone, Copy, Debug)]
struct Tick;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
impl Tick {
    fn now() -> Self {
        Tick
    }

    fn ms_since(self, _earlier: Tick) -> f64 {
        0.0
    }
}

/// Lap timer driving the timing records.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Stopwatch {
    start: Tick,
    last: Tick,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        let now = Tick::now();
        Self {
            start: now,
            last: now,
        }
    }

    /// Milliseconds since the previous lap, logged under `stage`.
    pub(crate) fn lap(&mut self, stage: &'static str) -> f64 {
        let now = Tick::now();
        let ms = now.ms_since(self.last);
        self.last = now;
        tracing::trace!(stage, ms, "stage complete");
        ms
    }

    /// Milliseconds since [`start`](Self::start).
    pub(crate) fn total(&self) -> f64 {
        Tick::now().ms_since(self.start)
    }
}
