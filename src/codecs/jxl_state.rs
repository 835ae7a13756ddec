//! Transition table for the JPEG XL decode event loop.
//!
//! The decoder reports events; the dispatcher checks each one against the
//! current state and answers with the action the pipeline must perform. An
//! event with no entry for the current state is a protocol violation, so the
//! output buffer cannot be touched before `NEED_IMAGE_OUT_BUFFER` has been
//! handled, and nothing is reported before `BASIC_INFO`.

use crate::backend::JxlEvent;
use crate::error::BridgeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DecodeState {
    AwaitingBasicInfo,
    HaveBasicInfo,
    HaveColor,
    OutputBound,
    FrameComplete,
    Done,
}

impl DecodeState {
    fn describe(self) -> &'static str {
        match self {
            DecodeState::AwaitingBasicInfo => "awaiting basic info",
            DecodeState::HaveBasicInfo => "awaiting color encoding",
            DecodeState::HaveColor => "awaiting output buffer request",
            DecodeState::OutputBound => "decoding pixels",
            DecodeState::FrameComplete => "finishing frame",
            DecodeState::Done => "done",
        }
    }
}

/// What the loop is driving towards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Full decode of the first frame.
    Pixels,
    /// Stop once basic info and color are known.
    Info,
}

/// Work the pipeline performs in response to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    CaptureBasicInfo,
    CaptureColor,
    BindOutput,
    CompleteFrame,
    Finish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    BasicInfo,
    ColorEncoding,
    NeedImageOutBuffer,
    FullImage,
    Success,
}

struct Transition {
    from: DecodeState,
    on: EventKind,
    action: Action,
    to: DecodeState,
}

const fn edge(from: DecodeState, on: EventKind, action: Action, to: DecodeState) -> Transition {
    Transition {
        from,
        on,
        action,
        to,
    }
}

use Action::*;
use DecodeState::*;

const PIXELS: &[Transition] = &[
    edge(AwaitingBasicInfo, EventKind::BasicInfo, CaptureBasicInfo, HaveBasicInfo),
    edge(HaveBasicInfo, EventKind::ColorEncoding, CaptureColor, HaveColor),
    edge(HaveBasicInfo, EventKind::NeedImageOutBuffer, BindOutput, OutputBound),
    edge(HaveColor, EventKind::NeedImageOutBuffer, BindOutput, OutputBound),
    edge(OutputBound, EventKind::FullImage, CompleteFrame, FrameComplete),
    edge(FrameComplete, EventKind::Success, Finish, Done),
    // Animation: the next frame wants a buffer. Only the first is decoded.
    edge(FrameComplete, EventKind::NeedImageOutBuffer, Finish, Done),
];

const INFO: &[Transition] = &[
    edge(AwaitingBasicInfo, EventKind::BasicInfo, CaptureBasicInfo, HaveBasicInfo),
    edge(HaveBasicInfo, EventKind::ColorEncoding, CaptureColor, Done),
    edge(HaveBasicInfo, EventKind::Success, Finish, Done),
];

/// Event dispatcher for one decode call.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    mode: Mode,
    state: DecodeState,
}

impl Dispatcher {
    pub(crate) fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: AwaitingBasicInfo,
        }
    }

    pub(crate) fn state(&self) -> DecodeState {
        self.state
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state == Done
    }

    /// Advance on `event`.
    ///
    /// `NEED_MORE_INPUT` and backend errors are terminal: the whole file is
    /// bound up front, so running out of input means it was truncated.
    pub(crate) fn step(&mut self, event: JxlEvent) -> Result<Action, BridgeError> {
        let kind = match event {
            JxlEvent::BasicInfo => EventKind::BasicInfo,
            JxlEvent::ColorEncoding => EventKind::ColorEncoding,
            JxlEvent::NeedImageOutBuffer => EventKind::NeedImageOutBuffer,
            JxlEvent::FullImage => EventKind::FullImage,
            JxlEvent::Success => EventKind::Success,
            JxlEvent::NeedMoreInput => return Err(BridgeError::IncompleteInput),
            JxlEvent::Error(reason) => return Err(BridgeError::Decode(reason)),
        };
        let table = match self.mode {
            Mode::Pixels => PIXELS,
            Mode::Info => INFO,
        };
        let transition = table
            .iter()
            .find(|t| t.from == self.state && t.on == kind)
            .ok_or(BridgeError::Protocol {
                event: event.name(),
                state: self.state.describe(),
            })?;
        tracing::trace!(event = event.name(), from = ?self.state, to = ?transition.to, "jxl event");
        self.state = transition.to;
        Ok(transition.action)
    }
}
