//! Connection-level HTTP/2 control frames.
//!
//! Only the frames the transport emits or reacts to are modelled here:
//! `SETTINGS`, `PING`, `GOAWAY` and `RST_STREAM`. `DATA` and `HEADERS`
//! framing belongs to the HTTP/2 engine below this layer.
use std::fmt;

mod go_away;
mod head;
mod ping;
mod reason;
mod reset;
mod settings;
mod stream_id;

pub use self::go_away::GoAway;
pub use self::head::{Head, Kind};
pub use self::ping::{Ping, Payload as PingPayload};
pub use self::reason::Reason;
pub use self::reset::Reset;
pub use self::settings::Settings;
pub use self::stream_id::StreamId;

// Re-export some constants
pub use self::settings::{
    DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
    MAX_INITIAL_WINDOW_SIZE, MAX_MAX_FRAME_SIZE,
};

pub type FrameSize = u32;
pub type WindowSize = u32;

pub const HEADER_LEN: usize = 9;

/// Read big-endian `u32` from the first 4 bytes of `buf`
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    Settings(Settings),
    Ping(Ping),
    GoAway(GoAway),
    Reset(Reset),
}

impl Frame {
    pub fn kind(&self) -> Kind {
        match self {
            Frame::Settings(_) => Kind::Settings,
            Frame::Ping(_) => Kind::Ping,
            Frame::GoAway(_) => Kind::GoAway,
            Frame::Reset(_) => Kind::Reset,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Frame::*;

        match *self {
            Settings(ref frame) => fmt::Debug::fmt(frame, fmt),
            Ping(ref frame) => fmt::Debug::fmt(frame, fmt),
            GoAway(ref frame) => fmt::Debug::fmt(frame, fmt),
            Reset(ref frame) => fmt::Debug::fmt(frame, fmt),
        }
    }
}

/// Control frame parse errors
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// PING payload is not 8 bytes, or GOAWAY payload is shorter than 8 bytes
    #[error("Invalid control frame size")]
    BadFrameSize,
    #[error("Invalid setting value")]
    InvalidSettingValue,
    /// SETTINGS length is not a multiple of 6, or RST_STREAM is not 4 bytes
    #[error("Invalid payload length")]
    InvalidPayloadLength,
    #[error("SETTINGS ack carries payload")]
    InvalidPayloadAckSettings,
    /// Connection frame on a stream, or RST_STREAM on stream 0
    #[error("Invalid stream id")]
    InvalidStreamId,
    #[error("Frame size exceeded")]
    MaxFrameSize,
}
