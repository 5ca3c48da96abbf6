use std::cell::Cell;

use ntex_bytes::BytesMut;
use ntex_codec::{Decoder, Encoder};

use crate::frame::{self, Frame, FrameError, Head, Kind};

/// Codec for connection control frames.
///
/// Frames of other kinds are skipped by the decoder, they are handled by
/// the HTTP/2 engine.
#[derive(Debug)]
pub struct ControlCodec {
    max_frame_size: Cell<frame::FrameSize>,
}

impl Default for ControlCodec {
    fn default() -> Self {
        ControlCodec {
            max_frame_size: Cell::new(frame::DEFAULT_MAX_FRAME_SIZE),
        }
    }
}

impl ControlCodec {
    /// Updates the max received frame size.
    pub fn set_recv_frame_size(&self, val: frame::FrameSize) {
        self.max_frame_size.set(val);
    }
}

impl Decoder for ControlCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            let (head, len) = match Head::parse(src) {
                Some(parsed) => parsed,
                None => return Ok(None),
            };
            if len > self.max_frame_size.get() as usize {
                proto_err!(conn: "frame size exceeded; len={}", len);
                return Err(FrameError::MaxFrameSize);
            }
            if src.len() < frame::HEADER_LEN + len {
                src.reserve(frame::HEADER_LEN + len - src.len());
                return Ok(None);
            }

            let bytes = src.split_to(frame::HEADER_LEN + len);
            let payload = &bytes[frame::HEADER_LEN..];

            let frame = match head.kind() {
                Kind::Settings => frame::Settings::load(head, payload)
                    .map_err(|e| {
                        proto_err!(conn: "failed to load SETTINGS frame; err={:?}", e);
                        e
                    })?
                    .into(),
                Kind::Ping => frame::Ping::load(head, payload)
                    .map_err(|e| {
                        proto_err!(conn: "failed to load PING frame; err={:?}", e);
                        e
                    })?
                    .into(),
                Kind::GoAway => frame::GoAway::load(head, payload)
                    .map_err(|e| {
                        proto_err!(conn: "failed to load GO_AWAY frame; err={:?}", e);
                        e
                    })?
                    .into(),
                Kind::Reset => frame::Reset::load(head, payload)
                    .map_err(|e| {
                        proto_err!(conn: "failed to load RESET frame; err={:?}", e);
                        e
                    })?
                    .into(),
                Kind::Other(ty) => {
                    log::trace!("skipping frame; type={} len={}", ty, len);
                    continue;
                }
            };
            return Ok(Some(frame));
        }
    }
}

impl Encoder for ControlCodec {
    type Item = Frame;
    type Error = FrameError;

    fn encode(&self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        match item {
            Frame::Settings(v) => v.encode(dst),
            Frame::Ping(v) => v.encode(dst),
            Frame::GoAway(v) => v.encode(dst),
            Frame::Reset(v) => v.encode(dst),
        }
        Ok(())
    }
}
