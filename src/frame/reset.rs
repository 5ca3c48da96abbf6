use ntex_bytes::BufMut;

use super::{read_u32, Frame, FrameError, Head, Kind, Reason, StreamId};

/// `RST_STREAM` frame
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reset {
    stream_id: StreamId,
    reason: Reason,
}

impl Reset {
    pub fn new(stream_id: StreamId, reason: Reason) -> Reset {
        Reset { stream_id, reason }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Reset, FrameError> {
        match payload.len() {
            _ if head.stream_id().is_zero() => Err(FrameError::InvalidStreamId),
            4 => Ok(Reset::new(head.stream_id(), read_u32(payload).into())),
            _ => Err(FrameError::InvalidPayloadLength),
        }
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!("encoding RST_STREAM; id={:?} reason={:?}", self.stream_id, self.reason);
        Head::new(Kind::Reset, 0, self.stream_id).encode(4, dst);
        dst.put_u32(self.reason.into());
    }
}

impl From<Reset> for Frame {
    fn from(src: Reset) -> Self {
        Frame::Reset(src)
    }
}
