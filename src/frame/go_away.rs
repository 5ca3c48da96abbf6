use std::fmt;

use ntex_bytes::{BufMut, Bytes};

use super::{read_u32, Frame, FrameError, Head, Kind, Reason, StreamId};

/// `GOAWAY` frame, announces connection shutdown
#[derive(Clone, Eq, PartialEq)]
pub struct GoAway {
    last_stream_id: StreamId,
    reason: Reason,
    data: Bytes,
}

impl GoAway {
    /// Frame with zero last-stream-id and no debug data
    pub fn new(reason: Reason) -> Self {
        GoAway {
            reason,
            last_stream_id: StreamId::zero(),
            data: Bytes::new(),
        }
    }

    pub fn set_last_stream_id(mut self, id: StreamId) -> Self {
        self.last_stream_id = id;
        self
    }

    /// Set opaque debug data
    pub fn set_data<T>(mut self, data: T) -> Self
    where
        Bytes: From<T>,
    {
        self.data = Bytes::from(data);
        self
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Debug data as text, invalid utf-8 sequences are replaced
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<GoAway, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        if payload.len() < 8 {
            return Err(FrameError::BadFrameSize);
        }

        Ok(GoAway {
            last_stream_id: StreamId::parse(payload).0,
            reason: read_u32(&payload[4..]).into(),
            data: Bytes::copy_from_slice(&payload[8..]),
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!(
            "encoding GOAWAY; last-stream-id={:?} reason={:?}",
            self.last_stream_id,
            self.reason
        );
        Head::new(Kind::GoAway, 0, StreamId::zero()).encode(8 + self.data.len(), dst);
        dst.put_u32(self.last_stream_id.into());
        dst.put_u32(self.reason.into());
        dst.put_slice(&self.data);
    }
}

impl From<GoAway> for Frame {
    fn from(src: GoAway) -> Self {
        Frame::GoAway(src)
    }
}

impl fmt::Debug for GoAway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoAway")
            .field("last_stream_id", &self.last_stream_id)
            .field("reason", &self.reason)
            .field("message", &self.message())
            .finish()
    }
}
