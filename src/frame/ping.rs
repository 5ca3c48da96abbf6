use ntex_bytes::BufMut;

use super::{Frame, FrameError, Head, Kind, StreamId};

const ACK_FLAG: u8 = 0x1;

/// Opaque 8 byte ping data
pub type Payload = [u8; 8];

/// `PING` frame.
///
/// The transport uses the payload as a big-endian `u64` nonce to match
/// acks with sent pings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ping {
    ack: bool,
    payload: Payload,
}

impl Ping {
    pub fn new(payload: Payload) -> Ping {
        Ping {
            ack: false,
            payload,
        }
    }

    /// Ack for received ping
    pub fn pong(payload: Payload) -> Ping {
        Ping { ack: true, payload }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn nonce(&self) -> u64 {
        u64::from_be_bytes(self.payload)
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Ping, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        let payload: Payload = payload.try_into().map_err(|_| FrameError::BadFrameSize)?;

        Ok(Ping {
            payload,
            ack: head.flag() & ACK_FLAG == ACK_FLAG,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!("encoding PING; ack={} nonce={:x}", self.ack, self.nonce());

        let flag = if self.ack { ACK_FLAG } else { 0 };
        Head::new(Kind::Ping, flag, StreamId::zero()).encode(self.payload.len(), dst);
        dst.put_slice(&self.payload);
    }
}

impl From<Ping> for Frame {
    fn from(src: Ping) -> Frame {
        Frame::Ping(src)
    }
}
