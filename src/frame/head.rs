use ntex_bytes::BufMut;

use super::{StreamId, HEADER_LEN};

/// Type of a frame on the wire.
///
/// Only the control types are named, the rest is passed through as
/// `Other` and skipped by the control codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Reset,
    Settings,
    Ping,
    GoAway,
    Other(u8),
}

impl From<u8> for Kind {
    fn from(ty: u8) -> Kind {
        match ty {
            0x3 => Kind::Reset,
            0x4 => Kind::Settings,
            0x6 => Kind::Ping,
            0x7 => Kind::GoAway,
            ty => Kind::Other(ty),
        }
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> u8 {
        match kind {
            Kind::Reset => 0x3,
            Kind::Settings => 0x4,
            Kind::Ping => 0x6,
            Kind::GoAway => 0x7,
            Kind::Other(ty) => ty,
        }
    }
}

/// Frame header without the payload length
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Head {
    kind: Kind,
    flag: u8,
    stream_id: StreamId,
}

impl Head {
    pub fn new(kind: Kind, flag: u8, stream_id: StreamId) -> Head {
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    /// Parse the 9-byte header at the start of `src`.
    ///
    /// Returns the header and the declared payload length, or `None` if
    /// `src` is shorter than a header.
    pub fn parse(src: &[u8]) -> Option<(Head, usize)> {
        if src.len() < HEADER_LEN {
            return None;
        }
        let len = u32::from_be_bytes([0, src[0], src[1], src[2]]) as usize;
        let (stream_id, _) = StreamId::parse(&src[5..HEADER_LEN]);
        Some((Head::new(Kind::from(src[3]), src[4], stream_id), len))
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Write the header for a payload of `len` bytes
    pub fn encode<T: BufMut>(&self, len: usize, dst: &mut T) {
        debug_assert!(len < 1 << 24);
        dst.put_uint(len as u64, 3);
        dst.put_u8(self.kind.into());
        dst.put_u8(self.flag);
        dst.put_u32(self.stream_id.into());
    }
}
