use std::cell::Cell;

use ntex_bytes::{Buf, Bytes, BytesMut};

use super::compression::Decompressor;
use super::HEADER_SIZE;
use crate::error::RpcError;

/// Resumable decoder for length-prefixed messages.
///
/// ```text
/// +-- flag: u8 --+-- len: u32 --+---- payload ----+
/// ```
///
/// The decoder keeps the parsed header between calls, partially received
/// payload bytes stay in the source buffer. A message that declares more
/// than the max payload size is rejected on its header, its payload is
/// discarded as it arrives and decoding resumes at the next header.
#[derive(Debug)]
pub struct MessageDecoder {
    max_payload: Cell<usize>,
    state: Cell<DecodeState>,
}

#[derive(Debug, Copy, Clone)]
enum DecodeState {
    Head,
    Data { compressed: bool, len: usize },
    Skip { remaining: usize },
}

impl MessageDecoder {
    pub fn new(max_payload: usize) -> Self {
        MessageDecoder {
            max_payload: Cell::new(max_payload),
            state: Cell::new(DecodeState::Head),
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload.get()
    }

    /// Update max payload size, applies to next message header
    pub fn set_max_payload(&self, max: usize) {
        self.max_payload.set(max);
    }

    /// Decode next message from `src`.
    ///
    /// Returns `Ok(None)` if more data is needed.
    pub fn decode(
        &self,
        src: &mut BytesMut,
        decompressor: Option<&mut Decompressor>,
    ) -> Result<Option<Bytes>, RpcError> {
        let res = self.decode_inner(src, decompressor);
        if res.is_err() && !matches!(self.state.get(), DecodeState::Skip { .. }) {
            self.state.set(DecodeState::Head);
        }
        res
    }

    fn decode_inner(
        &self,
        src: &mut BytesMut,
        decompressor: Option<&mut Decompressor>,
    ) -> Result<Option<Bytes>, RpcError> {
        if let DecodeState::Skip { remaining } = self.state.get() {
            if !self.skip(src, remaining) {
                return Ok(None);
            }
        }

        let (compressed, len) = match self.state.get() {
            DecodeState::Head | DecodeState::Skip { .. } => match self.decode_head(src)? {
                Some((compressed, len)) => {
                    self.state.set(DecodeState::Data { compressed, len });
                    (compressed, len)
                }
                None => return Ok(None),
            },
            DecodeState::Data { compressed, len } => (compressed, len),
        };

        // Not enough payload yet
        if src.len() < len {
            return Ok(None);
        }
        let payload = src.split_to(len);
        self.state.set(DecodeState::Head);

        if !compressed {
            return Ok(Some(payload.freeze()));
        }

        match decompressor {
            Some(decompressor) => {
                let mut dst = BytesMut::new();
                decompressor.decompress(&payload, self.max_payload.get(), &mut dst)?;
                Ok(Some(dst.freeze()))
            }
            None => Err(RpcError::internal(
                "Received a compressed message payload, but no decompressor has been configured.",
            )),
        }
    }

    /// Discard up to `remaining` payload bytes of a rejected message.
    ///
    /// Returns `true` once the whole payload is gone.
    fn skip(&self, src: &mut BytesMut, remaining: usize) -> bool {
        let n = remaining.min(src.len());
        src.advance(n);
        if n < remaining {
            self.state.set(DecodeState::Skip {
                remaining: remaining - n,
            });
            false
        } else {
            self.state.set(DecodeState::Head);
            true
        }
    }

    fn decode_head(&self, src: &mut BytesMut) -> Result<Option<(bool, usize)>, RpcError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let flag = src[0];
        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        let max = self.max_payload.get();

        // Declared size is checked before any payload byte is required
        if len > max {
            src.advance(HEADER_SIZE);
            self.skip(src, len);
            log::debug!("message exceeds max payload size; max={} actual={}", max, len);
            return Err(RpcError::resource_exhausted(format!(
                "Message has exceeded the configured maximum payload size (max: {}, actual: {})",
                max, len
            )));
        }

        let compressed = match flag {
            0 => false,
            1 => true,
            flag => {
                src.advance(HEADER_SIZE);
                return Err(RpcError::internal(format!(
                    "Invalid compression flag {}",
                    flag
                )));
            }
        };
        src.advance(HEADER_SIZE);

        // Ensure that the buffer has enough space to read the incoming payload
        src.reserve(len);

        Ok(Some((compressed, len)))
    }
}
