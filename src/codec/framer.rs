use std::collections::VecDeque;

use ntex_bytes::{BufMut, Bytes, BytesMut};
use ntex_util::channel::oneshot;

use super::compression::Compressor;
use super::HEADER_SIZE;
use crate::error::RpcError;

/// Write completion signal
pub type Completion = oneshot::Sender<Result<(), RpcError>>;

/// Encodes payloads into length-prefixed messages.
///
/// Payloads are appended and framed lazily, each frame carries its own
/// completion signal.
#[derive(Debug, Default)]
pub struct MessageFramer {
    pending: VecDeque<(Bytes, Option<Completion>)>,
}

impl MessageFramer {
    pub fn new() -> Self {
        MessageFramer::default()
    }

    /// Encode single message into `dst`
    pub fn encode(
        payload: &[u8],
        compressor: Option<&mut Compressor>,
        dst: &mut BytesMut,
    ) -> Result<(), RpcError> {
        let start = dst.len();
        dst.reserve(HEADER_SIZE + payload.len());

        // placeholder for header
        dst.put_slice(&[0; HEADER_SIZE]);

        let flag = if let Some(compressor) = compressor {
            if let Err(e) = compressor.compress(payload, dst) {
                dst.truncate(start);
                return Err(e);
            }
            1
        } else {
            dst.put_slice(payload);
            0
        };

        let len = dst.len() - start - HEADER_SIZE;
        if len > u32::MAX as usize {
            dst.truncate(start);
            return Err(RpcError::resource_exhausted(format!(
                "Message is too large to send (size: {})",
                len
            )));
        }

        dst[start] = flag;
        dst[start + 1..start + HEADER_SIZE].copy_from_slice(&(len as u32).to_be_bytes());
        Ok(())
    }

    /// Number of appended payloads
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue payload for framing
    pub fn append(&mut self, payload: Bytes, completion: Option<Completion>) {
        self.pending.push_back((payload, completion));
    }

    /// Frame next appended payload
    #[allow(clippy::should_implement_trait, clippy::type_complexity)]
    pub fn next(
        &mut self,
        compressor: Option<&mut Compressor>,
    ) -> Option<(Result<Bytes, RpcError>, Option<Completion>)> {
        let (payload, completion) = self.pending.pop_front()?;

        let mut dst = BytesMut::new();
        let res = MessageFramer::encode(&payload, compressor, &mut dst).map(|_| dst.freeze());
        Some((res, completion))
    }

    /// Frame all appended payloads into `dst`.
    ///
    /// Failed frames are completed with an error and skipped, returned
    /// signals belong to frames written to `dst` and are in append order.
    pub fn flush(
        &mut self,
        mut compressor: Option<&mut Compressor>,
        dst: &mut BytesMut,
    ) -> Vec<Completion> {
        let mut completions = Vec::with_capacity(self.pending.len());

        while let Some((payload, completion)) = self.pending.pop_front() {
            match MessageFramer::encode(&payload, compressor.as_deref_mut(), dst) {
                Ok(()) => {
                    if let Some(tx) = completion {
                        completions.push(tx);
                    }
                }
                Err(e) => {
                    log::debug!("cannot frame message: {}", e);
                    if let Some(tx) = completion {
                        let _ = tx.send(Err(e));
                    }
                }
            }
        }
        completions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_plain() {
        let mut dst = BytesMut::new();
        MessageFramer::encode(b"hello", None, &mut dst).unwrap();
        assert_eq!(&dst[..], b"\x00\x00\x00\x00\x05hello");
    }

    #[test]
    fn batched() {
        let mut framer = MessageFramer::new();
        let (tx1, _rx1) = oneshot::channel();
        framer.append(Bytes::from_static(b"a"), Some(tx1));
        framer.append(Bytes::from_static(b"bc"), None);
        assert_eq!(framer.len(), 2);

        let (frame, completion) = framer.next(None).unwrap();
        assert_eq!(&frame.unwrap()[..], b"\x00\x00\x00\x00\x01a");
        assert!(completion.is_some());

        let (frame, completion) = framer.next(None).unwrap();
        assert_eq!(&frame.unwrap()[..], b"\x00\x00\x00\x00\x02bc");
        assert!(completion.is_none());
        assert!(framer.next(None).is_none());
    }
}
