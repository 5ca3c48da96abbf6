//! Message compression.
//!
//! Every message is compressed independently. Compressor and decompressor
//! handles have an explicit lifecycle: `start()` allocates working state,
//! `end()` releases it. Handles are owned by the stream and lent to the
//! codec for each call.
use std::io::{Read, Write};

use flate2::{read, write, Compression};
use ntex_bytes::{BufMut, BytesMut};

use crate::error::RpcError;

/// Request compression header
pub const ENCODING_HEADER: &str = "grpc-encoding";
/// Accepted response compression header
pub const ACCEPT_ENCODING_HEADER: &str = "grpc-accept-encoding";

bitflags::bitflags! {
    /// Set of enabled compression algorithms
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct Algorithms: u8 {
        const DEFLATE = 0b0000_0001;
        const GZIP    = 0b0000_0010;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Algorithm {
    Deflate,
    Gzip,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Deflate => "deflate",
            Algorithm::Gzip => "gzip",
        }
    }

    pub fn from_name(name: &str) -> Option<Algorithm> {
        match name.trim() {
            "deflate" => Some(Algorithm::Deflate),
            "gzip" => Some(Algorithm::Gzip),
            _ => None,
        }
    }

    fn flag(self) -> Algorithms {
        match self {
            Algorithm::Deflate => Algorithms::DEFLATE,
            Algorithm::Gzip => Algorithms::GZIP,
        }
    }
}

impl Algorithms {
    /// Is algorithm enabled
    pub fn supports(&self, algorithm: Algorithm) -> bool {
        self.contains(algorithm.flag())
    }

    /// Iterate over enabled algorithms, in preference order
    pub fn algorithms(&self) -> impl Iterator<Item = Algorithm> + '_ {
        [Algorithm::Gzip, Algorithm::Deflate]
            .into_iter()
            .filter(move |alg| self.supports(*alg))
    }

    /// Value for the accept-encoding header, `None` if nothing is enabled
    pub fn accept_encoding(&self) -> Option<String> {
        let names: Vec<_> = self.algorithms().map(|alg| alg.name()).collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join(","))
        }
    }

    /// Select first enabled algorithm from comma separated header value
    pub fn select(&self, accept: &str) -> Option<Algorithm> {
        accept
            .split(',')
            .filter_map(Algorithm::from_name)
            .find(|alg| self.supports(*alg))
    }
}

#[derive(Debug)]
/// Message compressor
pub struct Compressor {
    algorithm: Algorithm,
    level: Compression,
    buf: Option<Vec<u8>>,
}

impl Compressor {
    pub fn new(algorithm: Algorithm) -> Self {
        Compressor {
            algorithm,
            level: Compression::default(),
            buf: None,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn is_started(&self) -> bool {
        self.buf.is_some()
    }

    pub fn start(&mut self) {
        if self.buf.is_none() {
            log::trace!("starting {} compressor", self.algorithm.name());
            self.buf = Some(Vec::new());
        }
    }

    pub fn end(&mut self) {
        if self.buf.take().is_some() {
            log::trace!("{} compressor ended", self.algorithm.name());
        }
    }

    /// Compress `src` and append result to `dst`
    pub fn compress(&mut self, src: &[u8], dst: &mut BytesMut) -> Result<(), RpcError> {
        let buf = self
            .buf
            .take()
            .ok_or_else(|| RpcError::internal("Compressor is not started"))?;
        let res = match self.algorithm {
            Algorithm::Deflate => {
                let mut enc = write::ZlibEncoder::new(buf, self.level);
                enc.write_all(src).and_then(|_| enc.finish())
            }
            Algorithm::Gzip => {
                let mut enc = write::GzEncoder::new(buf, self.level);
                enc.write_all(src).and_then(|_| enc.finish())
            }
        };

        match res {
            Ok(mut buf) => {
                dst.put_slice(&buf);
                buf.clear();
                self.buf = Some(buf);
                Ok(())
            }
            Err(e) => {
                self.buf = Some(Vec::new());
                Err(RpcError::internal(format!("Failed to compress message: {}", e)))
            }
        }
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        self.end();
    }
}

#[derive(Debug)]
/// Message decompressor
pub struct Decompressor {
    algorithm: Algorithm,
    buf: Option<Vec<u8>>,
}

impl Decompressor {
    pub fn new(algorithm: Algorithm) -> Self {
        Decompressor {
            algorithm,
            buf: None,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn is_started(&self) -> bool {
        self.buf.is_some()
    }

    pub fn start(&mut self) {
        if self.buf.is_none() {
            log::trace!("starting {} decompressor", self.algorithm.name());
            self.buf = Some(Vec::new());
        }
    }

    pub fn end(&mut self) {
        if self.buf.take().is_some() {
            log::trace!("{} decompressor ended", self.algorithm.name());
        }
    }

    /// Decompress `src` into `dst`.
    ///
    /// Never inflates more than `limit + 1` bytes, `usize::MAX` means unbounded.
    pub fn decompress(
        &mut self,
        src: &[u8],
        limit: usize,
        dst: &mut BytesMut,
    ) -> Result<(), RpcError> {
        let mut buf = self
            .buf
            .take()
            .ok_or_else(|| RpcError::internal("Decompressor is not started"))?;
        buf.clear();

        let take = (limit as u64).saturating_add(1);
        let res = match self.algorithm {
            Algorithm::Deflate => read::ZlibDecoder::new(src).take(take).read_to_end(&mut buf),
            Algorithm::Gzip => read::GzDecoder::new(src).take(take).read_to_end(&mut buf),
        };

        let res = match res {
            Ok(size) if size > limit => {
                Err(RpcError::resource_exhausted("Message is too large to decompress."))
            }
            Ok(_) => {
                dst.put_slice(&buf);
                Ok(())
            }
            Err(e) => Err(RpcError::internal(format!(
                "Failed to decompress message: {}",
                e
            ))),
        };
        buf.clear();
        self.buf = Some(buf);
        res
    }
}

impl Drop for Decompressor {
    fn drop(&mut self) {
        self.end();
    }
}
