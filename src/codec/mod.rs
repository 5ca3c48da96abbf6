//! Length-prefixed message codec and control frame codec.
mod compression;
mod control;
mod decoder;
mod framer;

pub use self::compression::{
    Algorithm, Algorithms, Compressor, Decompressor, ACCEPT_ENCODING_HEADER, ENCODING_HEADER,
};
pub use self::control::ControlCodec;
pub use self::decoder::MessageDecoder;
pub use self::framer::{Completion, MessageFramer};

/// Size of message header, compression flag and payload length
pub const HEADER_SIZE: usize = 5;

/// Default max size of received message
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;
