//! Transport core for RPC over HTTP/2.
//!
//! This library sits between an RPC runtime and an HTTP/2 engine. It
//! manages the lifecycle of a single HTTP/2 connection (keepalive pings,
//! idle and max-age shutdown, graceful and abrupt close) and frames RPC
//! messages as length-prefixed, optionally compressed units.
//!
//! # Layout
//!
//! * [`codec`] - message framer and decoder, compression and the control
//!   frame codec.
//! * [`connection`] - server and client connection management handlers and
//!   the driver that runs a handler on its own task.
//! * [`stream`] - per-stream method resolution and compression
//!   negotiation.
//! * [`pipeline`] - assembles server and client stacks.
//! * [`TaskGroup`] - group of local tasks with cancellation.
//!
//! Handlers are driven by an explicit clock, so connection behavior can be
//! tested without real time or sockets.
#![deny(rust_2018_idioms)]

macro_rules! proto_err {
    (conn: $($msg:tt)+) => {
        log::debug!("connection error PROTOCOL_ERROR -- {};", format_args!($($msg)+))
    };
    (stream: $($msg:tt)+) => {
        log::debug!("stream error PROTOCOL_ERROR -- {};", format_args!($($msg)+))
    };
}

mod config;
mod consts;
mod error;
mod task_group;

pub mod codec;
pub mod connection;
pub mod frame;
pub mod pipeline;
pub mod stream;

pub use self::config::{ClientConfig, Http2Config, KeepaliveConfig, ServerConfig};
pub use self::consts::{
    DEFAULT_RESET_STREAM_MAX, DEFAULT_RESET_STREAM_SECS, MAX_WINDOW_SIZE, MIN_MAX_FRAME_SIZE,
};
pub use self::error::{Code, ConnectionError, RpcError};
pub use self::task_group::{CancellableTaskHandle, TaskGroup};
