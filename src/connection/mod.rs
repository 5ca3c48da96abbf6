//! Connection management.
//!
//! Handlers are plain state machines driven by an explicit clock. Inputs are
//! inbound control frames, stream open/close notifications, flushes, close
//! requests and transport errors. Output is an ordered queue of [`Action`]s
//! that the [`driver`](run) applies to the transport.
use std::time::Instant;

mod client;
mod driver;
mod reason;
mod server;
mod state;
mod timers;

pub use self::client::{ClientConnection, ClientEvent};
pub use self::driver::{run, start, ConnectionHandle, Input, Transport};
pub use self::reason::CloseReason;
pub use self::server::{ServerConnection, ServerEvent};
pub use self::state::State;
pub use self::timers::Timer;

use crate::error::ConnectionError;
use crate::frame::{Frame, StreamId};

/// Handler output
#[derive(Debug, Clone, PartialEq)]
pub enum Action<E> {
    /// Write control frame
    Send(Frame),
    /// Notify upper layer
    Event(E),
    /// Flush pending data and close transport
    Close,
    /// Close transport immediately
    ForceClose,
}

/// Connection management handler
pub trait ConnectionHandler {
    type Event;

    /// Current lifecycle state
    fn state(&self) -> State;

    /// Transport is established
    fn on_active(&mut self, now: Instant);

    /// Inbound control frame
    fn recv_frame(&mut self, frame: Frame, now: Instant);

    /// Stream got request metadata
    fn stream_opened(&mut self, id: StreamId, now: Instant);

    fn stream_closed(&mut self, id: StreamId, now: Instant);

    /// Data has been written to transport
    fn on_flush(&mut self, now: Instant);

    /// Gracefully close connection
    fn close(&mut self, now: Instant);

    /// Fatal transport or protocol error
    fn on_error(&mut self, err: ConnectionError, now: Instant);

    /// Transport is closed
    fn on_inactive(&mut self, now: Instant);

    /// Earliest armed timer
    fn next_deadline(&self) -> Option<Instant>;

    /// Fire expired timers
    fn poll_timers(&mut self, now: Instant);

    fn next_action(&mut self) -> Option<Action<Self::Event>>;

    /// Handler does not accept input anymore
    fn is_closed(&self) -> bool {
        matches!(self.state(), State::Closing | State::Closed)
    }
}
