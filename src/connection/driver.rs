use std::{fmt, future::poll_fn, task::Poll, time::Instant};

use ntex_io::IoRef;
use ntex_util::channel::mpsc;
use ntex_util::time::{Millis, Sleep};

use super::{Action, ConnectionHandler};
use crate::codec::ControlCodec;
use crate::error::ConnectionError;
use crate::frame::{Frame, StreamId};
use crate::task_group::{CancellableTaskHandle, TaskGroup};

/// Connection transport
pub trait Transport {
    /// Write control frame
    fn send(&self, frame: Frame);

    /// Flush and close
    fn close(&self);

    fn force_close(&self);
}

impl Transport for IoRef {
    fn send(&self, frame: Frame) {
        if let Err(err) = self.encode(frame, &ControlCodec::default()) {
            log::error!("cannot encode control frame: {:?}", err);
        }
    }

    fn close(&self) {
        IoRef::close(self)
    }

    fn force_close(&self) {
        IoRef::force_close(self)
    }
}

/// Driver input
#[derive(Debug)]
pub enum Input {
    Frame(Frame),
    StreamOpened(StreamId),
    StreamClosed(StreamId),
    Flush,
    Close,
    Error(ConnectionError),
    Inactive,
}

/// Sender side of the driver inbox
#[derive(Clone)]
pub struct ConnectionHandle(mpsc::Sender<Input>);

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").finish()
    }
}

impl ConnectionHandle {
    fn send(&self, input: Input) {
        if self.0.send(input).is_err() {
            log::trace!("connection driver is gone");
        }
    }

    /// Inbound control frame
    pub fn frame(&self, frame: Frame) {
        self.send(Input::Frame(frame))
    }

    pub fn stream_opened(&self, id: StreamId) {
        self.send(Input::StreamOpened(id))
    }

    pub fn stream_closed(&self, id: StreamId) {
        self.send(Input::StreamClosed(id))
    }

    /// Data is written to transport
    pub fn flush(&self) {
        self.send(Input::Flush)
    }

    /// Request graceful close
    pub fn close(&self) {
        self.send(Input::Close)
    }

    pub fn error(&self, err: ConnectionError) {
        self.send(Input::Error(err))
    }

    /// Transport is closed
    pub fn inactive(&self) {
        self.send(Input::Inactive)
    }
}

fn apply<H, T>(handler: &mut H, transport: &T, events: &mpsc::Sender<H::Event>)
where
    H: ConnectionHandler,
    T: Transport,
{
    while let Some(action) = handler.next_action() {
        match action {
            Action::Send(frame) => {
                log::trace!("sending {:?}", frame);
                transport.send(frame)
            }
            Action::Event(event) => {
                if events.send(event).is_err() {
                    log::trace!("connection events receiver is gone");
                }
            }
            Action::Close => transport.close(),
            Action::ForceClose => transport.force_close(),
        }
    }
}

fn input<H: ConnectionHandler>(handler: &mut H, input: Input, now: Instant) {
    match input {
        Input::Frame(frame) => handler.recv_frame(frame, now),
        Input::StreamOpened(id) => handler.stream_opened(id, now),
        Input::StreamClosed(id) => handler.stream_closed(id, now),
        Input::Flush => handler.on_flush(now),
        Input::Close => handler.close(now),
        Input::Error(err) => handler.on_error(err, now),
        Input::Inactive => handler.on_inactive(now),
    }
}

/// Drive connection handler until it is closed.
///
/// Inputs are processed in order, handler output is applied to
/// `transport` and events are forwarded to `events`.
pub async fn run<H, T>(
    mut handler: H,
    transport: T,
    rx: mpsc::Receiver<Input>,
    events: mpsc::Sender<H::Event>,
) where
    H: ConnectionHandler,
    T: Transport,
{
    handler.on_active(Instant::now());

    loop {
        apply(&mut handler, &transport, &events);
        if handler.is_closed() {
            break;
        }

        let mut sleep = handler.next_deadline().map(|deadline| {
            let delay = deadline.saturating_duration_since(Instant::now());
            // round up, timer must not fire early
            let ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX - 1);
            Sleep::new(Millis(ms + 1))
        });

        let item = poll_fn(|cx| {
            if let Poll::Ready(item) = rx.poll_recv(cx) {
                return Poll::Ready(Some(item));
            }
            if let Some(ref mut sleep) = sleep {
                if sleep.poll_elapsed(cx).is_ready() {
                    return Poll::Ready(None);
                }
            }
            Poll::Pending
        })
        .await;

        let now = Instant::now();
        match item {
            Some(Some(item)) => input(&mut handler, item, now),
            Some(None) => {
                log::trace!("all connection handles are dropped");
                handler.on_inactive(now);
            }
            None => (),
        }
        handler.poll_timers(now);
    }
    apply(&mut handler, &transport, &events);
    log::debug!("connection driver is stopped");
}

/// Start connection driver in task group
pub fn start<H, T>(
    handler: H,
    transport: T,
    group: &TaskGroup,
) -> (ConnectionHandle, mpsc::Receiver<H::Event>, CancellableTaskHandle)
where
    H: ConnectionHandler + 'static,
    H::Event: 'static,
    T: Transport + 'static,
{
    let (tx, rx) = mpsc::channel();
    let (events_tx, events_rx) = mpsc::channel();
    let task = group.spawn_cancellable(run(handler, transport, rx, events_tx));

    (ConnectionHandle(tx), events_rx, task)
}
