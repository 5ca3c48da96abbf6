#![allow(dead_code)]
use std::{cell::RefCell, rc::Rc, time::Duration, time::Instant};

use ntex_rpc_transport::connection::{Action, ConnectionHandler, Transport};
use ntex_rpc_transport::frame::{Frame, StreamId};
use ntex_rpc_transport::stream::StreamObserver;

pub mod frames;

/// Output written to a [`Recorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum Written {
    Frame(Frame),
    Close,
    ForceClose,
}

/// Transport that records everything written to it
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Written>>>);

impl Recorder {
    pub fn take(&self) -> Vec<Written> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.0
            .borrow()
            .iter()
            .filter_map(|w| match w {
                Written::Frame(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.0
            .borrow()
            .iter()
            .any(|w| matches!(w, Written::Close | Written::ForceClose))
    }
}

impl Transport for Recorder {
    fn send(&self, frame: Frame) {
        self.0.borrow_mut().push(Written::Frame(frame));
    }

    fn close(&self) {
        self.0.borrow_mut().push(Written::Close);
    }

    fn force_close(&self) {
        self.0.borrow_mut().push(Written::ForceClose);
    }
}

/// Records stream notifications
#[derive(Clone, Default)]
pub struct Streams(Rc<RefCell<Vec<(bool, StreamId)>>>);

impl Streams {
    pub fn take(&self) -> Vec<(bool, StreamId)> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl StreamObserver for Streams {
    fn stream_opened(&self, id: StreamId) {
        self.0.borrow_mut().push((true, id));
    }

    fn stream_closed(&self, id: StreamId) {
        self.0.borrow_mut().push((false, id));
    }
}

/// Drain pending handler actions
pub fn actions<H: ConnectionHandler>(handler: &mut H) -> Vec<Action<H::Event>> {
    std::iter::from_fn(|| handler.next_action()).collect()
}

/// Instant `ms` milliseconds after `start`
pub fn at(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

pub fn init_log() {
    let _ = env_logger::try_init();
}
