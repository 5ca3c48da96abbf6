use std::{collections::VecDeque, time::Instant};

use fxhash::FxHashSet;
use nanorand::Rng;
use ntex_util::time::Millis;

use super::timers::{Timer, Timers};
use super::Action;
use crate::config::{duration, KeepaliveConfig};
use crate::frame::{Frame, Ping, Settings, StreamId};

/// Connection lifecycle state
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Active, no open streams
    Idle,
    /// Active, has open streams
    Active,
    /// Graceful shutdown in progress
    GoingAway,
    /// Close requested, waiting for transport
    Closing,
    Closed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum Phase {
    Open,
    GoingAway,
    Closing,
    Closed,
}

/// State shared by server and client handlers
#[derive(Debug)]
pub(super) struct Shared<E> {
    pub(super) phase: Phase,
    pub(super) streams: FxHashSet<StreamId>,
    pub(super) timers: Timers,
    pub(super) peer_settings: Option<Settings>,
    actions: VecDeque<Action<E>>,
    max_idle_time: Option<Millis>,
    keepalive: Option<KeepaliveConfig>,
    // keepalive interval without open streams, `None` disables pings
    no_calls_interval: Option<Millis>,
    ping_nonce: Option<u64>,
}

impl<E> Shared<E> {
    pub(super) fn new(
        max_idle_time: Option<Millis>,
        keepalive: Option<KeepaliveConfig>,
        no_calls_interval: Option<Millis>,
    ) -> Self {
        Shared {
            max_idle_time,
            keepalive,
            no_calls_interval,
            phase: Phase::Open,
            streams: FxHashSet::default(),
            timers: Timers::default(),
            peer_settings: None,
            actions: VecDeque::new(),
            ping_nonce: None,
        }
    }

    pub(super) fn state(&self) -> State {
        match self.phase {
            Phase::Open if self.streams.is_empty() => State::Idle,
            Phase::Open => State::Active,
            Phase::GoingAway => State::GoingAway,
            Phase::Closing => State::Closing,
            Phase::Closed => State::Closed,
        }
    }

    pub(super) fn is_closing(&self) -> bool {
        matches!(self.phase, Phase::Closing | Phase::Closed)
    }

    pub(super) fn send<T: Into<Frame>>(&mut self, frame: T) {
        self.actions.push_back(Action::Send(frame.into()));
    }

    pub(super) fn event(&mut self, event: E) {
        self.actions.push_back(Action::Event(event));
    }

    pub(super) fn next_action(&mut self) -> Option<Action<E>> {
        self.actions.pop_front()
    }

    /// Close transport
    pub(super) fn close(&mut self, force: bool) {
        if !self.is_closing() {
            self.phase = Phase::Closing;
            self.timers.cancel_all();
            self.actions.push_back(if force {
                Action::ForceClose
            } else {
                Action::Close
            });
        }
    }

    pub(super) fn on_active(&mut self, now: Instant) {
        self.arm_idle(now);
        self.schedule_keepalive(now);
    }

    /// Record peer settings, returns true for the first SETTINGS frame
    pub(super) fn peer_settings(&mut self, settings: Settings) -> bool {
        let first = self.peer_settings.is_none();
        self.peer_settings = Some(settings);
        first
    }

    /// Add stream to open set, returns false for known ids
    pub(super) fn open_stream(&mut self, id: StreamId, now: Instant) -> bool {
        if !self.streams.insert(id) {
            return false;
        }
        if self.streams.len() == 1 {
            self.timers.cancel(Timer::Idle);

            // keepalive could be suppressed while there were no calls
            if self.keepalive.is_some()
                && self.ping_nonce.is_none()
                && !self.timers.is_armed(Timer::Keepalive)
            {
                self.schedule_keepalive(now);
            }
        }
        true
    }

    /// Remove stream from open set, returns false for unknown ids
    pub(super) fn close_stream(&mut self, id: StreamId, now: Instant) -> bool {
        if !self.streams.remove(&id) {
            return false;
        }
        if self.streams.is_empty() && self.phase == Phase::Open {
            self.arm_idle(now);
            if self.ping_nonce.is_none() {
                self.schedule_keepalive(now);
            }
        }
        true
    }

    fn arm_idle(&mut self, now: Instant) {
        if let Some(idle) = self.max_idle_time {
            if self.streams.is_empty() {
                self.timers.arm(Timer::Idle, now + duration(idle));
            }
        }
    }

    /// Schedule next keepalive ping
    pub(super) fn schedule_keepalive(&mut self, now: Instant) {
        if let Some(ref keepalive) = self.keepalive {
            let interval = if self.streams.is_empty() {
                self.no_calls_interval
            } else {
                Some(keepalive.time)
            };

            if let Some(interval) = interval {
                self.timers.arm(Timer::Keepalive, now + duration(interval));
            } else {
                log::trace!("keepalive is suppressed, no open streams");
                self.timers.cancel(Timer::Keepalive);
            }
        }
    }

    /// Send keepalive ping with fresh nonce
    pub(super) fn send_keepalive(&mut self, now: Instant) {
        if let Some(timeout) = self.keepalive.as_ref().map(|k| k.timeout) {
            let nonce = nanorand::tls_rng().generate::<u64>();
            log::trace!("sending keepalive ping; nonce={:x}", nonce);

            self.ping_nonce = Some(nonce);
            self.send(Ping::new(nonce.to_be_bytes()));
            self.timers
                .arm(Timer::KeepaliveTimeout, now + duration(timeout));
        }
    }

    /// Handle PING ack, returns true if it acknowledges keepalive ping
    pub(super) fn keepalive_ack(&mut self, nonce: u64, now: Instant) -> bool {
        if self.ping_nonce == Some(nonce) {
            self.ping_nonce = None;
            self.timers.cancel(Timer::KeepaliveTimeout);
            self.schedule_keepalive(now);
            true
        } else {
            false
        }
    }
}
