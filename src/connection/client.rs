use std::time::Instant;

use super::state::{Phase, Shared, State};
use super::timers::Timer;
use super::{Action, CloseReason, ConnectionHandler};
use crate::config::ClientConfig;
use crate::error::ConnectionError;
use crate::frame::{Frame, GoAway, Ping, Reason, Settings, StreamId};

/// Client connection events
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Peer sent its first SETTINGS frame
    Ready,
    /// Connection is closing, no new streams should be opened
    Closing(CloseReason),
}

/// Client side connection management handler
#[derive(Debug)]
pub struct ClientConnection {
    st: Shared<ClientEvent>,
}

impl ClientConnection {
    pub fn new(cfg: &ClientConfig) -> Self {
        let no_calls_interval = cfg
            .keepalive
            .as_ref()
            .filter(|k| k.allow_without_calls)
            .map(|k| k.time);

        ClientConnection {
            st: Shared::new(cfg.max_idle_time, cfg.keepalive, no_calls_interval),
        }
    }

    /// Number of open streams
    pub fn active_streams(&self) -> usize {
        self.st.streams.len()
    }

    /// Peer settings, if received
    pub fn peer_settings(&self) -> Option<&Settings> {
        self.st.peer_settings.as_ref()
    }

    fn closing(&mut self, reason: CloseReason) {
        log::debug!("client connection is closing: {}", reason);
        self.st.event(ClientEvent::Closing(reason));
    }

    /// Start graceful shutdown
    fn go_away(&mut self, reason: CloseReason) {
        if self.st.phase != Phase::Open {
            return;
        }
        self.st.phase = Phase::GoingAway;
        self.st.timers.cancel(Timer::Idle);
        self.closing(reason);

        self.st
            .send(GoAway::new(Reason::NO_ERROR).set_last_stream_id(StreamId::zero()));
        self.close_if_drained();
    }

    fn close_if_drained(&mut self) {
        if self.st.phase == Phase::GoingAway && self.st.streams.is_empty() {
            self.st.close(false);
        }
    }

    fn force_close(&mut self, reason: CloseReason) {
        if !self.st.is_closing() {
            // Closing is already reported for graceful shutdown
            if self.st.phase == Phase::Open {
                self.closing(reason);
            }
            self.st.close(true);
        }
    }
}

impl ConnectionHandler for ClientConnection {
    type Event = ClientEvent;

    fn state(&self) -> State {
        self.st.state()
    }

    fn on_active(&mut self, now: Instant) {
        self.st.on_active(now);
    }

    fn recv_frame(&mut self, frame: Frame, now: Instant) {
        if self.st.is_closing() {
            return;
        }

        match frame {
            Frame::Settings(settings) => {
                if !settings.is_ack() && self.st.peer_settings(settings) {
                    log::debug!("connection is ready");
                    self.st.event(ClientEvent::Ready);
                }
            }
            Frame::Ping(ping) => {
                if !ping.is_ack() {
                    self.st.send(Ping::pong(ping.into_payload()));
                } else if !self.st.keepalive_ack(ping.nonce(), now) {
                    log::trace!("unexpected ping ack; nonce={:x}", ping.nonce());
                }
            }
            Frame::GoAway(frame) => {
                let reason = CloseReason::GoAway {
                    code: frame.reason(),
                    message: frame.message(),
                };
                log::debug!("received GOAWAY; {}", reason);
                if self.st.phase == Phase::Open {
                    self.go_away(reason);
                }
            }
            Frame::Reset(reset) => {
                log::trace!("stream {:?} is reset: {:?}", reset.stream_id(), reset.reason());
            }
        }
    }

    fn stream_opened(&mut self, id: StreamId, now: Instant) {
        if !self.st.open_stream(id, now) {
            log::trace!("stream {:?} is already open", id);
        }
    }

    fn stream_closed(&mut self, id: StreamId, now: Instant) {
        if self.st.close_stream(id, now) {
            self.close_if_drained();
        }
    }

    fn on_flush(&mut self, _: Instant) {}

    fn close(&mut self, _: Instant) {
        self.go_away(CloseReason::InitiatedLocally);
    }

    fn on_error(&mut self, err: ConnectionError, _: Instant) {
        let reason = CloseReason::Unexpected {
            error: Some(err),
            was_idle: self.st.streams.is_empty(),
        };
        self.force_close(reason);
    }

    fn on_inactive(&mut self, _: Instant) {
        if !self.st.is_closing() && self.st.phase == Phase::Open {
            let reason = CloseReason::Unexpected {
                error: None,
                was_idle: self.st.streams.is_empty(),
            };
            self.closing(reason);
        }
        self.st.timers.cancel_all();
        self.st.phase = Phase::Closed;
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.st.timers.next()
    }

    fn poll_timers(&mut self, now: Instant) {
        while let Some(timer) = self.st.timers.expired(now) {
            log::trace!("{:?} timer fired", timer);
            match timer {
                Timer::Idle => {
                    if self.st.streams.is_empty() {
                        self.go_away(CloseReason::IdleTimeout);
                    }
                }
                Timer::Keepalive => self.st.send_keepalive(now),
                Timer::KeepaliveTimeout => {
                    log::debug!("keepalive ping is not acknowledged");
                    self.force_close(CloseReason::KeepaliveTimeout);
                }
                Timer::MaxAge | Timer::Grace => {}
            }
        }
    }

    fn next_action(&mut self) -> Option<Action<ClientEvent>> {
        self.st.next_action()
    }
}
