use std::time::Instant;

use ntex_util::time::Millis;

use super::state::{Phase, Shared, State};
use super::timers::Timer;
use super::{Action, CloseReason, ConnectionHandler};
use crate::config::{duration, ServerConfig};
use crate::error::ConnectionError;
use crate::consts;
use crate::frame::{Frame, GoAway, Ping, Reason, Settings, StreamId};

/// Server connection events
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Peer sent its first SETTINGS frame
    ConnectSucceeded,
    /// Connection closed before peer SETTINGS was received
    ConnectFailed,
    /// Peer sent GOAWAY
    GoingAway(Reason, String),
    Closed(CloseReason),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Shutdown {
    /// First GOAWAY is sent, waiting for ping ack
    AwaitingAck,
    /// Final GOAWAY is sent
    Final,
    /// Peer sent GOAWAY
    Remote,
}

/// Server side connection management handler
#[derive(Debug)]
pub struct ServerConnection {
    st: Shared<ServerEvent>,
    max_age: Option<Millis>,
    max_grace_time: Option<Millis>,
    allow_without_calls: bool,
    min_ping_interval: Millis,
    shutdown: Option<Shutdown>,
    reason: Option<CloseReason>,
    last_peer_stream_id: StreamId,
    last_ping_at: Option<Instant>,
    ping_strikes: u32,
}

impl ServerConnection {
    pub fn new(cfg: &ServerConfig) -> Self {
        let keepalive = cfg.keepalive;
        let no_calls_interval = if keepalive.allow_without_calls {
            Some(Millis(std::cmp::max(
                keepalive.time.0,
                cfg.min_ping_interval_without_calls.0,
            )))
        } else {
            None
        };

        ServerConnection {
            st: Shared::new(cfg.max_idle_time, Some(keepalive), no_calls_interval),
            max_age: cfg.max_age,
            max_grace_time: cfg.max_grace_time,
            allow_without_calls: keepalive.allow_without_calls,
            min_ping_interval: cfg.min_ping_interval_without_calls,
            shutdown: None,
            reason: None,
            last_peer_stream_id: StreamId::zero(),
            last_ping_at: None,
            ping_strikes: 0,
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

    /// Highest stream id opened by the peer
    pub fn last_peer_stream_id(&self) -> StreamId {
        self.last_peer_stream_id
    }

    /// Start graceful shutdown
    fn go_away(&mut self, reason: CloseReason, now: Instant) {
        if self.st.phase != Phase::Open {
            return;
        }
        log::debug!("starting graceful shutdown: {}", reason);

        self.st.phase = Phase::GoingAway;
        self.reason = Some(reason);
        self.shutdown = Some(Shutdown::AwaitingAck);
        self.st.timers.cancel(Timer::Idle);
        self.st.timers.cancel(Timer::MaxAge);
        if let Some(grace) = self.max_grace_time {
            self.st.timers.arm(Timer::Grace, now + duration(grace));
        }

        // Peer may have streams in flight, announce max id and wait for ping ack
        self.st
            .send(GoAway::new(Reason::NO_ERROR).set_last_stream_id(StreamId::MAX));
        self.st
            .send(Ping::new(consts::SHUTDOWN_PING_NONCE.to_be_bytes()));
    }

    fn final_go_away(&mut self) {
        log::debug!(
            "sending final GOAWAY; last-stream-id={:?}",
            self.last_peer_stream_id
        );
        self.shutdown = Some(Shutdown::Final);
        self.st.send(
            GoAway::new(Reason::NO_ERROR).set_last_stream_id(self.last_peer_stream_id),
        );
        self.close_if_drained();
    }

    fn close_if_drained(&mut self) {
        if self.st.phase == Phase::GoingAway
            && self.st.streams.is_empty()
            && matches!(self.shutdown, Some(Shutdown::Final) | Some(Shutdown::Remote))
        {
            let reason = self.reason.take().unwrap_or(CloseReason::RemoteInitiated);
            self.closed(reason, false);
        }
    }

    fn closed(&mut self, reason: CloseReason, force: bool) {
        if !self.st.is_closing() {
            log::debug!("closing connection: {}", reason);
            self.st.event(ServerEvent::Closed(reason));
            self.st.close(force);
        }
    }

    fn error(&mut self, cause: ConnectionError) {
        let reason = CloseReason::Error {
            cause: Some(cause),
            active_streams: self.st.streams.len(),
        };
        self.closed(reason, true);
    }

    fn recv_ping(&mut self, ping: Ping, now: Instant) {
        if ping.is_ack() {
            let nonce = ping.nonce();
            if nonce == consts::SHUTDOWN_PING_NONCE {
                if self.shutdown == Some(Shutdown::AwaitingAck) {
                    self.final_go_away();
                }
            } else if !self.st.keepalive_ack(nonce, now) {
                log::trace!("unexpected ping ack; nonce={:x}", nonce);
            }
            return;
        }

        self.st.send(Ping::pong(ping.into_payload()));

        if self.st.streams.is_empty() {
            let too_soon = self
                .last_ping_at
                .map(|at| now.saturating_duration_since(at) < duration(self.min_ping_interval))
                .unwrap_or(false);

            if !self.allow_without_calls || too_soon {
                self.ping_strikes += 1;
                log::trace!("ping strike {}", self.ping_strikes);
            }
        }
        self.last_ping_at = Some(now);

        if self.ping_strikes > consts::MAX_PING_STRIKES {
            log::warn!("peer sent too many pings, closing connection");
            let err = ConnectionError::TooManyPings;
            self.st.send(GoAway::from(&err));
            self.error(err);
        }
    }

    fn recv_go_away(&mut self, frame: GoAway) {
        let message = frame.message();
        log::debug!(
            "received GOAWAY; code={:?} message={:?}",
            frame.reason(),
            message
        );
        self.st
            .event(ServerEvent::GoingAway(frame.reason(), message));

        if self.st.phase == Phase::Open {
            self.st.phase = Phase::GoingAway;
            self.st.timers.cancel(Timer::Idle);
            self.st.timers.cancel(Timer::MaxAge);
        }
        if !self.st.is_closing() && self.shutdown != Some(Shutdown::Final) {
            self.shutdown = Some(Shutdown::Remote);
            // a pending local shutdown keeps its reason
            self.reason.get_or_insert(CloseReason::RemoteInitiated);
        }
        self.close_if_drained();
    }
}

impl ConnectionHandler for ServerConnection {
    type Event = ServerEvent;

    fn state(&self) -> State {
        self.st.state()
    }

    fn on_active(&mut self, now: Instant) {
        self.st.on_active(now);
        if let Some(age) = self.max_age {
            self.st.timers.arm(Timer::MaxAge, now + duration(age));
        }
    }

    fn recv_frame(&mut self, frame: Frame, now: Instant) {
        if self.st.is_closing() {
            return;
        }

        match frame {
            Frame::Settings(settings) => {
                if !settings.is_ack() && self.st.peer_settings(settings) {
                    log::debug!("connection is established");
                    self.st.event(ServerEvent::ConnectSucceeded);
                }
            }
            Frame::Ping(ping) => self.recv_ping(ping, now),
            Frame::GoAway(frame) => self.recv_go_away(frame),
            Frame::Reset(reset) => {
                log::trace!("stream {:?} is reset: {:?}", reset.stream_id(), reset.reason());
            }
        }
    }

    fn stream_opened(&mut self, id: StreamId, now: Instant) {
        if self.st.open_stream(id, now) {
            if id.is_client_initiated() && id > self.last_peer_stream_id {
                self.last_peer_stream_id = id;
            }
        } else {
            log::trace!("stream {:?} is already open", id);
        }
    }

    fn stream_closed(&mut self, id: StreamId, now: Instant) {
        if self.st.close_stream(id, now) {
            self.close_if_drained();
        }
    }

    fn on_flush(&mut self, _: Instant) {
        self.ping_strikes = 0;
    }

    fn close(&mut self, now: Instant) {
        self.go_away(CloseReason::InitiatedLocally, now);
    }

    fn on_error(&mut self, err: ConnectionError, _: Instant) {
        if let ConnectionError::Protocol(_) = err {
            self.st.send(GoAway::from(&err));
        }
        self.error(err);
    }

    fn on_inactive(&mut self, _: Instant) {
        if self.st.is_closing() {
            self.st.phase = Phase::Closed;
            return;
        }
        self.st.timers.cancel_all();
        self.st.phase = Phase::Closed;

        if self.st.peer_settings.is_none() {
            log::debug!("connection closed before peer settings");
            self.st.event(ServerEvent::ConnectFailed);
        } else {
            let reason = self.reason.take().unwrap_or(CloseReason::RemoteInitiated);
            self.st.event(ServerEvent::Closed(reason));
        }
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
                        self.go_away(CloseReason::IdleTimeout, now);
                    }
                }
                Timer::MaxAge => {
                    let reason = CloseReason::Error {
                        cause: None,
                        active_streams: self.st.streams.len(),
                    };
                    self.go_away(reason, now);
                }
                Timer::Grace => {
                    let reason = self.reason.take().unwrap_or(CloseReason::InitiatedLocally);
                    self.closed(reason, true);
                }
                Timer::Keepalive => self.st.send_keepalive(now),
                Timer::KeepaliveTimeout => {
                    log::debug!("keepalive ping is not acknowledged");
                    self.closed(CloseReason::KeepaliveTimeout, true);
                }
            }
        }
    }

    fn next_action(&mut self) -> Option<Action<ServerEvent>> {
        self.st.next_action()
    }
}
