use std::{io, time::Instant};

use ntex_rpc_transport::connection::{
    Action, ClientConnection, ClientEvent, CloseReason, ConnectionHandler, ServerConnection,
    ServerEvent, State,
};
use ntex_rpc_transport::frame::{Frame, FrameError, Reason, StreamId};
use ntex_rpc_transport::{ClientConfig, ConnectionError, KeepaliveConfig, ServerConfig};
use ntex_util::time::Millis;

mod support;

use support::{actions, at, frames};

fn server(cfg: ServerConfig) -> (ServerConnection, Instant) {
    support::init_log();
    let now = Instant::now();
    let mut con = ServerConnection::new(&cfg);
    con.on_active(now);
    assert!(actions(&mut con).is_empty());
    (con, now)
}

fn client(cfg: ClientConfig) -> (ClientConnection, Instant) {
    support::init_log();
    let now = Instant::now();
    let mut con = ClientConnection::new(&cfg);
    con.on_active(now);
    assert!(actions(&mut con).is_empty());
    (con, now)
}

fn send(frame: Frame) -> Action<ServerEvent> {
    Action::Send(frame)
}

fn client_send(frame: Frame) -> Action<ClientEvent> {
    Action::Send(frame)
}

/// Returns payload of the shutdown ping
fn expect_first_go_away(actions: Vec<Action<ServerEvent>>) -> [u8; 8] {
    assert_eq!(actions.len(), 2, "actions={:?}", actions);
    assert_eq!(
        actions[0],
        send(frames::go_away(StreamId::MAX, Reason::NO_ERROR))
    );
    match actions[1] {
        Action::Send(ref frame) => frames::ping_payload(frame),
        ref action => panic!("unexpected action; actual={:?}", action),
    }
}

// ===== server =====

#[test]
fn server_connect_succeeded() {
    let (mut con, now) = server(ServerConfig::new());
    assert_eq!(con.state(), State::Idle);

    con.recv_frame(frames::settings(), now);
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ServerEvent::ConnectSucceeded)]
    );
    assert!(con.peer_settings().is_some());

    // only first SETTINGS is reported
    con.recv_frame(frames::settings(), now);
    con.recv_frame(frames::settings_ack(), now);
    assert!(actions(&mut con).is_empty());
}

#[test]
fn server_inactive() {
    let (mut con, now) = server(ServerConfig::new());
    con.on_inactive(now);
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ServerEvent::ConnectFailed)]
    );
    assert_eq!(con.state(), State::Closed);

    let (mut con, now) = server(ServerConfig::new());
    con.recv_frame(frames::settings(), now);
    let _ = actions(&mut con);
    con.on_inactive(now);
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ServerEvent::Closed(CloseReason::RemoteInitiated))]
    );
}

#[test]
fn server_stream_count() {
    let (mut con, now) = server(ServerConfig::new().max_idle_time(Millis(1000)));
    assert_eq!(con.next_deadline(), Some(at(now, 1000)));

    con.stream_opened(1.into(), now);
    con.stream_opened(1.into(), now);
    con.stream_opened(3.into(), now);
    assert_eq!(con.active_streams(), 2);
    assert_eq!(con.state(), State::Active);
    assert_eq!(con.last_peer_stream_id(), 3);

    // idle timer is suspended while streams are open
    assert_eq!(con.next_deadline(), Some(at(now, 7_200_000)));

    con.stream_closed(5.into(), at(now, 100));
    con.stream_closed(1.into(), at(now, 100));
    con.stream_closed(3.into(), at(now, 200));
    assert_eq!(con.active_streams(), 0);
    assert_eq!(con.state(), State::Idle);
    assert_eq!(con.next_deadline(), Some(at(now, 1200)));
    assert!(actions(&mut con).is_empty());
}

#[test]
fn server_idle_timeout() {
    let cfg = ServerConfig::new()
        .max_idle_time(Millis(1000))
        .max_grace_time(Millis(500));
    let (mut con, now) = server(cfg);

    con.poll_timers(at(now, 999));
    assert!(actions(&mut con).is_empty());

    con.poll_timers(at(now, 1000));
    let _ = expect_first_go_away(actions(&mut con));
    assert_eq!(con.state(), State::GoingAway);
    assert_eq!(con.next_deadline(), Some(at(now, 1500)));

    // shutdown ping is never acked, grace time forces close
    con.poll_timers(at(now, 1500));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::IdleTimeout)),
            Action::ForceClose
        ]
    );
    assert_eq!(con.state(), State::Closing);
    assert!(con.is_closed());
    assert_eq!(con.next_deadline(), None);
}

#[test]
fn server_idle_timeout_peer_disconnects() {
    let (mut con, now) = server(ServerConfig::new().max_idle_time(Millis(1000)));
    con.recv_frame(frames::settings(), now);
    let _ = actions(&mut con);

    con.poll_timers(at(now, 1000));
    let _ = expect_first_go_away(actions(&mut con));

    // peer drops the socket instead of acking the shutdown ping
    con.on_inactive(at(now, 1100));
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ServerEvent::Closed(CloseReason::IdleTimeout))]
    );
    assert_eq!(con.state(), State::Closed);
}

#[test]
fn server_idle_timeout_remote_go_away() {
    let (mut con, now) = server(ServerConfig::new().max_idle_time(Millis(1000)));
    con.poll_timers(at(now, 1000));
    let _ = expect_first_go_away(actions(&mut con));

    con.recv_frame(frames::go_away(0, Reason::NO_ERROR), at(now, 1100));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::GoingAway(Reason::NO_ERROR, String::new())),
            Action::Event(ServerEvent::Closed(CloseReason::IdleTimeout)),
            Action::Close
        ]
    );
}

#[test]
fn server_graceful_shutdown() {
    let (mut con, now) = server(ServerConfig::new());
    con.stream_opened(1.into(), now);
    con.stream_opened(3.into(), now);

    con.close(now);
    let payload = expect_first_go_away(actions(&mut con));

    // repeated close is ignored
    con.close(now);
    assert!(actions(&mut con).is_empty());

    // unknown ping ack does not finish shutdown
    con.recv_frame(frames::pong([0; 8]), now);
    assert!(actions(&mut con).is_empty());

    con.recv_frame(frames::pong(payload), now);
    assert_eq!(
        actions(&mut con),
        vec![send(frames::go_away(3, Reason::NO_ERROR))]
    );

    con.stream_closed(1.into(), now);
    assert!(actions(&mut con).is_empty());
    con.stream_closed(3.into(), now);
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::InitiatedLocally)),
            Action::Close
        ]
    );
}

#[test]
fn server_graceful_shutdown_no_streams() {
    let (mut con, now) = server(ServerConfig::new());
    con.close(now);
    let payload = expect_first_go_away(actions(&mut con));

    con.recv_frame(frames::pong(payload), now);
    assert_eq!(
        actions(&mut con),
        vec![
            send(frames::go_away(0, Reason::NO_ERROR)),
            Action::Event(ServerEvent::Closed(CloseReason::InitiatedLocally)),
            Action::Close
        ]
    );
}

#[test]
fn server_max_age() {
    let (mut con, now) = server(ServerConfig::new().max_age(Millis(5000)));
    con.stream_opened(1.into(), now);

    con.poll_timers(at(now, 5000));
    let payload = expect_first_go_away(actions(&mut con));
    con.recv_frame(frames::pong(payload), at(now, 5001));
    assert_eq!(
        actions(&mut con),
        vec![send(frames::go_away(1, Reason::NO_ERROR))]
    );

    con.stream_closed(1.into(), at(now, 5002));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::Error {
                cause: None,
                active_streams: 1
            })),
            Action::Close
        ]
    );
}

#[test]
fn server_keepalive() {
    let cfg = ServerConfig::new().keepalive(KeepaliveConfig::new(Millis(10_000), Millis(2000)));
    let (mut con, now) = server(cfg);

    // no pings without calls
    assert_eq!(con.next_deadline(), None);

    con.stream_opened(1.into(), now);
    assert_eq!(con.next_deadline(), Some(at(now, 10_000)));

    con.poll_timers(at(now, 10_000));
    let acts = actions(&mut con);
    assert_eq!(acts.len(), 1);
    let payload = match acts[0] {
        Action::Send(ref frame) => frames::ping_payload(frame),
        ref action => panic!("unexpected action; actual={:?}", action),
    };
    assert_eq!(con.next_deadline(), Some(at(now, 12_000)));

    // ack reschedules next ping
    con.recv_frame(frames::pong(payload), at(now, 11_000));
    assert!(actions(&mut con).is_empty());
    assert_eq!(con.next_deadline(), Some(at(now, 21_000)));

    con.poll_timers(at(now, 21_000));
    let payload2 = match actions(&mut con).pop() {
        Some(Action::Send(frame)) => frames::ping_payload(&frame),
        action => panic!("unexpected action; actual={:?}", action),
    };
    assert_ne!(payload, payload2);

    con.poll_timers(at(now, 23_000));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::KeepaliveTimeout)),
            Action::ForceClose
        ]
    );
}

#[test]
fn server_keepalive_without_calls() {
    let cfg = ServerConfig::new()
        .keepalive(KeepaliveConfig::new(Millis(10_000), Millis(2000)).allow_without_calls(true));
    let (con, now) = server(cfg);

    // min ping interval without calls is larger than keepalive time
    assert_eq!(con.next_deadline(), Some(at(now, 300_000)));
}

#[test]
fn server_keepalive_suppressed() {
    let cfg = ServerConfig::new().keepalive(KeepaliveConfig::new(Millis(10_000), Millis(2000)));
    let (mut con, now) = server(cfg);

    con.stream_opened(1.into(), now);
    con.stream_closed(1.into(), at(now, 5000));
    assert_eq!(con.next_deadline(), None);

    con.stream_opened(3.into(), at(now, 6000));
    assert_eq!(con.next_deadline(), Some(at(now, 16_000)));
}

#[test]
fn server_ping_strikes() {
    let (mut con, now) = server(ServerConfig::new());

    for idx in 0..2 {
        con.recv_frame(frames::ping([idx; 8]), at(now, idx as u64));
        assert_eq!(actions(&mut con), vec![send(frames::pong([idx; 8]))]);
    }

    con.recv_frame(frames::ping([2; 8]), at(now, 2));
    assert_eq!(
        actions(&mut con),
        vec![
            send(frames::pong([2; 8])),
            send(frames::go_away_with_data(
                0,
                Reason::ENHANCE_YOUR_CALM,
                "too_many_pings"
            )),
            Action::Event(ServerEvent::Closed(CloseReason::Error {
                cause: Some(ConnectionError::TooManyPings),
                active_streams: 0
            })),
            Action::ForceClose
        ]
    );
}

#[test]
fn server_ping_strikes_reset_by_flush() {
    let (mut con, now) = server(ServerConfig::new());

    con.recv_frame(frames::ping([0; 8]), now);
    con.recv_frame(frames::ping([0; 8]), now);
    con.on_flush(now);
    con.recv_frame(frames::ping([0; 8]), now);
    con.recv_frame(frames::ping([0; 8]), now);
    assert_eq!(actions(&mut con).len(), 4);
    assert_eq!(con.state(), State::Idle);
}

#[test]
fn server_pings_with_active_streams() {
    let (mut con, now) = server(ServerConfig::new());
    con.stream_opened(1.into(), now);

    for _ in 0..5 {
        con.recv_frame(frames::ping([1; 8]), now);
    }
    assert_eq!(actions(&mut con).len(), 5);
    assert_eq!(con.state(), State::Active);
}

#[test]
fn server_allowed_pings_interval() {
    let cfg = ServerConfig::new()
        .keepalive(KeepaliveConfig::default().allow_without_calls(true))
        .min_ping_interval_without_calls(Millis(1000));
    let (mut con, now) = server(cfg);

    // pings are allowed, but not too often
    for idx in 0..10 {
        con.recv_frame(frames::ping([0; 8]), at(now, idx * 1000));
    }
    assert_eq!(con.state(), State::Idle);

    for idx in 0..4 {
        con.recv_frame(frames::ping([0; 8]), at(now, 10_000 + idx));
    }
    assert_eq!(con.state(), State::Closing);
}

#[test]
fn server_remote_go_away() {
    let (mut con, now) = server(ServerConfig::new());
    con.stream_opened(1.into(), now);

    con.recv_frame(
        frames::go_away_with_data(1, Reason::NO_ERROR, "shutdown"),
        now,
    );
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ServerEvent::GoingAway(
            Reason::NO_ERROR,
            "shutdown".to_string()
        ))]
    );
    assert_eq!(con.state(), State::GoingAway);

    con.stream_closed(1.into(), now);
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::RemoteInitiated)),
            Action::Close
        ]
    );
}

#[test]
fn server_error() {
    let (mut con, now) = server(ServerConfig::new());
    con.stream_opened(1.into(), now);

    con.on_error(FrameError::InvalidStreamId.into(), now);
    let acts = actions(&mut con);
    assert_eq!(acts.len(), 3);
    match acts[0] {
        Action::Send(Frame::GoAway(ref frame)) => {
            assert_eq!(frame.reason(), Reason::PROTOCOL_ERROR)
        }
        ref action => panic!("unexpected action; actual={:?}", action),
    }
    assert_eq!(
        acts[1],
        Action::Event(ServerEvent::Closed(CloseReason::Error {
            cause: Some(ConnectionError::Protocol(FrameError::InvalidStreamId)),
            active_streams: 1
        }))
    );
    assert_eq!(acts[2], Action::ForceClose);

    // closed connection ignores input
    con.recv_frame(frames::ping([0; 8]), now);
    con.close(now);
    assert!(actions(&mut con).is_empty());

    con.on_inactive(now);
    assert!(actions(&mut con).is_empty());
    assert_eq!(con.state(), State::Closed);
}

#[test]
fn server_io_error() {
    let (mut con, now) = server(ServerConfig::new());
    con.on_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset").into(), now);
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ServerEvent::Closed(CloseReason::Error {
                cause: Some(io::Error::new(io::ErrorKind::ConnectionReset, "").into()),
                active_streams: 0
            })),
            Action::ForceClose
        ]
    );
}

// ===== client =====

#[test]
fn client_ready() {
    let (mut con, now) = client(ClientConfig::new());
    con.recv_frame(frames::settings(), now);
    con.recv_frame(frames::settings(), now);
    assert_eq!(actions(&mut con), vec![Action::Event(ClientEvent::Ready)]);
}

#[test]
fn client_idle_timeout() {
    let (mut con, now) = client(ClientConfig::new().max_idle_time(Some(Millis(1000))));
    assert_eq!(con.next_deadline(), Some(at(now, 1000)));

    con.poll_timers(at(now, 1000));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ClientEvent::Closing(CloseReason::IdleTimeout)),
            client_send(frames::go_away(0, Reason::NO_ERROR)),
            Action::Close
        ]
    );
}

#[test]
fn client_keepalive_timeout() {
    let cfg = ClientConfig::new()
        .max_idle_time(None)
        .keepalive(KeepaliveConfig::new(Millis(10_000), Millis(2000)).allow_without_calls(true));
    let (mut con, now) = client(cfg);
    assert_eq!(con.next_deadline(), Some(at(now, 10_000)));

    con.poll_timers(at(now, 10_000));
    assert_eq!(actions(&mut con).len(), 1);

    con.poll_timers(at(now, 12_000));
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ClientEvent::Closing(CloseReason::KeepaliveTimeout)),
            Action::ForceClose
        ]
    );
}

#[test]
fn client_keepalive_ack() {
    let cfg = ClientConfig::new()
        .max_idle_time(None)
        .keepalive(KeepaliveConfig::new(Millis(10_000), Millis(2000)));
    let (mut con, now) = client(cfg);
    assert_eq!(con.next_deadline(), None);

    con.stream_opened(1.into(), now);
    con.poll_timers(at(now, 10_000));
    let payload = match actions(&mut con).pop() {
        Some(Action::Send(frame)) => frames::ping_payload(&frame),
        action => panic!("unexpected action; actual={:?}", action),
    };
    con.recv_frame(frames::pong(payload), at(now, 10_500));
    assert_eq!(con.next_deadline(), Some(at(now, 20_500)));
}

#[test]
fn client_remote_go_away() {
    let (mut con, now) = client(ClientConfig::new());
    con.stream_opened(1.into(), now);

    con.recv_frame(
        frames::go_away_with_data(1, Reason::ENHANCE_YOUR_CALM, "too_many_pings"),
        now,
    );
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ClientEvent::Closing(CloseReason::GoAway {
                code: Reason::ENHANCE_YOUR_CALM,
                message: "too_many_pings".to_string()
            })),
            client_send(frames::go_away(0, Reason::NO_ERROR)),
        ]
    );

    con.stream_closed(1.into(), now);
    assert_eq!(actions(&mut con), vec![Action::Close]);
}

#[test]
fn client_pong() {
    let (mut con, now) = client(ClientConfig::new());
    con.recv_frame(frames::ping([7; 8]), now);
    assert_eq!(actions(&mut con), vec![client_send(frames::pong([7; 8]))]);
}

#[test]
fn client_error() {
    let (mut con, now) = client(ClientConfig::new());
    con.on_error(ConnectionError::TooManyPings, now);
    assert_eq!(
        actions(&mut con),
        vec![
            Action::Event(ClientEvent::Closing(CloseReason::Unexpected {
                error: Some(ConnectionError::TooManyPings),
                was_idle: true
            })),
            Action::ForceClose
        ]
    );
}

#[test]
fn client_inactive() {
    let (mut con, now) = client(ClientConfig::new());
    con.stream_opened(1.into(), now);
    con.on_inactive(now);
    assert_eq!(
        actions(&mut con),
        vec![Action::Event(ClientEvent::Closing(CloseReason::Unexpected {
            error: None,
            was_idle: false
        }))]
    );
    assert_eq!(con.state(), State::Closed);
}
