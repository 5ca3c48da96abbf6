use ntex_http::HeaderMap;
use ntex_rpc_transport::connection::{ClientEvent, CloseReason, ServerEvent};
use ntex_rpc_transport::frame::{Frame, Reason, Reset, StreamId};
use ntex_rpc_transport::pipeline::{ClientStack, ServerStack};
use ntex_rpc_transport::stream::MethodDescriptor;
use ntex_rpc_transport::{ClientConfig, ServerConfig, TaskGroup};
use ntex_util::time::{sleep, Millis};

mod support;

use support::{frames, Recorder, Written};

#[ntex::test]
async fn initial_settings() {
    support::init_log();
    let group = TaskGroup::new();
    let transport = Recorder::default();

    let stack = ServerStack::new(
        &ServerConfig::new().max_concurrent_streams(10),
        transport.clone(),
        &group,
    );
    let written = transport.frames();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0], Frame::Settings(stack.http2_settings().initial.clone()));
    assert_eq!(stack.http2_settings().initial.max_concurrent_streams(), Some(10));

    stack.shutdown();
    group.wait().await;
}

#[ntex::test]
async fn server_rejects_server_stream_ids() {
    let group = TaskGroup::new();
    let transport = Recorder::default();
    let stack = ServerStack::new(&ServerConfig::new(), transport.clone(), &group);
    transport.take();

    assert!(stack.accept_stream(StreamId::from(2)).is_none());
    assert_eq!(
        transport.take(),
        vec![Written::Frame(
            Reset::new(StreamId::from(2), Reason::PROTOCOL_ERROR).into()
        )]
    );

    let stream = stack.accept_stream(StreamId::from(1)).unwrap();
    assert_eq!(stream.id(), 1);
    assert!(!stream.is_open());
    assert!(transport.take().is_empty());

    group.cancel_all();
    group.wait().await;
}

#[ntex::test]
async fn client_refuses_peer_streams() {
    let group = TaskGroup::new();
    let transport = Recorder::default();
    let mut stack = ClientStack::new(&ClientConfig::new(), transport.clone(), &group);
    let events = stack.events().unwrap();
    assert!(stack.events().is_none());

    let initial = stack.http2_settings().initial.clone();
    assert_eq!(initial.is_push_enabled(), Some(false));
    assert_eq!(transport.take(), vec![Written::Frame(initial.into())]);

    assert!(stack.accept_stream(StreamId::from(2)).is_none());
    assert_eq!(
        transport.take(),
        vec![Written::Frame(
            Reset::new(StreamId::from(2), Reason::REFUSED_STREAM).into()
        )]
    );

    stack.connection().frame(frames::settings());
    assert_eq!(events.recv().await, Some(ClientEvent::Ready));

    let stream = stack.open_stream(StreamId::from(1), MethodDescriptor::new("svc", "method"));
    assert!(stream.is_open());

    stack.shutdown();
    group.wait().await;
    assert_eq!(events.recv().await, None);
}

#[ntex::test]
async fn server_graceful_close() {
    support::init_log();
    let group = TaskGroup::new();
    let transport = Recorder::default();
    let mut stack = ServerStack::new(&ServerConfig::new(), transport.clone(), &group);
    let events = stack.events().unwrap();
    transport.take();

    stack.connection().frame(frames::settings());
    assert_eq!(events.recv().await, Some(ServerEvent::ConnectSucceeded));

    let mut stream = stack.accept_stream(StreamId::from(1)).unwrap();
    stream
        .recv_request_metadata("/svc/method", &HeaderMap::new())
        .unwrap();
    stack.flush_notifier().notify();

    stack.connection().close();
    sleep(Millis(50)).await;

    let written = transport.frames();
    assert_eq!(written.len(), 2, "frames={:?}", written);
    assert_eq!(written[0], frames::go_away(StreamId::MAX, Reason::NO_ERROR));
    let payload = frames::ping_payload(&written[1]);
    transport.take();

    stack.connection().frame(frames::pong(payload));
    sleep(Millis(50)).await;
    assert_eq!(
        transport.take(),
        vec![Written::Frame(frames::go_away(1, Reason::NO_ERROR))]
    );
    assert_eq!(group.active(), 1);

    // last stream completes shutdown
    drop(stream);
    assert_eq!(
        events.recv().await,
        Some(ServerEvent::Closed(CloseReason::InitiatedLocally))
    );
    group.wait().await;
    assert_eq!(transport.take(), vec![Written::Close]);
    assert_eq!(events.recv().await, None);
}

#[ntex::test]
async fn server_connection_lost() {
    let group = TaskGroup::new();
    let transport = Recorder::default();
    let mut stack = ServerStack::new(&ServerConfig::new(), transport.clone(), &group);
    let events = stack.events().unwrap();

    stack.connection().inactive();
    assert_eq!(events.recv().await, Some(ServerEvent::ConnectFailed));
    group.wait().await;
    assert_eq!(group.active(), 0);
    assert!(!transport.is_closed());
}
