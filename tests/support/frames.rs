#![allow(dead_code)]
use ntex_rpc_transport::frame::{Frame, GoAway, Ping, PingPayload, Reason, Settings, StreamId};

// ==== helper functions to easily construct control frames ====

pub fn settings() -> Frame {
    Settings::default().into()
}

pub fn settings_ack() -> Frame {
    Settings::ack().into()
}

pub fn ping(payload: PingPayload) -> Frame {
    Ping::new(payload).into()
}

pub fn pong(payload: PingPayload) -> Frame {
    Ping::pong(payload).into()
}

pub fn go_away<T: Into<StreamId>>(last: T, reason: Reason) -> Frame {
    GoAway::new(reason).set_last_stream_id(last.into()).into()
}

pub fn go_away_with_data<T: Into<StreamId>>(last: T, reason: Reason, data: &'static str) -> Frame {
    GoAway::new(reason)
        .set_last_stream_id(last.into())
        .set_data(data)
        .into()
}

/// Payload of a non-ack PING frame
pub fn ping_payload(frame: &Frame) -> PingPayload {
    match frame {
        Frame::Ping(ping) if !ping.is_ack() => ping.into_payload(),
        frame => panic!("unexpected frame; actual={:?}", frame),
    }
}
