//! Protocol stack assembly.
//!
//! A stack consists of a flush notification hook, the connection
//! management handler running in a task group, settings for the HTTP/2
//! layer and a per-stream initializer that builds [`StreamHandler`]s.
use std::{fmt, rc::Rc};

use ntex_util::{channel::mpsc, time::Seconds};

use crate::config::{ClientConfig, Http2Config, ServerConfig};
use crate::connection::{
    self, ClientConnection, ClientEvent, ConnectionHandle, ServerConnection, ServerEvent,
    Transport,
};
use crate::frame::{Reason, Reset, Settings, StreamId, MAX_MAX_FRAME_SIZE};
use crate::stream::{MethodDescriptor, StreamConfig, StreamHandler, StreamObserver};
use crate::consts;
use crate::task_group::{CancellableTaskHandle, TaskGroup};

/// Clamp max frame size to `2^14..=2^24-1`
pub fn clamp_max_frame_size(size: u32) -> u32 {
    size.clamp(consts::MIN_MAX_FRAME_SIZE, MAX_MAX_FRAME_SIZE)
}

/// Clamp target window size to `2^31-1`
pub fn clamp_target_window_size(size: u32) -> u32 {
    size.min(consts::MAX_WINDOW_SIZE)
}

#[derive(Debug, Clone, PartialEq)]
/// Settings for the HTTP/2 layer
pub struct Http2Settings {
    /// Initial SETTINGS frame
    pub initial: Settings,
    pub target_window_size: u32,
    pub max_frame_size: u32,
    /// Max number of peer stream resets in `reset_stream_window`
    pub reset_stream_max: usize,
    pub reset_stream_window: Seconds,
}

impl Http2Settings {
    fn new(cfg: &Http2Config, client: bool) -> Self {
        let target_window_size = clamp_target_window_size(cfg.target_window_size);
        let max_frame_size = clamp_max_frame_size(cfg.max_frame_size);

        let mut initial = Settings::default();
        if client {
            // servers must not create push streams
            initial.set_enable_push(false);
        }
        initial.set_initial_window_size(Some(target_window_size));
        initial.set_max_frame_size(Some(max_frame_size));
        initial.set_max_header_list_size(Some(consts::DEFAULT_SETTINGS_MAX_HEADER_LIST_SIZE));
        if !client {
            initial.set_max_concurrent_streams(cfg.max_concurrent_streams);
        }

        Http2Settings {
            initial,
            target_window_size,
            max_frame_size,
            reset_stream_max: consts::DEFAULT_RESET_STREAM_MAX,
            reset_stream_window: if client {
                consts::CLIENT_RESET_STREAM_SECS
            } else {
                consts::DEFAULT_RESET_STREAM_SECS
            },
        }
    }
}

#[derive(Clone, Debug)]
/// Reports written data to the connection handler
pub struct FlushNotifier(ConnectionHandle);

impl FlushNotifier {
    pub fn notify(&self) {
        self.0.flush()
    }
}

/// Server protocol stack
pub struct ServerStack<T> {
    transport: T,
    flush: FlushNotifier,
    connection: ConnectionHandle,
    events: Option<mpsc::Receiver<ServerEvent>>,
    task: CancellableTaskHandle,
    http2: Http2Settings,
    stream_cfg: StreamConfig,
}

impl<T: Transport + Clone + 'static> ServerStack<T> {
    /// Build server stack and start connection handler in `group`
    pub fn new(cfg: &ServerConfig, transport: T, group: &TaskGroup) -> Self {
        let http2 = Http2Settings::new(&cfg.http2, false);
        log::debug!("starting server connection; settings={:?}", http2.initial);

        let handler = ServerConnection::new(cfg);
        let (connection, events, task) = connection::start(handler, transport.clone(), group);
        transport.send(http2.initial.clone().into());

        ServerStack {
            transport,
            http2,
            task,
            flush: FlushNotifier(connection.clone()),
            connection,
            events: Some(events),
            stream_cfg: StreamConfig {
                compression: cfg.compression,
                max_payload_size: cfg.max_request_payload_size,
            },
        }
    }

    /// Create handler for a stream opened by the peer
    pub fn accept_stream(&self, id: StreamId) -> Option<StreamHandler> {
        if !id.is_client_initiated() {
            proto_err!(stream: "invalid stream id {:?}", id);
            self.transport
                .send(Reset::new(id, Reason::PROTOCOL_ERROR).into());
            return None;
        }

        let observer: Rc<dyn StreamObserver> = Rc::new(self.connection.clone());
        Some(StreamHandler::new(id, self.stream_cfg, observer))
    }
}

impl<T> ServerStack<T> {
    pub fn flush_notifier(&self) -> &FlushNotifier {
        &self.flush
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Take connection events receiver
    pub fn events(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.events.take()
    }

    pub fn http2_settings(&self) -> &Http2Settings {
        &self.http2
    }

    /// Stop connection handler
    pub fn shutdown(&self) {
        self.task.cancel()
    }
}

/// Client protocol stack
pub struct ClientStack<T> {
    transport: T,
    flush: FlushNotifier,
    connection: ConnectionHandle,
    events: Option<mpsc::Receiver<ClientEvent>>,
    task: CancellableTaskHandle,
    http2: Http2Settings,
    stream_cfg: StreamConfig,
}

impl<T: Transport + Clone + 'static> ClientStack<T> {
    /// Build client stack and start connection handler in `group`
    pub fn new(cfg: &ClientConfig, transport: T, group: &TaskGroup) -> Self {
        let http2 = Http2Settings::new(&cfg.http2, true);
        log::debug!("starting client connection; settings={:?}", http2.initial);

        let handler = ClientConnection::new(cfg);
        let (connection, events, task) = connection::start(handler, transport.clone(), group);
        transport.send(http2.initial.clone().into());

        ClientStack {
            transport,
            http2,
            task,
            flush: FlushNotifier(connection.clone()),
            connection,
            events: Some(events),
            stream_cfg: StreamConfig {
                compression: cfg.compression,
                max_payload_size: cfg.max_response_payload_size,
            },
        }
    }

    /// Create handler for a locally initiated stream
    pub fn open_stream(&self, id: StreamId, method: MethodDescriptor) -> StreamHandler {
        let observer: Rc<dyn StreamObserver> = Rc::new(self.connection.clone());
        StreamHandler::with_method(id, method, self.stream_cfg, observer)
    }

    /// Handle stream opened by the peer.
    ///
    /// Push is disabled, such streams are refused.
    pub fn accept_stream(&self, id: StreamId) -> Option<StreamHandler> {
        log::debug!("refusing peer initiated stream {:?}", id);
        self.transport
            .send(Reset::new(id, Reason::REFUSED_STREAM).into());
        None
    }
}

impl<T> ClientStack<T> {
    pub fn flush_notifier(&self) -> &FlushNotifier {
        &self.flush
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Take connection events receiver
    pub fn events(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.events.take()
    }

    pub fn http2_settings(&self) -> &Http2Settings {
        &self.http2
    }

    /// Stop connection handler
    pub fn shutdown(&self) {
        self.task.cancel()
    }
}

impl<T> fmt::Debug for ServerStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStack")
            .field("http2", &self.http2)
            .field("stream_cfg", &self.stream_cfg)
            .finish()
    }
}

impl<T> fmt::Debug for ClientStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStack")
            .field("http2", &self.http2)
            .field("stream_cfg", &self.stream_cfg)
            .finish()
    }
}
