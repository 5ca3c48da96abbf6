use std::time::Duration;

use ntex_util::time::Millis;

use crate::codec::{Algorithms, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::{consts, frame};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Keepalive configuration
pub struct KeepaliveConfig {
    /// Interval between pings
    pub(crate) time: Millis,
    /// How long to wait for ping ack
    pub(crate) timeout: Millis,
    /// Send pings when there are no active streams
    pub(crate) allow_without_calls: bool,
}

impl KeepaliveConfig {
    pub fn new(time: Millis, timeout: Millis) -> Self {
        KeepaliveConfig {
            time,
            timeout,
            allow_without_calls: false,
        }
    }

    /// Allow keepalive pings while there are no open streams.
    ///
    /// The default value is `false`.
    pub fn allow_without_calls(mut self, allow: bool) -> Self {
        self.allow_without_calls = allow;
        self
    }

    pub fn time(&self) -> Millis {
        self.time
    }

    pub fn timeout(&self) -> Millis {
        self.timeout
    }

    pub fn is_allowed_without_calls(&self) -> bool {
        self.allow_without_calls
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        KeepaliveConfig::new(consts::DEFAULT_KEEPALIVE_TIME, consts::DEFAULT_KEEPALIVE_TIMEOUT)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Http/2 settings shared by server and client
pub struct Http2Config {
    pub(crate) max_frame_size: u32,
    pub(crate) target_window_size: u32,
    pub(crate) max_concurrent_streams: Option<u32>,
}

impl Default for Http2Config {
    fn default() -> Self {
        Http2Config {
            max_frame_size: frame::DEFAULT_MAX_FRAME_SIZE,
            target_window_size: frame::DEFAULT_INITIAL_WINDOW_SIZE,
            max_concurrent_streams: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Server transport configuration
pub struct ServerConfig {
    pub(crate) compression: Algorithms,
    pub(crate) max_idle_time: Option<Millis>,
    pub(crate) max_age: Option<Millis>,
    pub(crate) max_grace_time: Option<Millis>,
    pub(crate) keepalive: KeepaliveConfig,
    pub(crate) min_ping_interval_without_calls: Millis,
    pub(crate) http2: Http2Config,
    pub(crate) max_request_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new()
    }
}

impl ServerConfig {
    /// Create configuration
    pub fn new() -> Self {
        ServerConfig {
            compression: Algorithms::empty(),
            max_idle_time: None,
            max_age: None,
            max_grace_time: None,
            keepalive: KeepaliveConfig::default(),
            min_ping_interval_without_calls: consts::DEFAULT_MIN_PING_INTERVAL_WITHOUT_CALLS,
            http2: Http2Config::default(),
            max_request_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Set enabled compression algorithms.
    ///
    /// The default value is no compression.
    pub fn compression(mut self, algorithms: Algorithms) -> Self {
        self.compression = algorithms;
        self
    }

    /// Max time a connection may have no open streams before it is
    /// gracefully closed.
    ///
    /// The default value is unbounded.
    pub fn max_idle_time(mut self, time: Millis) -> Self {
        self.max_idle_time = Some(time);
        self
    }

    /// Max age of a connection, after which it is gracefully closed.
    ///
    /// The default value is unbounded.
    pub fn max_age(mut self, time: Millis) -> Self {
        self.max_age = Some(time);
        self
    }

    /// Max time open streams have to finish during graceful shutdown.
    ///
    /// The default value is unbounded.
    pub fn max_grace_time(mut self, time: Millis) -> Self {
        self.max_grace_time = Some(time);
        self
    }

    /// Server keepalive pings.
    ///
    /// The default value is 2 hours interval and 20 seconds timeout.
    pub fn keepalive(mut self, cfg: KeepaliveConfig) -> Self {
        self.keepalive = cfg;
        self
    }

    /// Min interval between client pings while there are no open streams.
    ///
    /// The default value is 5 minutes.
    pub fn min_ping_interval_without_calls(mut self, time: Millis) -> Self {
        self.min_ping_interval_without_calls = time;
        self
    }

    /// Indicates the size of the largest HTTP/2 frame payload.
    ///
    /// Value is clamped to 16,384..=16,777,215. The default value is 16,384.
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.http2.max_frame_size = size;
        self
    }

    /// Initial window size of received data.
    ///
    /// Value is clamped to 2^31-1. The default value is 65,535.
    pub fn target_window_size(mut self, size: u32) -> Self {
        self.http2.target_window_size = size;
        self
    }

    /// Maximum number of concurrent streams the peer may open.
    ///
    /// The default value is unlimited.
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.http2.max_concurrent_streams = Some(max);
        self
    }

    /// Max size of received request message.
    ///
    /// The default value is 4Mb.
    pub fn max_request_payload_size(mut self, size: usize) -> Self {
        self.max_request_payload_size = size;
        self
    }

    pub fn get_compression(&self) -> Algorithms {
        self.compression
    }

    pub fn get_max_idle_time(&self) -> Option<Millis> {
        self.max_idle_time
    }

    pub fn get_max_age(&self) -> Option<Millis> {
        self.max_age
    }

    pub fn get_max_grace_time(&self) -> Option<Millis> {
        self.max_grace_time
    }

    pub fn get_keepalive(&self) -> &KeepaliveConfig {
        &self.keepalive
    }

    pub fn get_min_ping_interval_without_calls(&self) -> Millis {
        self.min_ping_interval_without_calls
    }

    pub fn get_http2(&self) -> &Http2Config {
        &self.http2
    }

    pub fn get_max_request_payload_size(&self) -> usize {
        self.max_request_payload_size
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Client transport configuration
pub struct ClientConfig {
    pub(crate) compression: Algorithms,
    pub(crate) max_idle_time: Option<Millis>,
    pub(crate) keepalive: Option<KeepaliveConfig>,
    pub(crate) http2: Http2Config,
    pub(crate) max_response_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new()
    }
}

impl ClientConfig {
    /// Create configuration
    pub fn new() -> Self {
        ClientConfig {
            compression: Algorithms::empty(),
            max_idle_time: Some(consts::DEFAULT_CLIENT_MAX_IDLE_TIME),
            keepalive: None,
            http2: Http2Config::default(),
            max_response_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Set enabled compression algorithms.
    ///
    /// The default value is no compression.
    pub fn compression(mut self, algorithms: Algorithms) -> Self {
        self.compression = algorithms;
        self
    }

    /// Max time a connection may have no open streams.
    ///
    /// The default value is 30 minutes.
    pub fn max_idle_time(mut self, time: Option<Millis>) -> Self {
        self.max_idle_time = time;
        self
    }

    /// Client keepalive pings.
    ///
    /// The default value is disabled.
    pub fn keepalive(mut self, cfg: KeepaliveConfig) -> Self {
        self.keepalive = Some(cfg);
        self
    }

    /// Indicates the size of the largest HTTP/2 frame payload.
    ///
    /// Value is clamped to 16,384..=16,777,215. The default value is 16,384.
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.http2.max_frame_size = size;
        self
    }

    /// Initial window size of received data.
    ///
    /// Value is clamped to 2^31-1. The default value is 65,535.
    pub fn target_window_size(mut self, size: u32) -> Self {
        self.http2.target_window_size = size;
        self
    }

    /// Max size of received response message.
    ///
    /// The default value is 4Mb.
    pub fn max_response_payload_size(mut self, size: usize) -> Self {
        self.max_response_payload_size = size;
        self
    }

    pub fn get_compression(&self) -> Algorithms {
        self.compression
    }

    pub fn get_max_idle_time(&self) -> Option<Millis> {
        self.max_idle_time
    }

    pub fn get_keepalive(&self) -> Option<&KeepaliveConfig> {
        self.keepalive.as_ref()
    }

    pub fn get_http2(&self) -> &Http2Config {
        &self.http2
    }

    pub fn get_max_response_payload_size(&self) -> usize {
        self.max_response_payload_size
    }
}

pub(crate) fn duration(time: Millis) -> Duration {
    Duration::from_millis(time.0 as u64)
}
