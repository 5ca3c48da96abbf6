use ntex_util::time::{Millis, Seconds};

use crate::frame::WindowSize;

// Constants
pub const MAX_WINDOW_SIZE: WindowSize = (1 << 31) - 1;
pub const MIN_MAX_FRAME_SIZE: u32 = 1 << 14;
pub const DEFAULT_SETTINGS_MAX_HEADER_LIST_SIZE: u32 = 16_384;

pub const DEFAULT_KEEPALIVE_TIME: Millis = Millis(7_200_000);
pub const DEFAULT_KEEPALIVE_TIMEOUT: Millis = Millis(20_000);
pub const DEFAULT_MIN_PING_INTERVAL_WITHOUT_CALLS: Millis = Millis(300_000);
pub const DEFAULT_CLIENT_MAX_IDLE_TIME: Millis = Millis(1_800_000);

// Peer stream reset rate limits
pub const DEFAULT_RESET_STREAM_MAX: usize = 200;
pub const DEFAULT_RESET_STREAM_SECS: Seconds = Seconds(30);
pub const CLIENT_RESET_STREAM_SECS: Seconds = Seconds(10);

// Ping policing
pub(crate) const MAX_PING_STRIKES: u32 = 2;
pub(crate) const SHUTDOWN_PING_NONCE: u64 = 0x6b69_6c6c_6b69_6c6c;
